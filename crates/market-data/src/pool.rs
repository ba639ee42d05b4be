//! 고정 크기 워커 풀.
//!
//! 작업은 하나의 공유 큐에 들어가고 `size`개의 워커가 순서 없이 꺼내 처리합니다.
//! 각 작업은 정확히 한 번 실행되며 실패한 작업은 재시도하지 않습니다.
//!
//! ```rust,ignore
//! let mut pool = WorkerPool::new(5);
//! for task in tasks {
//!     pool.put(task)?;
//! }
//! pool.start(|task| async move { collector.save_history(task).await });
//! pool.stop();
//! let report = pool.join().await;
//! ```

use std::fmt::Debug;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{DataError, Result};

/// 실패한 작업.
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    /// 작업 설명 (`Debug` 출력)
    pub task: String,
    /// 오류 메시지
    pub error: String,
}

/// 풀 실행 결과.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolReport {
    /// 성공한 작업 수
    pub completed: usize,
    /// 실패한 작업 수
    pub failed: usize,
    /// 성공한 작업이 처리한 항목 수 합계
    pub items: usize,
    /// 실패 목록
    pub failures: Vec<TaskFailure>,
}

impl PoolReport {
    /// 실패 없이 끝났는지 확인합니다.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn merge(&mut self, other: PoolReport) {
        self.completed += other.completed;
        self.failed += other.failed;
        self.items += other.items;
        self.failures.extend(other.failures);
    }
}

/// 고정 크기 워커 풀.
pub struct WorkerPool<T> {
    size: usize,
    sender: Option<mpsc::UnboundedSender<T>>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
    workers: Vec<JoinHandle<PoolReport>>,
}

impl<T> WorkerPool<T>
where
    T: Debug + Send + 'static,
{
    /// `size`개의 워커를 가진 풀을 생성합니다 (최소 1).
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            size: size.max(1),
            sender: Some(sender),
            receiver: Arc::new(Mutex::new(receiver)),
            workers: Vec::new(),
        }
    }

    /// 워커 수를 반환합니다.
    pub fn size(&self) -> usize {
        self.size
    }

    /// 작업을 큐에 넣습니다.
    pub fn put(&self, task: T) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| DataError::WorkerPool("pool is stopped".to_string()))?;

        sender
            .send(task)
            .map_err(|e| DataError::WorkerPool(format!("queue closed: {:?}", e.0)))
    }

    /// 워커를 시작합니다.
    ///
    /// `handler`는 작업 하나를 처리하고 처리한 항목 수를 반환합니다.
    pub fn start<F, Fut>(&mut self, handler: F) -> Result<()>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<usize>> + Send + 'static,
    {
        if !self.workers.is_empty() {
            return Err(DataError::WorkerPool("pool already started".to_string()));
        }

        let handler = Arc::new(handler);
        for worker_id in 0..self.size {
            let receiver = Arc::clone(&self.receiver);
            let handler = Arc::clone(&handler);
            self.workers
                .push(tokio::spawn(run_worker(worker_id, receiver, handler)));
        }

        debug!(workers = self.size, "워커 풀 시작");
        Ok(())
    }

    /// 큐를 닫습니다. 이미 들어간 작업은 모두 처리됩니다.
    pub fn stop(&mut self) {
        self.sender.take();
    }

    /// 모든 워커가 끝날 때까지 기다립니다.
    ///
    /// 큐가 아직 열려 있으면 먼저 닫습니다.
    pub async fn join(&mut self) -> PoolReport {
        self.stop();

        let mut report = PoolReport::default();
        for handle in self.workers.drain(..) {
            match handle.await {
                Ok(worker_report) => report.merge(worker_report),
                Err(e) => {
                    error!(error = %e, "워커 종료 실패");
                    report.failed += 1;
                    report.failures.push(TaskFailure {
                        task: "<worker>".to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            completed = report.completed,
            failed = report.failed,
            items = report.items,
            "워커 풀 종료"
        );
        report
    }
}

async fn run_worker<T, F, Fut>(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
    handler: Arc<F>,
) -> PoolReport
where
    T: Debug + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<usize>> + Send + 'static,
{
    let mut report = PoolReport::default();

    loop {
        let task = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(task) = task else {
            break;
        };

        let label = format!("{:?}", task);
        match AssertUnwindSafe(handler(task)).catch_unwind().await {
            Ok(Ok(items)) => {
                report.completed += 1;
                report.items += items;
            }
            Ok(Err(e)) => {
                error!(worker_id, task = %label, error = %e, "작업 실패");
                report.failed += 1;
                report.failures.push(TaskFailure {
                    task: label,
                    error: e.to_string(),
                });
            }
            Err(_) => {
                error!(worker_id, task = %label, "작업 중 패닉 발생");
                report.failed += 1;
                report.failures.push(TaskFailure {
                    task: label,
                    error: "panicked".to_string(),
                });
            }
        }
    }

    debug!(worker_id, completed = report.completed, "워커 종료");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_task_runs_exactly_once() {
        let seen = Arc::new(StdMutex::new(HashMap::<u32, usize>::new()));
        let mut pool = WorkerPool::new(4);
        for i in 0..200u32 {
            pool.put(i).unwrap();
        }

        let counter = Arc::clone(&seen);
        pool.start(move |task: u32| {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock().unwrap().entry(task).or_default() += 1;
                Ok::<_, DataError>(1)
            }
        })
        .unwrap();
        pool.stop();
        let report = pool.join().await;

        assert_eq!(report.completed, 200);
        assert_eq!(report.items, 200);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 200);
        assert!(seen.values().all(|&n| n == 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failures_are_not_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new(3);
        for i in 0..10u32 {
            pool.put(i).unwrap();
        }

        let counter = Arc::clone(&attempts);
        pool.start(move |task: u32| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if task % 2 == 0 {
                    Err(DataError::InvalidData(format!("task {}", task)))
                } else {
                    Ok(task as usize)
                }
            }
        })
        .unwrap();
        let report = pool.join().await;

        assert_eq!(attempts.load(Ordering::SeqCst), 10);
        assert_eq!(report.completed, 5);
        assert_eq!(report.failed, 5);
        assert_eq!(report.items, 1 + 3 + 5 + 7 + 9);
        assert!(!report.is_success());
        assert!(report.failures.iter().any(|f| f.task == "4"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new(3);
        for i in 0..12u32 {
            pool.put(i).unwrap();
        }

        let (current, max) = (Arc::clone(&in_flight), Arc::clone(&peak));
        pool.start(move |_task: u32| {
            let (current, max) = (Arc::clone(&current), Arc::clone(&max));
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, DataError>(0)
            }
        })
        .unwrap();
        let report = pool.join().await;

        assert_eq!(report.completed, 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported() {
        let mut pool = WorkerPool::new(1);
        for i in 0..3u32 {
            pool.put(i).unwrap();
        }

        pool.start(|task: u32| async move {
            if task == 1 {
                panic!("boom");
            }
            Ok::<_, DataError>(1)
        })
        .unwrap();
        let report = pool.join().await;

        // 패닉 후에도 같은 워커가 다음 작업을 처리
        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_put_after_stop_fails() {
        let mut pool: WorkerPool<u32> = WorkerPool::new(2);
        pool.stop();
        assert!(matches!(pool.put(1), Err(DataError::WorkerPool(_))));

        // 작업 없이 시작/종료
        pool.start(|_| async { Ok::<_, DataError>(0) }).unwrap();
        let report = pool.join().await;
        assert_eq!(report.completed, 0);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut pool: WorkerPool<u32> = WorkerPool::new(1);
        pool.start(|_| async { Ok::<_, DataError>(0) }).unwrap();
        assert!(pool.start(|_| async { Ok::<_, DataError>(0) }).is_err());
        pool.join().await;
    }
}
