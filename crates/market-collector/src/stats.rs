//! 수집 통계 구조체.

use market_data::{PoolReport, TaskFailure};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 수집 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 총 작업 수
    pub total: usize,
    /// 성공 횟수
    pub success: usize,
    /// 에러 횟수
    pub errors: usize,
    /// 저장된 총 캔들 수
    pub total_candles: usize,
    /// 실패한 작업 (작업, 에러 메시지)
    pub failures: Vec<(String, String)>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 워커 풀 결과에서 통계 생성
    pub fn from_report(report: PoolReport, elapsed: Duration) -> Self {
        Self {
            total: report.completed + report.failed,
            success: report.completed,
            errors: report.failed,
            total_candles: report.items,
            failures: report
                .failures
                .into_iter()
                .map(|TaskFailure { task, error }| (task, error))
                .collect(),
            elapsed,
        }
    }

    /// 작업 하나의 성공을 기록
    pub fn record_success(&mut self, candles: usize) {
        self.total += 1;
        self.success += 1;
        self.total_candles += candles;
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            total_candles = self.total_candles,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );

        for (task, error) in &self.failures {
            tracing::warn!(operation = operation, task = %task, error = %error, "실패한 작업");
        }
    }
}
