//! 정렬된 시간축 탐색.
//!
//! 캐시 조회 시 "현재 시점 이전의 마지막 봉"과 윈도우 구간을 계산합니다.
//! 축은 오름차순 정렬을 가정하며 `Ord`인 모든 타입에서 동작합니다.

use std::ops::Range;

use thiserror::Error;

/// 윈도우 계산 오류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WindowError {
    /// 빈 시간축
    #[error("empty time axis")]
    EmptyAxis,

    /// 요청 길이보다 사용 가능한 행이 적음
    #[error("insufficient history: requested {requested}, available {available}")]
    InsufficientHistory { requested: usize, available: usize },
}

/// 왼쪽 삽입 위치를 반환합니다.
pub fn search_sorted<T: Ord>(axis: &[T], t: &T) -> usize {
    axis.partition_point(|x| x < t)
}

/// `t` 이하인 마지막 위치를 반환합니다.
///
/// 모든 값이 `t`보다 크면 0, 빈 축이면 `None`입니다.
pub fn locate_at_or_before<T: Ord>(axis: &[T], t: &T) -> Option<usize> {
    if axis.is_empty() {
        return None;
    }

    let i = search_sorted(axis, t);
    if i == axis.len() {
        Some(axis.len() - 1)
    } else if axis[i] <= *t {
        Some(i)
    } else {
        Some(i.saturating_sub(1))
    }
}

/// 윈도우에 해당하는 반열린 구간을 계산합니다.
///
/// 끝 위치는 `now` 이전의 마지막 봉이며, `end`가 주어지면 둘 중 앞선 쪽입니다.
/// - `start`가 있으면 시작 위치부터 (`length`가 있으면 최대 `length`개)
/// - `length`만 있으면 끝에서부터 `length`개
/// - 둘 다 없으면 처음부터 끝까지
pub fn slice_for_window<T: Ord>(
    axis: &[T],
    now: &T,
    start: Option<&T>,
    end: Option<&T>,
    length: Option<usize>,
) -> Result<Range<usize>, WindowError> {
    let last = locate_at_or_before(axis, now).ok_or(WindowError::EmptyAxis)?;
    let end = match end {
        Some(end) => locate_at_or_before(axis, end)
            .ok_or(WindowError::EmptyAxis)?
            .min(last),
        None => last,
    };
    let stop = end + 1;

    match (start, length) {
        (Some(start), length) => {
            let s = search_sorted(axis, start);
            let e = match length {
                Some(length) if s + length <= stop => s + length,
                _ => stop,
            };
            Ok(s.min(e)..e)
        }
        (None, Some(length)) => {
            if stop < length {
                return Err(WindowError::InsufficientHistory {
                    requested: length,
                    available: stop,
                });
            }
            Ok(stop - length..stop)
        }
        (None, None) => Ok(0..stop),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_locate_at_or_before() {
        let axis = [10, 20, 30];
        assert_eq!(locate_at_or_before(&axis, &25), Some(1));
        assert_eq!(locate_at_or_before(&axis, &20), Some(1));
        assert_eq!(locate_at_or_before(&axis, &5), Some(0));
        assert_eq!(locate_at_or_before(&axis, &35), Some(2));
        assert_eq!(locate_at_or_before::<i32>(&[], &35), None);
    }

    #[test]
    fn test_slice_with_start_and_length() {
        let axis = [10, 20, 30, 40];
        assert_eq!(slice_for_window(&axis, &40, Some(&20), None, Some(2)), Ok(1..3));
        // 길이가 끝을 넘으면 끝에서 잘림
        assert_eq!(slice_for_window(&axis, &40, Some(&20), None, Some(10)), Ok(1..4));
        assert_eq!(slice_for_window(&axis, &40, Some(&20), None, None), Ok(1..4));
    }

    #[test]
    fn test_slice_with_end_and_length() {
        let axis = [10, 20, 30, 40];
        let range = slice_for_window(&axis, &40, None, Some(&30), Some(2)).unwrap();
        assert_eq!(range, 1..3);
        assert_eq!(&axis[range], &[20, 30]);
    }

    #[test]
    fn test_slice_bounded_by_now() {
        let axis = [10, 20, 30, 40];
        let range = slice_for_window(&axis, &20, None, None, Some(2)).unwrap();
        assert_eq!(&axis[range], &[10, 20]);

        // end가 now보다 뒤여도 now에서 잘림
        assert_eq!(slice_for_window(&axis, &25, None, Some(&40), None), Ok(0..2));
    }

    #[test]
    fn test_slice_insufficient_history() {
        let axis = [10, 20, 30, 40];
        assert_eq!(
            slice_for_window(&axis, &20, None, None, Some(3)),
            Err(WindowError::InsufficientHistory {
                requested: 3,
                available: 2
            })
        );
        assert_eq!(
            slice_for_window::<i32>(&[], &20, None, None, Some(1)),
            Err(WindowError::EmptyAxis)
        );
    }

    #[test]
    fn test_start_after_end_is_empty() {
        let axis = [10, 20, 30, 40];
        let range = slice_for_window(&axis, &20, Some(&35), None, None).unwrap();
        assert!(range.is_empty());
    }

    proptest! {
        #[test]
        fn prop_locate_is_at_or_before(
            mut axis in prop::collection::btree_set(0i64..10_000, 1..200)
                .prop_map(|s| s.into_iter().collect::<Vec<_>>()),
            t in 0i64..10_000,
        ) {
            axis.dedup();
            let i = locate_at_or_before(&axis, &t).unwrap();
            prop_assert!(i < axis.len());
            if axis[0] <= t {
                prop_assert!(axis[i] <= t);
                if i + 1 < axis.len() {
                    prop_assert!(axis[i + 1] > t);
                }
            } else {
                prop_assert_eq!(i, 0);
            }
        }

        #[test]
        fn prop_window_length_exact(
            axis in prop::collection::btree_set(0i64..10_000, 1..200)
                .prop_map(|s| s.into_iter().collect::<Vec<_>>()),
            now in 0i64..10_000,
            length in 1usize..50,
        ) {
            match slice_for_window(&axis, &now, None, None, Some(length)) {
                Ok(range) => {
                    prop_assert_eq!(range.len(), length);
                    let last = locate_at_or_before(&axis, &now).unwrap();
                    prop_assert_eq!(range.end, last + 1);
                }
                Err(WindowError::InsufficientHistory { requested, available }) => {
                    prop_assert_eq!(requested, length);
                    prop_assert!(available < length);
                }
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }
    }
}
