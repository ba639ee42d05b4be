//! 외부 API 오류 타입.

use thiserror::Error;

/// 요청 범위가 5000개 한도를 넘을 때의 API 코드.
pub const RANGE_TOO_LARGE: i32 = 5000;

/// 요청 조합을 지원하지 않을 때의 API 코드.
pub const UNSUPPORTED_REQUEST: i32 = 36;

/// 외부 API 오류.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// 네트워크 오류
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 인증 실패
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// API가 반환한 오류
    #[error("API error {code}: {message}")]
    Api { code: i32, message: String },

    /// 응답 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 요청 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 알 수 없는 오류
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ApiError {
    /// API 오류 코드를 반환합니다.
    pub fn code(&self) -> Option<i32> {
        match self {
            ApiError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// 5000개 한도 초과 오류인지 확인합니다.
    pub fn is_range_too_large(&self) -> bool {
        match self {
            ApiError::Api { code, message } => {
                *code == RANGE_TOO_LARGE || message.contains("5000")
            }
            _ => false,
        }
    }

    /// 지원하지 않는 요청(코드 36)인지 확인합니다.
    pub fn is_unsupported_request(&self) -> bool {
        self.code() == Some(UNSUPPORTED_REQUEST)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else if err.is_decode() {
            ApiError::ParseError(err.to_string())
        } else {
            ApiError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = ApiError::Api {
            code: 5000,
            message: "too many".to_string(),
        };
        assert!(err.is_range_too_large());
        assert!(!err.is_unsupported_request());

        let err = ApiError::Api {
            code: 46,
            message: "count exceeds 5000 candles".to_string(),
        };
        assert!(err.is_range_too_large());

        let err = ApiError::Api {
            code: 36,
            message: "unsupported".to_string(),
        };
        assert!(err.is_unsupported_request());
        assert!(!err.is_range_too_large());

        assert!(!ApiError::NetworkError("5000".to_string()).is_range_too_large());
    }
}
