//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! TOML 파일에서 로드하며 `FXDATA__` 접두사 환경 변수로 오버라이드할 수 있습니다
//! (예: `FXDATA__STORE__URL`).

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 저장소 설정
    #[serde(default)]
    pub store: StoreConfig,
    /// OANDA API 설정
    #[serde(default)]
    pub oanda: OandaSettings,
    /// 수집기 설정
    #[serde(default)]
    pub collector: CollectorSettings,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// db별 필드 매핑 (표준 이름 → 벤더 이름)
    #[serde(default)]
    pub field_mappers: HashMap<String, BTreeMap<String, String>>,
}

/// 영구 저장소 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 연결 URL
    pub url: String,
    /// 기본 db 식별자
    pub db: String,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 최소 연결 수
    pub min_connections: u32,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 유휴 타임아웃 (초)
    pub idle_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/fxdata".to_string(),
            db: "oanda".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 300,
        }
    }
}

/// OANDA API 설정.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OandaSettings {
    /// 환경 (practice, live, sandbox)
    pub environment: String,
    /// 접근 토큰
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// 기본 URL (지정 시 environment보다 우선)
    pub base_url: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl OandaSettings {
    /// 접근 토큰을 SecretString으로 반환합니다.
    pub fn secret_token(&self) -> Option<SecretString> {
        self.access_token
            .as_ref()
            .map(|token| SecretString::new(token.clone().into()))
    }
}

impl Default for OandaSettings {
    fn default() -> Self {
        Self {
            environment: "practice".to_string(),
            access_token: None,
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for OandaSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OandaSettings")
            .field("environment", &self.environment)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// 수집기 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectorSettings {
    /// 워커 수
    pub workers: usize,
    /// API 호출 간 지연 (밀리초)
    pub request_delay_ms: u64,
    /// 요청당 최대 캔들 수
    pub page_limit: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            workers: 5,
            request_delay_ms: 0,
            page_limit: 5000,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("FXDATA")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 환경 변수만으로 설정을 구성합니다.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("FXDATA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

/// `config export`로 내보내는 기본 설정 파일.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# fxdata 설정

[store]
url = "postgres://localhost:5432/fxdata"
db = "oanda"
max_connections = 10
min_connections = 1
connect_timeout_secs = 30
idle_timeout_secs = 300

[oanda]
environment = "practice"
# access_token = ""
timeout_secs = 30

[collector]
workers = 5
request_delay_ms = 0
page_limit = 5000

[logging]
level = "info"
format = "pretty"

[field_mappers.oanda]
open = "openMid"
high = "highMid"
low = "lowMid"
close = "closeMid"
"#;
