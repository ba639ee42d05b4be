//! 수집기 설정 모듈.
//!
//! 설정 파일은 `--config` 경로, 레지스트리의 `default` 항목, 환경변수
//! (`FXDATA__…`) 순서로 찾습니다. 워커 수와 요청 간격은 `COLLECTOR_*`
//! 환경변수로 덮어쓸 수 있습니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use market_core::{AppConfig, LogConfig};
use market_data::{
    DocumentStore, FieldMapper, FieldMappers, HistorySource, OandaClient, OandaConfig,
    PaginatedFetcher, PgDocumentStore,
};

use crate::error::{CollectorError, Result};
use crate::registry::ConfigRegistry;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 애플리케이션 설정
    pub app: AppConfig,
    /// 설정을 읽은 파일 (환경변수만 사용했으면 없음)
    pub source: Option<PathBuf>,
    /// 동시 워커 수
    pub workers: usize,
    /// API 요청 간 딜레이 (밀리초)
    pub request_delay_ms: u64,
    /// 페이지당 최대 캔들 수
    pub page_limit: usize,
}

impl CollectorConfig {
    /// 설정 로드
    pub fn load(path: Option<&Path>, registry: &ConfigRegistry) -> Result<Self> {
        dotenvy::dotenv().ok();

        let source = match path {
            Some(path) => Some(path.to_path_buf()),
            None => registry.default_path()?,
        };

        let app = match &source {
            Some(path) => AppConfig::load(path),
            None => AppConfig::from_env(),
        }
        .map_err(|e| CollectorError::Config(e.to_string()))?;

        Ok(Self::from_app(app, source))
    }

    /// 애플리케이션 설정에서 생성 (환경변수 오버라이드 적용)
    pub fn from_app(app: AppConfig, source: Option<PathBuf>) -> Self {
        let workers = env_var_parse("COLLECTOR_WORKERS", app.collector.workers).max(1);
        let request_delay_ms =
            env_var_parse("COLLECTOR_REQUEST_DELAY_MS", app.collector.request_delay_ms);
        let page_limit = env_var_parse("COLLECTOR_PAGE_LIMIT", app.collector.page_limit);

        Self {
            app,
            source,
            workers,
            request_delay_ms,
            page_limit,
        }
    }

    /// API 요청 간 딜레이를 Duration으로 반환
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// 기본 db 식별자
    pub fn db(&self) -> &str {
        &self.app.store.db
    }

    /// 로깅 설정
    pub fn log_config(&self) -> LogConfig {
        LogConfig::from(&self.app.logging)
    }

    /// db별 필드 매퍼 (설정이 없으면 OANDA 기본 매퍼)
    pub fn field_mappers(&self) -> FieldMappers {
        if self.app.field_mappers.is_empty() {
            FieldMappers::new().with(self.db(), FieldMapper::oanda())
        } else {
            FieldMappers::from_config(&self.app.field_mappers)
        }
    }

    /// 페이지 조회기 생성
    pub fn fetcher(&self, source: Arc<dyn HistorySource>) -> PaginatedFetcher {
        let fetcher = PaginatedFetcher::new(source).with_page_limit(self.page_limit);
        if self.request_delay_ms > 0 {
            fetcher.with_request_delay(self.request_delay())
        } else {
            fetcher
        }
    }

    /// OANDA 클라이언트 생성
    pub fn oanda_client(&self) -> Result<Arc<OandaClient>> {
        let config = OandaConfig::from_settings(&self.app.oanda)?;
        Ok(Arc::new(OandaClient::new(config)?))
    }

    /// 저장소 연결 및 마이그레이션
    pub async fn connect_store(&self) -> Result<Arc<dyn DocumentStore>> {
        let store = PgDocumentStore::connect(&self.app.store).await?;
        store.migrate().await?;
        tracing::info!(db = self.db(), "저장소 연결 성공");
        Ok(Arc::new(store))
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
