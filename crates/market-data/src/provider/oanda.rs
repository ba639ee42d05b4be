//! OANDA v1 REST API 클라이언트.
//!
//! `GET /v1/candles`로 과거 캔들을 조회합니다. 한 번의 요청은 최대 5000개이며
//! 한도를 넘는 범위는 `PaginatedFetcher`가 나누어 요청합니다.
//!
//! 보조 데이터셋은 labs 엔드포인트를 사용합니다.
//! - HPR: `/labs/v1/historical_position_ratios`
//! - CLD: `/labs/v1/calendar`
//! - COT: `/labs/v1/commitments_of_traders`

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::{Dataset, Instrument, OandaSettings, Record};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error, instrument};

use super::{ApiError, DatasetSource, HistoryQuery, HistorySource};

/// 요청 시간 형식.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%6fZ";

// ============================================================================
// 설정
// ============================================================================

/// OANDA 환경.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OandaEnvironment {
    /// 모의 계좌
    #[default]
    Practice,
    /// 실계좌
    Live,
    /// 샌드박스
    Sandbox,
}

impl OandaEnvironment {
    /// REST API 기본 URL 반환.
    pub fn base_url(&self) -> &'static str {
        match self {
            OandaEnvironment::Practice => "https://api-fxpractice.oanda.com",
            OandaEnvironment::Live => "https://api-fxtrade.oanda.com",
            OandaEnvironment::Sandbox => "http://api-sandbox.oanda.com",
        }
    }
}

impl FromStr for OandaEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "practice" => Ok(Self::Practice),
            "live" => Ok(Self::Live),
            "sandbox" => Ok(Self::Sandbox),
            _ => Err(format!("Unknown OANDA environment: {}", s)),
        }
    }
}

/// OANDA 클라이언트 설정.
///
/// `Debug` 구현은 접근 토큰을 마스킹합니다.
#[derive(Clone)]
pub struct OandaConfig {
    /// 환경
    pub environment: OandaEnvironment,
    /// 접근 토큰
    pub access_token: Option<SecretString>,
    /// 기본 URL (지정 시 환경보다 우선)
    pub base_url: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl fmt::Debug for OandaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OandaConfig")
            .field("environment", &self.environment)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "***REDACTED***"),
            )
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl OandaConfig {
    /// 새 설정 생성.
    pub fn new(environment: OandaEnvironment) -> Self {
        Self {
            environment,
            access_token: None,
            base_url: None,
            timeout_secs: 30,
        }
    }

    /// 접근 토큰 설정.
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.access_token = Some(token);
        self
    }

    /// 기본 URL 설정.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// 애플리케이션 설정에서 생성.
    pub fn from_settings(settings: &OandaSettings) -> Result<Self, ApiError> {
        let environment = settings
            .environment
            .parse()
            .map_err(ApiError::Unknown)?;

        Ok(Self {
            environment,
            access_token: settings.secret_token(),
            base_url: settings.base_url.clone(),
            timeout_secs: settings.timeout_secs,
        })
    }

    /// REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    candles: Vec<Map<String, Value>>,
}

/// HPR 응답: `{"data": {"EUR_USD": {"data": [[timestamp, ratio, rate], ...]}}}`
#[derive(Debug, Deserialize)]
struct PositionRatiosResponse {
    data: HashMap<String, PositionRatioSeries>,
}

#[derive(Debug, Deserialize)]
struct PositionRatioSeries {
    data: Vec<(i64, f64, f64)>,
}

#[derive(Debug, Deserialize)]
struct OandaErrorBody {
    code: i32,
    message: String,
}

// ============================================================================
// 클라이언트
// ============================================================================

/// OANDA REST API 클라이언트.
pub struct OandaClient {
    config: OandaConfig,
    client: Client,
}

impl OandaClient {
    /// 새 클라이언트 생성.
    pub fn new(config: OandaConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// 요청 쿼리 파라미터를 구성합니다.
    fn query_params(query: &HistoryQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("instrument", query.instrument.to_string()),
            ("granularity", query.granularity.to_string()),
            ("candleFormat", query.candle_format.clone()),
            ("dailyAlignment", query.daily_alignment.to_string()),
            ("alignmentTimezone", query.alignment_timezone.clone()),
        ];

        if let Some(start) = query.start {
            params.push(("start", start.format(TIME_FORMAT).to_string()));
        }
        if let Some(end) = query.end {
            params.push(("end", end.format(TIME_FORMAT).to_string()));
        }
        if let Some(count) = query.count {
            params.push(("count", count.to_string()));
        }
        if let Some(include_first) = query.include_first {
            params.push(("includeFirst", include_first.to_string()));
        }

        params
    }

    /// GET 요청 후 응답 본문을 파싱합니다.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.config.rest_base_url(), path);

        let mut request = self.client.get(&url).query(params);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token.expose_secret());
        }

        self.handle_response(request.send().await?).await
    }

    /// API 응답 처리.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                error!("Failed to parse response: {} - Body: {}", e, body);
                ApiError::ParseError(e.to_string())
            })
        } else if status == reqwest::StatusCode::UNAUTHORIZED {
            Err(ApiError::Unauthorized(body))
        } else if let Ok(error) = serde_json::from_str::<OandaErrorBody>(&body) {
            Err(ApiError::Api {
                code: error.code,
                message: error.message,
            })
        } else {
            Err(ApiError::Api {
                code: status.as_u16() as i32,
                message: body,
            })
        }
    }

    /// 캔들 객체를 레코드로 변환합니다 (`time` → `datetime`).
    fn to_record(candle: Map<String, Value>) -> Result<Record, ApiError> {
        let time = candle
            .get("time")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::ParseError("candle without time".to_string()))?;
        let datetime = DateTime::parse_from_rfc3339(time)
            .map_err(|e| ApiError::ParseError(format!("invalid candle time '{}': {}", time, e)))?
            .with_timezone(&Utc);

        Ok(Record {
            datetime,
            values: candle,
        })
    }

    /// 유닉스 시간(초) 필드로 시간을 정하는 레코드 변환.
    fn timestamp_record(doc: Map<String, Value>, field: &str) -> Result<Record, ApiError> {
        let secs = doc
            .get(field)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .ok_or_else(|| ApiError::ParseError(format!("document without {}", field)))?;
        let datetime = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| ApiError::ParseError(format!("invalid timestamp: {}", secs)))?;

        Ok(Record {
            datetime,
            values: doc,
        })
    }

    async fn position_ratios(
        &self,
        instrument: &Instrument,
        params: &[(&'static str, String)],
    ) -> Result<Vec<Record>, ApiError> {
        let mut response: PositionRatiosResponse = self
            .get_json("/labs/v1/historical_position_ratios", params)
            .await?;
        let series = response.data.remove(instrument.as_str()).ok_or_else(|| {
            ApiError::ParseError(format!("no position ratios for {}", instrument))
        })?;

        series
            .data
            .into_iter()
            .map(|(timestamp, ratio, rate)| {
                let mut doc = Map::new();
                doc.insert("timestamp".to_string(), timestamp.into());
                doc.insert("long_position_ratio".to_string(), ratio.into());
                doc.insert("exchange_rate".to_string(), rate.into());
                Self::timestamp_record(doc, "timestamp")
            })
            .collect()
    }

    async fn calendar(
        &self,
        params: &[(&'static str, String)],
    ) -> Result<Vec<Record>, ApiError> {
        let events: Vec<Map<String, Value>> = self.get_json("/labs/v1/calendar", params).await?;
        events
            .into_iter()
            .map(|doc| Self::timestamp_record(doc, "timestamp"))
            .collect()
    }

    async fn commitments_of_traders(
        &self,
        instrument: &Instrument,
        params: &[(&'static str, String)],
    ) -> Result<Vec<Record>, ApiError> {
        let mut response: HashMap<String, Vec<Map<String, Value>>> = self
            .get_json("/labs/v1/commitments_of_traders", params)
            .await?;
        let reports = response.remove(instrument.as_str()).ok_or_else(|| {
            ApiError::ParseError(format!("no commitments of traders for {}", instrument))
        })?;

        reports
            .into_iter()
            .map(|doc| Self::timestamp_record(doc, "date"))
            .collect()
    }
}

#[async_trait]
impl HistorySource for OandaClient {
    #[instrument(skip(self), fields(instrument = %query.instrument, granularity = %query.granularity))]
    async fn get_history(&self, query: &HistoryQuery) -> Result<Vec<Record>, ApiError> {
        let response: CandlesResponse = self
            .get_json("/v1/candles", &Self::query_params(query))
            .await?;
        let records = response
            .candles
            .into_iter()
            .map(Self::to_record)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = records.len(), "캔들 조회 완료");
        Ok(records)
    }
}

#[async_trait]
impl DatasetSource for OandaClient {
    #[instrument(skip_all, fields(instrument = %instrument, dataset = %dataset))]
    async fn get_dataset(
        &self,
        dataset: Dataset,
        instrument: &Instrument,
        period: u64,
    ) -> Result<Vec<Record>, ApiError> {
        let params = [
            ("instrument", instrument.to_string()),
            ("period", period.to_string()),
        ];

        let mut records = match dataset {
            Dataset::PositionRatios => self.position_ratios(instrument, &params).await?,
            Dataset::Calendar => self.calendar(&params).await?,
            Dataset::CommitmentsOfTraders => {
                self.commitments_of_traders(instrument, &params).await?
            }
        };
        records.sort_by_key(|r| r.datetime);

        debug!(count = records.len(), "데이터셋 조회 완료");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use market_core::{Granularity, Instrument};
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> OandaClient {
        let config = OandaConfig::new(OandaEnvironment::Practice)
            .with_token(SecretString::new("test-token".to_string().into()))
            .with_base_url(server.url());
        OandaClient::new(config).unwrap()
    }

    #[test]
    fn test_query_params_format() {
        let query = HistoryQuery::new(Instrument::from("EUR_USD"), Granularity::D)
            .with_start(Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap())
            .with_count(5000)
            .with_include_first(false);

        let params = OandaClient::query_params(&query);
        assert!(params.contains(&("start", "2016-01-01T00:00:00.000000Z".to_string())));
        assert!(params.contains(&("includeFirst", "false".to_string())));
        assert!(params.contains(&("candleFormat", "midpoint".to_string())));
        assert!(params.contains(&("alignmentTimezone", "UTC".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "end"));
    }

    #[test]
    fn test_config_debug_masks_token() {
        let config = OandaConfig::new(OandaEnvironment::Live)
            .with_token(SecretString::new("secret-value".to_string().into()));
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-value"));
        assert_eq!(config.rest_base_url(), "https://api-fxtrade.oanda.com");
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("practice".parse(), Ok(OandaEnvironment::Practice));
        assert_eq!("SANDBOX".parse(), Ok(OandaEnvironment::Sandbox));
        assert!("demo".parse::<OandaEnvironment>().is_err());
    }

    #[tokio::test]
    async fn test_get_history_parses_candles() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/candles")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("instrument".into(), "EUR_USD".into()),
                Matcher::UrlEncoded("granularity".into(), "D".into()),
                Matcher::UrlEncoded("count".into(), "2".into()),
            ]))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"instrument":"EUR_USD","granularity":"D","candles":[
                    {"time":"2016-01-04T00:00:00.000000Z","openMid":1.0862,"closeMid":1.0827,"volume":10,"complete":true},
                    {"time":"2016-01-05T00:00:00.000000Z","openMid":1.0827,"closeMid":1.0746,"volume":12,"complete":true}
                ]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let query = HistoryQuery::new(Instrument::from("EUR_USD"), Granularity::D).with_count(2);
        let records = client.get_history(&query).await.unwrap();

        mock.assert_async().await;
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].datetime,
            Utc.with_ymd_and_hms(2016, 1, 4, 0, 0, 0).unwrap()
        );
        assert_eq!(records[1].get_f64("closeMid"), 1.0746);
        assert!(records[0].get("time").is_some());
    }

    #[tokio::test]
    async fn test_get_history_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/candles")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":36,"message":"Invalid combination","moreInfo":""}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let query = HistoryQuery::new(Instrument::from("EUR_USD"), Granularity::M);
        let err = client.get_history(&query).await.unwrap_err();

        assert!(err.is_unsupported_request());
    }

    #[tokio::test]
    async fn test_get_history_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/candles")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("denied")
            .create_async()
            .await;

        let client = client_for(&server);
        let query = HistoryQuery::new(Instrument::from("EUR_USD"), Granularity::D);
        assert!(matches!(
            client.get_history(&query).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_get_position_ratios() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/labs/v1/historical_position_ratios")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("instrument".into(), "EUR_USD".into()),
                Matcher::UrlEncoded("period".into(), "86400".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"data":{"EUR_USD":{"label":"EUR/USD","data":[
                    [1451692800,54.2,1.0862],
                    [1451606400,52.1,1.0871]
                ]}}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let records = client
            .get_dataset(Dataset::PositionRatios, &Instrument::from("EUR_USD"), 86400)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(records.len(), 2);
        // 시간순 정렬
        assert_eq!(
            records[0].datetime,
            Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(records[0].get_f64("long_position_ratio"), 52.1);
        assert_eq!(records[1].get_f64("exchange_rate"), 1.0862);
    }

    #[tokio::test]
    async fn test_get_calendar_and_cot() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/labs/v1/calendar")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[{"title":"Non-farm Payrolls","timestamp":1452258000,"currency":"USD","actual":"292","forecast":"200"}]"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/labs/v1/commitments_of_traders")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"EUR_USD":[{"date":1451952000,"oi":"393010","ncl":"70302","ncs":"216468","price":"1.0827"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let eur = Instrument::from("EUR_USD");

        let events = client.get_dataset(Dataset::Calendar, &eur, 86400).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].datetime,
            Utc.with_ymd_and_hms(2016, 1, 8, 13, 0, 0).unwrap()
        );
        assert!(events[0].get("title").is_some());

        let reports = client
            .get_dataset(Dataset::CommitmentsOfTraders, &eur, 86400)
            .await
            .unwrap();
        assert_eq!(
            reports[0].datetime,
            Utc.with_ymd_and_hms(2016, 1, 5, 0, 0, 0).unwrap()
        );

        // 응답에 없는 종목
        let err = client
            .get_dataset(Dataset::CommitmentsOfTraders, &Instrument::from("USD_JPY"), 86400)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ParseError(_)));
    }

    #[tokio::test]
    #[ignore] // 실제 API 호출 필요
    async fn test_live_candles() {
        let token = std::env::var("OANDA_ACCESS_TOKEN").expect("OANDA_ACCESS_TOKEN");
        let client = OandaClient::new(
            OandaConfig::new(OandaEnvironment::Practice)
                .with_token(SecretString::new(token.into())),
        )
        .unwrap();

        let query = HistoryQuery::new(Instrument::from("EUR_USD"), Granularity::D).with_count(10);
        let records = client.get_history(&query).await.unwrap();
        assert!(!records.is_empty());
    }
}
