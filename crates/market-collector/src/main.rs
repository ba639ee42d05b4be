//! fxdata CLI.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use market_core::{
    init_logging, init_logging_from_env, Dataset, Granularity, Instrument, LogConfig, LogFormat,
};
use market_data::MarketDataService;
use market_collector::modules::{self, HistoryCollector};
use market_collector::{CollectorConfig, ConfigRegistry};

#[derive(Parser)]
#[command(name = "fxdata")]
#[command(about = "fxdata market data collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (없으면 레지스트리의 default)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// 설정 파일 경로 관리
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    #[command(flatten)]
    Data(DataCommands),
}

/// 저장소/API를 사용하는 명령
#[derive(Subcommand)]
enum DataCommands {
    /// 저장소 데이터 조회 (history, current)
    Execute {
        /// 조회 종류
        read: String,

        /// 위치 인자 또는 key=value (쉼표로 목록)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// 종목 × 주기 과거 캔들 수집
    Save {
        /// 종목 (쉼표로 구분, 예: "EUR_USD,GBP_USD")
        #[arg(long)]
        instruments: String,

        /// 캔들 주기 (쉼표로 구분, 예: "H1,D")
        #[arg(long, default_value = "D")]
        granularities: String,

        /// 시작 시간
        #[arg(long, value_parser = parse_datetime)]
        start: DateTime<Utc>,

        /// 종료 시간
        #[arg(long, value_parser = parse_datetime)]
        end: Option<DateTime<Utc>>,
    },

    /// 주요 통화쌍 × 기본 주기 수집
    SaveMain {
        /// 시작 시간 (기본: 2010-01-01)
        #[arg(long, value_parser = parse_datetime)]
        start: Option<DateTime<Utc>>,

        /// 종료 시간
        #[arg(long, value_parser = parse_datetime)]
        end: Option<DateTime<Utc>>,
    },

    /// 보조 데이터셋 수집 (HPR, CLD, COT)
    SaveDataset {
        /// 종목 (쉼표로 구분)
        #[arg(long)]
        instruments: String,

        /// 데이터셋 (쉼표로 구분)
        #[arg(long, default_value = "HPR,CLD,COT")]
        datasets: String,

        /// 조회 기간 (초, 기본: 1년)
        #[arg(long)]
        period: Option<u64>,
    },

    /// 마지막 캔들 이후 증분 업데이트
    Update {
        /// 컬렉션 이름 (없으면 전체)
        collections: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// 설정 경로 등록
    Add {
        name: String,
        path: PathBuf,
        /// 설정 디렉터리로 복사 후 등록
        #[arg(long)]
        copy: bool,
    },
    /// 기본 설정 지정
    Use { name: String },
    /// 등록 삭제
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// 등록 목록 출력
    Show,
    /// 기본 설정 템플릿 내보내기
    Export {
        path: PathBuf,
        /// 내보낸 파일을 이 이름으로 등록
        #[arg(long)]
        name: Option<String>,
        /// 등록 시 설정 디렉터리로 복사
        #[arg(long)]
        copy: bool,
    },
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    modules::parse_datetime(raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let registry = ConfigRegistry::from_env()?;

    let command = match cli.command {
        Commands::Config { command } => {
            // 설정 명령은 설정 파일을 읽지 않음
            if cli.log_level.is_none() && cli.log_format.is_none() {
                init_logging_from_env()?;
            } else {
                init_logging(log_config(&cli.log_level, cli.log_format, None))?;
            }
            return run_config_command(&registry, command);
        }
        Commands::Data(command) => command,
    };

    let config = CollectorConfig::load(cli.config.as_deref(), &registry)?;
    init_logging(log_config(&cli.log_level, cli.log_format, Some(&config)))?;
    tracing::info!(source = ?config.source, db = config.db(), "fxdata 시작");

    let store = config.connect_store().await?;

    match command {
        DataCommands::Execute { read, args } => {
            let service = MarketDataService::new(store, config.field_mappers());
            let value = modules::execute(&service, &read, &args).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        DataCommands::Save {
            instruments,
            granularities,
            start,
            end,
        } => {
            let collector = HistoryCollector::from_config(&config, config.oanda_client()?, store);
            let instruments = Instrument::parse_list(&instruments);
            let granularities = Granularity::parse_list(&granularities)?;

            let stats = collector
                .save_many(&instruments, &granularities, Some(start), end)
                .await?;
            stats.log_summary("과거 캔들 수집");
        }
        DataCommands::SaveMain { start, end } => {
            let collector = HistoryCollector::from_config(&config, config.oanda_client()?, store);
            let stats = collector.save_main(start, end).await?;
            stats.log_summary("주요 통화쌍 수집");
        }
        DataCommands::SaveDataset {
            instruments,
            datasets,
            period,
        } => {
            let collector = HistoryCollector::from_config(&config, config.oanda_client()?, store);
            let instruments = Instrument::parse_list(&instruments);
            let datasets = Dataset::parse_list(&datasets)?;

            let stats = collector
                .save_datasets(&instruments, &datasets, period)
                .await?;
            stats.log_summary("보조 데이터셋 수집");
        }
        DataCommands::Update { collections } => {
            let collector = HistoryCollector::from_config(&config, config.oanda_client()?, store);
            let stats = collector.update_many(&collections).await?;
            stats.log_summary("증분 업데이트");
        }
    }

    tracing::info!("fxdata 종료");
    Ok(())
}

/// CLI 인자 > 설정 파일 > 환경변수 순서로 로깅 설정 결정
fn log_config(
    level: &Option<String>,
    format: Option<LogFormat>,
    config: Option<&CollectorConfig>,
) -> LogConfig {
    let mut log = config.map_or_else(LogConfig::from_env, CollectorConfig::log_config);
    if let Some(level) = level {
        log.level = level.clone();
    }
    if let Some(format) = format {
        log.format = format;
    }
    log
}

fn run_config_command(
    registry: &ConfigRegistry,
    command: ConfigCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        ConfigCommands::Add { name, path, copy } => {
            let path = registry.add(&name, &path, copy)?;
            println!("Add {}: {}", name, path.display());
        }
        ConfigCommands::Use { name } => {
            let path = registry.use_entry(&name)?;
            println!("Use {}: {} as main config", name, path.display());
        }
        ConfigCommands::Delete { names } => {
            registry.delete(&names)?;
            println!("Deleted: {}", names.join(", "));
        }
        ConfigCommands::Show => {
            for (name, path) in registry.entries()? {
                println!("{}: {}", name, path.display());
            }
        }
        ConfigCommands::Export { path, name, copy } => {
            let path = registry.export(&path, name.as_deref(), copy)?;
            println!("Export default config: {}", path.display());
        }
    }
    Ok(())
}
