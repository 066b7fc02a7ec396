use clap::{Parser, Subcommand};
use crypto_monitor::config::MonitorConfig;
use crypto_monitor::config_loader::{ConfigFormat, ConfigLoader};
use crypto_monitor::monitor::Monitor;
use crypto_monitor::sink::{AlertSink, LogSink, TelegramSink};
use crypto_monitor::source::BinanceClient;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::watch;

/// 암호화폐 RSI / 다이버전스 알림 모니터
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// 설정 파일 경로 (.toml / .json)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// 로그 레벨: trace, debug, info, warn, error (RUST_LOG가 우선)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// 종료 신호가 올 때까지 반복 실행 (기본)
    Run,
    /// 한 사이클만 실행하고 종료
    Once,
    /// 기본 설정 파일 생성
    Init,
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn write_default_config(path: &Path) -> ExitCode {
    if path.exists() {
        error!("설정 파일이 이미 존재합니다: {}", path.display());
        return ExitCode::FAILURE;
    }
    match ConfigLoader::save_to_file(&MonitorConfig::default(), path, ConfigFormat::Auto) {
        Ok(()) => {
            println!("기본 설정 파일 생성: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("기본 설정 파일 생성 실패: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run<K: AlertSink>(config: MonitorConfig, sink: K, command: Command) -> ExitCode {
    let source = BinanceClient::new(config.market_type);
    let mut monitor = match Monitor::new(config, source, sink) {
        Ok(monitor) => monitor,
        Err(e) => {
            error!("모니터 초기화 실패: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if command == Command::Once {
        return match monitor.run_once().await {
            Ok(report) => {
                info!("단일 실행 완료: {:?}", report);
                ExitCode::SUCCESS
            }
            Err(_) => ExitCode::FAILURE,
        };
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("종료 신호 수신, 진행 중인 사이클이 끝나면 종료합니다");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!("Ctrl+C 신호 대기 실패: {}", e),
        }
    });

    info!("Ctrl+C로 종료할 수 있습니다");
    monitor.run_continuous(shutdown_rx).await;
    ExitCode::SUCCESS
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_logging(&args.log_level);

    let command = args.command.unwrap_or(Command::Run);
    if command == Command::Init {
        return write_default_config(&args.config);
    }

    let config = match MonitorConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("설정 로드 실패: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("🚀 크립토 모니터 시작");
    info!("  시장: {}", config.market_type);
    info!("  거래 대금 상위: {}개", config.top_volume_limit);
    info!("  관심 종목: {}개", config.watchlist.len());
    info!("  확인 간격: {}분", config.check_interval_minutes);

    let telegram = config
        .telegram
        .credentials()
        .map(|(token, chat_id)| TelegramSink::new(token, chat_id));

    match telegram {
        Some(sink) => run(config, sink, command).await,
        None => {
            warn!("텔레그램 설정이 없어 알림을 로그로만 출력합니다");
            run(config, LogSink, command).await
        }
    }
}
