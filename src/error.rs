use crate::config_loader::ConfigError;
use thiserror::Error;

/// 시세 데이터 조회 오류
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP 요청 실패: {0}")]
    Http(#[from] reqwest::Error),

    #[error("거래소 응답 오류 (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("응답 파싱 실패: {0}")]
    Parse(String),

    #[error("심볼을 찾을 수 없음: {0}")]
    SymbolNotFound(String),
}

/// 알림 전송 오류
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP 요청 실패: {0}")]
    Http(#[from] reqwest::Error),

    #[error("메시지 전송 거부 (status {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// 지표 계산 오류
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// 워밍업에 필요한 데이터가 부족함
    #[error("데이터 부족: 최소 {required}개 필요, 현재 {actual}개")]
    InsufficientData { required: usize, actual: usize },
}

/// 모니터링 사이클 오류
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("데이터 조회 불가: {0}")]
    DataUnavailable(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("설정 오류: {0}")]
    Config(#[from] ConfigError),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
