// 시세 데이터 소스 모듈
// 캔들과 티커 조회를 거래소와 무관한 인터페이스로 제공합니다.

pub mod binance;

use crate::error::SourceError;
use crate::model::{OhlcvCandle, Ticker, Timeframe};
use async_trait::async_trait;

pub use binance::BinanceClient;

/// 캔들 데이터 제공자
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// 캔들 조회
    ///
    /// # Arguments
    /// * `symbol` - 심볼 (예: "BTCUSDT")
    /// * `timeframe` - 캔들 주기
    /// * `limit` - 최대 캔들 수
    ///
    /// # Returns
    /// * `Result<Vec<OhlcvCandle>, SourceError>` - 시간 순서의 캔들 목록
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<OhlcvCandle>, SourceError>;
}

/// 티커 데이터 제공자
#[async_trait]
pub trait TickerSource: Send + Sync {
    /// 단일 심볼 24시간 티커 조회
    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, SourceError>;

    /// 거래 대금 상위 USDT 종목 조회 (내림차순)
    async fn fetch_top_volume(&self, limit: usize) -> Result<Vec<Ticker>, SourceError>;
}

/// 캔들과 티커를 모두 제공하는 소스
pub trait MarketDataSource: CandleSource + TickerSource {}

impl<T: CandleSource + TickerSource> MarketDataSource for T {}

/// 티커 목록에서 USDT 종목만 골라 거래 대금 내림차순으로 자름
pub fn select_top_volume(tickers: Vec<Ticker>, limit: usize) -> Vec<Ticker> {
    let mut usdt: Vec<Ticker> = tickers
        .into_iter()
        .filter(|t| t.symbol.ends_with("USDT") && t.quote_volume > 0.0)
        .collect();
    usdt.sort_by(|a, b| b.quote_volume.total_cmp(&a.quote_volume));
    usdt.truncate(limit);
    usdt
}
