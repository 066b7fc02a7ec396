use super::{CandleSource, TickerSource, select_top_volume};
use crate::error::SourceError;
use crate::model::{MarketType, OhlcvCandle, Ticker, Timeframe};
use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;

const SPOT_BASE_URL: &str = "https://api.binance.com";
const FUTURES_BASE_URL: &str = "https://fapi.binance.com";

/// Binance 간격 문자열
pub fn binance_interval(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::Minute1 => "1m",
        Timeframe::Minute5 => "5m",
        Timeframe::Minute15 => "15m",
        Timeframe::Hour1 => "1h",
        Timeframe::Hour4 => "4h",
        Timeframe::Day1 => "1d",
    }
}

/// Binance 공개 REST API 클라이언트 (현물 / USDT 선물)
pub struct BinanceClient {
    http: reqwest::Client,
    market_type: MarketType,
    base_url: String,
}

impl BinanceClient {
    pub fn new(market_type: MarketType) -> Self {
        let base_url = match market_type {
            MarketType::Spot => SPOT_BASE_URL,
            MarketType::Futures => FUTURES_BASE_URL,
        };
        Self::with_base_url(market_type, base_url)
    }

    /// 기본 URL을 지정해 생성
    pub fn with_base_url(market_type: MarketType, base_url: &str) -> Self {
        BinanceClient {
            http: reqwest::Client::new(),
            market_type,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn api_prefix(&self) -> &'static str {
        match self.market_type {
            MarketType::Spot => "/api/v3",
            MarketType::Futures => "/fapi/v1",
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, SourceError> {
        let url = format!("{}{}{}", self.base_url, self.api_prefix(), path);
        let response = self.http.get(&url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

fn parse_number(value: &Value, field: &str) -> Result<f64, SourceError> {
    match value {
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| SourceError::Parse(format!("{} 숫자 변환 실패: {}", field, s))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| SourceError::Parse(format!("{} 숫자 변환 실패", field))),
        _ => Err(SourceError::Parse(format!("{} 필드 없음", field))),
    }
}

/// kline 응답 파싱
///
/// 각 행은 `[openTime(ms), open, high, low, close, volume, ...]` 입니다.
pub fn parse_klines(json: &Value) -> Result<Vec<OhlcvCandle>, SourceError> {
    let rows = json
        .as_array()
        .ok_or_else(|| SourceError::Parse("kline 응답이 배열이 아닙니다".to_string()))?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let open_time = row[0]
            .as_i64()
            .ok_or_else(|| SourceError::Parse("kline openTime 없음".to_string()))?;
        candles.push(OhlcvCandle::new(
            open_time / 1000,
            parse_number(&row[1], "open")?,
            parse_number(&row[2], "high")?,
            parse_number(&row[3], "low")?,
            parse_number(&row[4], "close")?,
            parse_number(&row[5], "volume")?,
        ));
    }

    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
    Ok(candles)
}

/// 24시간 티커 객체 파싱
pub fn parse_ticker(json: &Value) -> Result<Ticker, SourceError> {
    let symbol = json["symbol"]
        .as_str()
        .ok_or_else(|| SourceError::Parse("ticker symbol 없음".to_string()))?;

    Ok(Ticker {
        symbol: symbol.to_string(),
        last_price: parse_number(&json["lastPrice"], "lastPrice")?,
        change_percent_24h: parse_number(&json["priceChangePercent"], "priceChangePercent")?,
        high_price: parse_number(&json["highPrice"], "highPrice")?,
        low_price: parse_number(&json["lowPrice"], "lowPrice")?,
        quote_volume: parse_number(&json["quoteVolume"], "quoteVolume")?,
    })
}

#[async_trait]
impl CandleSource for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<OhlcvCandle>, SourceError> {
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", binance_interval(timeframe).to_string()),
            ("limit", limit.to_string()),
        ];
        let json = self.get_json("/klines", &query).await?;
        let candles = parse_klines(&json)?;
        debug!("{} {} 캔들 {}개 로드", symbol, timeframe, candles.len());
        Ok(candles)
    }
}

#[async_trait]
impl TickerSource for BinanceClient {
    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, SourceError> {
        let json = self
            .get_json("/ticker/24hr", &[("symbol", symbol.to_string())])
            .await?;
        if json.is_null() {
            return Err(SourceError::SymbolNotFound(symbol.to_string()));
        }
        parse_ticker(&json)
    }

    async fn fetch_top_volume(&self, limit: usize) -> Result<Vec<Ticker>, SourceError> {
        let json = self.get_json("/ticker/24hr", &[]).await?;
        let rows = json
            .as_array()
            .ok_or_else(|| SourceError::Parse("ticker 응답이 배열이 아닙니다".to_string()))?;

        // 파싱할 수 없는 항목은 건너뜀
        let tickers: Vec<Ticker> = rows.iter().filter_map(|row| parse_ticker(row).ok()).collect();
        info!("{} 티커 {}개 조회", self.market_type, tickers.len());
        Ok(select_top_volume(tickers, limit))
    }
}
