use crate::config::MonitorConfig;
use crate::config_loader::{ConfigResult, ConfigValidation};
use crate::error::{MonitorError, MonitorResult};
use crate::model::{AlertCandidate, MarketType, Ticker};
use crate::monitor::evaluator::ConditionEvaluator;
use crate::monitor::schedule::{NotificationScheduler, next_candle_close, smallest_timeframe_minutes};
use crate::sink::AlertSink;
use crate::source::MarketDataSource;
use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use log::{debug, error, info, warn};
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::watch;

/// 한 사이클 실행 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 평가한 심볼 수
    pub symbols_checked: usize,
    /// 알림이 하나 이상 남은 심볼 수
    pub symbols_alerted: usize,
    /// 실제로 전송한 알림 메시지 수
    pub messages_sent: usize,
    /// 일일 요약 전송 여부
    pub summary_sent: bool,
    /// 알림음 없이 보냈는지 여부
    pub silent: bool,
}

/// 시세 조회, 조건 평가, 알림 전송을 묶는 모니터
///
/// 심볼은 한 사이클 안에서 순서대로 하나씩 평가합니다.
pub struct Monitor<M: MarketDataSource, K: AlertSink> {
    config: MonitorConfig,
    source: M,
    sink: K,
    scheduler: NotificationScheduler,
    evaluator: ConditionEvaluator,
}

impl<M: MarketDataSource, K: AlertSink> Monitor<M, K> {
    /// 모니터 생성
    ///
    /// 설정이 잘못되었으면 첫 사이클 전에 실패합니다.
    pub fn new(config: MonitorConfig, source: M, sink: K) -> ConfigResult<Self> {
        config.validate()?;
        let scheduler = NotificationScheduler::new(&config.notification_schedule)?;
        let evaluator = ConditionEvaluator::new(&config, scheduler.timezone());

        Ok(Monitor {
            config,
            source,
            sink,
            scheduler,
            evaluator,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &ConditionEvaluator {
        &self.evaluator
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// 관심 종목과 거래 대금 상위 종목의 티커 목록
    ///
    /// 관심 종목이 먼저 오고, 중복은 제거됩니다.
    async fn collect_tickers(&self) -> MonitorResult<Vec<Ticker>> {
        let top = if self.config.top_volume_limit > 0 {
            match self.source.fetch_top_volume(self.config.top_volume_limit).await {
                Ok(top) => top,
                Err(e) if !self.config.watchlist.is_empty() => {
                    warn!("거래 대금 상위 종목 조회 실패, 관심 종목만 확인: {}", e);
                    Vec::new()
                }
                Err(e) => {
                    return Err(MonitorError::DataUnavailable(format!(
                        "거래 대금 상위 종목 조회 실패: {}",
                        e
                    )));
                }
            }
        } else {
            Vec::new()
        };

        let mut tickers: Vec<Ticker> = Vec::new();
        for entry in &self.config.watchlist {
            if tickers.iter().any(|t| t.symbol == entry.symbol) {
                continue;
            }
            if let Some(ticker) = top.iter().find(|t| t.symbol == entry.symbol) {
                tickers.push(ticker.clone());
                continue;
            }
            match self.source.fetch_ticker(&entry.symbol).await {
                Ok(ticker) => tickers.push(ticker),
                Err(e) => warn!("관심 종목 {} 티커 조회 실패: {}", entry.symbol, e),
            }
        }

        for ticker in top {
            if !tickers.iter().any(|t| t.symbol == ticker.symbol) {
                tickers.push(ticker);
            }
        }

        Ok(tickers)
    }

    fn is_daily_summary_time(&self, local: &DateTime<Tz>) -> bool {
        let summary = &self.config.daily_summary;
        summary.enabled
            && local.hour() == summary.hour
            && local.minute() < self.config.check_interval_minutes
    }

    async fn send_daily_summary(&self, silent: bool) -> bool {
        let count = self.config.daily_summary.count;
        let tickers = match self.source.fetch_top_volume(count).await {
            Ok(tickers) => tickers,
            Err(e) => {
                warn!("일일 요약용 거래 대금 조회 실패: {}", e);
                return false;
            }
        };
        if tickers.is_empty() {
            return false;
        }

        let text = format_daily_summary(&tickers, self.config.market_type);
        match self.sink.send(&text, silent).await {
            Ok(()) => {
                info!("일일 거래 대금 요약 전송 ({}개 종목)", tickers.len());
                true
            }
            Err(e) => {
                error!("일일 요약 전송 실패: {}", e);
                false
            }
        }
    }

    /// 모니터링 한 사이클 실행
    ///
    /// 개별 심볼이나 타임프레임의 조회 실패는 건너뛰고, 감시할 종목 목록을
    /// 만들 수 없을 때만 오류를 반환합니다.
    ///
    /// # Arguments
    /// * `now` - 사이클 기준 시각
    ///
    /// # Returns
    /// * `MonitorResult<CycleReport>` - 사이클 결과
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> MonitorResult<CycleReport> {
        let local = now.with_timezone(&self.scheduler.timezone());
        let silent = !self.scheduler.is_notification_allowed(&now);
        let mut report = CycleReport {
            silent,
            ..CycleReport::default()
        };

        if self.is_daily_summary_time(&local) {
            report.summary_sent = self.send_daily_summary(silent).await;
        }

        let tickers = self.collect_tickers().await?;
        if tickers.is_empty() {
            warn!("모니터링할 종목이 없습니다");
            return Ok(report);
        }
        info!(
            "{} 종목 {}개 확인 시작",
            self.config.market_type,
            tickers.len()
        );

        let mut messages = Vec::new();
        for ticker in &tickers {
            report.symbols_checked += 1;
            let alerts = self.evaluator.evaluate(&self.source, ticker, now).await;
            if alerts.is_empty() {
                continue;
            }
            debug!("{} 알림 {}개", ticker.symbol, alerts.len());
            let name = self.config.display_name(&ticker.symbol);
            messages.push(format_alert_message(
                ticker,
                &alerts,
                self.config.market_type,
                name,
                &local,
            ));
        }
        report.symbols_alerted = messages.len();

        let cap = self.config.max_alerts_per_cycle;
        if messages.len() > cap {
            info!("알림 {}개 중 {}개만 전송", messages.len(), cap);
        }

        let interval = Duration::from_millis(self.config.send_interval_ms);
        for (i, text) in messages.iter().take(cap).enumerate() {
            if i > 0 {
                tokio::time::sleep(interval).await;
            }
            match self.sink.send(text, silent).await {
                Ok(()) => report.messages_sent += 1,
                Err(e) => error!("알림 전송 실패: {}", e),
            }
        }

        self.evaluator.prune(now);

        info!(
            "사이클 완료: 종목 {}개, 알림 종목 {}개, 전송 {}개{}",
            report.symbols_checked,
            report.symbols_alerted,
            report.messages_sent,
            if silent { " (무음)" } else { "" }
        );
        Ok(report)
    }

    /// 사이클 실패를 알림으로 보고
    async fn report_failure(&self, err: &MonitorError) {
        let now = Utc::now();
        let silent = !self.scheduler.is_notification_allowed(&now);
        let local = now.with_timezone(&self.scheduler.timezone());
        let text = format_failure_message(err, &local);
        if let Err(e) = self.sink.send(&text, silent).await {
            error!("오류 알림 전송 실패: {}", e);
        }
    }

    /// 한 사이클만 실행
    ///
    /// 실패하면 오류 알림을 보낸 뒤 오류를 돌려줍니다.
    pub async fn run_once(&mut self) -> MonitorResult<CycleReport> {
        match self.run_cycle(Utc::now()).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("모니터링 사이클 실패: {}", e);
                self.report_failure(&e).await;
                Err(e)
            }
        }
    }

    /// 사이클을 실행하고, 실패하면 보고 후 백오프 동안 대기
    ///
    /// # Returns
    /// * `bool` - 종료 신호 없이 계속 진행할 수 있으면 true
    async fn run_guarded(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        match self.run_cycle(Utc::now()).await {
            Ok(_) => true,
            Err(e) => {
                error!("모니터링 사이클 실패: {}", e);
                self.report_failure(&e).await;
                let backoff = Duration::from_secs(self.config.error_backoff_seconds);
                wait_or_shutdown(backoff, shutdown).await
            }
        }
    }

    /// 종료 신호가 올 때까지 반복 실행
    ///
    /// 즉시 한 번 실행하고, 가장 짧은 타임프레임의 다음 캔들 마감에 맞춰 한 번 더
    /// 실행한 뒤 `check_interval_minutes`마다 실행합니다. 대기 중에만 종료하며
    /// 진행 중인 사이클은 끝까지 실행합니다.
    pub async fn run_continuous(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "연속 모니터링 시작 ({}분 간격)",
            self.config.check_interval_minutes
        );

        if !self.run_guarded(&mut shutdown).await {
            info!("모니터링 종료");
            return;
        }

        let timeframe_minutes = smallest_timeframe_minutes(&self.config);
        let now = Utc::now();
        let next_close = next_candle_close(timeframe_minutes, &now);
        info!(
            "다음 {}분 캔들 마감까지 대기: {}",
            timeframe_minutes,
            next_close.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let until_close = (next_close - now).to_std().unwrap_or(Duration::ZERO);
        if !wait_or_shutdown(until_close, &mut shutdown).await {
            info!("모니터링 종료");
            return;
        }

        let interval = Duration::from_secs(u64::from(self.config.check_interval_minutes) * 60);
        loop {
            if !self.run_guarded(&mut shutdown).await {
                break;
            }
            if !wait_or_shutdown(interval, &mut shutdown).await {
                break;
            }
        }
        info!("모니터링 종료");
    }
}

/// 지정한 시간만큼 대기
///
/// # Returns
/// * `bool` - 대기가 끝나면 true, 종료 신호를 받으면 false
pub async fn wait_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.changed() => false,
    }
}

/// 티커 요약 블록
pub fn format_ticker_block(ticker: &Ticker, market_type: MarketType, name: Option<&str>) -> String {
    let base = ticker.symbol.strip_suffix("USDT").unwrap_or(&ticker.symbol);
    let title = match market_type {
        MarketType::Spot => format!("{} ({})", name.unwrap_or(base), ticker.symbol),
        MarketType::Futures => format!("{} Futures ({})", name.unwrap_or(base), ticker.symbol),
    };

    format!(
        "<b>{}</b>\n💰 현재가: ${:.4}\n📊 24h 변동률: {:+.2}%\n📈 24h 최고: ${:.4}\n📉 24h 최저: ${:.4}\n💹 24h 거래량: ${:.0}",
        title,
        ticker.last_price,
        ticker.change_percent_24h,
        ticker.high_price,
        ticker.low_price,
        ticker.quote_volume
    )
}

/// 심볼 하나의 알림 메시지
///
/// # Arguments
/// * `ticker` - 심볼 티커
/// * `alerts` - 쿨다운을 통과한 알림
/// * `market_type` - 시장 유형
/// * `name` - 관심 종목 표시 이름
/// * `now` - 표시할 현재 시각
pub fn format_alert_message<T: TimeZone>(
    ticker: &Ticker,
    alerts: &[AlertCandidate],
    market_type: MarketType,
    name: Option<&str>,
    now: &DateTime<T>,
) -> String
where
    T::Offset: Display,
{
    let mut text = format!("🚨 <b>알림: {}</b>\n", ticker.symbol);
    text.push_str(&format_ticker_block(ticker, market_type, name));
    text.push_str("\n\n<b>조건 충족:</b>\n");
    for alert in alerts {
        text.push_str(&format!("• {}\n", alert.message));
    }
    text.push_str(&format!("\n⏰ 시간: {}", now.format("%Y-%m-%d %H:%M:%S")));
    text
}

/// 거래 대금 상위 종목 요약 메시지
pub fn format_daily_summary(tickers: &[Ticker], market_type: MarketType) -> String {
    let mut text = format!(
        "📊 <b>오늘의 {} 거래 대금 상위 {}개 종목</b>\n\n",
        market_type,
        tickers.len()
    );
    for (i, ticker) in tickers.iter().enumerate() {
        text.push_str(&format!(
            "{}. <b>{}</b>\n   💰 ${:.4} ({:+.2}%)\n   📊 거래 대금: ${:.0}\n\n",
            i + 1,
            ticker.symbol,
            ticker.last_price,
            ticker.change_percent_24h,
            ticker.quote_volume
        ));
    }
    text
}

/// 사이클 실패 알림 메시지
pub fn format_failure_message<T: TimeZone>(err: &MonitorError, now: &DateTime<T>) -> String
where
    T::Offset: Display,
{
    format!(
        "🔴 모니터링 오류 발생: {}\n시간: {}",
        err,
        now.format("%Y-%m-%d %H:%M:%S")
    )
}
