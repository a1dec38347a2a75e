//! Periodic alert evaluation.
//!
//! Each cycle loads the active, untriggered alerts of verified users, fetches
//! the prices of their coins in one request, updates the in-memory price
//! history, and notifies + retires every alert whose condition holds.
//!
//! Price history lives in memory only. After a restart a percentage alert needs
//! one extra cycle before it can fire.

pub mod predicate;
pub mod price_history;

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{
    config::Settings,
    error::{MonitorError, NotifyError, QuoteError, StoreError},
    models::{ActiveAlert, Alert, AlertCondition, AlertOwner, AlertUpdate},
};

use price_history::{PriceHistory, PriceSnapshot};

/// Current USD prices for a batch of coin ids. Unknown ids are left out of the
/// map; only transport-level problems fail the whole call.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn batch_get(&self, coin_ids: &[String]) -> Result<HashMap<String, f64>, QuoteError>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Active, untriggered alerts joined with their owner's Telegram details.
    async fn load_active(&self) -> Result<Vec<ActiveAlert>, StoreError>;

    async fn update(&self, alert_id: ObjectId, update: AlertUpdate) -> Result<Alert, StoreError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_alert_message(
        &self,
        chat_id: &str,
        alert: &Alert,
        current_price: f64,
    ) -> Result<(), NotifyError>;
}

/// What to do with an alert whose condition held but whose notification failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotifyFailurePolicy {
    /// Keep the alert active; it is evaluated again next cycle.
    #[default]
    Retry,
    /// Retire the alert anyway. The notification is lost.
    MarkTriggered,
}

impl FromStr for NotifyFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "retry" => Ok(NotifyFailurePolicy::Retry),
            "mark_triggered" => Ok(NotifyFailurePolicy::MarkTriggered),
            other => Err(format!("unknown notify failure policy: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub period: Duration,
    /// Upper bound for one quote fetch or one notification.
    pub call_timeout: Duration,
    pub notify_failure_policy: NotifyFailurePolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60),
            call_timeout: Duration::from_secs(10),
            notify_failure_policy: NotifyFailurePolicy::Retry,
        }
    }
}

impl MonitorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            period: settings.alert_check_interval,
            call_timeout: settings.http_timeout,
            notify_failure_policy: settings.notify_failure_policy,
        }
    }
}

/// Counters for one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub alerts_loaded: usize,
    pub instruments: usize,
    pub missing_quotes: usize,
    pub invalid_alerts: usize,
    pub notified: usize,
    pub notify_failures: usize,
    pub triggered: usize,
    pub store_failures: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub running: bool,
    pub tracked_instrument_count: usize,
    pub snapshots: BTreeMap<String, PriceSnapshot>,
}

struct Schedule {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct AlertMonitor {
    quotes: Arc<dyn QuoteProvider>,
    store: Arc<dyn AlertStore>,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
    history: Mutex<PriceHistory>,
    // held for the whole of a cycle; a second cycle is refused, not queued
    cycle_guard: tokio::sync::Mutex<()>,
    schedule: Mutex<Option<Schedule>>,
    events_tx: Option<broadcast::Sender<String>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AlertMonitor {
    pub fn new(
        quotes: Arc<dyn QuoteProvider>,
        store: Arc<dyn AlertStore>,
        notifier: Arc<dyn Notifier>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            quotes,
            store,
            notifier,
            config,
            history: Mutex::new(PriceHistory::default()),
            cycle_guard: tokio::sync::Mutex::new(()),
            schedule: Mutex::new(None),
            events_tx: None,
        }
    }

    /// Publish `alertsUpdated` on this bus whenever a cycle retires alerts.
    pub fn with_events(mut self, events_tx: broadcast::Sender<String>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    /// Arms the schedule: one check right away, then one per period.
    /// Returns `false` (and does nothing) if it is already armed.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut schedule = lock(&self.schedule);

        if schedule.as_ref().is_some_and(|s| !s.task.is_finished()) {
            tracing::info!("alert monitor is already running");
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let monitor = Arc::clone(self);
        let task = tokio::spawn(async move { monitor.run_schedule(shutdown_rx).await });

        *schedule = Some(Schedule { shutdown, task });
        tracing::info!(
            period_secs = self.config.period.as_secs(),
            "alert monitor started"
        );
        true
    }

    /// Disarms the schedule. A check already in flight runs to completion.
    pub fn stop(&self) -> bool {
        match lock(&self.schedule).take() {
            Some(schedule) => {
                let _ = schedule.shutdown.send(true);
                tracing::info!("alert monitor stopped");
                true
            }
            None => {
                tracing::debug!("alert monitor was not running");
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.schedule)
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }

    pub fn status(&self) -> MonitorStatus {
        let snapshots = lock(&self.history).to_map();
        MonitorStatus {
            running: self.is_running(),
            tracked_instrument_count: snapshots.len(),
            snapshots,
        }
    }

    async fn run_schedule(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle().await {
                Ok(report) => tracing::debug!(?report, "scheduled alert check finished"),
                Err(MonitorError::CycleInProgress) => {
                    tracing::debug!("previous alert check still running, skipping tick")
                }
                Err(e) => tracing::error!(error = %e, "scheduled alert check failed"),
            }
        }

        tracing::debug!("alert monitor schedule exited");
    }

    /// One evaluation pass. Also used for manual checks.
    pub async fn run_cycle(&self) -> Result<CycleReport, MonitorError> {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            tracing::warn!("alert check requested while another is in progress");
            return Err(MonitorError::CycleInProgress);
        };

        let started = Instant::now();
        let alerts = self.store.load_active().await?;

        let mut report = CycleReport {
            alerts_loaded: alerts.len(),
            ..CycleReport::default()
        };

        if alerts.is_empty() {
            tracing::debug!("no active alerts to check");
            return Ok(report);
        }

        let coin_ids: Vec<String> = alerts
            .iter()
            .map(|a| a.alert.coin_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        report.instruments = coin_ids.len();

        tracing::info!(
            alerts = alerts.len(),
            coins = coin_ids.len(),
            "checking alerts"
        );

        let prices = match time::timeout(self.config.call_timeout, self.quotes.batch_get(&coin_ids))
            .await
        {
            Ok(res) => res?,
            Err(_) => return Err(QuoteError::Timeout.into()),
        };

        // One history update per coin, before any alert on it is evaluated.
        let changes: HashMap<String, Option<f64>> = {
            let mut history = lock(&self.history);
            coin_ids
                .iter()
                .filter_map(|id| {
                    let price = *prices.get(id)?;
                    Some((id.clone(), history.record(id, price).percent_change()))
                })
                .collect()
        };

        for ActiveAlert { alert, owner } in &alerts {
            let Some(&price) = prices.get(&alert.coin_id) else {
                tracing::warn!(alert_id = %alert.id, coin_id = %alert.coin_id, "no price data for coin");
                report.missing_quotes += 1;
                continue;
            };

            let Some(condition) = alert.condition() else {
                tracing::warn!(alert_id = %alert.id, "alert has an invalid condition, skipping");
                report.invalid_alerts += 1;
                continue;
            };

            let change = changes.get(&alert.coin_id).copied().flatten();
            if !predicate::should_trigger(&condition, price, change) {
                continue;
            }

            self.fire(alert, owner, condition, price, &mut report).await;
        }

        if report.triggered > 0 {
            if let Some(tx) = &self.events_tx {
                let _ = tx.send("alertsUpdated".to_string());
            }
        }

        tracing::info!(
            triggered = report.triggered,
            missing_quotes = report.missing_quotes,
            notify_failures = report.notify_failures,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "alert check finished"
        );

        Ok(report)
    }

    async fn fire(
        &self,
        alert: &Alert,
        owner: &AlertOwner,
        condition: AlertCondition,
        price: f64,
        report: &mut CycleReport,
    ) {
        tracing::info!(
            alert_id = %alert.id,
            coin = %alert.coin_name,
            symbol = %alert.coin_symbol,
            price,
            condition = %condition,
            "alert condition met"
        );

        let delivery = match owner.chat_id() {
            None => Err(NotifyError::NoChat(alert.user_id.to_hex())),
            Some(chat_id) => {
                let send = self.notifier.send_alert_message(chat_id, alert, price);
                match time::timeout(self.config.call_timeout, send).await {
                    Ok(res) => res,
                    Err(_) => Err(NotifyError::Timeout),
                }
            }
        };

        match delivery {
            Ok(()) => {
                report.notified += 1;
                tracing::info!(alert_id = %alert.id, "alert notification sent");
            }
            Err(e) if e.is_permanent() => {
                report.notify_failures += 1;
                tracing::warn!(alert_id = %alert.id, error = %e, "telegram refused the alert chat, retiring alert");
            }
            Err(e) => {
                report.notify_failures += 1;
                match self.config.notify_failure_policy {
                    NotifyFailurePolicy::Retry => {
                        tracing::warn!(alert_id = %alert.id, error = %e, "alert notification failed, will retry next check");
                        return;
                    }
                    NotifyFailurePolicy::MarkTriggered => {
                        tracing::warn!(alert_id = %alert.id, error = %e, "alert notification failed, retiring alert anyway");
                    }
                }
            }
        }

        match self.store.update(alert.id, AlertUpdate::retire()).await {
            Ok(_) => {
                report.triggered += 1;
                tracing::info!(alert_id = %alert.id, "alert marked as triggered and disabled");
            }
            Err(e) => {
                report.store_failures += 1;
                tracing::error!(alert_id = %alert.id, error = %e, "failed to mark alert as triggered");
            }
        }
    }
}
