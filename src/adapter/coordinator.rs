// src/adapter/coordinator.rs
// Expiry coordinator: periodic reconciliation of stale orders and deals

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::application::usecase::DealLifecycleUseCase;
use crate::config::ExpiryConfig;
use crate::domain::models::OrderFilter;
use crate::domain::repository::RecordStore;
use crate::domain::state::OrderStatus;

/// Counts from one expiry cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub orders_scanned: usize,
    pub orders_expired: usize,
    pub deals_scanned: usize,
    pub deals_expired: usize,
    pub orders_cancelled: usize,
    /// Entities whose transition failed and were skipped.
    pub failures: usize,
    /// Scans that could not list their candidates.
    pub scan_failures: usize,
    pub panicked: bool,
}

impl CycleReport {
    fn is_quiet(&self) -> bool {
        self.orders_scanned == 0
            && self.deals_scanned == 0
            && self.scan_failures == 0
            && !self.panicked
    }
}

struct CycleRunner {
    engine: Arc<dyn DealLifecycleUseCase + Send + Sync>,
    store: Arc<dyn RecordStore>,
    config: ExpiryConfig,
}

impl CycleRunner {
    async fn run_guarded(&self, now: DateTime<Utc>) -> CycleReport {
        match AssertUnwindSafe(self.run(now)).catch_unwind().await {
            Ok(report) => report,
            Err(_) => {
                log::error!("Expiry cycle panicked, continuing with the next tick");
                CycleReport {
                    panicked: true,
                    ..Default::default()
                }
            }
        }
    }

    async fn run(&self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();
        self.expire_orders(now, &mut report).await;
        self.expire_deals(now, &mut report).await;

        if report.is_quiet() {
            log::debug!("Expiry cycle: nothing to do");
        } else {
            log::info!(
                "Expiry cycle: {} orders expired, {} deals expired, {} orders cancelled, {} failures",
                report.orders_expired,
                report.deals_expired,
                report.orders_cancelled,
                report.failures + report.scan_failures
            );
        }
        report
    }

    async fn expire_orders(&self, now: DateTime<Utc>, report: &mut CycleReport) {
        let cutoff = now - self.config.order_timeout();
        let filter = OrderFilter {
            statuses: OrderStatus::OPEN.to_vec(),
            created_before: Some(cutoff),
            limit: Some(self.config.batch_limit),
            ..Default::default()
        };

        let orders = match self.store.query_orders(&filter).await {
            Ok(orders) => orders,
            Err(e) => {
                log::error!("Order expiry scan failed: {}", e);
                report.scan_failures += 1;
                return;
            }
        };

        for order in orders {
            report.orders_scanned += 1;
            match self.engine.expire_order(order.id, cutoff).await {
                Ok(_) => report.orders_expired += 1,
                Err(e) => {
                    log::warn!("Could not expire order {}: {}", order.id, e);
                    report.failures += 1;
                }
            }
        }
    }

    async fn expire_deals(&self, now: DateTime<Utc>, report: &mut CycleReport) {
        let cutoff = now - self.config.deal_timeout();
        let deals = match self
            .store
            .get_expired_deals(cutoff, self.config.batch_limit)
            .await
        {
            Ok(deals) => deals,
            Err(e) => {
                log::error!("Deal expiry scan failed: {}", e);
                report.scan_failures += 1;
                return;
            }
        };

        for deal in deals {
            report.deals_scanned += 1;
            match self.engine.expire_deal(deal.id, cutoff).await {
                Ok(expiry) => {
                    report.deals_expired += 1;
                    report.orders_cancelled += expiry.cancelled_orders.len();
                }
                Err(e) => {
                    log::warn!("Could not expire deal {}: {}", deal.id, e);
                    report.failures += 1;
                }
            }
        }
    }
}

/// Runs the expiry cycle on a timer until stopped.
pub struct ExpiryCoordinator {
    runner: Arc<CycleRunner>,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl ExpiryCoordinator {
    pub fn new(
        engine: Arc<dyn DealLifecycleUseCase + Send + Sync>,
        store: Arc<dyn RecordStore>,
        config: ExpiryConfig,
    ) -> Self {
        Self {
            runner: Arc::new(CycleRunner {
                engine,
                store,
                config,
            }),
            shutdown: None,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the loop. The first cycle runs immediately.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            log::warn!("Expiry coordinator already running");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let runner = self.runner.clone();
        let period = self.runner.config.check_interval();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        runner.run_guarded(Utc::now()).await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            log::info!("Expiry coordinator stopped");
        });

        self.shutdown = Some(shutdown_tx);
        self.handle = Some(handle);
        log::info!(
            "Expiry coordinator started: every {:?}, order timeout {}h, deal timeout {}h, batch {}",
            period,
            self.runner.config.order_timeout_hours,
            self.runner.config.deal_timeout_hours,
            self.runner.config.batch_limit
        );
    }

    /// Signal the loop and wait for it to exit. A cycle in flight finishes
    /// first.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                log::error!("Expiry coordinator task ended abnormally: {}", e);
            }
        }
    }

    /// Run one cycle as of `now`, outside the timer.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> CycleReport {
        self.runner.run_guarded(now).await
    }
}
