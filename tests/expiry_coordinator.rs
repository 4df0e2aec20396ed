//! Expiry coordinator tests: stale orders and deals, cascade cancellation,
//! and survival of store failures and panics.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::*;

use deal_desk::adapter::ExpiryCoordinator;
use deal_desk::application::usecase::DealLifecycleUseCase;
use deal_desk::config::ExpiryConfig;
use deal_desk::domain::errors::DealError;
use deal_desk::domain::repository::RecordStore;
use deal_desk::domain::service::NotificationKind;
use deal_desk::domain::state::{DealStatus, OrderStatus};
use deal_desk::infrastructure::InMemoryStore;

fn coordinator_for(desk: &Desk, config: ExpiryConfig) -> ExpiryCoordinator {
    ExpiryCoordinator::new(desk.engine.clone(), desk.store.clone(), config)
}

/// A stale order with no responses expires and its owner hears about it once.
#[tokio::test]
async fn test_stale_order_expires_with_single_notification() {
    let desk = Desk::new().await;
    let order = desk.engine.create_order(ALICE, reference_draft()).await.unwrap();
    let fresh = desk.engine.create_order(BOB, reference_draft()).await.unwrap();
    let coordinator = coordinator_for(&desk, ExpiryConfig::default());

    // Nothing is old enough yet.
    let report = coordinator.run_cycle_at(Utc::now()).await;
    assert_eq!(report.orders_expired, 0);

    let later = Utc::now() + chrono::Duration::days(8);
    let report = coordinator.run_cycle_at(later).await;
    assert_eq!(report.orders_expired, 2);
    assert_eq!(report.failures, 0);
    assert_eq!(
        desk.store.get_order(order.id).await.unwrap().unwrap().status,
        OrderStatus::Expired
    );
    assert_eq!(
        desk.store.get_order(fresh.id).await.unwrap().unwrap().status,
        OrderStatus::Expired
    );

    // A second pass finds nothing left to do.
    let report = coordinator.run_cycle_at(later).await;
    assert_eq!(report.orders_scanned, 0);

    desk.settle().await;
    assert_eq!(
        desk.notifier.kinds_for(ALICE).await,
        vec![NotificationKind::OrderExpired]
    );
}

#[tokio::test]
async fn test_expire_order_refuses_fresh_or_closed_orders() {
    let desk = Desk::new().await;
    let order = desk.engine.create_order(ALICE, reference_draft()).await.unwrap();

    let early = desk.engine.expire_order(order.id, order.created_at).await;
    assert!(matches!(early, Err(DealError::InvalidState(_))));

    let response = desk.engine.create_response(BOB, order.id, "").await.unwrap();
    desk.engine.accept_response(ALICE, response.id).await.unwrap();
    let in_deal = desk
        .engine
        .expire_order(order.id, Utc::now() + chrono::Duration::days(30))
        .await;
    assert!(matches!(in_deal, Err(DealError::InvalidState(_))));
}

/// An unconfirmed deal expires and cancels the author's `in_deal` order.
#[tokio::test]
async fn test_deal_expiry_cascades_to_orders() {
    let desk = Desk::new().await;
    let engine = &desk.engine;

    let order = engine.create_order(ALICE, reference_draft()).await.unwrap();
    let response = engine.create_response(BOB, order.id, "").await.unwrap();
    let deal = engine.accept_response(ALICE, response.id).await.unwrap();
    engine.confirm_deal(BOB, deal.id, false, "sent").await.unwrap();

    let coordinator = coordinator_for(&desk, ExpiryConfig::default());
    let report = coordinator
        .run_cycle_at(Utc::now() + chrono::Duration::hours(25))
        .await;
    assert_eq!(report.deals_expired, 1);
    assert_eq!(report.orders_cancelled, 1);
    assert_eq!(report.orders_expired, 0);

    let deal_now = desk.store.get_deal(deal.id).await.unwrap().unwrap();
    assert_eq!(deal_now.status, DealStatus::Expired);
    assert!(deal_now.counterparty_confirmed);
    assert_eq!(
        desk.store.get_order(order.id).await.unwrap().unwrap().status,
        OrderStatus::Cancelled
    );

    // A late confirmation cannot revive it.
    let late = engine.confirm_deal(ALICE, deal.id, true, "").await;
    assert!(matches!(late, Err(DealError::InvalidState(_))));

    desk.settle().await;
    assert!(desk
        .notifier
        .kinds_for(ALICE)
        .await
        .contains(&NotificationKind::DealExpired));
    assert!(desk
        .notifier
        .kinds_for(BOB)
        .await
        .contains(&NotificationKind::DealExpired));
}

/// An `in_deal` order that still backs another live deal is left alone.
#[tokio::test]
async fn test_cascade_skips_orders_backing_live_deals() {
    let desk = Desk::new().await;
    let engine = &desk.engine;

    let alice_order = engine.create_order(ALICE, reference_draft()).await.unwrap();
    let response = engine.create_response(BOB, alice_order.id, "").await.unwrap();
    let first = engine.accept_response(ALICE, response.id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;

    let bob_order = engine.create_order(BOB, reference_draft()).await.unwrap();
    let response = engine.create_response(CAROL, bob_order.id, "").await.unwrap();
    let second = engine.accept_response(BOB, response.id).await.unwrap();
    assert!(first.created_at < second.created_at);

    let expiry = engine.expire_deal(first.id, second.created_at).await.unwrap();
    assert_eq!(expiry.deal.status, DealStatus::Expired);
    let cancelled: Vec<_> = expiry.cancelled_orders.iter().map(|o| o.id).collect();
    assert_eq!(cancelled, vec![alice_order.id]);

    assert_eq!(
        desk.store.get_order(bob_order.id).await.unwrap().unwrap().status,
        OrderStatus::InDeal
    );
    assert_eq!(
        desk.store.get_deal(second.id).await.unwrap().unwrap().status,
        DealStatus::InProgress
    );
}

/// An order whose deal is under dispute is not cancelled by another
/// participant's deal timing out.
#[tokio::test]
async fn test_cascade_skips_orders_backing_disputed_deals() {
    let desk = Desk::new().await;
    let engine = &desk.engine;

    let bob_order = engine.create_order(BOB, reference_draft()).await.unwrap();
    let response = engine.create_response(CAROL, bob_order.id, "").await.unwrap();
    let disputed = engine.accept_response(BOB, response.id).await.unwrap();
    engine
        .open_dispute(CAROL, disputed.id, "payment never arrived")
        .await
        .unwrap();

    let alice_order = engine.create_order(ALICE, reference_draft()).await.unwrap();
    let response = engine.create_response(BOB, alice_order.id, "").await.unwrap();
    let stale = engine.accept_response(ALICE, response.id).await.unwrap();

    let expiry = engine
        .expire_deal(stale.id, Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();
    let cancelled: Vec<_> = expiry.cancelled_orders.iter().map(|o| o.id).collect();
    assert_eq!(cancelled, vec![alice_order.id]);

    assert_eq!(
        desk.store.get_order(bob_order.id).await.unwrap().unwrap().status,
        OrderStatus::InDeal
    );
    assert_eq!(
        desk.store.get_deal(disputed.id).await.unwrap().unwrap().status,
        DealStatus::Dispute
    );
}

#[tokio::test]
async fn test_completed_deals_never_expire() {
    let desk = Desk::new().await;
    let engine = &desk.engine;

    let order = engine.create_order(ALICE, reference_draft()).await.unwrap();
    let response = engine.create_response(BOB, order.id, "").await.unwrap();
    let deal = engine.accept_response(ALICE, response.id).await.unwrap();
    engine.confirm_deal(BOB, deal.id, false, "").await.unwrap();
    engine.confirm_deal(ALICE, deal.id, true, "").await.unwrap();

    let coordinator = coordinator_for(&desk, ExpiryConfig::default());
    let report = coordinator
        .run_cycle_at(Utc::now() + chrono::Duration::days(30))
        .await;
    assert_eq!(report.deals_scanned, 0);
    assert_eq!(
        desk.store.get_deal(deal.id).await.unwrap().unwrap().status,
        DealStatus::Completed
    );
    assert_eq!(
        desk.store.get_order(order.id).await.unwrap().unwrap().status,
        OrderStatus::Completed
    );
}

/// Scan failures are counted and the next cycle proceeds normally.
#[tokio::test]
async fn test_cycle_survives_store_failures() {
    let desk = Desk::new().await;
    let order = desk.engine.create_order(ALICE, reference_draft()).await.unwrap();

    let faulty = Arc::new(FaultyStore::new((*desk.store).clone()));
    let coordinator =
        ExpiryCoordinator::new(desk.engine.clone(), faulty.clone(), ExpiryConfig::default());
    let later = Utc::now() + chrono::Duration::days(8);

    faulty.fail_scans(true);
    let report = coordinator.run_cycle_at(later).await;
    assert_eq!(report.scan_failures, 2);
    assert_eq!(report.orders_expired, 0);
    assert!(!report.panicked);

    faulty.fail_scans(false);
    let report = coordinator.run_cycle_at(later).await;
    assert_eq!(report.orders_expired, 1);
    assert_eq!(
        desk.store.get_order(order.id).await.unwrap().unwrap().status,
        OrderStatus::Expired
    );
}

#[tokio::test]
async fn test_cycle_survives_panics() {
    let desk = Desk::new().await;
    desk.engine.create_order(ALICE, reference_draft()).await.unwrap();

    let faulty = Arc::new(FaultyStore::new((*desk.store).clone()));
    let coordinator =
        ExpiryCoordinator::new(desk.engine.clone(), faulty.clone(), ExpiryConfig::default());
    let later = Utc::now() + chrono::Duration::days(8);

    faulty.panic_scans(true);
    let report = coordinator.run_cycle_at(later).await;
    assert!(report.panicked);

    faulty.panic_scans(false);
    let report = coordinator.run_cycle_at(later).await;
    assert!(!report.panicked);
    assert_eq!(report.orders_expired, 1);
}

/// The timer loop keeps going after a panicking cycle and stops on request.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_and_stop() {
    let desk = Desk::with_store(InMemoryStore::new()).await;
    let order = desk.engine.create_order(ALICE, reference_draft()).await.unwrap();

    let faulty = Arc::new(FaultyStore::new((*desk.store).clone()));
    faulty.panic_scans(true);

    let config = ExpiryConfig {
        check_interval_secs: 1,
        order_timeout_hours: 0,
        ..ExpiryConfig::default()
    };
    let mut coordinator = ExpiryCoordinator::new(desk.engine.clone(), faulty.clone(), config);
    coordinator.start();
    assert!(coordinator.is_running());

    // Let the immediate first cycle panic, then heal the store.
    tokio::time::sleep(Duration::from_millis(200)).await;
    faulty.panic_scans(false);

    let mut expired = false;
    for _ in 0..40 {
        let status = desk.store.get_order(order.id).await.unwrap().unwrap().status;
        if status == OrderStatus::Expired {
            expired = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(expired, "order should expire once the store recovers");

    coordinator.stop().await;
    assert!(!coordinator.is_running());

    // Stopped: new stale orders stay untouched.
    let later = desk.engine.create_order(BOB, reference_draft()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        desk.store.get_order(later.id).await.unwrap().unwrap().status,
        OrderStatus::Active
    );
}
