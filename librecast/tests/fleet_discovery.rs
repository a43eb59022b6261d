//! Fleet discovery and task lifecycle
//!
//! Exercises the orchestrator against a mutable mock inventory: accounts
//! appearing, disappearing, and coexisting without blocking each other.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use librecast::fleet::FleetOrchestrator;
use librecast::mock::{MockInventory, MockPublishAdapter, MockVariantService};
use librecast::publish::Dispatcher;
use librecast::ratelimit::RateLimiter;
use librecast::scheduler::EngineCtx;
use librecast::types::{Account, Library, LibraryItem, Network, Schedule};

/// Seed enough content that an account with a schedule passes the cycle's
/// up-front snapshot checks and reaches the slot wait.
fn seed_content(inv: &MockInventory) {
    inv.set_libraries(vec![Library {
        id: "lib-1".to_string(),
        name: "default".to_string(),
    }]);
    inv.set_items(vec![LibraryItem {
        id: "i1".to_string(),
        library_id: "lib-1".to_string(),
        master_url: "https://cdn.example/master.mp4".to_string(),
        title: Some("a title".to_string()),
    }]);
}

fn account(id: &str) -> Account {
    Account {
        id: id.to_string(),
        network: "instagram".to_string(),
        external_user_id: "1".to_string(),
        handle: format!("@{}", id),
        access_token: Some("tok".to_string()),
    }
}

/// A post time roughly twelve hours from now, so the slot is guaranteed
/// to still be waiting while the test observes the task.
fn far_slot() -> String {
    (Local::now() + chrono::Duration::hours(12))
        .format("%H:%M")
        .to_string()
}

fn engine(inv: Arc<MockInventory>) -> Arc<EngineCtx> {
    Arc::new(EngineCtx {
        inventory: inv,
        variants: Arc::new(MockVariantService::success()),
        dispatcher: Dispatcher::new(vec![Box::new(MockPublishAdapter::success(
            Network::Instagram,
        ))]),
        limiter: RateLimiter::new(HashMap::new()),
        posts_per_day: 3,
        jitter_minutes: 0,
    })
}

#[tokio::test]
async fn test_waiting_account_does_not_block_ineligible_one() {
    let inv = Arc::new(MockInventory::new());
    // "slow" waits on a slot half a day out; "fast" has no schedules and
    // finishes its cycle immediately.
    inv.set_accounts(vec![account("slow"), account("fast")]);
    seed_content(&inv);
    inv.set_schedules(vec![Schedule {
        id: "s1".to_string(),
        account_id: "slow".to_string(),
        post_times: vec![far_slot()],
    }]);

    let mut fleet = FleetOrchestrator::new(
        engine(inv),
        Duration::from_secs(600),
        Arc::new(AtomicBool::new(false)),
    );
    fleet.reconcile().await;

    // Give the fast task time to run to completion
    tokio::time::sleep(Duration::from_millis(50)).await;

    let active = fleet.active_accounts();
    assert!(active.contains(&"slow".to_string()));
    assert!(!active.contains(&"fast".to_string()));
}

#[tokio::test]
async fn test_disappeared_account_task_is_cancelled_mid_wait() {
    let inv = Arc::new(MockInventory::new());
    inv.set_accounts(vec![account("a")]);
    seed_content(&inv);
    inv.set_schedules(vec![Schedule {
        id: "s1".to_string(),
        account_id: "a".to_string(),
        post_times: vec![far_slot()],
    }]);

    let mut fleet = FleetOrchestrator::new(
        engine(inv.clone()),
        Duration::from_secs(600),
        Arc::new(AtomicBool::new(false)),
    );
    fleet.reconcile().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(fleet.active_accounts().contains(&"a".to_string()));

    inv.set_accounts(vec![]);
    fleet.reconcile().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(fleet.active_accounts().is_empty());
}

#[tokio::test]
async fn test_new_account_picked_up_on_later_pass() {
    let inv = Arc::new(MockInventory::new());
    let mut fleet = FleetOrchestrator::new(
        engine(inv.clone()),
        Duration::from_secs(600),
        Arc::new(AtomicBool::new(false)),
    );

    assert_eq!(fleet.reconcile().await, 0);

    let mut with_schedule = account("late");
    with_schedule.access_token = Some("tok".to_string());
    inv.set_accounts(vec![with_schedule]);
    seed_content(&inv);
    inv.set_schedules(vec![Schedule {
        id: "s1".to_string(),
        account_id: "late".to_string(),
        post_times: vec![far_slot()],
    }]);

    assert_eq!(fleet.reconcile().await, 1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(fleet.active_accounts().contains(&"late".to_string()));
}
