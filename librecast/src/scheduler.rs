//! Per-account scheduling loop
//!
//! Each eligible account gets its own task that walks the account's
//! effective slot list in order: wait until the fire instant, select
//! content, request a variant, dispatch the publish. Every step failure is
//! absorbed at this boundary; a bad slot skips to the next slot, a bad
//! account cycle ends without touching any sibling task.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use rand::thread_rng;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::cadence::{effective_slots, next_fire_instant};
use crate::config::Config;
use crate::error::{Result, SlotError};
use crate::inventory::{HttpInventory, Inventory};
use crate::publish::{Dispatcher, HttpPublishAdapter, PublishAdapter, PublishOutcome};
use crate::ratelimit::RateLimiter;
use crate::select::{choose_library, select_post};
use crate::types::{Account, Caption, Library, LibraryItem, Network};
use crate::variant::{HttpVariantService, VariantService};

/// States an account task moves through, per slot: `Idle` until the slot is
/// armed, `Waiting` until the fire instant, `Publishing` while the slot
/// resolves, back to `Idle`. `Ineligible` is terminal for the cycle; the
/// fleet retries the account on its next discovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Idle,
    Waiting,
    Publishing,
    Ineligible,
}

impl AccountState {
    /// Legal moves in the per-cycle state machine. A slot always resolves
    /// through `Publishing` back to `Idle` before the next one is armed.
    fn can_transition_to(self, next: AccountState) -> bool {
        matches!(
            (self, next),
            (AccountState::Idle, AccountState::Waiting)
                | (AccountState::Idle, AccountState::Ineligible)
                | (AccountState::Waiting, AccountState::Publishing)
                | (AccountState::Publishing, AccountState::Idle)
        )
    }
}

impl std::fmt::Display for AccountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccountState::Idle => "idle",
            AccountState::Waiting => "waiting",
            AccountState::Publishing => "publishing",
            AccountState::Ineligible => "ineligible",
        };
        write!(f, "{}", s)
    }
}

/// Tracks one account task's position in the cycle state machine. Illegal
/// transitions are a logic bug and trip a debug assertion; same-state
/// transitions are no-ops so error paths can settle back to `Idle`
/// unconditionally.
struct StateTracker<'a> {
    account: &'a str,
    state: AccountState,
}

impl<'a> StateTracker<'a> {
    fn new(account: &'a str) -> Self {
        Self {
            account,
            state: AccountState::Idle,
        }
    }

    fn transition(&mut self, next: AccountState) {
        if next == self.state {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal state transition {} -> {}",
            self.state,
            next
        );
        debug!(account = %self.account, from = %self.state, to = %next, "State transition");
        self.state = next;
    }
}

/// Why a cycle ended without processing any slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibleReason {
    MissingCredentials,
    NoSchedules,
    NoContent,
}

/// Result of one full account cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Ineligible(IneligibleReason),
    Completed { published: usize, skipped: usize },
}

/// Shared handles every account task works against. Collaborator clients
/// and the rate limiter are process-wide; all entity data is fetched per
/// cycle and treated as an immutable snapshot.
pub struct EngineCtx {
    pub inventory: Arc<dyn Inventory>,
    pub variants: Arc<dyn VariantService>,
    pub dispatcher: Dispatcher,
    pub limiter: RateLimiter,
    pub posts_per_day: usize,
    pub jitter_minutes: i64,
}

impl EngineCtx {
    /// Build the production engine context: HTTP collaborators with the
    /// configured base URLs and per-call timeouts.
    pub fn from_config(config: &Config) -> Result<Self> {
        let inventory = HttpInventory::new(
            &config.endpoints.inventory_base,
            Duration::from_secs(config.timeouts.inventory_secs),
        )?;
        let variants = HttpVariantService::new(
            &config.endpoints.variant_base,
            Duration::from_secs(config.timeouts.variant_secs),
        )?;

        let mut adapters: Vec<Box<dyn PublishAdapter>> = Vec::new();
        for network in Network::all() {
            adapters.push(Box::new(HttpPublishAdapter::new(
                network,
                config.endpoints.publish_base(network),
                Duration::from_secs(config.timeouts.publish_secs),
            )?));
        }

        Ok(Self {
            inventory: Arc::new(inventory),
            variants: Arc::new(variants),
            dispatcher: Dispatcher::new(adapters),
            limiter: RateLimiter::new(config.rate_limits.clone()),
            posts_per_day: config.scheduling.posts_per_day,
            jitter_minutes: config.scheduling.jitter_minutes,
        })
    }
}

/// Entry point for one spawned account task: run a single full cycle and
/// exit. The fleet orchestrator respawns finished tasks on its next
/// discovery pass, so a completed pass is exactly when the account becomes
/// "due" again.
pub async fn run_account_task(ctx: Arc<EngineCtx>, account: Account) {
    debug!(account = %account.id, "Account task starting");
    let outcome = run_account_cycle(&ctx, &account).await;
    match outcome {
        CycleOutcome::Ineligible(reason) => {
            info!(
                account = %account.id,
                "Account cycle ended {}: {:?}",
                AccountState::Ineligible,
                reason
            );
        }
        CycleOutcome::Completed { published, skipped } => {
            info!(
                account = %account.id,
                published, skipped, "Account cycle completed"
            );
        }
    }
}

/// One full pass over an account's effective slot list.
pub async fn run_account_cycle(ctx: &EngineCtx, account: &Account) -> CycleOutcome {
    let mut states = StateTracker::new(&account.id);

    // Credential check comes first so an ineligible account causes zero
    // collaborator calls.
    if !account.has_credentials() {
        info!(account = %account.id, "Account missing access token, skipping");
        states.transition(AccountState::Ineligible);
        return CycleOutcome::Ineligible(IneligibleReason::MissingCredentials);
    }

    let schedules = ctx.inventory.schedules(&account.id).await;
    if schedules.is_empty() {
        info!(account = %account.id, "No schedules found");
        states.transition(AccountState::Ineligible);
        return CycleOutcome::Ineligible(IneligibleReason::NoSchedules);
    }

    let slots = effective_slots(&schedules, ctx.posts_per_day);
    if slots.is_empty() {
        info!(account = %account.id, "Schedules contain no usable post times");
        states.transition(AccountState::Ineligible);
        return CycleOutcome::Ineligible(IneligibleReason::NoSchedules);
    }

    // One inventory snapshot per cycle: libraries, the chosen library's
    // items, and their captions.
    let libraries = ctx.inventory.libraries().await;
    let Some(library) = choose_library(&libraries) else {
        warn!(account = %account.id, "No libraries defined");
        states.transition(AccountState::Ineligible);
        return CycleOutcome::Ineligible(IneligibleReason::NoContent);
    };
    let items = ctx.inventory.items(&library.id).await;
    if items.is_empty() {
        warn!(account = %account.id, library = %library.id, "No items in library");
        states.transition(AccountState::Ineligible);
        return CycleOutcome::Ineligible(IneligibleReason::NoContent);
    }
    let mut captions: Vec<Caption> = Vec::new();
    for item in &items {
        captions.extend(ctx.inventory.captions(&item.id).await);
    }

    let mut published = 0;
    let mut skipped = 0;
    for slot in &slots {
        match run_slot(ctx, account, &libraries, &items, &captions, slot, &mut states).await {
            Ok(Some(outcome)) => {
                published += 1;
                if outcome.is_success() {
                    info!(
                        account = %account.id,
                        status = outcome.status,
                        body = %outcome.body,
                        "Published"
                    );
                } else {
                    // Best effort: an unhappy adapter answer is surfaced to
                    // the operator but does not block the next slot.
                    warn!(
                        account = %account.id,
                        status = outcome.status,
                        body = %outcome.body,
                        "Publish adapter reported failure"
                    );
                }
            }
            Ok(None) => {
                skipped += 1;
                warn!(account = %account.id, slot = %slot, "Rate limited, slot skipped");
            }
            Err(e) => {
                skipped += 1;
                warn!(account = %account.id, slot = %slot, "Slot skipped: {}", e);
            }
        }
        states.transition(AccountState::Idle);
    }

    CycleOutcome::Completed { published, skipped }
}

/// Process a single slot: wait, select, vary, dispatch.
///
/// `Ok(None)` means the slot was dropped by the rate limiter. Any `Err` is
/// one of the per-step failures the cycle absorbs.
async fn run_slot(
    ctx: &EngineCtx,
    account: &Account,
    libraries: &[Library],
    items: &[LibraryItem],
    captions: &[Caption],
    slot: &str,
    states: &mut StateTracker<'_>,
) -> std::result::Result<Option<PublishOutcome>, SlotError> {
    let fire_at = {
        let mut rng = thread_rng();
        next_fire_instant(slot, Local::now().naive_local(), ctx.jitter_minutes, &mut rng)?
    };

    states.transition(AccountState::Waiting);
    debug!(account = %account.id, slot = %slot, "Next fire at {}", fire_at);
    let until_fire = fire_at - Local::now().naive_local();
    if let Ok(wait) = until_fire.to_std() {
        sleep(wait).await;
    }

    states.transition(AccountState::Publishing);
    debug!(account = %account.id, slot = %slot, "Slot fired");

    let selection = {
        let mut rng = thread_rng();
        select_post(libraries, items, captions, &account.network, &mut rng)?
    };

    if !ctx
        .limiter
        .check_and_record(&account.network, chrono::Utc::now().timestamp())
    {
        return Ok(None);
    }

    // A fresh variant per post; on failure the slot is skipped outright,
    // never published with the unmodified master asset.
    let variant_url = ctx
        .variants
        .request_variant(&selection.item.master_url, &account.network, None)
        .await?;

    let outcome = ctx
        .dispatcher
        .dispatch(
            account,
            &variant_url,
            &selection.caption,
            selection.item.title.as_deref(),
        )
        .await?;
    Ok(Some(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockInventory, MockPublishAdapter, MockVariantService};
    use crate::types::{Library, LibraryItem, Schedule};
    use std::collections::HashMap;

    fn account(network: &str, token: Option<&str>) -> Account {
        Account {
            id: "acc-1".to_string(),
            network: network.to_string(),
            external_user_id: "17890".to_string(),
            handle: "@demo".to_string(),
            access_token: token.map(str::to_string),
        }
    }

    fn seeded_inventory() -> MockInventory {
        let inv = MockInventory::new();
        inv.set_schedules(vec![Schedule {
            id: "s1".to_string(),
            account_id: "acc-1".to_string(),
            post_times: vec!["08:00".to_string()],
        }]);
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
        inv.set_captions(vec![Caption {
            id: "c1".to_string(),
            library_item_id: "i1".to_string(),
            platform: "instagram".to_string(),
            body: "hello".to_string(),
        }]);
        inv
    }

    fn ctx(inv: Arc<MockInventory>, variants: MockVariantService) -> EngineCtx {
        EngineCtx {
            inventory: inv,
            variants: Arc::new(variants),
            dispatcher: Dispatcher::new(vec![
                Box::new(MockPublishAdapter::success(Network::Instagram)),
                Box::new(MockPublishAdapter::success(Network::Tiktok)),
                Box::new(MockPublishAdapter::success(Network::Youtube)),
            ]),
            limiter: RateLimiter::new(HashMap::new()),
            posts_per_day: 3,
            jitter_minutes: 0,
        }
    }

    #[tokio::test]
    async fn test_missing_token_is_ineligible_with_no_calls() {
        let inv = Arc::new(seeded_inventory());
        let ctx = ctx(inv.clone(), MockVariantService::success());
        let outcome = run_account_cycle(&ctx, &account("instagram", None)).await;
        assert_eq!(
            outcome,
            CycleOutcome::Ineligible(IneligibleReason::MissingCredentials)
        );

        // Zero collaborator calls beyond the local credential check
        assert_eq!(inv.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_schedules_is_ineligible() {
        let inv = seeded_inventory();
        inv.set_schedules(vec![]);
        let ctx = ctx(Arc::new(inv), MockVariantService::success());
        let outcome = run_account_cycle(&ctx, &account("instagram", Some("tok"))).await;
        assert_eq!(
            outcome,
            CycleOutcome::Ineligible(IneligibleReason::NoSchedules)
        );
    }

    #[tokio::test]
    async fn test_no_libraries_is_ineligible() {
        let inv = seeded_inventory();
        inv.set_libraries(vec![]);
        let ctx = ctx(Arc::new(inv), MockVariantService::success());
        let outcome = run_account_cycle(&ctx, &account("instagram", Some("tok"))).await;
        assert_eq!(outcome, CycleOutcome::Ineligible(IneligibleReason::NoContent));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_slot_excluded_cycle_continues() {
        let inv = seeded_inventory();
        inv.set_schedules(vec![Schedule {
            id: "s1".to_string(),
            account_id: "acc-1".to_string(),
            post_times: vec!["nope".to_string(), "08:00".to_string()],
        }]);
        let ctx = ctx(Arc::new(inv), MockVariantService::success());
        let outcome = run_account_cycle(&ctx, &account("instagram", Some("tok"))).await;
        // The malformed entry is dropped from the effective list; only the
        // valid slot runs
        assert_eq!(
            outcome,
            CycleOutcome::Completed {
                published: 1,
                skipped: 0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_slot_counts_against_daily_quota() {
        let inv = seeded_inventory();
        inv.set_schedules(vec![Schedule {
            id: "s1".to_string(),
            account_id: "acc-1".to_string(),
            post_times: vec![
                "bad".to_string(),
                "08:00".to_string(),
                "12:00".to_string(),
                "18:00".to_string(),
            ],
        }]);
        let ctx = ctx(Arc::new(inv), MockVariantService::success());
        let outcome = run_account_cycle(&ctx, &account("instagram", Some("tok"))).await;
        // posts_per_day is 3 and the malformed entry holds one position, so
        // only two slots run
        assert_eq!(
            outcome,
            CycleOutcome::Completed {
                published: 2,
                skipped: 0
            }
        );
    }

    #[tokio::test]
    async fn test_only_malformed_slots_is_ineligible() {
        let inv = seeded_inventory();
        inv.set_schedules(vec![Schedule {
            id: "s1".to_string(),
            account_id: "acc-1".to_string(),
            post_times: vec!["nope".to_string()],
        }]);
        let ctx = ctx(Arc::new(inv), MockVariantService::success());
        let outcome = run_account_cycle(&ctx, &account("instagram", Some("tok"))).await;
        assert_eq!(
            outcome,
            CycleOutcome::Ineligible(IneligibleReason::NoSchedules)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_variant_failure_skips_publish() {
        let inv = seeded_inventory();
        let variants = MockVariantService::failure();
        let ctx = ctx(Arc::new(inv), variants);
        let outcome = run_account_cycle(&ctx, &account("instagram", Some("tok"))).await;
        assert_eq!(
            outcome,
            CycleOutcome::Completed {
                published: 0,
                skipped: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_slot_is_skipped() {
        let inv = seeded_inventory();
        inv.set_schedules(vec![Schedule {
            id: "s1".to_string(),
            account_id: "acc-1".to_string(),
            post_times: vec!["08:00".to_string(), "12:00".to_string()],
        }]);
        let mut limits = HashMap::new();
        limits.insert("instagram".to_string(), 1);
        let mut engine = ctx(Arc::new(inv), MockVariantService::success());
        engine.limiter = RateLimiter::new(limits);

        let outcome = run_account_cycle(&engine, &account("instagram", Some("tok"))).await;
        // Both slots fire within the same hour window under paused time, so
        // only the first is allowed through.
        assert_eq!(
            outcome,
            CycleOutcome::Completed {
                published: 1,
                skipped: 1
            }
        );
    }

    #[test]
    fn test_account_state_display() {
        assert_eq!(AccountState::Idle.to_string(), "idle");
        assert_eq!(AccountState::Waiting.to_string(), "waiting");
        assert_eq!(AccountState::Publishing.to_string(), "publishing");
        assert_eq!(AccountState::Ineligible.to_string(), "ineligible");
    }

    #[test]
    fn test_legal_state_transitions() {
        use AccountState::*;
        assert!(Idle.can_transition_to(Waiting));
        assert!(Idle.can_transition_to(Ineligible));
        assert!(Waiting.can_transition_to(Publishing));
        assert!(Publishing.can_transition_to(Idle));

        // A slot never arms directly out of Publishing, and an ineligible
        // cycle never resumes
        assert!(!Publishing.can_transition_to(Waiting));
        assert!(!Waiting.can_transition_to(Ineligible));
        assert!(!Ineligible.can_transition_to(Waiting));
        assert!(!Ineligible.can_transition_to(Idle));
    }

    #[test]
    fn test_tracker_rejects_same_state_noise() {
        let mut tracker = StateTracker::new("acc-1");
        tracker.transition(AccountState::Idle);
        assert_eq!(tracker.state, AccountState::Idle);
        tracker.transition(AccountState::Waiting);
        tracker.transition(AccountState::Waiting);
        assert_eq!(tracker.state, AccountState::Waiting);
    }
}
