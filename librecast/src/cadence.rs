//! Cadence calculation for scheduled posts
//!
//! Pure functions that turn "HH:MM" schedule slots into absolute fire
//! instants. Nothing here waits; the account loop decides how to suspend
//! until the returned instant. All instants are in the process-local clock.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use rand::Rng;
use tracing::warn;

use crate::error::SlotError;
use crate::types::Schedule;

/// Parse a 24-hour "HH:MM" slot string.
///
/// One- or two-digit fields are accepted ("8:30" and "08:30" both parse);
/// anything else is `MalformedTime` and the caller skips that slot.
pub fn parse_post_time(s: &str) -> Result<NaiveTime, SlotError> {
    let malformed = || SlotError::MalformedTime(s.to_string());

    let (hour_str, minute_str) = s.split_once(':').ok_or_else(malformed)?;
    if hour_str.is_empty() || minute_str.is_empty() || minute_str.contains(':') {
        return Err(malformed());
    }

    let hour: u32 = hour_str.parse().map_err(|_| malformed())?;
    let minute: u32 = minute_str.parse().map_err(|_| malformed())?;

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(malformed)
}

/// Compute the next fire instant for a slot.
///
/// Base instant is today at the slot time; if that is not after `now`, it
/// advances by exactly one day (never more, since the loop revisits every
/// account at least daily). A uniform offset in `[-jitter_minutes,
/// +jitter_minutes]` is then applied. Deterministic for a fixed `rng`
/// state; production call sites pass `rand::thread_rng()`.
pub fn next_fire_instant<R: Rng>(
    post_time: &str,
    now: NaiveDateTime,
    jitter_minutes: i64,
    rng: &mut R,
) -> Result<NaiveDateTime, SlotError> {
    let slot = parse_post_time(post_time)?;

    let mut fire_at = now.date().and_time(slot);
    if fire_at <= now {
        fire_at += Duration::days(1);
    }

    if jitter_minutes > 0 {
        let jitter = rng.gen_range(-jitter_minutes..=jitter_minutes);
        fire_at += Duration::minutes(jitter);
    }

    Ok(fire_at)
}

/// Build the effective slot list for one account: all schedules' post times
/// concatenated in listed order, truncated to `posts_per_day`, then
/// malformed entries dropped with a logged warning. Truncation comes first,
/// so a malformed entry still consumes its position in the daily quota.
pub fn effective_slots(schedules: &[Schedule], posts_per_day: usize) -> Vec<String> {
    schedules
        .iter()
        .flat_map(|s| s.post_times.iter())
        .take(posts_per_day)
        .filter(|t| match parse_post_time(t) {
            Ok(_) => true,
            Err(e) => {
                warn!("Dropping schedule entry: {}", e);
                false
            }
        })
        .cloned()
        .collect()
}
