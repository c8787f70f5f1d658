//! Posting schedule for generated reels.
//!
//! Posts go out at fixed local times in UTC+7. A new post takes the first
//! future slot that no scheduled post already occupies.

use std::collections::HashSet;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Offset, Utc};

/// Local posting hours (08:00 and 21:00).
pub const POSTING_HOURS: [u32; 2] = [8, 21];

/// How far ahead to look for a free slot.
const SEARCH_DAYS: u64 = 30;

const POSTING_UTC_OFFSET_SECS: i32 = 7 * 3600;

pub fn posting_timezone() -> FixedOffset {
    FixedOffset::east_opt(POSTING_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

fn local_slot(day: NaiveDate, hour: u32, tz: FixedOffset) -> Option<DateTime<FixedOffset>> {
    day.and_hms_opt(hour, 0, 0)?.and_local_timezone(tz).single()
}

/// Find the next free posting slot after `now`.
///
/// Slots are compared at minute precision. When every slot in the search
/// window is taken, falls back to tomorrow's first slot.
pub fn next_available_slot(taken: &[DateTime<Utc>], now: DateTime<Utc>) -> DateTime<FixedOffset> {
    let tz = posting_timezone();
    let local_now = now.with_timezone(&tz);
    let today = local_now.date_naive();
    let taken: HashSet<i64> = taken.iter().map(|slot| slot.timestamp() / 60).collect();

    for day_offset in 0..SEARCH_DAYS {
        let Some(day) = today.checked_add_days(Days::new(day_offset)) else {
            break;
        };

        for hour in POSTING_HOURS {
            let Some(slot) = local_slot(day, hour, tz) else {
                continue;
            };
            if slot <= local_now || taken.contains(&(slot.timestamp() / 60)) {
                continue;
            }
            return slot;
        }
    }

    today
        .checked_add_days(Days::new(1))
        .and_then(|tomorrow| local_slot(tomorrow, POSTING_HOURS[0], tz))
        .unwrap_or_else(|| local_now + chrono::Duration::days(1))
}
