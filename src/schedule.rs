use std::time::Duration;

use chrono::{DateTime, Utc};

/// Time left until the next wall-clock multiple of `every`, counted from the
/// Unix epoch. With `every` = 1h that is the top of the next hour. Never zero,
/// so a run finishing exactly on a boundary waits a full interval.
pub fn until_next_run(now: DateTime<Utc>, every: Duration) -> Duration {
    let every_ms = every.as_millis().max(1) as i64;
    let now_ms = now.timestamp_millis();
    let into = now_ms.rem_euclid(every_ms);
    Duration::from_millis((every_ms - into) as u64)
}
