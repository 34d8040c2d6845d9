use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, Utc};

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Returns the next local midnight after `now` in the institution's timezone.
///
/// Every cache entry expires at this instant, so nothing written during a local
/// calendar day survives into the next one. The offset is passed in rather than
/// read from the host so the result does not depend on where the process runs.
///
/// # Arguments
///
/// * `now` - The current instant.
/// * `offset` - The institution's fixed UTC offset.
///
/// # Returns
///
/// The UTC instant of the next `00:00:00` local time. When `now` is exactly
/// local midnight, this is the midnight 24 hours later.
pub fn next_local_midnight(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local_day = now.with_timezone(&offset).date_naive();
    let next_midnight = local_day.and_time(NaiveTime::MIN) + TimeDelta::days(1);

    (next_midnight - TimeDelta::seconds(offset.local_minus_utc().into())).and_utc()
}
