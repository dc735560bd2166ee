//! Timestamp source for backup names and age cutoffs.

use time::{OffsetDateTime, PrimitiveDateTime};

/// Wall clock used for backup timestamps and age cutoffs.
///
/// Both are naive date-times, so names and cutoffs always come from the same
/// clock domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
    #[default]
    Utc,
    Local,
    /// Always reports the same instant.
    Fixed(PrimitiveDateTime),
}

impl Clock {
    /// Pick the local or UTC wall clock.
    pub fn new(local_time: bool) -> Self {
        if local_time {
            Clock::Local
        } else {
            Clock::Utc
        }
    }

    /// Current time, without its UTC offset.
    pub fn now(&self) -> PrimitiveDateTime {
        let now = match *self {
            Clock::Fixed(at) => return at,
            Clock::Utc => OffsetDateTime::now_utc(),
            Clock::Local => OffsetDateTime::now_local().unwrap_or_else(|err| {
                log::warn!("local UTC offset unavailable ({err}), using UTC");
                OffsetDateTime::now_utc()
            }),
        };
        PrimitiveDateTime::new(now.date(), now.time())
    }
}
