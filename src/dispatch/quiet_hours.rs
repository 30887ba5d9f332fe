use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::events::Priority;

/// Configured time-of-day window during which only bypass-listed priorities
/// may be sent. The window may cross midnight; `start == end` is an empty
/// window.
#[derive(Debug, Clone)]
pub struct QuietHours {
    start: NaiveTime,
    end: NaiveTime,
    tz: Tz,
    bypass: Vec<Priority>,
}

impl QuietHours {
    pub fn new(start: NaiveTime, end: NaiveTime, tz: Tz, bypass: Vec<Priority>) -> Self {
        Self {
            start,
            end,
            tz,
            bypass,
        }
    }

    pub fn bypasses(&self, priority: Priority) -> bool {
        self.bypass.contains(&priority)
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz).time();
        if self.start <= self.end {
            self.start <= local && local < self.end
        } else {
            local >= self.start || local < self.end
        }
    }

    /// Next moment the window ends, strictly after `now`. Rolls to the next
    /// day when today's end has already passed.
    pub fn next_window_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_now = now.with_timezone(&self.tz);
        for offset in 0..=2u64 {
            let Some(date) = local_now.date_naive().checked_add_days(Days::new(offset)) else {
                continue;
            };
            // earliest() resolves DST-ambiguous local times; gaps skip to
            // the next day.
            if let Some(end_local) = self.tz.from_local_datetime(&date.and_time(self.end)).earliest()
            {
                let end_utc = end_local.with_timezone(&Utc);
                if end_utc > now {
                    return end_utc;
                }
            }
        }
        now + chrono::Duration::days(1)
    }
}
