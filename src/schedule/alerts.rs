use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};

use crate::{Error, Result};

/// Poll schedule for the fine-grained alert feed.
///
/// Absent an active alert, polls land on a fixed grid of minute-of-hour
/// marks. While an alert is active the cadence collapses to a short fixed
/// interval; when it clears, the schedule re-aligns to the grid instead of
/// firing immediately.
#[derive(Debug, Clone)]
pub struct AlertPollSchedule {
    marks: Vec<u32>,
    active_interval: Duration,
}

impl AlertPollSchedule {
    pub fn new(marks: &[u32], active_poll_secs: u64) -> Result<Self> {
        if marks.is_empty() {
            return Err(Error::Config("alert minute marks must not be empty".into()));
        }
        if marks.iter().any(|&m| m > 59) {
            return Err(Error::Config("alert minute marks must be 0-59".into()));
        }
        if marks.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Config(
                "alert minute marks must be strictly ascending".into(),
            ));
        }
        if active_poll_secs == 0 {
            return Err(Error::Config("active poll interval must be non-zero".into()));
        }
        Ok(Self {
            marks: marks.to_vec(),
            active_interval: Duration::seconds(active_poll_secs as i64),
        })
    }

    /// The next poll instant after a poll at `last`.
    pub fn next_poll_after(&self, last: NaiveDateTime, alert_active: bool) -> NaiveDateTime {
        if alert_active {
            last + self.active_interval
        } else {
            self.grid_after(last)
        }
    }

    pub fn is_due(
        &self,
        now: NaiveDateTime,
        last: Option<NaiveDateTime>,
        alert_active: bool,
        force: bool,
    ) -> bool {
        if force {
            return true;
        }
        match last {
            None => true,
            Some(last) => now >= self.next_poll_after(last, alert_active),
        }
    }

    /// First grid instant strictly after `t`, wrapping to the next hour's
    /// first mark past the last mark of the hour.
    fn grid_after(&self, t: NaiveDateTime) -> NaiveDateTime {
        let hour_start = t
            .date()
            .and_hms_opt(t.hour(), 0, 0)
            .expect("hour out of range");
        for &m in &self.marks {
            let candidate = hour_start + Duration::minutes(m as i64);
            if candidate > t {
                return candidate;
            }
        }
        hour_start + Duration::hours(1) + Duration::minutes(self.marks[0] as i64)
    }
}

/// Poll schedule for the coarse storm feed: due only during a small set of
/// UTC hours, once per (date, hour). A force flag bypasses the gate for
/// startup refreshes.
#[derive(Debug, Clone)]
pub struct StormPollSchedule {
    hours: Vec<u32>,
}

impl StormPollSchedule {
    pub fn new(hours: &[u32]) -> Result<Self> {
        if hours.is_empty() {
            return Err(Error::Config("storm poll hours must not be empty".into()));
        }
        if hours.iter().any(|&h| h > 23) {
            return Err(Error::Config("storm poll hours must be 0-23".into()));
        }
        if hours.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Config(
                "storm poll hours must be strictly ascending".into(),
            ));
        }
        Ok(Self {
            hours: hours.to_vec(),
        })
    }

    pub fn is_due(&self, now: DateTime<Utc>, last: Option<DateTime<Utc>>, force: bool) -> bool {
        if force {
            return true;
        }
        if !self.hours.contains(&now.hour()) {
            return false;
        }
        match last {
            None => true,
            Some(last) => (last.date_naive(), last.hour()) != (now.date_naive(), now.hour()),
        }
    }
}
