use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};

use crate::{Error, Result};

/// A tick this close to the top of an anchor hour snaps back onto it.
const SNAP_WINDOW_MINUTES: u32 = 5;
/// A refresh fires only within this many seconds of minute zero.
const REFRESH_TOLERANCE_SECS: u32 = 5;

/// Marker for the most recent refresh, keyed by local date and anchor hour.
pub type RefreshMark = (NaiveDate, u32);

/// Plans forecast refreshes over a fixed set of daily anchor hours.
#[derive(Debug, Clone)]
pub struct Planner {
    hours: Vec<u32>,
}

impl Planner {
    /// At least two strictly ascending hours below 24 are required, so two
    /// consecutive anchors are never more than a day apart.
    pub fn new(hours: &[u32]) -> Result<Self> {
        if hours.len() < 2 {
            return Err(Error::Config(
                "at least two forecast anchor hours are required".into(),
            ));
        }
        if hours.iter().any(|&h| h > 23) {
            return Err(Error::Config("forecast anchor hours must be 0-23".into()));
        }
        if hours.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Config(
                "forecast anchor hours must be strictly ascending".into(),
            ));
        }
        Ok(Self {
            hours: hours.to_vec(),
        })
    }

    /// The three forecast instants shown on the sign: now (snapped onto the
    /// current anchor hour when the tick lands within its first few minutes)
    /// followed by the next two anchors, rolling past midnight as needed.
    pub fn next_anchors(&self, now: NaiveDateTime) -> [NaiveDateTime; 3] {
        let t0 = self.snap(now);
        let t1 = self.anchor_after_hour(t0);
        let t2 = self.anchor_after_hour(t1);
        [t0, t1, t2]
    }

    /// The single next anchor strictly after `now`, for "next update" text.
    pub fn next_refresh(&self, now: NaiveDateTime) -> NaiveDateTime {
        for &h in &self.hours {
            let candidate = at_hour(now.date(), h);
            if candidate > now {
                return candidate;
            }
        }
        at_hour(next_day(now.date()), self.hours[0])
    }

    /// Whether a refresh should fire on this tick. Fires on an anchor hour,
    /// at minute zero within the tolerance window, at most once per hour:
    /// `last` is the (date, hour) recorded when the previous refresh fired.
    pub fn refresh_due(&self, now: NaiveDateTime, last: Option<RefreshMark>) -> bool {
        self.hours.contains(&now.hour())
            && now.minute() == 0
            && now.second() < REFRESH_TOLERANCE_SECS
            && last != Some((now.date(), now.hour()))
    }

    fn snap(&self, now: NaiveDateTime) -> NaiveDateTime {
        if self.hours.contains(&now.hour()) && now.minute() < SNAP_WINDOW_MINUTES {
            at_hour(now.date(), now.hour())
        } else {
            now
        }
    }

    fn anchor_after_hour(&self, t: NaiveDateTime) -> NaiveDateTime {
        match self.hours.iter().copied().find(|&h| h > t.hour()) {
            Some(h) => at_hour(t.date(), h),
            None => at_hour(next_day(t.date()), self.hours[0]),
        }
    }
}

fn at_hour(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, 0, 0).expect("anchor hour out of range")
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).expect("date overflow")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn planner() -> Planner {
        Planner::new(&[0, 3, 6, 9, 12, 15, 18, 21]).unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn rejects_degenerate_anchor_sets() {
        assert!(Planner::new(&[]).is_err());
        assert!(Planner::new(&[12]).is_err());
        assert!(Planner::new(&[3, 3]).is_err());
        assert!(Planner::new(&[6, 3]).is_err());
        assert!(Planner::new(&[0, 24]).is_err());
    }

    #[test]
    fn anchors_are_strictly_increasing_and_within_a_day() {
        let p = planner();
        for h in 0..24 {
            for m in [0, 2, 5, 31, 59] {
                let now = at(h, m, 17);
                let [t0, t1, t2] = p.next_anchors(now);
                assert!(t0 < t1 && t1 < t2, "not increasing at {now}");
                assert!(t0 <= now);
                assert!(t2 <= now + Duration::hours(24), "t2 too far at {now}");
            }
        }
    }

    #[test]
    fn snaps_within_first_minutes_of_anchor_hour() {
        let p = planner();
        assert_eq!(p.next_anchors(at(9, 2, 40))[0], at(9, 0, 0));
        assert_eq!(p.next_anchors(at(9, 30, 0))[0], at(9, 30, 0));
        assert_eq!(p.next_anchors(at(10, 2, 0))[0], at(10, 2, 0));
    }

    #[test]
    fn anchors_roll_to_next_day_past_last_anchor() {
        let p = planner();
        let [t0, t1, t2] = p.next_anchors(at(22, 15, 0));
        assert_eq!(t0, at(22, 15, 0));
        assert_eq!(t1.date(), at(0, 0, 0).date().succ_opt().unwrap());
        assert_eq!(t1.hour(), 0);
        assert_eq!(t2.hour(), 3);
    }

    #[test]
    fn next_refresh_is_strictly_after_now() {
        let p = planner();
        assert_eq!(p.next_refresh(at(8, 59, 0)), at(9, 0, 0));
        assert_eq!(p.next_refresh(at(9, 0, 0)), at(12, 0, 0));
        let rolled = p.next_refresh(at(21, 0, 1));
        assert_eq!(rolled.hour(), 0);
        assert_eq!(rolled.date(), at(0, 0, 0).date().succ_opt().unwrap());
    }

    #[test]
    fn refresh_fires_once_per_anchor_hour() {
        let p = planner();
        let first = at(9, 0, 2);
        assert!(p.refresh_due(first, Some((first.date(), 8))));
        // After firing, the recorded marker suppresses the rest of the window.
        assert!(!p.refresh_due(at(9, 0, 4), Some((first.date(), 9))));
        assert!(!p.refresh_due(at(9, 0, 7), Some((first.date(), 8))));
        assert!(!p.refresh_due(at(9, 1, 0), Some((first.date(), 8))));
        assert!(!p.refresh_due(at(10, 0, 0), Some((first.date(), 9))));
    }

    #[test]
    fn refresh_fires_again_on_same_hour_next_day() {
        let p = planner();
        let yesterday = at(9, 0, 0).date().pred_opt().unwrap();
        assert!(p.refresh_due(at(9, 0, 1), Some((yesterday, 9))));
    }
}
