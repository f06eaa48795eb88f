use chrono::NaiveTime;

/// Whether the display window covers `now`.
///
/// A window with `on < off` is a plain daytime interval `[on, off)`. When
/// `on >= off` the window wraps past midnight and covers `[on, 24:00) ∪
/// [00:00, off)`. Equal on/off times are rejected at the config boundary
/// before this is ever called.
pub fn is_active(now: NaiveTime, on: NaiveTime, off: NaiveTime) -> bool {
    if on < off {
        on <= now && now < off
    } else {
        now >= on || now < off
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn daytime_window_covers_exactly_on_to_off() {
        let on = t(6, 0);
        let off = t(22, 0);
        for h in 0..24 {
            for m in [0, 15, 30, 59] {
                let now = t(h, m);
                let expected = now >= on && now < off;
                assert_eq!(is_active(now, on, off), expected, "at {now}");
            }
        }
    }

    #[test]
    fn window_is_half_open() {
        let on = t(6, 0);
        let off = t(22, 0);
        assert!(is_active(t(6, 0), on, off));
        assert!(!is_active(t(22, 0), on, off));
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let on = t(22, 0);
        let off = t(6, 0);
        assert!(is_active(t(23, 30), on, off));
        assert!(is_active(t(0, 30), on, off));
        assert!(is_active(t(5, 59), on, off));
        assert!(!is_active(t(6, 0), on, off));
        assert!(!is_active(t(7, 0), on, off));
        assert!(!is_active(t(21, 59), on, off));
    }

    #[test]
    fn overnight_window_has_no_gap() {
        // Every minute of the day is either inside the overnight window or
        // inside its daytime complement.
        let on = t(22, 0);
        let off = t(6, 0);
        for h in 0..24 {
            for m in 0..60 {
                let now = t(h, m);
                let complement = is_active(now, off, on);
                assert!(is_active(now, on, off) ^ complement, "gap/overlap at {now}");
            }
        }
    }
}
