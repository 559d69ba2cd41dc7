use chrono::{DateTime, Datelike, FixedOffset, TimeDelta, Timelike, Utc};

/// Hours (KST) at which the village forecast service publishes a new batch
const ISSUE_HOURS: [u32; 8] = [2, 5, 8, 11, 14, 17, 20, 23];

/// 3-hour forecast slots a village forecast row can describe
const SLOT_STEP: u32 = 3;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Mode {
    /// Answer for the next 3-hour slot after the current hour
    OnDemand,
    /// Answer for the fixed 07:00 slot of the morning broadcast
    Morning,
}

/// Resolved issuance and target times for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ApiTimes {
    pub base_date: String,
    pub base_time: String,
    pub forecast_date: String,
    pub forecast_time: String,
    pub forecast_label: String,
}

/// Returns the current instant in the fixed KST (UTC+9) civil zone,
/// regardless of the host time zone
pub fn kst_now() -> DateTime<FixedOffset> {
    let kst = FixedOffset::east_opt(9 * 3600).unwrap();
    Utc::now().with_timezone(&kst)
}

/// Resolves the most recent issuance the upstream has already published and
/// the forecast slot the caller wants answered.
///
/// The issuance scan picks the largest issue hour not exceeding the current
/// KST hour; before the first issue hour of the day it rolls back to the
/// previous day's 23:00 batch. A non-zero 'publication_delay' additionally
/// requires that many minutes to have passed within the issue hour itself
/// (legacy behavior of the service, off by default).
///
/// # Arguments
///
/// * 'now' - current instant, already in KST
/// * 'mode' - which forecast slot the caller is asking about
/// * 'publication_delay' - minutes after the issue hour before the batch counts as published
pub fn api_times(now: DateTime<FixedOffset>, mode: Mode, publication_delay: u32) -> ApiTimes {
    let hour = now.hour();
    let minute = now.minute();

    let mut issue_hour: Option<u32> = None;
    for h in ISSUE_HOURS {
        if hour < h || (hour == h && minute < publication_delay) {
            break;
        }
        issue_hour = Some(h);
    }

    let (base_date, base_time) = match issue_hour {
        Some(h) => (date_string(now), format!("{:02}00", h)),
        None => (date_string(now - TimeDelta::days(1)), "2300".to_string()),
    };

    let (forecast_date, slot_hour) = match mode {
        Mode::Morning => (date_string(now), 7),
        Mode::OnDemand => {
            let next = (hour / SLOT_STEP + 1) * SLOT_STEP;
            if next >= 24 {
                (date_string(now + TimeDelta::days(1)), 0)
            } else {
                (date_string(now), next)
            }
        }
    };

    ApiTimes {
        base_date,
        base_time,
        forecast_date,
        forecast_time: format!("{:02}00", slot_hour),
        forecast_label: format!("{}시", slot_hour),
    }
}

/// Freshness gate: the cache is fresh only when the stored marker names the
/// same issuance time the resolver just computed. An absent marker is stale.
pub fn is_fresh(stored: Option<&str>, computed: &str) -> bool {
    match stored {
        Some(s) => crate::extractor::canonical(s) == crate::extractor::canonical(computed),
        None => false,
    }
}

fn date_string(dt: DateTime<FixedOffset>) -> String {
    format!("{:04}{:02}{:02}", dt.year(), dt.month(), dt.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn kst(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
    }

    #[test]
    fn issuance_before_first_hour_rolls_to_previous_day() {
        let t = api_times(kst(2026, 3, 2, 1, 59), Mode::OnDemand, 0);
        assert_eq!(t.base_date, "20260301");
        assert_eq!(t.base_time, "2300");
    }

    #[test]
    fn issuance_at_exact_issue_hour_selects_same_day() {
        let t = api_times(kst(2026, 3, 2, 2, 0), Mode::OnDemand, 0);
        assert_eq!(t.base_date, "20260302");
        assert_eq!(t.base_time, "0200");
    }

    #[test]
    fn issuance_midday_picks_latest_published() {
        let t = api_times(kst(2026, 3, 2, 16, 30), Mode::OnDemand, 0);
        assert_eq!(t.base_time, "1400");
    }

    #[test]
    fn legacy_delay_holds_back_the_fresh_batch() {
        let t = api_times(kst(2026, 3, 2, 2, 5), Mode::OnDemand, 10);
        assert_eq!(t.base_date, "20260301");
        assert_eq!(t.base_time, "2300");

        let t = api_times(kst(2026, 3, 2, 2, 10), Mode::OnDemand, 10);
        assert_eq!(t.base_time, "0200");
    }

    #[test]
    fn on_demand_slot_is_strictly_after_current_hour() {
        let t = api_times(kst(2026, 3, 2, 20, 0), Mode::OnDemand, 0);
        assert_eq!(t.forecast_date, "20260302");
        assert_eq!(t.forecast_time, "2100");
        assert_eq!(t.forecast_label, "21시");

        let t = api_times(kst(2026, 3, 2, 3, 0), Mode::OnDemand, 0);
        assert_eq!(t.forecast_time, "0600");
    }

    #[test]
    fn on_demand_slot_rolls_over_after_21() {
        let t = api_times(kst(2026, 3, 2, 22, 15), Mode::OnDemand, 0);
        assert_eq!(t.forecast_date, "20260303");
        assert_eq!(t.forecast_time, "0000");
        assert_eq!(t.forecast_label, "0시");
    }

    #[test]
    fn morning_mode_targets_seven_same_day() {
        let t = api_times(kst(2026, 3, 2, 6, 50), Mode::Morning, 0);
        assert_eq!(t.forecast_date, "20260302");
        assert_eq!(t.forecast_time, "0700");
        assert_eq!(t.forecast_label, "7시");
    }

    #[test]
    fn freshness_gate() {
        assert!(is_fresh(Some("0800"), "0800"));
        assert!(is_fresh(Some(" 0800 "), "0800"));
        assert!(!is_fresh(Some("0500"), "0800"));
        assert!(!is_fresh(None, "0800"));
    }
}
