use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::{sign::DisplayMessage, state::ActiveAlertState, Error, Result};

/// Which forecast backend to query. Both produce the same period shape;
/// the rest of the daemon never sees the difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    OpenWeather,
    TomorrowIo,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenWeather => "OpenWeather",
            Provider::TomorrowIo => "Tomorrow.io",
        }
    }

    pub fn fetch(
        &self,
        client: &reqwest::blocking::Client,
        api_key: &str,
        zip_code: &str,
    ) -> Result<DayBuckets> {
        let raw = client
            .get(self.forecast_url(api_key, zip_code))
            .send()?
            .error_for_status()?
            .text()?;
        let periods = match self {
            Provider::OpenWeather => parse_openweather(&raw)?,
            Provider::TomorrowIo => parse_tomorrowio(&raw)?,
        };
        Ok(DayBuckets::from_periods(periods))
    }

    fn forecast_url(&self, api_key: &str, zip_code: &str) -> String {
        match self {
            Provider::OpenWeather => format!(
                "https://api.openweathermap.org/data/2.5/forecast?zip={zip_code},us&units=imperial&appid={api_key}"
            ),
            Provider::TomorrowIo => format!(
                "https://api.tomorrow.io/v4/timelines?location={zip_code}&fields=temperature,weatherCode&units=imperial&timesteps=1h&apikey={api_key}"
            ),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['.', '_', '-'], "").as_str() {
            "openweather" => Ok(Provider::OpenWeather),
            "tomorrowio" => Ok(Provider::TomorrowIo),
            _ => Err(format!("unknown provider '{s}'")),
        }
    }
}

/// One forecast sample in local time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastPeriod {
    pub at: NaiveDateTime,
    pub condition: String,
    pub temp_min: i32,
    pub temp_max: i32,
}

/// Aggregate over one future day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub condition: String,
    pub temp_min: i32,
    pub temp_max: i32,
}

/// Forecast periods bucketed by local calendar day.
#[derive(Debug, Clone, Default)]
pub struct DayBuckets {
    days: BTreeMap<NaiveDate, Vec<ForecastPeriod>>,
}

impl DayBuckets {
    pub fn from_periods(periods: Vec<ForecastPeriod>) -> Self {
        let mut days: BTreeMap<NaiveDate, Vec<ForecastPeriod>> = BTreeMap::new();
        for period in periods {
            days.entry(period.at.date()).or_default().push(period);
        }
        Self { days }
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// The sample closest in time to `to` within that day's bucket.
    pub fn nearest(&self, to: NaiveDateTime) -> Option<&ForecastPeriod> {
        self.days
            .get(&to.date())?
            .iter()
            .min_by_key(|p| (p.at - to).num_seconds().abs())
    }

    /// Aggregates for up to `max_days` days strictly after `after`:
    /// min/max over all samples and the most common condition, first-seen
    /// winning ties so the result is deterministic.
    pub fn daily_summaries(&self, after: NaiveDate, max_days: usize) -> Vec<DaySummary> {
        self.days
            .iter()
            .filter(|(date, _)| **date > after)
            .take(max_days)
            .filter_map(|(date, periods)| {
                let temp_min = periods.iter().map(|p| p.temp_min).min()?;
                let temp_max = periods.iter().map(|p| p.temp_max).max()?;
                let condition = most_common_condition(periods)?;
                Some(DaySummary {
                    date: *date,
                    condition,
                    temp_min,
                    temp_max,
                })
            })
            .collect()
    }
}

fn most_common_condition(periods: &[ForecastPeriod]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for period in periods {
        match counts.iter_mut().find(|(c, _)| *c == period.condition) {
            Some(entry) => entry.1 += 1,
            None => counts.push((&period.condition, 1)),
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (condition, count) in counts {
        if best.map_or(true, |(_, n)| count > n) {
            best = Some((condition, count));
        }
    }
    best.map(|(condition, _)| condition.to_string())
}

fn parse_openweather(raw: &str) -> Result<Vec<ForecastPeriod>> {
    let response: OwResponse =
        serde_json::from_str(raw).map_err(|e| Error::Parse(format!("openweather json: {e}")))?;
    Ok(response
        .list
        .into_iter()
        .filter_map(|entry| {
            let at = local_from_unix(entry.dt?)?;
            let main = entry.main?;
            let condition = entry.weather.into_iter().next()?.main?;
            Some(ForecastPeriod {
                at,
                condition,
                temp_min: main.temp_min? as i32,
                temp_max: main.temp_max? as i32,
            })
        })
        .collect())
}

fn parse_tomorrowio(raw: &str) -> Result<Vec<ForecastPeriod>> {
    let response: TioResponse =
        serde_json::from_str(raw).map_err(|e| Error::Parse(format!("tomorrow.io json: {e}")))?;
    let intervals = response
        .data
        .map(|d| d.timelines)
        .unwrap_or_default()
        .into_iter()
        .flat_map(|t| t.intervals);
    Ok(intervals
        .filter_map(|interval| {
            let at = DateTime::parse_from_rfc3339(&interval.start_time?)
                .ok()?
                .with_timezone(&Local)
                .naive_local();
            let values = interval.values?;
            let temp = values.temperature? as i32;
            let condition = values
                .weather_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            Some(ForecastPeriod {
                at,
                condition,
                temp_min: temp,
                temp_max: temp,
            })
        })
        .collect())
}

fn local_from_unix(secs: i64) -> Option<NaiveDateTime> {
    Local.timestamp_opt(secs, 0).single().map(|t| t.naive_local())
}

/// Assemble the sign message: one block per upcoming forecast instant,
/// one per aggregated future day, a next-update suffix, and an alert
/// suffix when anything is in effect.
pub fn build_message(
    buckets: &DayBuckets,
    anchors: &[NaiveDateTime; 3],
    next_refresh: NaiveDateTime,
    alert: Option<&ActiveAlertState>,
    storms: &BTreeSet<String>,
) -> DisplayMessage {
    let today = anchors
        .iter()
        .filter_map(|anchor| {
            let period = buckets.nearest(*anchor)?;
            Some(format!(
                "{} {} {}F/{}F",
                anchor.format("%I:%M %p %a %m/%d/%y"),
                period.condition,
                period.temp_min,
                period.temp_max
            ))
        })
        .collect();

    let future = buckets
        .daily_summaries(anchors[0].date(), 5)
        .into_iter()
        .map(|day| {
            format!(
                "{} {} {}F/{}F",
                day.date.format("%a %m/%d/%y"),
                day.condition,
                day.temp_min,
                day.temp_max
            )
        })
        .collect();

    let suffix = Some(format!(
        "Next update: {}",
        next_refresh
            .format("%m/%d/%y %I:%M %p")
            .to_string()
            .trim_start_matches('0')
    ));

    let mut alert_parts = Vec::new();
    if let Some(alert) = alert {
        alert_parts.push(format!("NWS: {}", alert.headline));
    }
    if !storms.is_empty() {
        let names: Vec<&str> = storms.iter().map(String::as_str).collect();
        alert_parts.push(format!("NHC: {}", names.join(", ")));
    }
    let alert = if alert_parts.is_empty() {
        None
    } else {
        Some(alert_parts.join(" | "))
    };

    DisplayMessage {
        today,
        future,
        suffix,
        alert,
    }
}

#[derive(Deserialize)]
struct OwResponse {
    #[serde(default)]
    list: Vec<OwEntry>,
}

#[derive(Deserialize)]
struct OwEntry {
    #[serde(default)]
    dt: Option<i64>,
    #[serde(default)]
    main: Option<OwMain>,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[derive(Deserialize)]
struct OwMain {
    #[serde(default)]
    temp_min: Option<f64>,
    #[serde(default)]
    temp_max: Option<f64>,
}

#[derive(Deserialize)]
struct OwWeather {
    #[serde(default)]
    main: Option<String>,
}

#[derive(Deserialize)]
struct TioResponse {
    #[serde(default)]
    data: Option<TioData>,
}

#[derive(Deserialize)]
struct TioData {
    #[serde(default)]
    timelines: Vec<TioTimeline>,
}

#[derive(Deserialize)]
struct TioTimeline {
    #[serde(default)]
    intervals: Vec<TioInterval>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TioInterval {
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    values: Option<TioValues>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TioValues {
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    weather_code: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(at: NaiveDateTime, condition: &str, lo: i32, hi: i32) -> ForecastPeriod {
        ForecastPeriod {
            at,
            condition: condition.into(),
            temp_min: lo,
            temp_max: hi,
        }
    }

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn openweather_entries_parse_into_periods() {
        let stamp = 1_750_000_000i64;
        let raw = format!(
            r#"{{"list": [{{"dt": {stamp}, "main": {{"temp_min": 58.2, "temp_max": 71.9}},
                "weather": [{{"main": "Clouds"}}]}}]}}"#
        );
        let periods = parse_openweather(&raw).unwrap();
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].condition, "Clouds");
        assert_eq!(periods[0].temp_min, 58);
        assert_eq!(periods[0].temp_max, 71);
        assert_eq!(periods[0].at, local_from_unix(stamp).unwrap());
    }

    #[test]
    fn openweather_entries_missing_fields_are_skipped() {
        let raw = r#"{"list": [
            {"dt": 1750000000},
            {"main": {"temp_min": 1.0, "temp_max": 2.0}, "weather": [{"main": "Rain"}]}
        ]}"#;
        assert!(parse_openweather(raw).unwrap().is_empty());
    }

    #[test]
    fn tomorrowio_intervals_parse_into_periods() {
        let raw = r#"{"data": {"timelines": [{"intervals": [
            {"startTime": "2025-06-10T15:00:00-04:00",
             "values": {"temperature": 83.4, "weatherCode": 1001}}
        ]}]}}"#;
        let periods = parse_tomorrowio(raw).unwrap();
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].condition, "1001");
        assert_eq!(periods[0].temp_min, 83);
        assert_eq!(periods[0].temp_max, 83);
    }

    #[test]
    fn malformed_bodies_are_parse_errors() {
        assert!(parse_openweather("[1,2").is_err());
        assert!(parse_tomorrowio("nope").is_err());
    }

    #[test]
    fn nearest_picks_closest_sample_in_the_day() {
        let buckets = DayBuckets::from_periods(vec![
            period(at(10, 6), "Clear", 55, 60),
            period(at(10, 12), "Clouds", 60, 70),
            period(at(10, 18), "Rain", 58, 64),
        ]);
        assert_eq!(buckets.nearest(at(10, 13)).unwrap().condition, "Clouds");
        assert_eq!(buckets.nearest(at(10, 16)).unwrap().condition, "Rain");
        assert!(buckets.nearest(at(11, 12)).is_none());
    }

    #[test]
    fn daily_summaries_aggregate_and_break_ties_deterministically() {
        let buckets = DayBuckets::from_periods(vec![
            period(at(11, 6), "Rain", 50, 55),
            period(at(11, 12), "Clear", 60, 72),
            period(at(11, 18), "Rain", 58, 64),
            period(at(12, 9), "Clouds", 52, 61),
            period(at(12, 15), "Clear", 54, 66),
        ]);
        let summaries = buckets.daily_summaries(at(10, 0).date(), 5);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].condition, "Rain");
        assert_eq!(summaries[0].temp_min, 50);
        assert_eq!(summaries[0].temp_max, 72);
        // Tie between Clouds and Clear: first seen wins.
        assert_eq!(summaries[1].condition, "Clouds");
    }

    #[test]
    fn daily_summaries_skip_today_and_cap_days() {
        let periods: Vec<ForecastPeriod> = (10..=17)
            .map(|d| period(at(d, 12), "Clear", 60, 70))
            .collect();
        let buckets = DayBuckets::from_periods(periods);
        let summaries = buckets.daily_summaries(at(10, 0).date(), 5);
        assert_eq!(summaries.len(), 5);
        assert_eq!(summaries[0].date, at(11, 0).date());
    }

    #[test]
    fn build_message_fills_blocks_and_suffixes() {
        let buckets = DayBuckets::from_periods(vec![
            period(at(10, 9), "Clear", 58, 71),
            period(at(10, 12), "Clouds", 60, 72),
            period(at(10, 15), "Clouds", 61, 73),
            period(at(11, 12), "Rain", 55, 63),
        ]);
        let anchors = [at(10, 9), at(10, 12), at(10, 15)];
        let message = build_message(&buckets, &anchors, at(10, 12), None, &BTreeSet::new());
        assert_eq!(message.today.len(), 3);
        assert!(message.today[0].contains("Clear 58F/71F"));
        assert_eq!(message.future.len(), 1);
        assert!(message.future[0].contains("Rain 55F/63F"));
        assert_eq!(message.suffix.as_deref(), Some("Next update: 6/10/25 12:00 PM"));
        assert!(message.alert.is_none());
    }

    #[test]
    fn build_message_carries_alert_and_storm_suffix() {
        let buckets = DayBuckets::from_periods(vec![period(at(10, 9), "Clear", 58, 71)]);
        let anchors = [at(10, 9), at(10, 12), at(10, 15)];
        let alert = ActiveAlertState {
            id: "urn:1".into(),
            headline: "Tornado Warning".into(),
        };
        let storms: BTreeSet<String> = ["ALBERTO".to_string()].into();
        let message = build_message(&buckets, &anchors, at(10, 12), Some(&alert), &storms);
        assert_eq!(
            message.alert.as_deref(),
            Some("NWS: Tornado Warning | NHC: ALBERTO")
        );
    }

    #[test]
    fn missing_day_buckets_just_drop_blocks() {
        let buckets = DayBuckets::from_periods(vec![period(at(10, 9), "Clear", 58, 71)]);
        let anchors = [at(10, 9), at(11, 0), at(11, 3)];
        let message = build_message(&buckets, &anchors, at(11, 0), None, &BTreeSet::new());
        assert_eq!(message.today.len(), 1);
        assert!(message.future.is_empty());
    }

    #[test]
    fn provider_round_trips_through_strings() {
        assert_eq!("openweather".parse::<Provider>().unwrap(), Provider::OpenWeather);
        assert_eq!("Tomorrow.io".parse::<Provider>().unwrap(), Provider::TomorrowIo);
        assert!("weatherdotcom".parse::<Provider>().is_err());
        assert_eq!(Provider::TomorrowIo.to_string(), "Tomorrow.io");
    }
}
