use std::collections::BTreeSet;

use serde::Deserialize;

use crate::{Error, Result};

const STORMS_URL: &str = "https://www.nhc.noaa.gov/CurrentStorms.json";

/// One tracked tropical system from the storm bulletin feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStorm {
    pub name: String,
    pub classification: String,
    pub basin: String,
}

pub fn fetch_active_storms(client: &reqwest::blocking::Client) -> Result<Vec<ActiveStorm>> {
    let raw = client
        .get(STORMS_URL)
        .send()?
        .error_for_status()?
        .text()?;
    parse_storms(&raw)
}

pub fn parse_storms(raw: &str) -> Result<Vec<ActiveStorm>> {
    let response: StormsResponse =
        serde_json::from_str(raw).map_err(|e| Error::Parse(format!("storms json: {e}")))?;
    Ok(response
        .active_storms
        .into_iter()
        .filter_map(|record| {
            Some(ActiveStorm {
                name: record.name?,
                classification: record.classification.unwrap_or_default(),
                basin: record.basin.unwrap_or_default(),
            })
        })
        .collect())
}

/// Names of storms matching the configured classification, optionally
/// restricted to one basin. This is the only view the scheduler caches.
pub fn matching_names(
    storms: &[ActiveStorm],
    classification: &str,
    basin: Option<&str>,
) -> BTreeSet<String> {
    storms
        .iter()
        .filter(|s| s.classification == classification)
        .filter(|s| basin.map_or(true, |b| s.basin.eq_ignore_ascii_case(b)))
        .map(|s| s.name.clone())
        .collect()
}

#[derive(Deserialize)]
struct StormsResponse {
    #[serde(default, rename = "activeStorms")]
    active_storms: Vec<StormRecord>,
}

#[derive(Deserialize)]
struct StormRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    classification: Option<String>,
    #[serde(default)]
    basin: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "activeStorms": [
            {"name": "ALBERTO", "classification": "HU", "basin": "AL"},
            {"name": "BERYL", "classification": "TS", "basin": "AL"},
            {"name": "CARLOTTA", "classification": "HU", "basin": "EP"}
        ]
    }"#;

    #[test]
    fn parses_storm_records() {
        let storms = parse_storms(SAMPLE).unwrap();
        assert_eq!(storms.len(), 3);
        assert_eq!(storms[0].name, "ALBERTO");
        assert_eq!(storms[0].classification, "HU");
    }

    #[test]
    fn filters_to_one_classification() {
        let storms = parse_storms(SAMPLE).unwrap();
        let names = matching_names(&storms, "HU", None);
        assert_eq!(names, ["ALBERTO".to_string(), "CARLOTTA".to_string()].into());
    }

    #[test]
    fn basin_filter_narrows_further() {
        let storms = parse_storms(SAMPLE).unwrap();
        let names = matching_names(&storms, "HU", Some("AL"));
        assert_eq!(names, ["ALBERTO".to_string()].into());
    }

    #[test]
    fn quiet_season_is_empty_not_an_error() {
        let storms = parse_storms(r#"{"activeStorms": []}"#).unwrap();
        assert!(matching_names(&storms, "HU", None).is_empty());
    }

    #[test]
    fn nameless_records_are_skipped() {
        let storms = parse_storms(r#"{"activeStorms": [{"classification": "HU"}]}"#).unwrap();
        assert!(storms.is_empty());
    }
}
