use serde::Deserialize;

use crate::{Error, Result};

const ALERTS_URL: &str = "https://api.weather.gov/alerts/active";

/// One active weather alert for the configured forecast zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAlert {
    pub id: String,
    pub headline: String,
}

/// Fetch the active alerts for a zone, newest first as the feed orders
/// them. A transport or parse failure propagates; the caller keeps its
/// cached alert data untouched.
pub fn fetch_active_alerts(
    client: &reqwest::blocking::Client,
    zone: &str,
) -> Result<Vec<ActiveAlert>> {
    let raw = client
        .get(ALERTS_URL)
        .query(&[("zone", zone)])
        .send()?
        .error_for_status()?
        .text()?;
    parse_alerts(&raw)
}

pub fn parse_alerts(raw: &str) -> Result<Vec<ActiveAlert>> {
    let response: AlertsResponse =
        serde_json::from_str(raw).map_err(|e| Error::Parse(format!("alerts json: {e}")))?;
    Ok(response
        .features
        .into_iter()
        .filter_map(|feature| {
            let id = feature.id?;
            let headline = feature
                .properties
                .and_then(|p| p.headline)
                .unwrap_or_default();
            Some(ActiveAlert { id, headline })
        })
        .collect())
}

#[derive(Deserialize)]
struct AlertsResponse {
    #[serde(default)]
    features: Vec<AlertFeature>,
}

#[derive(Deserialize)]
struct AlertFeature {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    properties: Option<AlertProperties>,
}

#[derive(Deserialize)]
struct AlertProperties {
    #[serde(default)]
    headline: Option<String>,
}
