use std::time::Duration;

use crate::{feeds::forecast::Provider, sign::retry::with_attempts};

const VALIDATION_ATTEMPTS: u32 = 3;
const VALIDATION_PAUSE: Duration = Duration::from_secs(1);
/// Any real ZIP works for probing a key; this one never goes away.
const PROBE_ZIP: &str = "10001";

/// True when the key is accepted by the selected provider. Network trouble
/// after the attempt budget counts as a negative result, never an error.
pub fn validate_api_key(
    client: &reqwest::blocking::Client,
    provider: Provider,
    api_key: &str,
) -> bool {
    if api_key.trim().is_empty() {
        return false;
    }
    probe(client, &probe_url(provider, api_key, PROBE_ZIP))
}

/// True when the ZIP is well-formed and known to the provider.
pub fn validate_zip(
    client: &reqwest::blocking::Client,
    provider: Provider,
    api_key: &str,
    zip_code: &str,
) -> bool {
    if !zip_is_well_formed(zip_code) {
        return false;
    }
    probe(client, &probe_url(provider, api_key, zip_code))
}

/// True when the NWS forecast zone exists.
pub fn validate_forecast_zone(client: &reqwest::blocking::Client, zone: &str) -> bool {
    if !zone_is_well_formed(zone) {
        return false;
    }
    let url = format!(
        "https://api.weather.gov/zones/forecast/{}",
        zone.to_ascii_uppercase()
    );
    probe(client, &url)
}

pub fn zip_is_well_formed(zip_code: &str) -> bool {
    zip_code.len() == 5 && zip_code.chars().all(|c| c.is_ascii_digit())
}

pub fn zone_is_well_formed(zone: &str) -> bool {
    !zone.is_empty() && zone.chars().all(|c| c.is_ascii_alphanumeric())
}

fn probe_url(provider: Provider, api_key: &str, zip_code: &str) -> String {
    match provider {
        Provider::OpenWeather => format!(
            "https://api.openweathermap.org/data/2.5/weather?zip={zip_code},US&appid={api_key}"
        ),
        Provider::TomorrowIo => format!(
            "https://api.tomorrow.io/v4/timelines?location={zip_code}&fields=temperature&timesteps=1h&apikey={api_key}"
        ),
    }
}

fn probe(client: &reqwest::blocking::Client, url: &str) -> bool {
    let status = with_attempts(VALIDATION_ATTEMPTS, VALIDATION_PAUSE, || {
        Ok(client.get(url).send()?.status())
    });
    match status {
        Ok(status) => status.is_success(),
        Err(_) => false,
    }
}
