use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::{
    feeds::{forecast::Provider, validate as feed_validate},
    schedule::{
        alerts::{AlertPollSchedule, StormPollSchedule},
        forecast::Planner,
    },
    Error, Result,
};

pub mod loader;

pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD: u32 = 9_600;
pub const DEFAULT_ON_TIME: &str = "06:00";
pub const DEFAULT_OFF_TIME: &str = "22:00";
pub const DEFAULT_FORECAST_HOURS: &[u32] = &[0, 3, 6, 9, 12, 15, 18, 21];
pub const DEFAULT_ALERT_MINUTE_MARKS: &[u32] = &[0, 5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 55];
pub const DEFAULT_STORM_HOURS_UTC: &[u32] = &[3, 9, 15, 21];
pub const DEFAULT_STORM_CLASSIFICATION: &str = "HU";
pub const DEFAULT_ACTIVE_POLL_SECS: u64 = 120;
pub const DEFAULT_RESEND_DEBOUNCE_SECS: u64 = 300;
const CONFIG_DIR_NAME: &str = ".signwx";
const CONFIG_FILE_NAME: &str = "config.json";

/// What to do with the sign when the display window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OffPolicy {
    /// Send one empty frame so the sign goes dark.
    #[default]
    Blank,
    /// Stop sending; whatever is on the sign stays there.
    Suppress,
}

impl OffPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffPolicy::Blank => "blank",
            OffPolicy::Suppress => "suppress",
        }
    }
}

impl fmt::Display for OffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OffPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blank" => Ok(OffPolicy::Blank),
            "suppress" => Ok(OffPolicy::Suppress),
            _ => Err(format!("expected 'blank' or 'suppress', got '{s}'")),
        }
    }
}

/// Operator settings persisted as JSON. One immutable snapshot of this is
/// taken per daemon run; nothing rereads it mid-cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub device: String,
    pub baud: u32,
    pub provider: Provider,
    pub api_key: String,
    pub zip_code: String,
    pub forecast_zone: String,
    pub on_time: String,
    pub off_time: String,
    pub forecast_hours: Vec<u32>,
    pub alert_minute_marks: Vec<u32>,
    pub storm_hours_utc: Vec<u32>,
    pub storm_classification: String,
    pub storm_basin: Option<String>,
    pub active_poll_secs: u64,
    pub resend_debounce_secs: u64,
    pub off_policy: OffPolicy,
    pub logging_on: bool,
    pub log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud: DEFAULT_BAUD,
            provider: Provider::default(),
            api_key: String::new(),
            zip_code: String::new(),
            forecast_zone: String::new(),
            on_time: DEFAULT_ON_TIME.to_string(),
            off_time: DEFAULT_OFF_TIME.to_string(),
            forecast_hours: DEFAULT_FORECAST_HOURS.to_vec(),
            alert_minute_marks: DEFAULT_ALERT_MINUTE_MARKS.to_vec(),
            storm_hours_utc: DEFAULT_STORM_HOURS_UTC.to_vec(),
            storm_classification: DEFAULT_STORM_CLASSIFICATION.to_string(),
            storm_basin: None,
            active_poll_secs: DEFAULT_ACTIVE_POLL_SECS,
            resend_debounce_secs: DEFAULT_RESEND_DEBOUNCE_SECS,
            off_policy: OffPolicy::default(),
            logging_on: false,
            log_file: None,
        }
    }
}

impl Config {
    pub fn load_or_default() -> Result<Self> {
        loader::load_or_default()
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        loader::load_from_path(path)
    }

    pub fn save(&self) -> Result<()> {
        loader::save(self)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        loader::save_to_path(self, path)
    }

    /// The parsed display window. Equal on/off times are ambiguous and
    /// rejected here, before the evaluator ever sees them.
    pub fn window(&self) -> Result<(NaiveTime, NaiveTime)> {
        let on = parse_hhmm(&self.on_time)?;
        let off = parse_hhmm(&self.off_time)?;
        if on == off {
            return Err(Error::Config(
                "on_time and off_time must differ (the window would be ambiguous)".into(),
            ));
        }
        Ok((on, off))
    }
}

/// Strict 24-hour HH:MM.
pub fn parse_hhmm(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| Error::Config(format!("'{raw}' is not a valid 24-hour HH:MM time")))
}

/// Structural checks applied on every load and save. These hold for the
/// default config so a freshly created file is valid.
pub fn validate(cfg: &Config) -> Result<()> {
    cfg.window()?;
    Planner::new(&cfg.forecast_hours)?;
    AlertPollSchedule::new(&cfg.alert_minute_marks, cfg.active_poll_secs)?;
    StormPollSchedule::new(&cfg.storm_hours_utc)?;
    if cfg.baud == 0 {
        return Err(Error::Config("baud must be non-zero".into()));
    }
    if cfg.storm_classification.trim().is_empty() {
        return Err(Error::Config("storm_classification must not be empty".into()));
    }
    Ok(())
}

/// Additional checks before the daemon starts: credentials and location
/// identifiers must be present and well-formed. The setup console is where
/// they get filled in and verified against the live services.
pub fn validate_runtime(cfg: &Config) -> Result<()> {
    validate(cfg)?;
    if cfg.api_key.trim().is_empty() {
        return Err(Error::Config("api_key is not set; run `signwx setup`".into()));
    }
    if !feed_validate::zip_is_well_formed(&cfg.zip_code) {
        return Err(Error::Config(format!(
            "zip_code '{}' must be five digits; run `signwx setup`",
            cfg.zip_code
        )));
    }
    if !feed_validate::zone_is_well_formed(&cfg.forecast_zone) {
        return Err(Error::Config(format!(
            "forecast_zone '{}' is not a valid NWS zone id; run `signwx setup`",
            cfg.forecast_zone
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        fs,
        path::PathBuf,
        time::{SystemTime, UNIX_EPOCH},
    };

    fn temp_path(name: &str) -> PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("signwx_test_{name}_{stamp}"))
    }

    #[test]
    fn default_config_is_structurally_valid() {
        validate(&Config::default()).unwrap();
    }

    #[test]
    fn default_config_is_not_runnable_until_setup() {
        let err = validate_runtime(&Config::default()).unwrap_err();
        assert!(format!("{err}").contains("api_key"));
    }

    #[test]
    fn rejects_equal_on_off_times() {
        let cfg = Config {
            on_time: "08:00".into(),
            off_time: "08:00".into(),
            ..Config::default()
        };
        let err = validate(&cfg).unwrap_err();
        assert!(format!("{err}").contains("must differ"));
    }

    #[test]
    fn rejects_malformed_times() {
        assert!(parse_hhmm("24:00").is_err());
        assert!(parse_hhmm("12:60").is_err());
        assert!(parse_hhmm("noonish").is_err());
        assert_eq!(
            parse_hhmm("22:30").unwrap(),
            NaiveTime::from_hms_opt(22, 30, 0).unwrap()
        );
    }

    #[test]
    fn rejects_bad_anchor_sets_at_the_boundary() {
        let cfg = Config {
            forecast_hours: vec![9],
            ..Config::default()
        };
        assert!(validate(&cfg).is_err());

        let cfg = Config {
            alert_minute_marks: vec![30, 5],
            ..Config::default()
        };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn loads_default_when_missing() {
        let path = temp_path("missing");
        let cfg = Config::load_from_path(&path).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parses_valid_config() {
        let path = temp_path("parse");
        let contents = r#"{
            "device": "/dev/ttyUSB1",
            "baud": 9600,
            "provider": "tomorrow_io",
            "api_key": "k123",
            "zip_code": "33101",
            "forecast_zone": "FLZ072",
            "on_time": "07:30",
            "off_time": "23:00",
            "off_policy": "suppress",
            "resend_debounce_secs": 0
        }"#;
        fs::write(&path, contents).unwrap();
        let cfg = Config::load_from_path(&path).unwrap();
        assert_eq!(cfg.device, "/dev/ttyUSB1");
        assert_eq!(cfg.provider, Provider::TomorrowIo);
        assert_eq!(cfg.zip_code, "33101");
        assert_eq!(cfg.off_policy, OffPolicy::Suppress);
        assert_eq!(cfg.resend_debounce_secs, 0);
        // Unspecified fields keep their defaults.
        assert_eq!(cfg.forecast_hours, DEFAULT_FORECAST_HOURS);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn rejects_unknown_key() {
        let path = temp_path("unknown");
        fs::write(&path, r#"{"nope": 1}"#).unwrap();
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(format!("{err}").contains("unknown field"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn saves_and_loads_round_trip() {
        let path = temp_path("roundtrip");
        let cfg = Config {
            device: "/dev/ttyS1".into(),
            api_key: "secret".into(),
            zip_code: "10001".into(),
            forecast_zone: "NYZ072".into(),
            storm_basin: Some("AL".into()),
            logging_on: true,
            ..Config::default()
        };
        cfg.save_to_path(&path).unwrap();
        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(cfg, loaded);
        let _ = fs::remove_file(&path);
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir(parent);
        }
    }

    #[test]
    fn load_or_default_creates_file_with_defaults() {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let home = std::env::temp_dir().join(format!("signwx_home_{stamp}"));
        fs::create_dir_all(&home).unwrap();
        std::env::set_var("HOME", &home);
        let cfg_path = home.join(".signwx").join("config.json");

        let cfg = Config::load_or_default().unwrap();
        assert_eq!(cfg, Config::default());
        assert!(cfg_path.exists(), "expected config file to be created");

        let contents = fs::read_to_string(&cfg_path).unwrap();
        assert!(contents.contains("\"device\""));
        assert!(contents.contains("\"on_time\""));

        let _ = fs::remove_dir_all(home);
    }
}
