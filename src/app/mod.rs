use std::path::Path;
use std::str::FromStr;

use chrono::NaiveTime;

use crate::{
    cli::RunOptions,
    config::{self, loader, Config, OffPolicy},
    feeds::{self, forecast::Provider},
    sign::{port::PortOptions, Encoder, SignPort},
    state::SharedState,
    Result,
};

mod cycle;
mod lifecycle;
pub mod logger;
mod storm_poller;
pub mod wizard;

pub use logger::{LogLevel, Logger};

use storm_poller::StormFeedConfig;

/// Fully parsed and validated daemon configuration: the immutable snapshot
/// every cycle reads.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub device: String,
    pub baud: u32,
    pub provider: Provider,
    pub api_key: String,
    pub zip_code: String,
    pub forecast_zone: String,
    pub on_time: NaiveTime,
    pub off_time: NaiveTime,
    pub forecast_hours: Vec<u32>,
    pub alert_minute_marks: Vec<u32>,
    pub storm_hours_utc: Vec<u32>,
    pub storm_classification: String,
    pub storm_basin: Option<String>,
    pub active_poll_secs: u64,
    pub resend_debounce_secs: u64,
    pub off_policy: OffPolicy,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
}

impl AppConfig {
    /// Merge the config file with CLI overrides and reject anything the
    /// scheduler must never see: malformed times, ambiguous windows,
    /// degenerate anchor sets, missing credentials.
    pub fn from_sources(mut cfg: Config, opts: RunOptions) -> Result<Self> {
        if let Some(device) = opts.device {
            cfg.device = device;
        }
        config::validate_runtime(&cfg)?;
        let (on_time, off_time) = cfg.window()?;

        let log_level = opts
            .log_level
            .as_deref()
            .and_then(|s| LogLevel::from_str(s).ok())
            .unwrap_or_default();
        let log_file = opts.log_file.or_else(|| cfg.log_file.clone()).or_else(|| {
            if cfg.logging_on {
                loader::default_log_path()
                    .ok()
                    .map(|p| p.display().to_string())
            } else {
                None
            }
        });

        Ok(Self {
            device: cfg.device,
            baud: cfg.baud,
            provider: cfg.provider,
            api_key: cfg.api_key,
            zip_code: cfg.zip_code,
            forecast_zone: cfg.forecast_zone,
            on_time,
            off_time,
            forecast_hours: cfg.forecast_hours,
            alert_minute_marks: cfg.alert_minute_marks,
            storm_hours_utc: cfg.storm_hours_utc,
            storm_classification: cfg.storm_classification,
            storm_basin: cfg.storm_basin,
            active_poll_secs: cfg.active_poll_secs,
            resend_debounce_secs: cfg.resend_debounce_secs,
            off_policy: cfg.off_policy,
            log_level,
            log_file,
        })
    }

    pub fn port_options(&self) -> PortOptions {
        PortOptions {
            baud: self.baud,
            ..PortOptions::default()
        }
    }

    fn storm_feed(&self) -> StormFeedConfig {
        StormFeedConfig {
            hours_utc: self.storm_hours_utc.clone(),
            classification: self.storm_classification.clone(),
            basin: self.storm_basin.clone(),
        }
    }
}

pub struct App {
    config: AppConfig,
    logger: Logger,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let logger = Logger::new(config.log_level, config.log_file.clone());
        Self { config, logger }
    }

    pub fn from_options(opts: RunOptions) -> Result<Self> {
        let cfg_file = match opts.config_path.as_deref() {
            Some(path) => Config::load_from_path(Path::new(path))?,
            None => Config::load_or_default()?,
        };
        let merged = AppConfig::from_sources(cfg_file, opts)?;
        Ok(Self::new(merged))
    }

    /// Entry point for the daemon: open the sign link, prime both alert
    /// feeds with forced polls, start the storm poller, then hand control
    /// to the coordinating loop until shutdown.
    pub fn run(&self) -> Result<()> {
        let config = &self.config;
        self.logger.info(format!(
            "daemon start (device={}, provider={}, zone={}, window {}-{})",
            config.device, config.provider, config.forecast_zone, config.on_time, config.off_time
        ));

        let state = SharedState::new();
        lifecycle::install_shutdown_handler(&state)?;

        let mut sign = SignPort::connect(&config.device, config.port_options())?;
        let client = feeds::client()?;

        // Prime the storm cache before the poller thread takes over; the
        // alert feed is primed by the loop's own forced first poll.
        storm_poller::poll_storms_once(&client, &config.storm_feed(), &state, &self.logger);
        let poller = storm_poller::start_storm_poller(config.storm_feed(), state.clone(), self.logger.clone())?;

        let result = cycle::run_loop(&mut sign, config, &state, &self.logger, &client);

        state.request_shutdown();
        lifecycle::send_exit_notice(&mut sign, &Encoder::new(), &self.logger);
        if poller.join().is_err() {
            self.logger.warn("storm poller exited abnormally");
        }
        self.logger.info("daemon exiting");
        result
    }
}
