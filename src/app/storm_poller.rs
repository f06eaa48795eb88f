use std::{thread, time::Duration};

use chrono::Utc;

use super::Logger;
use crate::{
    feeds::storms,
    schedule::alerts::StormPollSchedule,
    state::SharedState,
    Result,
};

/// How long the poller idles between schedule checks.
const POLL_IDLE: Duration = Duration::from_secs(15);
/// Idle waits are sliced so shutdown is noticed promptly.
const WAIT_SLICE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub(super) struct StormFeedConfig {
    pub hours_utc: Vec<u32>,
    pub classification: String,
    pub basin: Option<String>,
}

/// Spawn the background poller for the coarse storm feed. It talks to the
/// rest of the daemon only through [`SharedState`]; the coordinating loop
/// owns the serial line.
pub(super) fn start_storm_poller(
    cfg: StormFeedConfig,
    state: SharedState,
    logger: Logger,
) -> Result<thread::JoinHandle<()>> {
    let schedule = StormPollSchedule::new(&cfg.hours_utc)?;
    let client = crate::feeds::client()?;
    let handle = thread::Builder::new()
        .name("signwx-storm-poller".into())
        .spawn(move || {
            while state.is_running() {
                if schedule.is_due(Utc::now(), state.last_storm_poll(), false) {
                    poll_storms_once(&client, &cfg, &state, &logger);
                }
                sliced_wait(&state, POLL_IDLE);
            }
            logger.debug("storm poller stopped");
        })?;
    Ok(handle)
}

/// One storm poll: the attempt timestamp is recorded unconditionally, the
/// cached storm set only on success.
pub(super) fn poll_storms_once(
    client: &reqwest::blocking::Client,
    cfg: &StormFeedConfig,
    state: &SharedState,
    logger: &Logger,
) {
    state.record_storm_poll(Utc::now());
    match storms::fetch_active_storms(client) {
        Ok(all) => {
            let names = storms::matching_names(&all, &cfg.classification, cfg.basin.as_deref());
            if names.is_empty() {
                logger.debug("no active storms match the configured filter");
            } else {
                let listed: Vec<&str> = names.iter().map(String::as_str).collect();
                logger.info(format!("active storms: {}", listed.join(", ")));
            }
            if state.update_active_storms(names) {
                logger.info("storm activity changed; forecast resend queued");
            }
        }
        Err(err) => logger.warn(format!("storm poll failed: {err}")),
    }
}

fn sliced_wait(state: &SharedState, total: Duration) {
    let mut waited = Duration::ZERO;
    while waited < total && state.is_running() {
        thread::sleep(WAIT_SLICE);
        waited += WAIT_SLICE;
    }
}
