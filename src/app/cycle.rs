use std::{thread, time::Duration};

use chrono::{NaiveDateTime, Timelike};
use humantime::format_duration;

use super::{AppConfig, Logger};
use crate::{
    config::OffPolicy,
    feeds::{alerts, forecast as forecast_feed},
    schedule::{alerts::AlertPollSchedule, forecast::Planner, window},
    sign::{
        frame,
        retry::{send_with_retry, with_attempts, RetryPolicy},
        DisplayMessage, Encoder, FrameSink,
    },
    state::{ActiveAlertState, SharedState},
    Result,
};

/// Coordinating loop tick. Sub-minute so the refresh tolerance window and
/// shutdown flag are both observed promptly.
const TICK: Duration = Duration::from_secs(1);
const HTTP_ATTEMPTS: u32 = 3;
const HTTP_ATTEMPT_PAUSE: Duration = Duration::from_secs(1);

/// Everything a send needs besides the frame itself.
struct SendCtx<'a> {
    encoder: &'a Encoder,
    retry: &'a RetryPolicy,
    state: &'a SharedState,
    logger: &'a Logger,
}

/// Drive the daemon: evaluate the display window, poll the alert feed,
/// refresh the forecast on its anchors, and push frames with bounded
/// retry. Every per-cycle error is logged and survived; only startup
/// invariant failures propagate.
pub(super) fn run_loop<S: FrameSink + ?Sized>(
    sink: &mut S,
    config: &AppConfig,
    state: &SharedState,
    logger: &Logger,
    client: &reqwest::blocking::Client,
) -> Result<()> {
    let planner = Planner::new(&config.forecast_hours)?;
    let alert_schedule = AlertPollSchedule::new(&config.alert_minute_marks, config.active_poll_secs)?;
    let encoder = Encoder::new();
    let retry = RetryPolicy::default();
    let ctx = SendCtx {
        encoder: &encoder,
        retry: &retry,
        state,
        logger,
    };

    let mut force_alert_poll = true;
    // The first forecast goes out as soon as the window allows, without
    // waiting for an anchor hour.
    state.request_resend();

    while state.is_running() {
        let now = chrono::Local::now().naive_local();
        let active = window::is_active(now.time(), config.on_time, config.off_time);
        let previous = state.set_display_active(active);

        if !active {
            if previous == Some(true) {
                handle_window_close(sink, &ctx, config.off_policy, now);
            }
            thread::sleep(TICK);
            continue;
        }
        if previous == Some(false) {
            // Re-entering the window warrants a fresh message.
            state.request_resend();
        }

        poll_alert_feed(&alert_schedule, config, state, logger, client, now, force_alert_poll);
        force_alert_poll = false;

        let refresh_due = planner.refresh_due(now, state.last_forecast_mark());
        let resend_due = take_eligible_resend(state, config.resend_debounce_secs, now);
        if refresh_due || resend_due {
            // Recorded at fire time, success or not, so a refresh happens
            // at most once per anchor hour even across failures.
            state.mark_forecast_fired((now.date(), now.hour()));
            refresh_forecast(sink, &ctx, &planner, config, client, now);
        }

        thread::sleep(TICK);
    }
    Ok(())
}

/// Poll the fine-grained alert feed when its schedule says so. The
/// last-poll instant updates even when the fetch fails; the cached alert
/// only changes on a verified success.
fn poll_alert_feed(
    schedule: &AlertPollSchedule,
    config: &AppConfig,
    state: &SharedState,
    logger: &Logger,
    client: &reqwest::blocking::Client,
    now: NaiveDateTime,
    force: bool,
) {
    let alert_active = state.active_alert().is_some();
    if !schedule.is_due(now, state.last_alert_poll(), alert_active, force) {
        return;
    }
    state.record_alert_poll(now);
    let outcome = with_attempts(HTTP_ATTEMPTS, HTTP_ATTEMPT_PAUSE, || {
        alerts::fetch_active_alerts(client, &config.forecast_zone)
    });
    match outcome {
        Ok(list) => {
            let newest = list.into_iter().next().map(|a| ActiveAlertState {
                id: a.id,
                headline: a.headline,
            });
            match &newest {
                Some(alert) => logger.info(format!("alert active: {}", alert.headline)),
                None => logger.debug("no active alerts for zone"),
            }
            if state.update_active_alert(newest) {
                logger.info("alert status changed; forecast resend queued");
            }
        }
        Err(err) => logger.warn(format!("alert poll failed: {err}; keeping cached alert state")),
    }
}

/// Consume the resend request if the debounce window since the last send
/// has elapsed. An ineligible request stays queued for a later tick, so a
/// transition is delayed, never lost.
fn take_eligible_resend(state: &SharedState, debounce_secs: u64, now: NaiveDateTime) -> bool {
    if !state.resend_requested() {
        return false;
    }
    let eligible = match state.last_send() {
        None => true,
        Some((at, _)) => {
            debounce_secs == 0 || now - at >= chrono::Duration::seconds(debounce_secs as i64)
        }
    };
    if eligible {
        state.clear_resend_request();
    }
    eligible
}

fn handle_window_close<S: FrameSink + ?Sized>(
    sink: &mut S,
    ctx: &SendCtx<'_>,
    policy: OffPolicy,
    now: NaiveDateTime,
) {
    match policy {
        OffPolicy::Suppress => ctx
            .logger
            .info("display window closed; sends suppressed until it reopens"),
        OffPolicy::Blank => {
            if send_message(sink, ctx, &DisplayMessage::blank(), now, "blank frame") {
                ctx.logger.info("display window closed; sign blanked");
            }
        }
    }
}

fn refresh_forecast<S: FrameSink + ?Sized>(
    sink: &mut S,
    ctx: &SendCtx<'_>,
    planner: &Planner,
    config: &AppConfig,
    client: &reqwest::blocking::Client,
    now: NaiveDateTime,
) {
    let fetched = with_attempts(HTTP_ATTEMPTS, HTTP_ATTEMPT_PAUSE, || {
        config
            .provider
            .fetch(client, &config.api_key, &config.zip_code)
    });
    let buckets = match fetched {
        Ok(buckets) => buckets,
        Err(err) => {
            ctx.logger
                .warn(format!("forecast fetch failed: {err}; keeping prior display"));
            return;
        }
    };
    if buckets.is_empty() {
        ctx.logger
            .warn("forecast feed returned no usable periods this cycle");
        return;
    }

    let anchors = planner.next_anchors(now);
    let next_refresh = planner.next_refresh(now);
    let alert = ctx.state.active_alert();
    let storms = ctx.state.active_storms();
    let message =
        forecast_feed::build_message(&buckets, &anchors, next_refresh, alert.as_ref(), &storms);
    send_message(sink, ctx, &message, now, "forecast");
}

/// Encode and push one message. Identical consecutive frames are skipped;
/// a send that exhausts its retry budget is logged and deferred, leaving
/// the sign's prior content in place.
fn send_message<S: FrameSink + ?Sized>(
    sink: &mut S,
    ctx: &SendCtx<'_>,
    message: &DisplayMessage,
    now: NaiveDateTime,
    what: &str,
) -> bool {
    let bytes = ctx.encoder.encode(message);
    let crc = frame::frame_crc(&bytes);
    if ctx.state.last_send().map(|(_, prev)| prev) == Some(crc) {
        ctx.logger.debug(format!("{what} unchanged; send skipped"));
        return true;
    }
    match send_with_retry(sink, &bytes, ctx.retry) {
        Ok(attempts) => {
            ctx.state.record_send(now, crc);
            if attempts > 1 {
                ctx.logger
                    .warn(format!("{what} sent after {attempts} attempts"));
            } else {
                ctx.logger
                    .info(format!("{what} sent ({} bytes)", bytes.len()));
            }
            true
        }
        Err(err) => {
            ctx.logger.error(format!(
                "{what} send failed after {}: {err}; deferring to next cycle",
                format_duration(ctx.retry.max_elapsed)
            ));
            false
        }
    }
}
