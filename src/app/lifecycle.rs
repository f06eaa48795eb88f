use chrono::Local;

use super::Logger;
use crate::{
    sign::{DisplayMessage, Encoder, FrameSink},
    state::SharedState,
    Error, Result,
};

/// Install a ctrl-c handler that flips the shared running flag instead of
/// exiting immediately; in-flight bounded retries get to finish.
pub(super) fn install_shutdown_handler(state: &SharedState) -> Result<()> {
    let handle = state.clone();
    ctrlc::set_handler(move || handle.request_shutdown())
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}

/// Leave a dated notice on the sign so an operator can tell the daemon is
/// no longer feeding it. One attempt only; a dead link at shutdown is not
/// worth blocking exit for.
pub(super) fn send_exit_notice<S: FrameSink + ?Sized>(
    sink: &mut S,
    encoder: &Encoder,
    logger: &Logger,
) {
    let stamp = Local::now().format("%m/%d/%y %I:%M %p").to_string();
    let notice = format!("Check program || {}", stamp.trim_start_matches('0'));
    match sink.write_frame(&encoder.encode(&DisplayMessage::notice(notice))) {
        Ok(()) => logger.info("exit notice sent"),
        Err(err) => logger.warn(format!("exit notice not sent: {err}")),
    }
}
