use std::time::Duration;

use signwx::sign::{
    fake::FakeSink,
    frame,
    retry::{send_with_retry, RetryPolicy},
    DisplayMessage, Encoder, FrameSink,
};
use signwx::Error;

fn io_down() -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "down"))
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        backoff: Duration::from_millis(1),
        max_elapsed: Duration::from_millis(25),
    }
}

#[test]
fn send_path_recovers_from_transient_transport_failures() {
    let encoder = Encoder::new();
    let frame_bytes = encoder.encode(&DisplayMessage::notice("HELLO SIGN"));

    let mut sink = FakeSink::with_script(vec![Err(io_down()), Err(io_down())]);
    let attempts = send_with_retry(&mut sink, &frame_bytes, &fast_policy()).unwrap();
    assert_eq!(attempts, 3);

    // The frame that finally made it through is intact.
    let decoded = frame::decode(&sink.frames()[0]).unwrap();
    assert_eq!(decoded.blocks[0].1, "HELLO SIGN");
}

#[test]
fn send_path_gives_up_within_its_budget() {
    let encoder = Encoder::new();
    let frame_bytes = encoder.encode(&DisplayMessage::notice("NEVER SHOWN"));

    let script = (0..256).map(|_| Err(io_down())).collect();
    let mut sink = FakeSink::with_script(script);
    let err = send_with_retry(&mut sink, &frame_bytes, &fast_policy()).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(sink.frames().is_empty(), "nothing should reach the sign");
}

#[test]
fn every_written_frame_is_well_formed() {
    let encoder = Encoder::new();
    let mut sink = FakeSink::new();
    for text in ["first", "second", "third"] {
        sink.write_frame(&encoder.encode(&DisplayMessage::notice(text)))
            .unwrap();
    }
    for written in sink.frames() {
        frame::decode(written).unwrap();
    }
}
