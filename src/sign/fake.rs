use std::collections::VecDeque;

use crate::{sign::FrameSink, Result};

/// Minimal fake sink used in tests to script write outcomes and capture
/// the frames the daemon would have sent to the sign.
#[derive(Default)]
pub struct FakeSink {
    script: VecDeque<Result<()>>,
    frames: Vec<Vec<u8>>,
    attempts: usize,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripted outcomes are consumed in order; once exhausted every write
    /// succeeds.
    pub fn with_script(script: Vec<Result<()>>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    /// Frames from successful writes only.
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl FrameSink for FakeSink {
    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.attempts += 1;
        match self.script.pop_front() {
            Some(Err(err)) => Err(err),
            _ => {
                self.frames.push(frame.to_vec());
                Ok(())
            }
        }
    }
}
