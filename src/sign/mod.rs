pub mod fake;
pub mod frame;
pub mod port;
pub mod retry;

pub use frame::{DisplayMessage, Encoder};
pub use port::SignPort;

use crate::Result;

/// Byte sink for encoded sign frames. The serial port implements this; a
/// scriptable fake stands in for it in tests. Reconnection is the sink's
/// own concern and surfaces here only as success or failure.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &[u8]) -> Result<()>;
}
