use crc32fast::Hasher;

use crate::{Error, Result};

/// Capacity of the sign's TEXT file buffer; encoded payloads never exceed it.
pub const MAX_PAYLOAD_BYTES: usize = 1024;

const NUL: u8 = 0x00;
const SOH: u8 = 0x01;
const STX: u8 = 0x02;
const EOT: u8 = 0x04;
const ESC: u8 = 0x1B;
const FS: u8 = 0x1C;

/// Null bytes sent ahead of the header so the sign can lock onto the baud rate.
const PREAMBLE_LEN: usize = 10;
/// Sign type code plus the fixed two-character device address (broadcast).
const SIGN_ADDRESS: &[u8] = b"Z00";
/// Write-TEXT command code plus the fixed memory file label.
const WRITE_TEXT: &[u8] = b"AA";
/// Display position byte following ESC; with the mode byte it selects write mode.
const DISPLAY_POSITION: u8 = 0x20;
/// Rotate mode.
pub const DEFAULT_MODE: u8 = b'a';

pub const TODAY_PALETTE: &[u8] = b"3";
pub const FUTURE_PALETTE: &[u8] = b"145678";
pub const ALERT_COLOR: u8 = b'2';

const BLOCK_GAP: &str = "  ";
const SUFFIX_SEPARATOR: &str = " || ";
const ELLIPSIS: &str = "...";

/// Text destined for the sign: today's forecast blocks, future-day blocks,
/// an optional plain trailing suffix ("next update" text) and an optional
/// alert headline rendered in the alert color.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayMessage {
    pub today: Vec<String>,
    pub future: Vec<String>,
    pub suffix: Option<String>,
    pub alert: Option<String>,
}

impl DisplayMessage {
    /// An empty frame, used to clear the sign outside the display window.
    pub fn blank() -> Self {
        Self::default()
    }

    /// A single plain notice block, e.g. the shutdown message.
    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            today: vec![text.into()],
            ..Self::default()
        }
    }
}

/// Serializes display messages into the sign's fixed binary frame. The
/// framing is dictated by the hardware protocol and reproduced byte for
/// byte; only the palettes and payload budget are parameters.
#[derive(Debug, Clone)]
pub struct Encoder {
    today_palette: Vec<u8>,
    future_palette: Vec<u8>,
    alert_color: u8,
    max_payload: usize,
}

impl Encoder {
    pub fn new() -> Self {
        Self::with_palettes(TODAY_PALETTE, FUTURE_PALETTE, MAX_PAYLOAD_BYTES)
            .expect("builtin palettes are non-empty")
    }

    pub fn with_palettes(today: &[u8], future: &[u8], max_payload: usize) -> Result<Self> {
        if today.is_empty() || future.is_empty() {
            return Err(Error::Config("color palettes must not be empty".into()));
        }
        if max_payload <= ELLIPSIS.len() {
            return Err(Error::Config("payload budget too small".into()));
        }
        Ok(Self {
            today_palette: today.to_vec(),
            future_palette: future.to_vec(),
            alert_color: ALERT_COLOR,
            max_payload,
        })
    }

    pub fn encode(&self, msg: &DisplayMessage) -> Vec<u8> {
        self.encode_with_mode(msg, DEFAULT_MODE)
    }

    pub fn encode_with_mode(&self, msg: &DisplayMessage, mode: u8) -> Vec<u8> {
        let payload = self.payload(msg);
        let mut frame = Vec::with_capacity(payload.len() + PREAMBLE_LEN + 10);
        frame.extend(std::iter::repeat(NUL).take(PREAMBLE_LEN));
        frame.push(SOH);
        frame.extend_from_slice(SIGN_ADDRESS);
        frame.push(STX);
        frame.extend_from_slice(WRITE_TEXT);
        frame.push(ESC);
        frame.push(DISPLAY_POSITION);
        frame.push(mode);
        frame.extend_from_slice(&payload);
        frame.push(EOT);
        frame
    }

    /// Build the payload within the buffer budget. Today's blocks are kept
    /// first; future blocks are dropped whole from the end; whatever still
    /// exceeds the budget is hard-cut with an ellipsis marker.
    fn payload(&self, msg: &DisplayMessage) -> Vec<u8> {
        let mut head = Vec::new();
        for (i, text) in msg.today.iter().enumerate() {
            push_block(&mut head, self.today_palette[i % self.today_palette.len()], text);
        }

        let future_blocks: Vec<Vec<u8>> = msg
            .future
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let mut block = Vec::new();
                push_block(
                    &mut block,
                    self.future_palette[i % self.future_palette.len()],
                    text,
                );
                block
            })
            .collect();

        let mut tail = Vec::new();
        if let Some(suffix) = &msg.suffix {
            push_ascii(&mut tail, SUFFIX_SEPARATOR);
            push_ascii(&mut tail, suffix);
        }
        if let Some(alert) = &msg.alert {
            tail.push(FS);
            tail.push(self.alert_color);
            push_ascii(&mut tail, alert);
        }

        let mut kept = future_blocks.len();
        loop {
            let total = head.len()
                + future_blocks[..kept].iter().map(Vec::len).sum::<usize>()
                + tail.len();
            if total <= self.max_payload || kept == 0 {
                break;
            }
            kept -= 1;
        }

        let mut payload = head;
        for block in &future_blocks[..kept] {
            payload.extend_from_slice(block);
        }
        payload.extend_from_slice(&tail);

        if payload.len() > self.max_payload {
            payload.truncate(self.max_payload - ELLIPSIS.len());
            // Never leave a dangling field separator ahead of the marker.
            if payload.last() == Some(&FS) {
                payload.pop();
            }
            payload.extend_from_slice(ELLIPSIS.as_bytes());
        }
        payload
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

fn push_block(out: &mut Vec<u8>, color: u8, text: &str) {
    out.push(FS);
    out.push(color);
    push_ascii(out, text);
    push_ascii(out, BLOCK_GAP);
}

/// 7-bit payload: non-ASCII characters are dropped rather than erroring, and
/// control characters are dropped so text can never corrupt the framing.
fn push_ascii(out: &mut Vec<u8>, text: &str) {
    out.extend(
        text.chars()
            .filter(|c| c.is_ascii() && !c.is_ascii_control())
            .map(|c| c as u8),
    );
}

/// A frame parsed back into its parts. Used to verify the encoder and by
/// the transport tests; the daemon itself only ever encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub mode: u8,
    /// Text preceding the first color change; empty for well-formed frames.
    pub leading: String,
    /// (color, text) segments in payload order, block gaps stripped.
    pub blocks: Vec<(u8, String)>,
}

pub fn decode(frame: &[u8]) -> Result<DecodedFrame> {
    let body = frame
        .strip_prefix(&[NUL; PREAMBLE_LEN][..])
        .ok_or_else(|| Error::Parse("missing sync preamble".into()))?;
    let body = expect_bytes(body, &[SOH])?;
    let body = expect_bytes(body, SIGN_ADDRESS)?;
    let body = expect_bytes(body, &[STX])?;
    let body = expect_bytes(body, WRITE_TEXT)?;
    let body = expect_bytes(body, &[ESC, DISPLAY_POSITION])?;
    let (&mode, body) = body
        .split_first()
        .ok_or_else(|| Error::Parse("frame truncated before mode byte".into()))?;
    let payload = body
        .strip_suffix(&[EOT])
        .ok_or_else(|| Error::Parse("missing end-of-transmission marker".into()))?;

    let mut segments = payload.split(|&b| b == FS);
    let leading = ascii_string(segments.next().unwrap_or_default());
    let mut blocks = Vec::new();
    for segment in segments {
        let (&color, text) = segment
            .split_first()
            .ok_or_else(|| Error::Parse("empty color segment".into()))?;
        let text = ascii_string(text);
        let text = text.strip_suffix(BLOCK_GAP).unwrap_or(&text).to_string();
        blocks.push((color, text));
    }
    Ok(DecodedFrame {
        mode,
        leading,
        blocks,
    })
}

fn expect_bytes<'a>(input: &'a [u8], expected: &[u8]) -> Result<&'a [u8]> {
    input
        .strip_prefix(expected)
        .ok_or_else(|| Error::Parse(format!("expected frame bytes {expected:02x?}")))
}

fn ascii_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Checksum used to suppress resending a frame identical to the last one.
pub fn frame_crc(frame: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(frame);
    hasher.finalize()
}
