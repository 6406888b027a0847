use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::constants::{MSG_NFC_UNSUPPORTED, NFC_TEXT_LANG};

/// NFC failures, worded for the status line.
#[derive(Debug, Error, PartialEq)]
pub enum NfcError {
    #[error("{}", MSG_NFC_UNSUPPORTED)]
    Unsupported,
    #[error("NFC scan aborted.")]
    Aborted,
    #[error("NFC scan timed out after {seconds}s.")]
    Timeout { seconds: u64 },
    #[error("{0}")]
    Hardware(String),
}

/// One NDEF record as the reader reports it. Only text records carry
/// content the station cares about; everything else is opaque.
#[derive(Debug, Clone, PartialEq)]
pub enum NdefRecord {
    Text {
        data: Vec<u8>,
        /// Encoding hint from the record header, when present.
        encoding: Option<String>,
        lang: String,
    },
    Other {
        record_type: String,
    },
}

impl NdefRecord {
    /// A UTF-8 text record the way the station writes them.
    pub fn text(content: &str) -> Self {
        NdefRecord::Text {
            data: content.as_bytes().to_vec(),
            encoding: Some("utf-8".to_string()),
            lang: NFC_TEXT_LANG.to_string(),
        }
    }
}

/// A tag presented to the reader: its serial number and NDEF message.
#[derive(Debug, Clone, PartialEq)]
pub struct TagEvent {
    pub serial_number: String,
    pub records: Vec<NdefRecord>,
}

/// What a completed scan hands to the controller. `text` is `None` when
/// the tag carried no text record at all; blank text stays `Some("")`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub text: Option<String>,
    pub serial_number: String,
}

pub type PortFuture<T> = Pin<Box<dyn Future<Output = Result<T, NfcError>> + Send>>;

/// Seam to the physical reader. The real driver lives outside this crate;
/// anything that can wait for a tag and replace its message qualifies.
pub trait ReaderPort: Send + Sync {
    /// Resolve with the next tag presented to the reader.
    fn await_tag(&self) -> PortFuture<TagEvent>;
    /// Replace the tag's NDEF message.
    fn write(&self, records: Vec<NdefRecord>) -> PortFuture<()>;
}

struct ScanSession {
    id: Uuid,
    token: CancellationToken,
}

/// Station-side NFC access with single-flight scanning.
///
/// At most one scan session exists at a time: starting a new one cancels
/// whatever was still waiting. Every exit path, including timeout and
/// cancellation, clears the session slot.
pub struct NfcBridge {
    port: Option<Box<dyn ReaderPort>>,
    session: Mutex<Option<ScanSession>>,
    read_timeout: Duration,
}

impl NfcBridge {
    pub fn new(port: Option<Box<dyn ReaderPort>>, read_timeout: Duration) -> Self {
        Self {
            port,
            session: Mutex::new(None),
            read_timeout,
        }
    }

    pub fn available(&self) -> bool {
        self.port.is_some()
    }

    /// Wait for one tag and extract its first text record.
    pub async fn read_once(&self) -> Result<ScanOutcome, NfcError> {
        let port = self.port.as_ref().ok_or(NfcError::Unsupported)?;

        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        {
            let mut slot = self.session.lock().await;
            if let Some(prev) = slot.take() {
                info!("🔄 NFC scan {} superseded by {}", prev.id, id);
                prev.token.cancel();
            }
            *slot = Some(ScanSession {
                id,
                token: token.clone(),
            });
        }

        info!("🔍 NFC scan {} waiting for a tag", id);
        let result = tokio::select! {
            _ = token.cancelled() => Err(NfcError::Aborted),
            _ = tokio::time::sleep(self.read_timeout) => Err(NfcError::Timeout {
                seconds: self.read_timeout.as_secs(),
            }),
            event = port.await_tag() => event.map(|event| ScanOutcome {
                text: extract_first_text(&event.records),
                serial_number: event.serial_number,
            }),
        };

        {
            // A newer scan may own the slot already; only clear our own.
            let mut slot = self.session.lock().await;
            if slot.as_ref().is_some_and(|s| s.id == id) {
                *slot = None;
            }
        }

        match &result {
            Ok(outcome) => info!(
                "✅ NFC scan {} read a tag (serial '{}')",
                id, outcome.serial_number
            ),
            Err(err) => warn!("⚠️  NFC scan {} ended: {}", id, err),
        }
        result
    }

    /// Write `text` as the tag's single text record. An empty string is
    /// the erase operation: it blanks the visible content without
    /// stripping the record structure.
    pub async fn write_text(&self, text: &str) -> Result<(), NfcError> {
        let port = self.port.as_ref().ok_or(NfcError::Unsupported)?;
        info!("🔄 NFC write of {} bytes", text.len());
        port.write(vec![NdefRecord::text(text)]).await
    }
}

/// First text record of the message, decoded and trimmed. `None` when the
/// message has no text record.
fn extract_first_text(records: &[NdefRecord]) -> Option<String> {
    records.iter().find_map(|rec| match rec {
        NdefRecord::Text { data, encoding, .. } => {
            Some(decode_text(data, encoding.as_deref()).trim().to_string())
        }
        NdefRecord::Other { .. } => None,
    })
}

/// Decode text-record bytes per the record's encoding hint. Unknown hints
/// and invalid sequences degrade to lossy UTF-8 rather than failing the
/// whole read.
fn decode_text(data: &[u8], encoding: Option<&str>) -> String {
    let label = encoding.unwrap_or("utf-8").trim().to_ascii_lowercase();
    match label.as_str() {
        "utf-16" | "utf-16le" => decode_utf16(data, false),
        "utf-16be" => decode_utf16(data, true),
        _ => {
            let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
            String::from_utf8_lossy(data).into_owned()
        }
    }
}

fn decode_utf16(bytes: &[u8], default_big_endian: bool) -> String {
    // A byte-order mark wins over the label's default endianness.
    let (payload, big_endian) = match bytes {
        [0xFE, 0xFF, rest @ ..] => (rest, true),
        [0xFF, 0xFE, rest @ ..] => (rest, false),
        _ => (bytes, default_big_endian),
    };
    let units: Vec<u16> = payload
        .chunks(2)
        .map(|pair| {
            let b0 = pair.first().copied().unwrap_or(0);
            let b1 = pair.get(1).copied().unwrap_or(0);
            if big_endian {
                u16::from_be_bytes([b0, b1])
            } else {
                u16::from_le_bytes([b0, b1])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}
