//! Radio link collaborator
//!
//! The radio module delivers already-demodulated text lines. The bridge only
//! needs a non-blocking poll that yields at most one frame per call; any status
//! other than [`ReceiveStatus::Success`] counts as "no data this tick".

pub mod line_reader;

pub use line_reader::{frame_from_bytes, LineRadio, MAX_LINE_BYTES, STDIN_DEVICE};

use std::fmt;
use thiserror::Error;

/// Outcome reported by the radio driver for one received message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveStatus {
    Success,
    /// Payload was not valid text
    WrongFormat,
    /// The module did not deliver a complete message in time
    Timeout,
    /// The device reported a read error
    Hardware,
}

impl fmt::Display for ReceiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReceiveStatus::Success => "success",
            ReceiveStatus::WrongFormat => "wrong format",
            ReceiveStatus::Timeout => "timeout",
            ReceiveStatus::Hardware => "hardware error",
        };
        f.write_str(label)
    }
}

/// One message handed over by the radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioFrame {
    pub status: ReceiveStatus,
    pub data: String,
}

impl RadioFrame {
    pub fn success(data: impl Into<String>) -> Self {
        Self {
            status: ReceiveStatus::Success,
            data: data.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReceiveStatus::Success
    }
}

/// Radio initialisation errors; fatal at startup
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("Failed to open radio device {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: std::io::Error,
    },
}

/// Non-blocking source of radio frames
pub trait RadioLink: Send {
    /// Return the next received frame, or `None` when nothing has arrived
    fn try_receive(&mut self) -> Option<RadioFrame>;
}

impl<T: RadioLink + ?Sized> RadioLink for Box<T> {
    fn try_receive(&mut self) -> Option<RadioFrame> {
        (**self).try_receive()
    }
}
