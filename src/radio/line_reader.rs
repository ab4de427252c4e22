//! Line-oriented radio reader
//!
//! The E220 module in transparent mode forwards each received packet verbatim
//! over its UART, one telemetry line per packet. [`LineRadio`] reads that byte
//! stream (or stdin) on a background task, splits it on `\n` and queues frames
//! for the bridge loop. The UART itself (baud rate, parity) is configured
//! outside the process, e.g. with `stty`.

use super::{RadioError, RadioFrame, RadioLink, ReceiveStatus};
use crate::config::RadioSection;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Device name that selects stdin instead of a character device
pub const STDIN_DEVICE: &str = "-";

/// Longest line kept, terminator included; an E220 packet carries at most 200 bytes
pub const MAX_LINE_BYTES: usize = 256;

/// Radio link reading newline-terminated frames from a byte stream
pub struct LineRadio {
    rx: mpsc::Receiver<RadioFrame>,
    reader_handle: JoinHandle<()>,
    closed_reported: bool,
}

impl LineRadio {
    /// Open the configured device; failure here is fatal for the bridge
    pub async fn open(config: &RadioSection) -> Result<Self, RadioError> {
        if config.device == STDIN_DEVICE {
            info!("Reading radio frames from stdin");
            return Ok(Self::from_reader(tokio::io::stdin(), config.channel_capacity));
        }

        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .open(&config.device)
            .await
            .map_err(|source| RadioError::Open {
                device: config.device.clone(),
                source,
            })?;

        info!("Radio receiver ready on {}", config.device);
        Ok(Self::from_reader(file, config.channel_capacity))
    }

    /// Start reading frames from any async byte source
    pub fn from_reader<R>(reader: R, capacity: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let reader_handle = tokio::spawn(read_frames(BufReader::new(reader), tx));

        Self {
            rx,
            reader_handle,
            closed_reported: false,
        }
    }

    /// True once the reader has stopped and every queued frame was consumed
    pub fn is_closed(&self) -> bool {
        self.closed_reported
    }
}

impl RadioLink for LineRadio {
    fn try_receive(&mut self) -> Option<RadioFrame> {
        match self.rx.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if !self.closed_reported {
                    warn!("Radio stream closed; no further telemetry will arrive");
                    self.closed_reported = true;
                }
                None
            }
        }
    }
}

impl Drop for LineRadio {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

/// Reader task: forward one frame per line until EOF or a read error
async fn read_frames<R>(mut reader: R, tx: mpsc::Sender<RadioFrame>)
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::with_capacity(MAX_LINE_BYTES);
    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut buf)
            .await;
        match read {
            Ok(0) => {
                debug!("Radio stream reached end of input");
                break;
            }
            Ok(n) => {
                let frame = if n == MAX_LINE_BYTES && !buf.ends_with(b"\n") {
                    warn!("Radio line exceeds {} bytes, discarding it", MAX_LINE_BYTES);
                    if let Err(e) = discard_rest_of_line(&mut reader).await {
                        error!("Radio read error: {}", e);
                        break;
                    }
                    RadioFrame {
                        status: ReceiveStatus::WrongFormat,
                        data: String::from_utf8_lossy(&buf).into_owned(),
                    }
                } else {
                    frame_from_bytes(&buf)
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Radio read error: {}", e);
                let _ = tx
                    .send(RadioFrame {
                        status: ReceiveStatus::Hardware,
                        data: e.to_string(),
                    })
                    .await;
                break;
            }
        }
    }
}

/// Skip input up to and including the next `\n` without buffering it
async fn discard_rest_of_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let (consumed, done) = {
            let chunk = reader.fill_buf().await?;
            if chunk.is_empty() {
                return Ok(());
            }
            match chunk.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (chunk.len(), false),
            }
        };
        reader.consume(consumed);
        if done {
            return Ok(());
        }
    }
}

/// Turn one raw line into a frame, stripping the line terminator (pure function)
pub fn frame_from_bytes(bytes: &[u8]) -> RadioFrame {
    let line = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    match std::str::from_utf8(line) {
        Ok(text) => RadioFrame::success(text),
        Err(_) => RadioFrame {
            status: ReceiveStatus::WrongFormat,
            data: String::from_utf8_lossy(line).into_owned(),
        },
    }
}
