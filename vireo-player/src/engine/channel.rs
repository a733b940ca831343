//! IPC channel codec
//!
//! Duplex byte stream to the engine over a local unix socket, carrying
//! newline-delimited JSON: outbound commands, inbound events. This layer
//! only frames and parses; connection retry and lifecycle live in the
//! manager.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::Result;
use crate::protocol::{parse_line, Command, EngineMessage};

/// A connected IPC channel
pub struct IpcChannel {
    stream: UnixStream,
}

impl IpcChannel {
    /// Attempt a single connection to the engine's socket
    pub async fn connect(path: &Path) -> std::io::Result<Self> {
        let stream = UnixStream::connect(path).await?;
        Ok(Self { stream })
    }

    /// Split into independently owned read and write halves
    pub fn split(self) -> (IpcReader, IpcWriter) {
        let (read_half, write_half) = self.stream.into_split();
        (
            IpcReader {
                lines: BufReader::new(read_half).lines(),
            },
            IpcWriter { write_half },
        )
    }
}

/// Reading half: one JSON object per line
pub struct IpcReader {
    lines: Lines<BufReader<OwnedReadHalf>>,
}

impl IpcReader {
    /// Next parseable message, or None when the channel closed
    ///
    /// Unparseable lines are skipped; the engine can emit partial lines
    /// while shutting down.
    pub async fn next_message(&mut self) -> Result<Option<EngineMessage>> {
        loop {
            match self.lines.next_line().await? {
                Some(line) => {
                    if line.is_empty() {
                        continue;
                    }
                    match parse_line(&line) {
                        Some(message) => return Ok(Some(message)),
                        None => {
                            debug!("skipping unparseable engine line: {}", line);
                            continue;
                        }
                    }
                }
                None => return Ok(None),
            }
        }
    }
}

/// Writing half: serializes one command per line
pub struct IpcWriter {
    write_half: OwnedWriteHalf,
}

impl IpcWriter {
    pub async fn send(&mut self, command: &Command) -> Result<()> {
        self.write_half.write_all(command.to_line().as_bytes()).await?;
        Ok(())
    }
}
