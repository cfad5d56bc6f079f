//! Frame streaming for message-based transports.
//!
//! Socket transports do not write one byte stream per command; they send
//! every serialized result item as its own message. [`stream_frames`] is the
//! output phase for such transports.

use keystone_core::Result;
use tracing::debug;

use crate::command::Command;
use crate::output::Chunk;

/// One transport message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Text message
    Text(&'a str),
    /// Binary message
    Binary(&'a [u8]),
}

/// Receives frames, e.g. the remote end of a WebSocket.
pub trait FrameSink {
    /// Send one frame.
    fn send(&mut self, frame: Frame<'_>) -> std::io::Result<()>;
}

impl FrameSink for Vec<Vec<u8>> {
    fn send(&mut self, frame: Frame<'_>) -> std::io::Result<()> {
        match frame {
            Frame::Text(s) => self.push(s.as_bytes().to_vec()),
            Frame::Binary(b) => self.push(b.to_vec()),
        }
        Ok(())
    }
}

/// Forward the executed command's result to `sink`, one frame per item.
///
/// Returns the number of frames sent. Nothing is sent for lifecycle-signal
/// commands (e.g. the handler of a closing connection, whose peer is already
/// gone) or for commands without output. Serializer and transport failures
/// are returned. The command's lock is released on every path.
pub fn stream_frames(command: &mut Command, sink: &mut dyn FrameSink) -> Result<usize> {
    command.output_phase(|command| forward(command, sink))
}

fn forward(command: &mut Command, sink: &mut dyn FrameSink) -> Result<usize> {
    if command.is_lifecycle_signal() || !command.capabilities().produces_output() {
        debug!(command = %command, "no frames to send");
        return Ok(0);
    }
    let chunks = match command.serialize_result()? {
        Some(chunks) => chunks,
        None => return Ok(0),
    };
    for chunk in &chunks {
        let frame = match chunk {
            Chunk::Text(s) => Frame::Text(s),
            Chunk::Bytes(b) => Frame::Binary(b),
        };
        sink.send(frame)?;
    }
    debug!(command = %command, frames = chunks.len(), "frames sent");
    Ok(chunks.len())
}
