// ABOUTME: Buffered frame I/O over TCP for SMPP sessions, split into reader and writer halves
// ABOUTME: The listener reads PDUs on one task while deliveries are written from another

use crate::frame::{self, Frame};
use bytes::{Buf, BytesMut};
use std::io::{self, Cursor};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// Split a freshly accepted (or dialed) socket into the frame-level reader
/// and writer halves.
///
/// The halves are separate because a bound session is full duplex: the
/// per-connection task blocks on `read_frame` while the router delivers
/// `deliver_sm` PDUs through the writer from another task.
pub fn split(socket: TcpStream) -> (FrameReader, FrameWriter) {
    let (read_half, write_half) = socket.into_split();
    (FrameReader::new(read_half), FrameWriter::new(write_half))
}

/// Reads SMPP frames from the owned read half of a TCP stream.
///
/// Incoming bytes accumulate in a `BytesMut` buffer; a frame is surfaced
/// once `Frame::check` confirms a whole PDU has arrived. Data left over
/// after a parse stays buffered for the next call.
#[derive(Debug)]
pub struct FrameReader {
    io: OwnedReadHalf,
    buffer: BytesMut,
}

impl FrameReader {
    pub fn new(io: OwnedReadHalf) -> FrameReader {
        FrameReader {
            io,
            // 4KB covers every PDU the gateway exchanges; BytesMut grows on
            // demand for clients that batch submissions.
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read a single frame from the underlying stream.
    ///
    /// Waits until enough data has arrived to parse a frame. Returns
    /// `Ok(None)` when the peer closes the stream on a frame boundary;
    /// a close mid-frame is an error.
    pub async fn read_frame(&mut self) -> crate::Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            if 0 == self.io.read_buf(&mut self.buffer).await? {
                return self
                    .buffer
                    .is_empty()
                    .then_some(None)
                    .ok_or_else(|| "connection reset by peer".into());
            }
        }
    }

    /// Attempt to parse a frame out of the buffered data, consuming it on
    /// success. `Ok(None)` means more bytes are needed.
    fn parse_frame(&mut self) -> crate::Result<Option<Frame>> {
        use frame::Error::Incomplete;

        let mut buf = Cursor::new(&self.buffer[..]);

        match Frame::check(&mut buf) {
            Ok(len) => {
                buf.set_position(0);

                // A malformed body terminates this connection but must not
                // impact any other connected client.
                let frame = Frame::parse(&mut buf)?;

                self.buffer.advance(len);
                Ok(Some(frame))
            }
            Err(Incomplete) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Writes SMPP frames to the owned write half of a TCP stream.
#[derive(Debug)]
pub struct FrameWriter {
    io: BufWriter<OwnedWriteHalf>,
}

impl FrameWriter {
    pub fn new(io: OwnedWriteHalf) -> FrameWriter {
        FrameWriter {
            io: BufWriter::new(io),
        }
    }

    /// Write a single frame and flush it to the socket.
    pub async fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let bytes = frame.to_bytes();
        self.io.write_all(&bytes).await?;
        self.io.flush().await
    }
}
