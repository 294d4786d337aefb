//! Tokio codec for newline-delimited bridge traffic.
//!
//! The decoder yields each complete line as a `String` with the terminator
//! and any trailing `\r` removed; the encoder appends `\n` to outbound
//! [`Directive`]s or raw strings.
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use futures::{SinkExt, StreamExt};
//! use locker_core::SubjectId;
//! use locker_protocol::{Directive, LineCodec, Reply};
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//!
//! # async fn example() -> locker_core::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:7878").await?;
//! let mut framed = Framed::new(stream, LineCodec::new());
//!
//! framed.send(Directive::Borrow(SubjectId::new("12345678")?)).await?;
//!
//! if let Some(Ok(line)) = framed.next().await {
//!     println!("bridge said {}", Reply::classify(&line));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # DoS Protection
//!
//! A line longer than the configured maximum is rejected and the buffered
//! bytes are discarded up to the next terminator, so a misbehaving peer
//! cannot grow the receive buffer without bound.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::Directive;
use locker_core::constants::{LINE_TERMINATOR, MAX_LINE_LENGTH};
use locker_core::{Error, Result};

const NEWLINE: u8 = LINE_TERMINATOR as u8;

/// Line codec for the locker/bridge link.
#[derive(Debug)]
pub struct LineCodec {
    max_line_length: usize,

    /// Bytes already scanned for a terminator.
    next_index: usize,

    /// Set after an over-long line until its terminator is seen.
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with the default maximum line length.
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom maximum line length.
    ///
    /// ```
    /// use locker_protocol::LineCodec;
    ///
    /// let codec = LineCodec::with_max_line_length(64);
    /// assert_eq!(codec.max_line_length(), 64);
    /// ```
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            next_index: 0,
            discarding: false,
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    fn take_line(&mut self, src: &mut BytesMut, terminator_at: usize) -> Result<String> {
        let mut line = src.split_to(terminator_at + 1);
        self.next_index = 0;

        line.truncate(line.len() - 1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        String::from_utf8(line.to_vec()).map_err(|_| Error::InvalidMessageFormat {
            message: "line is not valid UTF-8".to_string(),
        })
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        loop {
            let terminator = src[self.next_index..]
                .iter()
                .position(|b| *b == NEWLINE)
                .map(|offset| self.next_index + offset);

            match (self.discarding, terminator) {
                (true, Some(at)) => {
                    src.advance(at + 1);
                    self.next_index = 0;
                    self.discarding = false;
                }
                (true, None) => {
                    src.clear();
                    self.next_index = 0;
                    return Ok(None);
                }
                (false, Some(at)) if at > self.max_line_length => {
                    src.advance(at + 1);
                    self.next_index = 0;
                    return Err(Error::LineTooLong {
                        max: self.max_line_length,
                    });
                }
                (false, Some(at)) => return self.take_line(src, at).map(Some),
                (false, None) if src.len() > self.max_line_length => {
                    src.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Err(Error::LineTooLong {
                        max: self.max_line_length,
                    });
                }
                (false, None) => {
                    self.next_index = src.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() || self.discarding => Ok(None),
            None => {
                let len = src.len();
                src.put_u8(NEWLINE);
                self.take_line(src, len).map(Some)
            }
        }
    }
}

impl Encoder<Directive> for LineCodec {
    type Error = Error;

    fn encode(&mut self, item: Directive, dst: &mut BytesMut) -> Result<()> {
        Encoder::<String>::encode(self, item.to_line(), dst)
    }
}

impl Encoder<String> for LineCodec {
    type Error = Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.max_line_length {
            return Err(Error::LineTooLong {
                max: self.max_line_length,
            });
        }
        if item.contains(LINE_TERMINATOR) {
            return Err(Error::InvalidMessageFormat {
                message: "outbound line contains a terminator".to_string(),
            });
        }

        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(NEWLINE);
        Ok(())
    }
}
