//! Line framing for the streamed build response
//!
//! The build endpoint keeps one connection open and writes newline-delimited text as
//! the build progresses. [`EventLines`] turns the raw byte chunks into text lines
//! without buffering the whole body. `\n`, `\r\n` and a bare `\r` all end a line.
//! It is single-pass: once the body is consumed or the transport fails, the stream
//! is finished for good.

use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

/// Stream of text lines over a stream of byte chunks
pub struct EventLines<S> {
    inner: S,
    buffer: BytesMut,
    done: bool,
}

impl<S> EventLines<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            done: false,
        }
    }

    /// Split the next complete line off the buffer, without its terminator
    fn next_line(&mut self) -> Option<Result<String>> {
        let pos = self
            .buffer
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r')?;

        let terminator_len = if self.buffer[pos] == b'\r' {
            match self.buffer.get(pos + 1) {
                Some(b'\n') => 2,
                Some(_) => 1,
                // A `\n` may still follow in the next chunk
                None if !self.done => return None,
                None => 1,
            }
        } else {
            1
        };

        let mut line = self.buffer.split_to(pos + terminator_len);
        line.truncate(pos);
        Some(decode(line))
    }
}

fn decode(line: BytesMut) -> Result<String> {
    String::from_utf8(line.to_vec())
        .map_err(|e| Error::Parse(format!("Build stream line is not UTF-8: {}", e)))
}

impl<S, E> Stream for EventLines<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Display,
{
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(line) = this.next_line() {
                return Poll::Ready(Some(line));
            }

            if this.done {
                if this.buffer.is_empty() {
                    return Poll::Ready(None);
                }
                // Last line without a trailing newline
                let rest = this.buffer.split();
                return Poll::Ready(Some(decode(rest)));
            }

            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(chunk)) => this.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    this.done = true;
                    this.buffer.clear();
                    return Poll::Ready(Some(Err(Error::Transport(format!(
                        "Build stream interrupted: {}",
                        e
                    )))));
                }
                None => this.done = true,
            }
        }
    }
}
