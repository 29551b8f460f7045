// src/progress.rs

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::ApiError;
use crate::models::ProgressEvent;

/// Incremental decoder for a `text/event-stream` body.
///
/// Feed it raw chunks as they arrive; it returns the `data:` payload of every
/// event completed so far. Chunks may split lines (and multi-byte characters)
/// anywhere, so the buffer holds bytes and lines are only decoded once their
/// terminator has been seen. Comment lines and fields other than `data` are
/// ignored.
#[derive(Debug, Default)]
pub struct SseParser {
    buf: Vec<u8>,
    data: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes a chunk and returns the payloads of all completed events.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let mut line = String::from_utf8_lossy(&line).into_owned();
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }

            if line.is_empty() {
                // Blank line terminates the event.
                if !self.data.is_empty() {
                    let mut payload = std::mem::take(&mut self.data);
                    payload.pop(); // trailing separator
                    out.push(payload);
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push_str(value.strip_prefix(' ').unwrap_or(value));
                self.data.push('\n');
            }
            // `event:`, `id:`, `retry:` and `:` comments carry nothing we use.
        }

        out
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ApiError>> + Send>>;

/// A long-lived progress subscription: the SSE body of
/// `GET /api/progress/{id}`, decoded into typed [`ProgressEvent`]s.
///
/// The subscription must be released on every terminal transition. Calling
/// [`close`](Self::close) (or cancelling the token from
/// [`cancel_handle`](Self::cancel_handle)) ends the stream; the next poll
/// returns `None` and the connection is dropped with the stream itself.
pub struct ProgressStream {
    inner: Option<ByteStream>,
    parser: SseParser,
    pending: VecDeque<ProgressEvent>,
    token: CancellationToken,
}

impl ProgressStream {
    pub(crate) fn new(inner: ByteStream) -> Self {
        Self {
            inner: Some(inner),
            parser: SseParser::new(),
            pending: VecDeque::new(),
            token: CancellationToken::new(),
        }
    }

    /// Token that closes this subscription when cancelled, from anywhere.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Closes the subscription. Idempotent.
    pub fn close(&mut self) {
        self.token.cancel();
        if self.inner.take().is_some() {
            debug!("progress stream closed");
        }
    }

    fn decode(&mut self, chunk: &[u8]) -> Result<(), ApiError> {
        for payload in self.parser.push(chunk) {
            let event: ProgressEvent = serde_json::from_str(&payload)?;
            self.pending.push_back(event);
        }
        Ok(())
    }
}

impl Stream for ProgressStream {
    type Item = Result<ProgressEvent, ApiError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.token.is_cancelled() {
                this.inner = None;
                return Poll::Ready(None);
            }
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };
            match inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    if let Err(e) = this.decode(&chunk) {
                        return Poll::Ready(Some(Err(e)));
                    }
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    this.inner = None;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        self.close();
    }
}
