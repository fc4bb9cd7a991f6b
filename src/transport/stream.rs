//! Live message stream handed to callers of `ProcessTransport::stream`.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::protocol::Message;

use super::TransportError;

/// Channel capacity between the reader task and the consumer.
///
/// One slot keeps the reader at most one decoded message ahead of the
/// consumer.
pub const DEFAULT_CHANNEL_BUFFER: usize = 1;

/// Item yielded by a [`MessageStream`].
pub type StreamItem = Result<Message, TransportError>;

/// Forward-only stream of messages from a running CLI process.
///
/// Messages arrive in output order. If the run fails, the error is the last
/// item. Dropping the stream interrupts the process.
#[derive(Debug)]
pub struct MessageStream {
    inner: ReceiverStream<StreamItem>,
}

impl MessageStream {
    pub(crate) fn new(rx: mpsc::Receiver<StreamItem>) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
        }
    }

    /// Receive the next item, or `None` once the run has finished.
    pub async fn next_message(&mut self) -> Option<StreamItem> {
        self.inner.next().await
    }

    /// Drain the stream into a list, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the stream.
    pub async fn collect_messages(mut self) -> Result<Vec<Message>, TransportError> {
        let mut messages = Vec::new();
        while let Some(item) = self.next_message().await {
            messages.push(item?);
        }
        Ok(messages)
    }
}

impl Stream for MessageStream {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
