//! Single-producer, multi-consumer delivery of one acquisition
//!
//! A [`Delivery`] collects subscribers while the acquisition is in flight.
//! The producer side ([`Publisher`]) detaches the delivery from the
//! pending table right before the first event goes out, then fans every
//! chunk and the terminal outcome out to each subscriber in order.
//! Each subscriber gets its own unbounded channel: consumers read at their
//! own pace and a stream that is held but not yet read never stalls the
//! others.

use crate::error::{HoardError, HoardResult};
use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone)]
enum Event {
    Chunk(Bytes),
    Done,
    Failed(HoardError),
}

/// Subscriber list for one in-flight acquisition
#[derive(Debug, Default)]
pub struct Delivery {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Event>>>,
}

impl Delivery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a new consumer.
    ///
    /// Callers must hold the pending-table lock so that subscription can
    /// not interleave with the producer detaching this delivery.
    pub fn subscribe(&self) -> ReadStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        ReadStream::new(rx)
    }

    /// Number of attached consumers
    pub fn subscribers(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<Event>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

type Detach = Box<dyn FnOnce() + Send>;

/// Producer handle for a [`Delivery`]
pub struct Publisher {
    delivery: Arc<Delivery>,
    detach: Option<Detach>,
    live: Vec<mpsc::UnboundedSender<Event>>,
}

impl Publisher {
    /// `detach` runs exactly once, before the first event is published
    pub fn new(delivery: Arc<Delivery>, detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            delivery,
            detach: Some(Box::new(detach)),
            live: Vec::new(),
        }
    }

    /// Whether any consumer is still listening
    pub fn has_consumers(&self) -> bool {
        if self.detach.is_some() {
            self.delivery.subscribers() > 0
        } else {
            !self.live.is_empty()
        }
    }

    /// Publish the next chunk to every consumer
    pub fn send(&mut self, chunk: Bytes) {
        self.publish(Event::Chunk(chunk));
    }

    /// Signal successful completion
    pub fn finish(mut self) {
        self.publish(Event::Done);
    }

    /// Signal the terminal error to every consumer
    pub fn fail(mut self, err: HoardError) {
        debug!("Delivering failure to consumers: {}", err);
        self.publish(Event::Failed(err));
    }

    fn publish(&mut self, event: Event) {
        if let Some(detach) = self.detach.take() {
            detach();
            self.live = mem::take(&mut *self.delivery.lock());
        }

        // A send error means the consumer dropped its stream.
        self.live.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        // Never published: unhook from the table so waiters see the end.
        if let Some(detach) = self.detach.take() {
            detach();
            self.delivery.lock().clear();
        }
    }
}

/// Consumer end of a delivery: the bytes of one digest, or one error
#[derive(Debug)]
pub struct ReadStream {
    rx: mpsc::UnboundedReceiver<Event>,
    finished: bool,
}

impl ReadStream {
    fn new(rx: mpsc::UnboundedReceiver<Event>) -> Self {
        Self {
            rx,
            finished: false,
        }
    }

    /// A stream that yields `err` and ends
    pub fn failed(err: HoardError) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Event::Failed(err));
        Self::new(rx)
    }

    /// Next chunk, `Ok(None)` at the end of the content
    pub async fn next_chunk(&mut self) -> HoardResult<Option<Bytes>> {
        if self.finished {
            return Ok(None);
        }
        let event = self.rx.recv().await;
        self.settle(event)
    }

    /// Collect the whole payload in memory
    pub async fn read_to_end(mut self) -> HoardResult<Vec<u8>> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.to_vec())
    }

    /// Copy the payload into `writer`, returning the number of bytes written
    pub async fn copy_to<W>(mut self, writer: &mut W) -> HoardResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        while let Some(chunk) = self.next_chunk().await? {
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| HoardError::io("writing output", e))?;
            written += chunk.len() as u64;
        }
        writer
            .flush()
            .await
            .map_err(|e| HoardError::io("flushing output", e))?;
        Ok(written)
    }

    fn settle(&mut self, event: Option<Event>) -> HoardResult<Option<Bytes>> {
        match event {
            Some(Event::Chunk(chunk)) => Ok(Some(chunk)),
            Some(Event::Done) => {
                self.finished = true;
                Ok(None)
            }
            Some(Event::Failed(err)) => {
                self.finished = true;
                Err(err)
            }
            None => {
                self.finished = true;
                Err(HoardError::Internal(
                    "acquisition ended without completing delivery".to_string(),
                ))
            }
        }
    }
}

impl Stream for ReadStream {
    type Item = HoardResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(event) => Poll::Ready(self.settle(event).transpose()),
        }
    }
}
