//! Unidirectional single-sender/single-receiver channels
//!
//! A channel is created as a pair of endpoints. [`SendEnd`] and [`RecvEnd`] are
//! deliberately not `Clone`: each endpoint lives in exactly one place, and
//! moving it into a worker is how ownership is handed over. Dropping an endpoint
//! closes it, so a worker that returns early, fails, or panics still releases
//! its side of the channel and the peer observes the close instead of blocking.
//!
//! End of stream is signalled two ways:
//! - explicitly, by the sender's single [`Message::Sentinel`], and
//! - implicitly, by [`ChannelError::EndOfStream`] once the sender is closed and
//!   the buffer is drained.
//!
//! ```rust
//! use pipework::channel::{channel, Message};
//!
//! let (mut tx, mut rx) = channel::<u32>();
//! tx.send(7).unwrap();
//! tx.finish().unwrap(); // sentinel + close
//!
//! assert_eq!(rx.recv().unwrap(), Message::Value(7));
//! assert_eq!(rx.recv().unwrap(), Message::Sentinel);
//! assert!(rx.recv().unwrap_err().is_end_of_stream());
//! ```

mod error;

pub use error::ChannelError;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::time::Duration;

/// A message on a channel: either a payload or the end-of-stream sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<T> {
    Value(T),
    Sentinel,
}

impl<T> Message<T> {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Message::Sentinel)
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Message::Value(value) => Some(value),
            Message::Sentinel => None,
        }
    }
}

/// Create a new FIFO channel and return its two endpoints.
pub fn channel<T>() -> (SendEnd<T>, RecvEnd<T>) {
    let (tx, rx) = unbounded();
    (
        SendEnd {
            tx: Some(tx),
            sent: 0,
            sentinel_sent: false,
        },
        RecvEnd {
            rx: Some(rx),
            received: 0,
        },
    )
}

/// The send-capable endpoint of a channel.
#[derive(Debug)]
pub struct SendEnd<T> {
    tx: Option<Sender<Message<T>>>,
    sent: usize,
    sentinel_sent: bool,
}

impl<T> SendEnd<T> {
    /// Append a value to the tail of the channel.
    pub fn send(&mut self, value: T) -> Result<(), ChannelError> {
        if self.sentinel_sent {
            return Err(ChannelError::SentinelAlreadySent);
        }
        self.push(Message::Value(value))?;
        self.sent += 1;
        Ok(())
    }

    /// Send the end-of-stream sentinel. Allowed once per channel.
    pub fn send_sentinel(&mut self) -> Result<(), ChannelError> {
        if self.sentinel_sent {
            return Err(ChannelError::SentinelAlreadySent);
        }
        self.push(Message::Sentinel)?;
        self.sentinel_sent = true;
        tracing::trace!(sent = self.sent, "sentinel sent");
        Ok(())
    }

    /// Send the sentinel unless it already went out, then close.
    ///
    /// The endpoint is closed even when the sentinel cannot be delivered.
    pub fn finish(&mut self) -> Result<(), ChannelError> {
        let result = if self.sentinel_sent {
            Ok(())
        } else {
            self.send_sentinel()
        };
        self.close();
        result
    }

    /// Close this endpoint. Buffered messages stay readable by the receiver.
    pub fn close(&mut self) {
        if self.tx.take().is_some() {
            tracing::trace!(sent = self.sent, "send endpoint closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    /// Number of values (not counting the sentinel) sent so far.
    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn sentinel_sent(&self) -> bool {
        self.sentinel_sent
    }

    fn push(&mut self, message: Message<T>) -> Result<(), ChannelError> {
        let tx = self.tx.as_ref().ok_or(ChannelError::Closed)?;
        // Only fails when the receiving endpoint is gone.
        tx.send(message).map_err(|_| ChannelError::Closed)
    }
}

/// The receive-capable endpoint of a channel.
#[derive(Debug)]
pub struct RecvEnd<T> {
    rx: Option<Receiver<Message<T>>>,
    received: usize,
}

impl<T> RecvEnd<T> {
    /// Block until the next message arrives.
    ///
    /// Returns [`ChannelError::EndOfStream`] once the sender has closed and the
    /// buffer is empty.
    pub fn recv(&mut self) -> Result<Message<T>, ChannelError> {
        let rx = self.rx.as_ref().ok_or(ChannelError::Closed)?;
        let message = rx.recv().map_err(|_| ChannelError::EndOfStream)?;
        self.count(&message);
        Ok(message)
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Message<T>, ChannelError> {
        let rx = self.rx.as_ref().ok_or(ChannelError::Closed)?;
        let message = rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => ChannelError::Timeout(timeout),
            RecvTimeoutError::Disconnected => ChannelError::EndOfStream,
        })?;
        self.count(&message);
        Ok(message)
    }

    /// Iterate over values until the sentinel or end of stream.
    ///
    /// The terminating message is consumed; anything after it is left alone.
    pub fn values(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || match self.recv() {
            Ok(Message::Value(value)) => Some(value),
            Ok(Message::Sentinel) | Err(_) => None,
        })
    }

    /// Close this endpoint. Later sends from the peer fail with
    /// [`ChannelError::Closed`].
    pub fn close(&mut self) {
        if self.rx.take().is_some() {
            tracing::trace!(received = self.received, "receive endpoint closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_none()
    }

    /// Number of values (not counting the sentinel) received so far.
    pub fn received(&self) -> usize {
        self.received
    }

    fn count(&mut self, message: &Message<T>) {
        if !message.is_sentinel() {
            self.received += 1;
        }
    }
}
