use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::{ResponseFragment, TransportError};

type StreamItem = Result<ResponseFragment, TransportError>;

/// Creates a single-producer, single-reader fragment channel for one model call.
#[must_use]
pub fn fragment_channel() -> (FragmentSender, FragmentStream) {
    let (tx, rx) = mpsc::channel();
    (FragmentSender { tx }, FragmentStream { rx })
}

/// Writing end of a fragment channel, owned by the transport.
#[derive(Debug, Clone)]
pub struct FragmentSender {
    tx: Sender<StreamItem>,
}

impl FragmentSender {
    /// Sends one fragment. Returns false once the reader has gone away, which
    /// is the transport's cue to stop producing.
    pub fn send(&self, fragment: ResponseFragment) -> bool {
        self.tx.send(Ok(fragment)).is_ok()
    }

    /// Reports a terminal transport failure.
    pub fn fail(&self, error: TransportError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

/// Result of polling a fragment stream once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPoll {
    Fragment(ResponseFragment),
    Failed(TransportError),
    /// No fragment arrived within the poll interval.
    Pending,
    /// The producer hung up.
    Closed,
}

/// Reading end of a fragment channel, consumed by exactly one reader.
///
/// Dropping the stream closes the channel.
#[derive(Debug)]
pub struct FragmentStream {
    rx: Receiver<StreamItem>,
}

impl FragmentStream {
    /// Waits up to `interval` for the next fragment.
    pub fn poll(&self, interval: Duration) -> StreamPoll {
        match self.rx.recv_timeout(interval) {
            Ok(Ok(fragment)) => StreamPoll::Fragment(fragment),
            Ok(Err(error)) => StreamPoll::Failed(error),
            Err(RecvTimeoutError::Timeout) => StreamPoll::Pending,
            Err(RecvTimeoutError::Disconnected) => StreamPoll::Closed,
        }
    }

    /// Builds an already-complete stream from a fixed fragment script.
    #[must_use]
    pub fn from_fragments(fragments: impl IntoIterator<Item = StreamItem>) -> Self {
        let (tx, rx) = mpsc::channel();
        for item in fragments {
            // The receiver is alive until this function returns.
            let _ = tx.send(item);
        }
        Self { rx }
    }
}
