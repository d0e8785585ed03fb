//! Streaming watch engine
//!
//! Turns an open watch response into a channel of typed events. A background
//! task decodes one event at a time and hands it to the single consumer
//! holding the [`WatchHandle`]. The task ends, closing the channel, when:
//!
//! - the consumer calls [`WatchHandle::stop`] (or drops the handle),
//! - the body ends,
//! - an event cannot be decoded or carries an unknown type.
//!
//! Decode failures are logged, never delivered: to the consumer a broken
//! stream looks exactly like a finished one.
//!
//! `stop` does not drain the channel. An event already buffered before the
//! task observed the stop can still be received once.

use crate::decoder::ResponseDecoder;
use crate::error::DecodeError;
use futures::Stream;
use k8s_types::{Event, EventType};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Events buffered between the decode task and the consumer.
pub const DEFAULT_WATCH_BUFFER: usize = 1;

/// Watch event as it appears on the wire, before validation.
#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    event_type: String,
    object: serde_json::Value,
}

/// Validate the event type, then decode the object into `T`.
pub(crate) fn decode_event<T: DeserializeOwned>(value: serde_json::Value) -> Result<Event<T>, DecodeError> {
    let wire: WireEvent = serde_json::from_value(value)?;
    let event_type = wire.event_type.parse::<EventType>()?;
    let object = serde_json::from_value(wire.object)?;
    Ok(Event::new(event_type, object))
}

/// One-way stop flag shared by the handle and the decode task.
#[derive(Debug, Default)]
struct StopState {
    stopped: Mutex<bool>,
    cancel: CancellationToken,
}

impl StopState {
    fn stop(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        if !*stopped {
            *stopped = true;
            self.cancel.cancel();
        }
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stops a watch from any task. Clones stop the same watch.
#[derive(Debug, Clone)]
pub struct WatchStopper {
    state: Arc<StopState>,
}

impl WatchStopper {
    /// Stop the watch. Idempotent.
    pub fn stop(&self) {
        self.state.stop();
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.is_stopped()
    }
}

/// Consumer side of a running watch.
///
/// Receive with [`WatchHandle::recv`] or use it as a [`Stream`]. Both end
/// (`None`) once the watch terminated and buffered events were consumed.
/// Dropping the handle stops the watch.
pub struct WatchHandle<T> {
    events: mpsc::Receiver<Event<T>>,
    stopper: WatchStopper,
}

impl<T> WatchHandle<T> {
    /// Next event, or `None` once the watch has terminated.
    pub async fn recv(&mut self) -> Option<Event<T>> {
        self.events.recv().await
    }

    /// Raw receiving end of the event channel.
    pub fn result_chan(&mut self) -> &mut mpsc::Receiver<Event<T>> {
        &mut self.events
    }

    /// Stop watching and release the response body. Idempotent.
    pub fn stop(&self) {
        self.stopper.stop();
    }

    /// Handle that can stop this watch from another task.
    #[must_use]
    pub fn stopper(&self) -> WatchStopper {
        self.stopper.clone()
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopper.is_stopped()
    }
}

impl<T> Stream for WatchHandle<T> {
    type Item = Event<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl<T> Drop for WatchHandle<T> {
    fn drop(&mut self) {
        self.stopper.stop();
    }
}

impl<T> fmt::Debug for WatchHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Start decoding watch events from `decoder` on a background task.
///
/// The returned handle receives events in arrival order. `buffer` is the
/// channel capacity (at least 1).
///
/// # Panics
/// Panics when called outside of a Tokio runtime.
pub fn start_watch<T>(decoder: Box<dyn ResponseDecoder>, buffer: usize) -> WatchHandle<T>
where
    T: DeserializeOwned + Send + 'static,
{
    let (result, events) = mpsc::channel(buffer.max(1));
    let state = Arc::new(StopState::default());

    let watcher = StreamWatcher {
        decoder,
        result,
        state: Arc::clone(&state),
        _kind: PhantomData,
    };
    tokio::spawn(watcher.receive());

    WatchHandle {
        events,
        stopper: WatchStopper { state },
    }
}

/// Producer side: owns the decoder and the sending end of the channel.
struct StreamWatcher<T> {
    decoder: Box<dyn ResponseDecoder>,
    result: mpsc::Sender<Event<T>>,
    state: Arc<StopState>,
    _kind: PhantomData<fn() -> T>,
}

impl<T> StreamWatcher<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn receive(mut self) {
        loop {
            let decoded = tokio::select! {
                biased;
                () = self.state.cancel.cancelled() => break,
                decoded = self.decoder.decode() => decoded,
            };

            let event = match decoded.and_then(decode_event::<T>) {
                Ok(event) => event,
                Err(err) => {
                    if self.state.is_stopped() {
                        break;
                    }
                    match err {
                        DecodeError::Eof => debug!("Watch stream closed"),
                        DecodeError::UnexpectedEof => {
                            warn!("Unexpected EOF during watch stream event decoding");
                        }
                        other => warn!("Unable to decode an event from the watch stream: {}", other),
                    }
                    break;
                }
            };

            if self.state.is_stopped() {
                break;
            }
            tokio::select! {
                biased;
                () = self.state.cancel.cancelled() => break,
                sent = self.result.send(event) => {
                    if sent.is_err() {
                        debug!("Watch consumer went away");
                        break;
                    }
                }
            }
        }

        // Body is released before the channel closes
        self.decoder.close();
        drop(self.result);
    }
}
