//! Test doubles for the decoder and the file change notifier
//!
//! Enabled with the `test-util` feature so downstream crates can drive a
//! watch or a token refresh without a live API server or real file events.

use crate::decoder::ResponseDecoder;
use crate::error::{ClientError, DecodeError};
use crate::token::{ChangeCallback, FileChangeNotifier, ListenerGuard};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Decoder fed from a channel.
///
/// While the feeding side is alive, `decode` waits like an open connection
/// with no traffic. Once the feed is dropped and drained, `decode` returns
/// [`DecodeError::Eof`].
#[derive(Debug)]
pub struct MockDecoder {
    feed: mpsc::UnboundedReceiver<Result<Value, DecodeError>>,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

/// Test-side controls of a [`MockDecoder`].
#[derive(Debug, Clone)]
pub struct MockDecoderHandle {
    feed: mpsc::UnboundedSender<Result<Value, DecodeError>>,
    closes: Arc<AtomicUsize>,
}

impl MockDecoder {
    /// Decoder that waits for values pushed through the returned handle.
    #[must_use]
    pub fn channel() -> (Self, MockDecoderHandle) {
        let (tx, feed) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        let decoder = Self {
            feed,
            closes: Arc::clone(&closes),
            closed: false,
        };
        (decoder, MockDecoderHandle { feed: tx, closes })
    }

    /// Decoder that yields `script` and then reports end of stream.
    ///
    /// The returned counter records `close` calls.
    #[must_use]
    pub fn scripted(script: Vec<Result<Value, DecodeError>>) -> (Self, Arc<AtomicUsize>) {
        let (decoder, handle) = Self::channel();
        for item in script {
            handle.push_result(item);
        }
        let closes = Arc::clone(&handle.closes);
        (decoder, closes)
    }
}

impl MockDecoderHandle {
    /// Queue a successfully decoded value.
    pub fn push(&self, value: Value) {
        self.push_result(Ok(value));
    }

    /// Queue a decode result, success or failure.
    pub fn push_result(&self, item: Result<Value, DecodeError>) {
        // The decoder may already be gone; tests only care while it is alive
        let _ = self.feed.send(item);
    }

    /// Number of times the decoder was closed.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Shared close counter.
    #[must_use]
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

#[async_trait::async_trait]
impl ResponseDecoder for MockDecoder {
    async fn decode(&mut self) -> Result<Value, DecodeError> {
        if self.closed {
            return Err(DecodeError::Eof);
        }
        self.feed.recv().await.unwrap_or(Err(DecodeError::Eof))
    }

    fn close(&mut self) {
        self.closed = true;
        self.feed.close();
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// File change notifier triggered by hand.
#[derive(Clone, Default)]
pub struct ManualFileNotifier {
    callbacks: Arc<Mutex<HashMap<PathBuf, Vec<ChangeCallback>>>>,
    fail_with: Option<String>,
}

impl ManualFileNotifier {
    /// Notifier with no registered listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier whose listener setup always fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// Run every callback registered for `path`. Returns how many ran.
    pub fn trigger(&self, path: &Path) -> usize {
        let callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        let registered = callbacks.get(path).map_or(&[][..], Vec::as_slice);
        for callback in registered {
            callback();
        }
        registered.len()
    }
}

impl FileChangeNotifier for ManualFileNotifier {
    fn on_file_changed(&self, path: &Path, callback: ChangeCallback) -> Result<ListenerGuard, ClientError> {
        if let Some(message) = &self.fail_with {
            return Err(ClientError::FileWatch(message.clone()));
        }
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_path_buf())
            .or_default()
            .push(callback);
        Ok(ListenerGuard::new(()))
    }
}

impl std::fmt::Debug for ManualFileNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let paths: Vec<PathBuf> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("ManualFileNotifier")
            .field("paths", &paths)
            .field("fail_with", &self.fail_with)
            .finish()
    }
}
