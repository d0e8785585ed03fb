//! Service account token store
//!
//! Holds the bearer token used by every request. The token is loaded once at
//! construction and then refreshed in the background whenever the token file
//! is rewritten, so long-running processes pick up rotated credentials.
//!
//! Readers take a snapshot under a read lock; the refresh listener is the only
//! writer. A refresh that fails to read the file keeps the previous token.

use crate::error::ClientError;
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

/// Callback invoked by a [`FileChangeNotifier`] after the watched file was written.
pub type ChangeCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Keeps a file listener alive. Listening stops when the guard is dropped.
pub struct ListenerGuard {
    _inner: Mutex<Box<dyn Send>>,
}

impl ListenerGuard {
    /// Wrap whatever value owns the underlying listener.
    pub fn new<G: Send + 'static>(inner: G) -> Self {
        Self {
            _inner: Mutex::new(Box::new(inner)),
        }
    }
}

impl fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard").finish_non_exhaustive()
    }
}

/// Source of "file was written" notifications.
///
/// Abstracted so token refresh can be driven without real filesystem events.
pub trait FileChangeNotifier: Send + Sync {
    /// Invoke `callback` every time `path` is written, for as long as the
    /// returned guard is alive.
    ///
    /// # Errors
    /// Returns [`ClientError::FileWatch`] if the listener cannot be installed.
    fn on_file_changed(&self, path: &Path, callback: ChangeCallback) -> Result<ListenerGuard, ClientError>;
}

/// [`FileChangeNotifier`] backed by the platform file watcher (`notify`).
///
/// Watches the directory holding the file rather than the file itself. The
/// kubelet publishes projected tokens through a `..data` symlink that it
/// swaps on every rotation, which a watch on the file would not survive.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyFileNotifier;

impl FileChangeNotifier for NotifyFileNotifier {
    fn on_file_changed(&self, path: &Path, callback: ChangeCallback) -> Result<ListenerGuard, ClientError> {
        let file_name = path
            .file_name()
            .map(OsStr::to_os_string)
            .ok_or_else(|| ClientError::FileWatch(format!("{}: not a file path", path.display())))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) if is_write(&event.kind) && concerns(&event, &file_name) => callback(),
            Ok(_) => {}
            Err(e) => debug!("Token file watcher error: {}", e),
        })
        .map_err(|e| ClientError::FileWatch(e.to_string()))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| ClientError::FileWatch(format!("{}: {}", dir.display(), e)))?;

        Ok(ListenerGuard::new(watcher))
    }
}

fn is_write(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Access(AccessKind::Close(AccessMode::Write))
    )
}

/// Whether `event` touches the watched file or one of the `..`-prefixed
/// entries the kubelet resolves it through.
fn concerns(event: &Event, file_name: &OsStr) -> bool {
    event
        .paths
        .iter()
        .filter_map(|path| path.file_name())
        .any(|name| name == file_name || name.to_string_lossy().starts_with(".."))
}

/// Thread-safe holder of the current bearer token.
///
/// Cloning is cheap; clones share the same token and listener.
#[derive(Clone)]
pub struct TokenStore {
    token: Arc<RwLock<String>>,
    path: Option<PathBuf>,
    _listener: Option<Arc<ListenerGuard>>,
}

impl TokenStore {
    /// Load the token from `path` and refresh it whenever the file is written.
    ///
    /// # Errors
    /// Fails if the file cannot be read or the file watcher cannot be installed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        Self::from_file_with_notifier(path, &NotifyFileNotifier)
    }

    /// Same as [`TokenStore::from_file`] with an explicit change notifier.
    ///
    /// # Errors
    /// Fails if the file cannot be read or `notifier` fails to install a listener.
    pub fn from_file_with_notifier(
        path: impl AsRef<Path>,
        notifier: &dyn FileChangeNotifier,
    ) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        let token = Arc::new(RwLock::new(read_token(&path)?));

        let refresh_token = Arc::clone(&token);
        let refresh_path = path.clone();
        let listener = notifier.on_file_changed(
            &path,
            Box::new(move || {
                refresh(&refresh_path, &refresh_token);
            }),
        )?;

        info!("Loaded service account token from {}", path.display());
        Ok(Self {
            token,
            path: Some(path),
            _listener: Some(Arc::new(listener)),
        })
    }

    /// A token that never changes.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(token.into())),
            path: None,
            _listener: None,
        }
    }

    /// No credentials; requests are sent without an `Authorization` header.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::fixed(String::new())
    }

    /// Snapshot of the current token. Empty when anonymous.
    #[must_use]
    pub fn current_token(&self) -> String {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Token file backing this store, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-read the token file now, outside of any file event.
    ///
    /// Returns `true` if the file was read. A failed read keeps the previous
    /// token. Fixed stores have nothing to reload and return `false`.
    pub fn reload(&self) -> bool {
        match &self.path {
            Some(path) => refresh(path, &self.token),
            None => false,
        }
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("path", &self.path)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

fn read_token(path: &Path) -> Result<String, ClientError> {
    std::fs::read_to_string(path)
        .map(|raw| raw.trim().to_string())
        .map_err(|source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Swap in the token currently on disk. Empty reads (a file caught between
/// truncation and rewrite) are ignored.
fn refresh(path: &Path, token: &RwLock<String>) -> bool {
    match read_token(path) {
        Ok(fresh) if fresh.is_empty() => {
            debug!("Ignoring empty token read from {}", path.display());
            false
        }
        Ok(fresh) => {
            let mut current = token.write().unwrap_or_else(PoisonError::into_inner);
            if *current != fresh {
                *current = fresh;
                info!("Refreshed service account token from {}", path.display());
            }
            true
        }
        Err(e) => {
            debug!("Keeping previous token: {}", e);
            false
        }
    }
}
