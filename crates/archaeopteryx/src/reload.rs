//! Live reload over websockets.
//!
//! The first websocket upgrade starts a recursive watch on the served root.
//! Later upgrades reuse it. Every connection gets its own subscription to the
//! watch stream and receives the literal text frame `reload` for each
//! modification. Creates and removes never trigger a reload.
//!
//! A failed send or a watch-stream error ends that connection's forwarding
//! loop only; other connections and the listener keep running.

use crate::config::ServerConfig;
use crate::error::report_error;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};

/// Payload sent to browsers when a watched file changes.
pub const RELOAD_MESSAGE: &str = "reload";

/// Buffered watch events per subscriber before it starts lagging.
const WATCH_CHANNEL_CAPACITY: usize = 256;

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Modify,
    Create,
    Remove,
}

/// Filesystem change reported by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub paths: Vec<PathBuf>,
}

impl WatchEvent {
    pub fn new(kind: WatchEventKind, paths: Vec<PathBuf>) -> Self {
        Self { kind, paths }
    }

    /// Convert a notify event. Access and unclassified events are dropped.
    pub fn from_notify(event: notify::Event) -> Option<Self> {
        let kind = match event.kind {
            notify::EventKind::Modify(_) => WatchEventKind::Modify,
            notify::EventKind::Create(_) => WatchEventKind::Create,
            notify::EventKind::Remove(_) => WatchEventKind::Remove,
            _ => return None,
        };
        Some(Self::new(kind, event.paths))
    }

    /// Only modifications reload connected pages.
    pub fn triggers_reload(&self) -> bool {
        self.kind == WatchEventKind::Modify
    }
}

/// Item of the shared watch stream. Errors are shared between subscribers.
pub type WatchMessage = Result<WatchEvent, Arc<notify::Error>>;

/// Why a connection's forwarding loop ended early.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("Failed to send reload message: {0}")]
    Send(String),

    #[error("Watch stream error: {0}")]
    Watch(Arc<notify::Error>),
}

/// Process-wide watcher for one root, fanned out to every live-reload socket.
///
/// The watcher is created on the first [`connect`](Self::connect) and kept
/// until the broadcaster is dropped.
pub struct ReloadBroadcaster {
    root: PathBuf,
    events: broadcast::Sender<WatchMessage>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl ReloadBroadcaster {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self {
            root: root.into(),
            events,
            watcher: Mutex::new(None),
        }
    }

    /// Whether the filesystem watcher has been started.
    pub fn is_watching(&self) -> bool {
        self.watcher.lock().is_some()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Start the watcher if needed and subscribe to its events.
    ///
    /// Creation happens under the lock, so concurrent first upgrades still
    /// produce exactly one watcher.
    ///
    /// # Errors
    ///
    /// Returns the notify error if the watcher cannot be created.
    pub fn connect(&self) -> Result<broadcast::Receiver<WatchMessage>, notify::Error> {
        let mut watcher = self.watcher.lock();
        if watcher.is_none() {
            *watcher = Some(self.start_watcher()?);
        }
        Ok(self.events.subscribe())
    }

    /// Push a message to every subscriber, returning how many received it.
    pub fn publish(&self, message: WatchMessage) -> usize {
        self.events.send(message).unwrap_or(0)
    }

    fn start_watcher(&self) -> Result<RecommendedWatcher, notify::Error> {
        let events = self.events.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let message = match res {
                Ok(event) => match WatchEvent::from_notify(event) {
                    Some(event) => {
                        tracing::debug!("{:?} {:?}", event.kind, event.paths);
                        Ok(event)
                    }
                    None => return,
                },
                Err(err) => Err(Arc::new(err)),
            };
            // No subscribers is fine; the event is simply dropped.
            let _ = events.send(message);
        })?;

        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        tracing::info!("Watching {} for changes", self.root.display());

        Ok(watcher)
    }
}

impl fmt::Debug for ReloadBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadBroadcaster")
            .field("root", &self.root)
            .field("watching", &self.is_watching())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Forward watch events to one socket until the stream closes or fails.
///
/// Sends [`RELOAD_MESSAGE`] for every modification. Returns `Ok(())` when the
/// watch stream is closed.
///
/// # Errors
///
/// - [`ReloadError::Send`] when the socket rejects a message
/// - [`ReloadError::Watch`] when the watcher reports an error
pub async fn forward_reloads<S>(
    events: &mut broadcast::Receiver<WatchMessage>,
    sink: &mut S,
) -> Result<(), ReloadError>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    loop {
        match events.recv().await {
            Ok(Ok(event)) => {
                if event.triggers_reload() {
                    sink.send(Message::Text(RELOAD_MESSAGE.into()))
                        .await
                        .map_err(|e| ReloadError::Send(e.to_string()))?;
                }
            }
            Ok(Err(err)) => return Err(ReloadError::Watch(err)),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Live reload subscriber skipped {} events", skipped);
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

/// Drive one upgraded live-reload socket until either side goes away.
pub(crate) async fn run_socket(
    socket: WebSocket,
    mut events: broadcast::Receiver<WatchMessage>,
    config: &ServerConfig,
) {
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!("Browser connected for live reload");

    let result = tokio::select! {
        result = forward_reloads(&mut events, &mut sender) => result,
        // Client messages are not interpreted; only closure matters.
        _ = async {
            while let Some(Ok(message)) = receiver.next().await {
                if matches!(message, Message::Close(_)) {
                    break;
                }
            }
        } => Ok(()),
    };

    if let Err(err) = result {
        report_error(config, &err);
    }

    tracing::debug!("Browser disconnected from live reload");
}

/// Inline client script that reloads the page on a `reload` message.
pub fn reload_script(host: &str, secure: bool) -> String {
    let protocol = if secure { "wss" } else { "ws" };
    format!(
        r#"<script>
  (() => {{
    const socket = new WebSocket('{protocol}://{host}');
    socket.onopen = () => {{
      console.log('Socket connection open. Listening for events.');
    }};
    socket.onmessage = (msg) => {{
      if (msg.data === '{RELOAD_MESSAGE}') location.reload();
    }};
  }})();
</script>"#
    )
}

/// Append the reload client script after `document`. The document bytes are
/// kept as-is, whatever their encoding.
pub fn append_reload_script(mut document: Vec<u8>, host: &str, secure: bool) -> Vec<u8> {
    document.extend_from_slice(reload_script(host, secure).as_bytes());
    document
}

/// Whether `host` is safe to embed in the reload script.
pub fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;

    fn modify() -> WatchMessage {
        Ok(WatchEvent::new(WatchEventKind::Modify, vec![PathBuf::from("/site/index.html")]))
    }

    #[test]
    fn test_watch_event_from_notify() {
        use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

        let modify = notify::Event::new(notify::EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/site/a.css"));
        let event = WatchEvent::from_notify(modify).unwrap();
        assert_eq!(event.kind, WatchEventKind::Modify);
        assert_eq!(event.paths, vec![PathBuf::from("/site/a.css")]);
        assert!(event.triggers_reload());

        let create = notify::Event::new(notify::EventKind::Create(CreateKind::File));
        assert!(!WatchEvent::from_notify(create).unwrap().triggers_reload());

        let remove = notify::Event::new(notify::EventKind::Remove(RemoveKind::File));
        assert!(!WatchEvent::from_notify(remove).unwrap().triggers_reload());

        let access = notify::Event::new(notify::EventKind::Access(AccessKind::Any));
        assert!(WatchEvent::from_notify(access).is_none());
    }

    #[test]
    fn test_reload_script() {
        let script = reload_script("localhost:8080", false);
        assert!(script.contains("new WebSocket('ws://localhost:8080')"));
        assert!(script.contains("msg.data === 'reload'"));

        let secure = reload_script("localhost:8443", true);
        assert!(secure.contains("wss://localhost:8443"));
    }

    #[test]
    fn test_append_reload_script_is_trailing() {
        let html = b"<html><body><h1>App</h1></body></html>";
        let result = append_reload_script(html.to_vec(), "127.0.0.1:3000", false);
        assert!(result.starts_with(html));
        assert!(result.ends_with(b"</script>"));
    }

    #[test]
    fn test_append_reload_script_keeps_non_utf8_bytes() {
        let latin1 = vec![b'<', b'p', b'>', 0xE9, b'<', b'/', b'p', b'>'];
        let result = append_reload_script(latin1.clone(), "localhost:8080", false);
        assert_eq!(&result[..latin1.len()], &latin1[..]);
        assert!(result.ends_with(b"</script>"));
    }

    #[test]
    fn test_is_valid_host() {
        assert!(is_valid_host("localhost:8080"));
        assert!(is_valid_host("[::1]:8080"));
        assert!(is_valid_host("192.168.1.20"));
        assert!(!is_valid_host(""));
        assert!(!is_valid_host("evil');alert(1);('"));
    }

    #[tokio::test]
    async fn test_modify_event_forwards_reload() {
        let broadcaster = ReloadBroadcaster::new("/unused");
        let mut events = broadcaster.events.subscribe();
        let (mut tx, mut rx) = mpsc::unbounded::<Message>();

        broadcaster.publish(Ok(WatchEvent::new(WatchEventKind::Create, vec![])));
        broadcaster.publish(Ok(WatchEvent::new(WatchEventKind::Remove, vec![])));
        broadcaster.publish(modify());
        drop(broadcaster);

        forward_reloads(&mut events, &mut tx).await.unwrap();
        drop(tx);

        let mut received = Vec::new();
        while let Some(message) = rx.next().await {
            received.push(message);
        }
        assert_eq!(received, vec![Message::Text(RELOAD_MESSAGE.into())]);
    }

    #[tokio::test]
    async fn test_watch_error_ends_forwarding() {
        let broadcaster = ReloadBroadcaster::new("/unused");
        let mut events = broadcaster.events.subscribe();
        let (mut tx, _rx) = mpsc::unbounded::<Message>();

        broadcaster.publish(Err(Arc::new(notify::Error::generic("watch failed"))));

        let err = forward_reloads(&mut events, &mut tx).await.unwrap_err();
        assert!(matches!(err, ReloadError::Watch(_)));
    }

    #[tokio::test]
    async fn test_send_failure_ends_forwarding() {
        let broadcaster = ReloadBroadcaster::new("/unused");
        let mut events = broadcaster.events.subscribe();
        let (mut tx, rx) = mpsc::unbounded::<Message>();
        drop(rx);

        broadcaster.publish(modify());

        let err = forward_reloads(&mut events, &mut tx).await.unwrap_err();
        assert!(matches!(err, ReloadError::Send(_)));
    }

    #[tokio::test]
    async fn test_connect_starts_single_watcher() {
        let temp = tempfile::TempDir::new().unwrap();
        let broadcaster = ReloadBroadcaster::new(temp.path());
        assert!(!broadcaster.is_watching());

        let _first = broadcaster.connect().unwrap();
        let _second = broadcaster.connect().unwrap();

        assert!(broadcaster.is_watching());
        assert_eq!(broadcaster.subscriber_count(), 2);
        assert_eq!(broadcaster.publish(modify()), 2);
    }

    #[tokio::test]
    async fn test_connect_fails_for_missing_root() {
        let temp = tempfile::TempDir::new().unwrap();
        let broadcaster = ReloadBroadcaster::new(temp.path().join("missing"));
        assert!(broadcaster.connect().is_err());
        assert!(!broadcaster.is_watching());
    }
}
