//! Subscription controller: `Connecting -> Streaming -> {Closed | Errored}`.
//!
//! One run owns its transport reader, splitter and decoder. Envelopes reach
//! the handler one at a time, in wire order, before the next frame is taken.
//! Cancellation is checked first at every suspension point, so once the token
//! fires no further callback is made.

use crate::config::SubscriptionConfig;
use crate::decode::envelope_stream;
use crate::error::StreamError;
use crate::transport::{HttpTransport, Transport};
use chatwire_protocol::EventEnvelope;
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Connecting,
    Streaming,
    /// End of stream, or cancelled by the caller.
    Closed,
    Errored,
}

impl SubscriptionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }
}

/// Callbacks of one subscription. Invoked on the subscription's task, never
/// concurrently.
pub trait SubscriptionHandler: Send {
    fn on_event(&mut self, envelope: EventEnvelope);

    /// Malformed frames are reported here and streaming continues
    /// ([`StreamError::is_recoverable`]); anything else ends the run.
    fn on_error(&mut self, error: StreamError);

    /// The server ended the stream. Called at most once.
    fn on_disconnected(&mut self) {}
}

/// Drive one subscription on the current task until it ends.
pub async fn run_subscription<H>(
    transport: &dyn Transport,
    config: &SubscriptionConfig,
    handler: &mut H,
    cancel: &CancellationToken,
) -> SubscriptionState
where
    H: SubscriptionHandler + ?Sized,
{
    let (state, _) = watch::channel(SubscriptionState::Connecting);
    drive(transport, config, handler, cancel, &state).await
}

#[instrument(skip_all, fields(chat_id = %config.chat_id))]
async fn drive<H>(
    transport: &dyn Transport,
    config: &SubscriptionConfig,
    handler: &mut H,
    cancel: &CancellationToken,
    state: &watch::Sender<SubscriptionState>,
) -> SubscriptionState
where
    H: SubscriptionHandler + ?Sized,
{
    let enter = |next: SubscriptionState| {
        debug!(state = ?next, "subscription state changed");
        state.send_replace(next);
        next
    };

    enter(SubscriptionState::Connecting);
    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!("subscription cancelled while connecting");
            return enter(SubscriptionState::Closed);
        }
        opened = transport.open(config) => opened,
    };
    let bytes = match opened {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%err, "subscription failed to connect");
            handler.on_error(err);
            return enter(SubscriptionState::Errored);
        }
    };

    enter(SubscriptionState::Streaming);
    let mut envelopes = std::pin::pin!(envelope_stream(bytes));
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("subscription cancelled");
                return enter(SubscriptionState::Closed);
            }
            next = envelopes.next() => next,
        };
        match next {
            Some(Ok(envelope)) => handler.on_event(envelope),
            Some(Err(err)) if err.is_recoverable() => handler.on_error(err),
            Some(Err(err)) => {
                warn!(%err, "subscription stream failed");
                handler.on_error(err);
                return enter(SubscriptionState::Errored);
            }
            None => {
                debug!("subscription stream ended");
                handler.on_disconnected();
                return enter(SubscriptionState::Closed);
            }
        }
    }
}

/// Open a subscription over HTTP and run it on a new Tokio task.
///
/// Configuration problems are returned here, before anything is spawned;
/// everything after that is reported through the handler.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn subscribe<H>(config: SubscriptionConfig, handler: H) -> Result<SubscriptionHandle, StreamError>
where
    H: SubscriptionHandler + 'static,
{
    config.subscribe_url()?;
    let transport = HttpTransport::from_config(&config)?;
    Ok(SubscriptionHandle::spawn(transport, config, handler))
}

/// A running subscription. Dropping the handle cancels it.
#[derive(Debug)]
pub struct SubscriptionHandle {
    cancel: CancellationToken,
    state: watch::Receiver<SubscriptionState>,
    task: JoinHandle<SubscriptionState>,
    guard: DropGuard,
}

impl SubscriptionHandle {
    /// Run a subscription over a caller-supplied transport on a new Tokio task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<T, H>(transport: T, config: SubscriptionConfig, mut handler: H) -> Self
    where
        T: Transport + 'static,
        H: SubscriptionHandler + 'static,
    {
        let cancel = CancellationToken::new();
        let (state_tx, state) = watch::channel(SubscriptionState::Connecting);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            drive(&transport, &config, &mut handler, &token, &state_tx).await
        });
        Self {
            guard: cancel.clone().drop_guard(),
            cancel,
            state,
            task,
        }
    }

    /// Stop the subscription. No callbacks are made afterwards.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this subscription, e.g. for use inside a handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.clone()
    }

    /// Wait for the run to end and return its final state.
    pub async fn wait(self) -> SubscriptionState {
        let Self { task, guard, .. } = self;
        let _ = guard.disarm();
        match task.await {
            Ok(state) => state,
            Err(err) => {
                warn!(%err, "subscription task did not complete");
                SubscriptionState::Errored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ByteStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chatwire_protocol::EventKind;
    use futures_util::stream;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Serves a fixed list of chunks once.
    struct ScriptedTransport {
        chunks: Mutex<Option<Vec<Result<Bytes, StreamError>>>>,
    }

    impl ScriptedTransport {
        fn new<S: Into<String>>(chunks: Vec<Result<S, StreamError>>) -> Self {
            let chunks = chunks
                .into_iter()
                .map(|chunk| chunk.map(|text| Bytes::from(text.into())))
                .collect();
            Self {
                chunks: Mutex::new(Some(chunks)),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn open(&self, _config: &SubscriptionConfig) -> Result<ByteStream, StreamError> {
            let chunks = self.chunks.lock().take().unwrap_or_default();
            Ok(stream::iter(chunks).boxed())
        }
    }

    struct RefusingTransport;

    #[async_trait]
    impl Transport for RefusingTransport {
        async fn open(&self, _config: &SubscriptionConfig) -> Result<ByteStream, StreamError> {
            Err(StreamError::Status {
                status: 401,
                body: "unauthorized".into(),
            })
        }
    }

    /// Never yields; flags when its reader is dropped.
    struct StalledTransport {
        released: Arc<AtomicBool>,
    }

    struct ReleaseFlag(Arc<AtomicBool>);

    impl Drop for ReleaseFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transport for StalledTransport {
        async fn open(&self, _config: &SubscriptionConfig) -> Result<ByteStream, StreamError> {
            let flag = ReleaseFlag(self.released.clone());
            Ok(stream::pending::<Result<Bytes, StreamError>>()
                .map(move |chunk| {
                    let _held = &flag;
                    chunk
                })
                .boxed())
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<EventEnvelope>,
        errors: Vec<StreamError>,
        disconnects: usize,
        cancel_after_first: Option<CancellationToken>,
    }

    impl SubscriptionHandler for Recorder {
        fn on_event(&mut self, envelope: EventEnvelope) {
            self.events.push(envelope);
            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
        }

        fn on_error(&mut self, error: StreamError) {
            self.errors.push(error);
        }

        fn on_disconnected(&mut self) {
            self.disconnects += 1;
        }
    }

    #[derive(Clone, Default)]
    struct SharedRecorder(Arc<Mutex<Recorder>>);

    impl SubscriptionHandler for SharedRecorder {
        fn on_event(&mut self, envelope: EventEnvelope) {
            self.0.lock().on_event(envelope);
        }

        fn on_error(&mut self, error: StreamError) {
            self.0.lock().on_error(error);
        }

        fn on_disconnected(&mut self) {
            self.0.lock().on_disconnected();
        }
    }

    fn config() -> SubscriptionConfig {
        SubscriptionConfig::new("c1", 8001)
    }

    const DELTA: &str = "data: {\"type\":\"stream_delta\",\"chat_id\":\"c1\",\"seq\":3,\"message_id\":\"m1\",\"ops\":[{\"op\":\"append_content\",\"text\":\"hi\"}]}\n\n";

    #[tokio::test]
    async fn events_then_disconnect() {
        let transport = ScriptedTransport::new(vec![
            Ok("data: {\"type\":\"stream_started\",\"chat_id\":\"c1\",\"seq\":\"2\",\"mess"),
            Ok("age_id\":\"m1\"}\n"),
            Ok("\n"),
            Ok(DELTA),
            Ok("data: [DONE]\n\n"),
        ]);
        let mut recorder = Recorder::default();

        let state = run_subscription(&transport, &config(), &mut recorder, &CancellationToken::new()).await;

        assert_eq!(state, SubscriptionState::Closed);
        assert_eq!(recorder.events.len(), 2);
        assert_eq!(recorder.events[0].event_type(), "stream_started");
        assert_eq!(recorder.events[1].seq.as_str(), "3");
        assert!(matches!(recorder.events[1].kind, EventKind::StreamDelta { .. }));
        assert!(recorder.errors.is_empty());
        assert_eq!(recorder.disconnects, 1);
    }

    #[tokio::test]
    async fn malformed_frame_is_reported_and_skipped() {
        let transport = ScriptedTransport::new(vec![Ok("data: {invalid json}\n\n"), Ok(DELTA)]);
        let mut recorder = Recorder::default();

        let state = run_subscription(&transport, &config(), &mut recorder, &CancellationToken::new()).await;

        assert_eq!(state, SubscriptionState::Closed);
        assert_eq!(recorder.events.len(), 1);
        assert_eq!(recorder.errors.len(), 1);
        assert!(recorder.errors[0].is_recoverable());
    }

    #[tokio::test]
    async fn read_error_is_terminal() {
        let transport = ScriptedTransport::new(vec![
            Ok(DELTA),
            Err(StreamError::Read(std::io::Error::other("connection reset"))),
            Ok(DELTA),
        ]);
        let mut recorder = Recorder::default();

        let state = run_subscription(&transport, &config(), &mut recorder, &CancellationToken::new()).await;

        assert_eq!(state, SubscriptionState::Errored);
        assert_eq!(recorder.events.len(), 1);
        assert!(matches!(recorder.errors[..], [StreamError::Read(_)]));
        assert_eq!(recorder.disconnects, 0);
    }

    #[tokio::test]
    async fn failed_connect_reports_once() {
        let mut recorder = Recorder::default();
        let state =
            run_subscription(&RefusingTransport, &config(), &mut recorder, &CancellationToken::new()).await;

        assert_eq!(state, SubscriptionState::Errored);
        assert!(matches!(
            recorder.errors[..],
            [StreamError::Status { status: 401, .. }]
        ));
        assert!(recorder.events.is_empty());
        assert_eq!(recorder.disconnects, 0);
    }

    #[tokio::test]
    async fn cancel_inside_handler_stops_buffered_frames() {
        let token = CancellationToken::new();
        let batch = format!("{DELTA}{DELTA}{DELTA}");
        let transport = ScriptedTransport::new(vec![Ok(batch)]);
        let mut recorder = Recorder {
            cancel_after_first: Some(token.clone()),
            ..Recorder::default()
        };

        let state = run_subscription(&transport, &config(), &mut recorder, &token).await;

        assert_eq!(state, SubscriptionState::Closed);
        assert_eq!(recorder.events.len(), 1);
        assert!(recorder.errors.is_empty());
        assert_eq!(recorder.disconnects, 0);
    }

    #[tokio::test]
    async fn cancel_before_connect_makes_no_callbacks() {
        let token = CancellationToken::new();
        token.cancel();
        let mut recorder = Recorder::default();

        let state = run_subscription(&RefusingTransport, &config(), &mut recorder, &token).await;

        assert_eq!(state, SubscriptionState::Closed);
        assert!(recorder.errors.is_empty());
    }

    #[tokio::test]
    async fn handle_cancel_releases_reader() -> anyhow::Result<()> {
        let released = Arc::new(AtomicBool::new(false));
        let recorder = SharedRecorder::default();
        let handle = SubscriptionHandle::spawn(
            StalledTransport {
                released: released.clone(),
            },
            config(),
            recorder.clone(),
        );

        let mut states = handle.watch_state();
        states
            .wait_for(|state| *state == SubscriptionState::Streaming)
            .await?;
        assert_eq!(handle.state(), SubscriptionState::Streaming);

        handle.cancel();
        assert_eq!(handle.wait().await, SubscriptionState::Closed);
        assert!(released.load(Ordering::SeqCst));

        let recorded = recorder.0.lock();
        assert!(recorded.events.is_empty());
        assert!(recorded.errors.is_empty());
        assert_eq!(recorded.disconnects, 0);
        Ok(())
    }

    #[tokio::test]
    async fn dropping_handle_cancels() -> anyhow::Result<()> {
        let released = Arc::new(AtomicBool::new(false));
        let handle = SubscriptionHandle::spawn(
            StalledTransport {
                released: released.clone(),
            },
            config(),
            SharedRecorder::default(),
        );
        let mut states = handle.watch_state();
        states
            .wait_for(|state| *state == SubscriptionState::Streaming)
            .await?;

        drop(handle);
        states.wait_for(|state| state.is_terminal()).await?;
        assert_eq!(*states.borrow(), SubscriptionState::Closed);
        tokio::time::timeout(Duration::from_secs(1), async {
            while !released.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn subscribe_rejects_empty_chat_id() {
        let result = subscribe(SubscriptionConfig::new("", 8001), SharedRecorder::default());
        assert!(matches!(result, Err(StreamError::InvalidConfig(_))));
    }
}
