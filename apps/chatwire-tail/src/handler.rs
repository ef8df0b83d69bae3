use std::sync::Arc;

use chatwire_protocol::{EventEnvelope, EventKind, validate_tool_call};
use chatwire_stream::{StreamError, SubscriptionHandler};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::transcript::{Outcome, Transcript};

/// Folds envelopes into a shared transcript and logs what happened.
pub struct TailHandler {
    transcript: Arc<Mutex<Transcript>>,
}

impl TailHandler {
    pub fn new(transcript: Arc<Mutex<Transcript>>) -> Self {
        Self { transcript }
    }
}

impl SubscriptionHandler for TailHandler {
    fn on_event(&mut self, envelope: EventEnvelope) {
        let mut transcript = self.transcript.lock();
        if transcript.apply(&envelope) == Outcome::Ignored {
            debug!(
                event_type = envelope.event_type(),
                seq = %envelope.seq,
                "envelope ignored"
            );
            return;
        }

        match &envelope.kind {
            EventKind::Snapshot {
                thread, messages, ..
            } => info!(
                title = %thread.title,
                model = %thread.model,
                messages = messages.len(),
                "snapshot received"
            ),
            EventKind::StreamDelta { message_id, ops } => {
                debug!(%message_id, ops = ops.len(), "delta applied");
            }
            EventKind::StreamFinished {
                message_id,
                finish_reason,
            } => {
                let Some(message) = transcript.message(message_id) else {
                    return;
                };
                info!(
                    %message_id,
                    finish_reason = ?finish_reason,
                    text = message.text().unwrap_or_default(),
                    "assistant message finished"
                );
                for call in message.tool_calls.iter().flatten() {
                    match validate_tool_call(call) {
                        Ok(arguments) => info!(
                            name = call.function.name.as_deref().unwrap_or_default(),
                            %arguments,
                            "tool call"
                        ),
                        Err(err) => warn!(%err, "incomplete tool call"),
                    }
                }
            }
            EventKind::MessageAdded { message, index } => {
                info!(role = %message.role, index, "message added");
            }
            EventKind::TitleUpdated { title, .. } => info!(%title, "title updated"),
            EventKind::RuntimeUpdated(runtime) => {
                info!(state = %runtime.state, queue_size = runtime.queue_size, "runtime updated");
            }
            EventKind::PauseRequired { reasons } => {
                for reason in reasons {
                    warn!(kind = %reason.kind, command = %reason.command, rule = %reason.rule, "paused for confirmation");
                }
            }
            other => debug!(event_type = other.event_type(), "envelope applied"),
        }
    }

    fn on_error(&mut self, err: StreamError) {
        if err.is_recoverable() {
            warn!(%err, "skipped a frame");
        } else {
            error!(%err, "subscription failed");
        }
    }

    fn on_disconnected(&mut self) {
        info!("server closed the stream");
    }
}
