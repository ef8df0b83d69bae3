use chatwire_protocol::{
    ChatId, ChatMessage, EventEnvelope, EventKind, MessageId, RuntimeState, Seq, ThreadParams,
    apply_delta_ops,
};

/// Local copy of one chat, rebuilt from subscription envelopes.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    chat_id: ChatId,
    thread: ThreadParams,
    runtime: RuntimeState,
    messages: Vec<ChatMessage>,
    last_seq: Option<Seq>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Not for this chat, targets a missing message, or carries no state.
    Ignored,
}

impl Transcript {
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            ..Self::default()
        }
    }

    pub fn thread(&self) -> &ThreadParams {
        &self.thread
    }

    pub fn runtime(&self) -> &RuntimeState {
        &self.runtime
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last_seq(&self) -> Option<&Seq> {
        self.last_seq.as_ref()
    }

    pub fn message(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.position(id).map(|pos| &self.messages[pos])
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages
            .iter()
            .position(|m| m.message_id.as_ref() == Some(id))
    }

    /// The message with `id`, created as an empty assistant placeholder if absent.
    fn streaming_message(&mut self, id: &MessageId) -> &mut ChatMessage {
        let pos = match self.position(id) {
            Some(pos) => pos,
            None => {
                self.messages.push(ChatMessage::streaming(id.clone()));
                self.messages.len() - 1
            }
        };
        &mut self.messages[pos]
    }

    pub fn apply(&mut self, envelope: &EventEnvelope) -> Outcome {
        if !envelope.chat_id.is_empty() && envelope.chat_id != self.chat_id {
            return Outcome::Ignored;
        }
        let outcome = self.apply_kind(&envelope.kind);
        if !envelope.seq.is_empty() {
            self.last_seq = Some(envelope.seq.clone());
        }
        outcome
    }

    fn apply_kind(&mut self, kind: &EventKind) -> Outcome {
        match kind {
            EventKind::Snapshot {
                thread,
                runtime,
                messages,
            } => {
                self.thread = thread.clone();
                self.runtime = runtime.clone();
                self.messages = messages.clone();
            }
            EventKind::StreamStarted { message_id } => {
                self.streaming_message(message_id);
            }
            EventKind::StreamDelta { message_id, ops } => {
                let message = self.streaming_message(message_id);
                *message = apply_delta_ops(message, ops);
            }
            EventKind::StreamFinished {
                message_id,
                finish_reason,
            } => {
                self.streaming_message(message_id)
                    .finish_reason
                    .clone_from(finish_reason);
            }
            EventKind::MessageAdded { message, index } => {
                let at = (*index).min(self.messages.len());
                self.messages.insert(at, message.clone());
            }
            EventKind::MessageUpdated {
                message_id,
                message,
            } => match self.position(message_id) {
                Some(pos) => self.messages[pos] = message.clone(),
                None => return Outcome::Ignored,
            },
            EventKind::MessageRemoved { message_id } => {
                let before = self.messages.len();
                self.messages
                    .retain(|m| m.message_id.as_ref() != Some(message_id));
                if self.messages.len() == before {
                    return Outcome::Ignored;
                }
            }
            EventKind::MessagesTruncated { from_index } => self.messages.truncate(*from_index),
            EventKind::ThreadUpdated(patch) => self.thread.apply_patch(patch),
            EventKind::RuntimeUpdated(runtime) => self.runtime = runtime.clone(),
            EventKind::TitleUpdated {
                title,
                is_generated,
            } => {
                self.thread.title.clone_from(title);
                self.thread.is_title_generated = *is_generated;
            }
            EventKind::PauseRequired { reasons } => {
                self.runtime.paused = true;
                self.runtime.pause_reasons = reasons.clone();
            }
            EventKind::PauseCleared => {
                self.runtime.paused = false;
                self.runtime.pause_reasons.clear();
            }
            _ => return Outcome::Ignored,
        }
        Outcome::Applied
    }
}
