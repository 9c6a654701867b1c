//! Conversation state machine.
//!
//! The controller owns the transcript and the composer and allows a single
//! turn in flight. A turn is one tokio task running the stream consumer;
//! the conversation lock is only taken between awaits, never across one.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use llm_core::ChatRequest;
use tokio::{
    sync::broadcast,
    task::{AbortHandle, JoinHandle},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    attachment::{Attachment, AttachmentRef, Composer},
    consumer::{StreamConsumer, TurnSummary},
    error::AppError,
    metrics::TurnMetrics,
    motion::{Motion, MotionActuator},
    transcript::{Message, MessageStatus, TranscriptEvent, TranscriptStore},
    validation::{validate_send, InputRejection},
};

/// Text left in an AI message cancelled before anything arrived.
pub const CANCELLED_NOTICE: &str = "(cancelled)";

/// Motion played when a question is accepted.
const ACKNOWLEDGE_MOTION: Motion = Motion::TapBody1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Sending,
}

enum Phase {
    Idle,
    Sending { turn_id: Uuid, abort: AbortHandle },
}

struct Conversation {
    phase: Phase,
    transcript: TranscriptStore,
    composer: Composer,
}

impl Conversation {
    fn is_current(&self, turn: Uuid) -> bool {
        matches!(self.phase, Phase::Sending { turn_id, .. } if turn_id == turn)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed(TurnSummary),
    /// The reason written into the AI message.
    Failed(String),
    Cancelled,
}

/// Resolves once the turn it was returned for has ended.
#[derive(Debug)]
pub struct TurnHandle {
    id: Uuid,
    task: JoinHandle<TurnOutcome>,
}

impl TurnHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn finished(self) -> TurnOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => TurnOutcome::Cancelled,
            Err(e) => TurnOutcome::Failed(e.to_string()),
        }
    }
}

#[derive(Debug)]
pub enum SendOutcome {
    Started(TurnHandle),
    Rejected(InputRejection),
}

impl SendOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, SendOutcome::Started(_))
    }

    pub fn into_handle(self) -> Option<TurnHandle> {
        match self {
            SendOutcome::Started(handle) => Some(handle),
            SendOutcome::Rejected(_) => None,
        }
    }
}

pub struct ConversationController {
    conversation: Arc<Mutex<Conversation>>,
    consumer: StreamConsumer,
    actuator: Arc<dyn MotionActuator>,
    metrics: TurnMetrics,
    completion_motion: Option<Motion>,
}

fn lock(conversation: &Mutex<Conversation>) -> MutexGuard<'_, Conversation> {
    conversation.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConversationController {
    pub fn new(consumer: StreamConsumer, actuator: Arc<dyn MotionActuator>, completion_motion: Option<Motion>) -> Self {
        Self {
            conversation: Arc::new(Mutex::new(Conversation {
                phase: Phase::Idle,
                transcript: TranscriptStore::new(),
                composer: Composer::default(),
            })),
            consumer,
            actuator,
            metrics: TurnMetrics::new(),
            completion_motion,
        }
    }

    pub fn state(&self) -> ControllerState {
        match lock(&self.conversation).phase {
            Phase::Idle => ControllerState::Idle,
            Phase::Sending { .. } => ControllerState::Sending,
        }
    }

    pub fn transcript(&self) -> Vec<Message> {
        lock(&self.conversation).transcript.messages().to_vec()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        lock(&self.conversation).transcript.subscribe()
    }

    pub fn metrics(&self) -> &TurnMetrics {
        &self.metrics
    }

    /// Start a turn with the given input.
    ///
    /// Must be called from within a tokio runtime. The user message and the
    /// AI placeholder are in the transcript when this returns.
    pub fn send(&self, text: &str, attachments: Vec<Attachment>) -> SendOutcome {
        let mut conversation = lock(&self.conversation);
        if let Err(rejection) = self.admit(&conversation, text, attachments.len()) {
            return SendOutcome::Rejected(rejection);
        }
        SendOutcome::Started(self.start_turn(&mut conversation, text.to_string(), attachments))
    }

    /// Send whatever is staged in the composer. Staged input is kept when
    /// the send is rejected.
    pub fn submit(&self) -> SendOutcome {
        let mut conversation = lock(&self.conversation);
        let staged = &conversation.composer;
        if let Err(rejection) = self.admit(&conversation, staged.text(), staged.attachments().len()) {
            return SendOutcome::Rejected(rejection);
        }
        let (text, attachments) = conversation.composer.take();
        SendOutcome::Started(self.start_turn(&mut conversation, text, attachments))
    }

    /// Clear the transcript and staged input. Ignored while a turn is in
    /// flight.
    pub fn reset(&self) -> Result<(), InputRejection> {
        let mut conversation = lock(&self.conversation);
        if let Phase::Sending { .. } = conversation.phase {
            debug!("Reset ignored: {}", InputRejection::Busy);
            self.metrics.record_rejected();
            return Err(InputRejection::Busy);
        }
        conversation.transcript.reset();
        conversation.composer.clear();
        info!("Conversation reset");
        Ok(())
    }

    /// Abort the turn in flight, keeping whatever text already arrived.
    /// Returns false when there was nothing to cancel.
    pub fn cancel(&self) -> bool {
        let mut conversation = lock(&self.conversation);
        let Phase::Sending { turn_id, abort } = std::mem::replace(&mut conversation.phase, Phase::Idle) else {
            return false;
        };
        abort.abort();

        let nothing_arrived = conversation
            .transcript
            .last()
            .is_some_and(|m| m.status == MessageStatus::Pending);
        let text = nothing_arrived.then(|| CANCELLED_NOTICE.to_string());
        if let Err(e) = conversation.transcript.finish_last_ai(MessageStatus::Cancelled, text) {
            warn!("Cancelled turn {} had no open answer: {}", turn_id, e);
        }
        self.metrics.record_cancelled();
        info!("Turn {} cancelled", turn_id);
        true
    }

    pub fn stage_text(&self, text: impl Into<String>) {
        lock(&self.conversation).composer.set_text(text);
    }

    pub fn stage_file(&self, path: &Path) -> Result<AttachmentRef, AppError> {
        let attachment = Attachment::from_path(path)?;
        let reference = attachment.reference().clone();
        lock(&self.conversation).composer.stage(attachment);
        Ok(reference)
    }

    /// Stage pasted data. Returns `None` when it is not an image.
    pub fn stage_clipboard(&self, name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Option<AttachmentRef> {
        lock(&self.conversation).composer.paste(name, mime, data)
    }

    pub fn remove_staged(&self, index: usize) -> Option<AttachmentRef> {
        lock(&self.conversation)
            .composer
            .remove(index)
            .map(|a| a.reference().clone())
    }

    pub fn staged(&self) -> Vec<AttachmentRef> {
        lock(&self.conversation)
            .composer
            .attachments()
            .iter()
            .map(|a| a.reference().clone())
            .collect()
    }

    pub fn play_motion(&self, motion: Motion) {
        self.actuator.play(motion);
    }

    fn admit(&self, conversation: &Conversation, text: &str, attachment_count: usize) -> Result<(), InputRejection> {
        let verdict = match conversation.phase {
            Phase::Sending { .. } => Err(InputRejection::Busy),
            Phase::Idle => validate_send(text, attachment_count),
        };
        if let Err(rejection) = verdict {
            debug!("Send ignored: {}", rejection);
            self.metrics.record_rejected();
        }
        verdict
    }

    fn start_turn(&self, conversation: &mut Conversation, text: String, attachments: Vec<Attachment>) -> TurnHandle {
        let turn_id = Uuid::new_v4();
        let references = attachments.iter().map(|a| a.reference().clone()).collect();
        conversation.transcript.append_user(text.clone(), references);
        self.actuator.play(ACKNOWLEDGE_MOTION);
        conversation.transcript.append_placeholder_ai();

        let mut request = ChatRequest::new(text);
        if let Some(first) = attachments.first() {
            request = request.with_file(first.to_file_part());
        }
        if attachments.len() > 1 {
            warn!(
                "Only the first of {} attachments is sent, the backend takes a single file",
                attachments.len()
            );
        }

        let task = tokio::spawn(run_turn(
            turn_id,
            request,
            self.conversation.clone(),
            self.consumer.clone(),
            self.actuator.clone(),
            self.metrics.clone(),
            self.completion_motion,
        ));
        conversation.phase = Phase::Sending {
            turn_id,
            abort: task.abort_handle(),
        };
        self.metrics.record_started();
        info!("Turn {} started", turn_id);

        TurnHandle { id: turn_id, task }
    }
}

impl Drop for ConversationController {
    fn drop(&mut self) {
        if let Phase::Sending { turn_id, abort } = &lock(&self.conversation).phase {
            debug!("Aborting turn {} on shutdown", turn_id);
            abort.abort();
        }
    }
}

async fn run_turn(
    turn_id: Uuid,
    request: ChatRequest,
    conversation: Arc<Mutex<Conversation>>,
    consumer: StreamConsumer,
    actuator: Arc<dyn MotionActuator>,
    metrics: TurnMetrics,
    completion_motion: Option<Motion>,
) -> TurnOutcome {
    let snapshots = conversation.clone();
    let result = consumer
        .run(request, move |text| {
            let mut conversation = lock(&snapshots);
            if conversation.is_current(turn_id) {
                if let Err(e) = conversation.transcript.update_last_ai(text) {
                    warn!("Dropped snapshot for turn {}: {}", turn_id, e);
                }
            }
        })
        .await;

    let mut conversation = lock(&conversation);
    if !conversation.is_current(turn_id) {
        return TurnOutcome::Cancelled;
    }

    let outcome = match result {
        Ok(summary) => {
            if let Err(e) = conversation.transcript.finish_last_ai(MessageStatus::Complete, None) {
                warn!("Turn {} had no open answer: {}", turn_id, e);
            }
            metrics.record_completed(summary.sentences, summary.first_increment_after);
            if let Some(motion) = completion_motion {
                actuator.play(motion);
            }
            info!(
                "Turn {} complete ({} increments, {} sentences)",
                turn_id, summary.increments, summary.sentences
            );
            TurnOutcome::Completed(summary)
        }
        Err(e) => {
            error!("Turn {} failed: {}", turn_id, e);
            let message = format!("An error occurred: {e}");
            if let Err(e) = conversation
                .transcript
                .finish_last_ai(MessageStatus::Failed, Some(message.clone()))
            {
                warn!("Turn {} had no open answer: {}", turn_id, e);
            }
            metrics.record_failed();
            TurnOutcome::Failed(message)
        }
    };
    conversation.phase = Phase::Idle;
    outcome
}
