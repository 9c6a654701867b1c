//! Reads one streamed answer and turns it into transcript snapshots and
//! speech.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures_util::{pin_mut, StreamExt};
use llm_core::{decode_increments, AnswerSource, BackendClient, ChatRequest, StreamError};
use tracing::debug;
use tts_core::{SentenceSegmenter, SpeechDispatcher};

use crate::error::AppError;

/// What a finished turn produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnSummary {
    /// Concatenation of every increment.
    pub text: String,
    pub increments: usize,
    /// Sentences handed to the speech engine.
    pub sentences: usize,
    /// Time from sending the request to the first increment.
    pub first_increment_after: Option<Duration>,
}

struct StreamState {
    accumulated: String,
    segmenter: SentenceSegmenter,
    is_first_increment: bool,
}

impl StreamState {
    fn new() -> Self {
        Self {
            accumulated: String::new(),
            segmenter: SentenceSegmenter::new(),
            is_first_increment: true,
        }
    }
}

#[derive(Clone)]
pub struct StreamConsumer {
    source: Arc<dyn AnswerSource>,
    dispatcher: SpeechDispatcher,
}

impl StreamConsumer {
    pub fn new(source: Arc<dyn AnswerSource>, dispatcher: SpeechDispatcher) -> Self {
        Self { source, dispatcher }
    }

    /// Consumer reading answers from the HTTP backend at `backend_url`.
    pub fn connect(backend_url: &str, dispatcher: SpeechDispatcher) -> Result<Self, AppError> {
        let client = BackendClient::new(backend_url)?;
        Ok(Self::new(Arc::new(client), dispatcher))
    }

    /// Run one turn.
    ///
    /// `on_snapshot` gets the full text received so far after every
    /// increment. Complete sentences are spoken as soon as they close and
    /// the unterminated rest once the body ends. On error nothing more is
    /// spoken; utterances already dispatched are left alone.
    pub async fn run<F>(&self, request: ChatRequest, mut on_snapshot: F) -> Result<TurnSummary, StreamError>
    where
        F: FnMut(&str) + Send,
    {
        let sent_at = Instant::now();
        let body = self.source.open(request).await?;
        let increments = decode_increments(body);
        pin_mut!(increments);

        let mut state = StreamState::new();
        let mut summary = TurnSummary::default();

        while let Some(increment) = increments.next().await {
            let increment = increment?;
            if state.is_first_increment {
                state.is_first_increment = false;
                summary.first_increment_after = Some(sent_at.elapsed());
                debug!("First increment after {:?}", sent_at.elapsed());
            }

            state.accumulated.push_str(&increment);
            let sentence = state.segmenter.feed(&increment);
            on_snapshot(&state.accumulated);
            summary.increments += 1;

            if let Some(sentence) = sentence {
                if self.dispatcher.speak(&sentence).is_some() {
                    summary.sentences += 1;
                }
            }
        }

        if let Some(rest) = state.segmenter.flush() {
            if self.dispatcher.speak(&rest).is_some() {
                summary.sentences += 1;
            }
        }

        debug!(
            "Stream ended: {} increments, {} chars",
            summary.increments,
            state.accumulated.chars().count()
        );
        summary.text = state.accumulated;
        Ok(summary)
    }
}
