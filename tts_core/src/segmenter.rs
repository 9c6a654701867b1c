//! Incremental sentence segmentation for streamed text.
//!
//! Text arrives in arbitrary increments. Each increment is appended to a
//! running buffer and only the increment itself is scanned for a sentence
//! terminator (`.`, `!`, `?` or a newline). When one is seen, everything
//! accumulated since the previous emission is released as one speakable
//! unit. This trades grammatical accuracy for latency: speech can start as
//! soon as a likely boundary shows up.

/// Characters treated as the end of a speakable unit.
const TERMINATORS: [char; 4] = ['.', '!', '?', '\n'];

fn has_terminator(text: &str) -> bool {
    text.contains(TERMINATORS)
}

#[derive(Debug, Default, Clone)]
pub struct SentenceSegmenter {
    buffer: String,
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one increment. Returns the completed unit when the increment
    /// contains at least one terminator.
    ///
    /// A single increment yields at most one unit, even if it holds several
    /// terminators: the unit covers everything buffered so far.
    pub fn feed(&mut self, chunk: &str) -> Option<String> {
        if chunk.is_empty() {
            return None;
        }
        self.buffer.push_str(chunk);
        if has_terminator(chunk) {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    /// Release whatever is still buffered. Call once when the stream ends.
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}
