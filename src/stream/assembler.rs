//! Answer assembly.
//!
//! The backend resends the whole answer so far with every delta. The
//! assembler keeps its own copy and turns each snapshot into the fragment the
//! client has not seen yet.

use super::{CompletionSignal, MessageDelta, TOKEN_LIMIT_TAG};
use crate::util::common_prefix_len;

/// Running state of one upstream call. Never shared between calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyState {
    pub accumulated_text: String,
    pub role_emitted: bool,
    /// Raw finish-detail tag, empty until one arrives.
    pub finish_reason: String,
    pub truncated: bool,
    pub last_conversation_id: Option<String>,
    pub last_message_id: Option<String>,
    pub turn_completed: bool,
}

/// How a new snapshot relates to the accumulated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Increment<'a> {
    /// Snapshot extends the accumulated text by this suffix (possibly empty).
    Extends(&'a str),
    /// Snapshot is a strict prefix of what was already seen.
    Stale,
    /// Snapshot rewrote earlier text; this is everything after the common prefix.
    Diverged(&'a str),
}

/// Classify `full` against the text accumulated so far.
#[must_use]
pub fn increment<'a>(accumulated: &str, full: &'a str) -> Increment<'a> {
    if let Some(suffix) = full.strip_prefix(accumulated) {
        return Increment::Extends(suffix);
    }
    if accumulated.starts_with(full) {
        return Increment::Stale;
    }
    Increment::Diverged(&full[common_prefix_len(accumulated, full)..])
}

/// Output produced by applying one delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyStep {
    /// Role chunk must be written before `fragment`.
    pub announce_role: bool,
    /// Non-empty new text, if any.
    pub fragment: Option<String>,
}

/// Stateful diffing of upstream snapshots.
#[derive(Debug, Default)]
pub struct Assembler {
    state: AssemblyState,
}

impl Assembler {
    /// `role_emitted` is true when an earlier call of the same logical answer
    /// already announced the role.
    #[must_use]
    pub fn new(role_emitted: bool) -> Self {
        Self {
            state: AssemblyState {
                role_emitted,
                ..AssemblyState::default()
            },
        }
    }

    #[must_use]
    pub fn state(&self) -> &AssemblyState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> AssemblyState {
        self.state
    }

    /// Apply one delta. Unusable deltas leave the state untouched.
    pub fn apply(&mut self, delta: &MessageDelta) -> AssemblyStep {
        let Some(full) = delta.usable_text() else {
            return AssemblyStep::default();
        };

        let fragment = match increment(&self.state.accumulated_text, full) {
            Increment::Extends(suffix) => {
                let fragment = suffix.to_string();
                self.state.accumulated_text.push_str(suffix);
                fragment
            }
            Increment::Stale => String::new(),
            Increment::Diverged(tail) => {
                tracing::warn!(
                    previous_len = self.state.accumulated_text.len(),
                    new_len = full.len(),
                    "upstream rewrote earlier answer text"
                );
                let fragment = tail.to_string();
                full.clone_into(&mut self.state.accumulated_text);
                fragment
            }
        };

        let announce_role = !self.state.role_emitted;
        self.state.role_emitted = true;

        if let Some(tag) = delta.finish_details.as_deref() {
            tag.clone_into(&mut self.state.finish_reason);
            self.state.truncated = tag == TOKEN_LIMIT_TAG;
        }
        if let Some(conversation_id) = delta.conversation_id.as_deref() {
            self.state.last_conversation_id = Some(conversation_id.to_string());
        }
        if !delta.message_id.is_empty() {
            self.state.last_message_id = Some(delta.message_id.clone());
        }

        AssemblyStep {
            announce_role,
            fragment: (!fragment.is_empty()).then_some(fragment),
        }
    }

    /// Record an end-of-turn echo. It never contributes text.
    pub fn complete_turn(&mut self, signal: &CompletionSignal) {
        tracing::debug!(
            message_id = %signal.message_id,
            finish_details = signal.finish_details.as_deref().unwrap_or(""),
            "upstream turn completed"
        );
        self.state.turn_completed = true;
    }

    /// Mark the role as announced outside of [`Assembler::apply`].
    pub fn mark_role_emitted(&mut self) {
        self.state.role_emitted = true;
    }
}
