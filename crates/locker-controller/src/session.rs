//! Per-transaction user context.

use locker_core::{IdentifierPolicy, SubjectId, Timestamp};

/// What the controller knows about the user in front of the locker.
///
/// The input buffer only ever holds ASCII digits and never grows past the
/// policy maximum; extra digits are dropped.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    input: String,
    max_len: usize,
    current_subject: Option<SubjectId>,
    last_subject: Option<SubjectId>,
    last_activity: Timestamp,
}

impl SessionContext {
    pub fn new(policy: &IdentifierPolicy) -> Self {
        Self {
            input: String::with_capacity(policy.max_len),
            max_len: policy.max_len,
            ..Default::default()
        }
    }

    /// Append a digit. Returns `false` if the buffer is full or `digit` is
    /// not a decimal digit.
    pub fn push_digit(&mut self, digit: char, now: Timestamp) -> bool {
        self.last_activity = now;
        if !digit.is_ascii_digit() || self.input.len() >= self.max_len {
            return false;
        }
        self.input.push(digit);
        true
    }

    /// Remove the last digit. Returns `false` if the buffer was empty.
    pub fn backspace(&mut self, now: Timestamp) -> bool {
        self.last_activity = now;
        self.input.pop().is_some()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_len(&self) -> usize {
        self.input.len()
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
    }

    /// Start a fresh entry at `now`.
    pub fn begin_entry(&mut self, now: Timestamp) {
        self.input.clear();
        self.current_subject = None;
        self.last_activity = now;
    }

    pub fn last_activity(&self) -> Timestamp {
        self.last_activity
    }

    pub fn set_current_subject(&mut self, subject: SubjectId) {
        self.current_subject = Some(subject);
    }

    pub fn current_subject(&self) -> Option<&SubjectId> {
        self.current_subject.as_ref()
    }

    /// Commit the current subject as the holder of the item.
    pub fn commit_borrow(&mut self) {
        if let Some(subject) = self.current_subject.take() {
            self.last_subject = Some(subject);
        }
    }

    pub fn last_subject(&self) -> Option<&SubjectId> {
        self.last_subject.as_ref()
    }

    /// Forget the holder once the item is back.
    pub fn take_last_subject(&mut self) -> Option<SubjectId> {
        self.last_subject.take()
    }

    /// Drop the in-flight entry and subject; the holder is kept.
    pub fn reset(&mut self) {
        self.input.clear();
        self.current_subject = None;
    }
}
