//! Notes buffer with debounced auto-save.
//!
//! The buffer never talks to the network itself. Callers poll it with the
//! current instant and get back the text to persist, then report how the
//! save went. That keeps the debounce deterministic under test.

use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);
const SAVED_VISIBLE_FOR: Duration = Duration::from_secs(2);
const ERROR_VISIBLE_FOR: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotesEdit {
    Insert(char),
    InsertStr(String),
    Newline,
    Backspace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Indicator {
    Idle,
    Saving,
    Saved { until: Instant },
    Error { until: Instant },
}

#[derive(Debug, Clone)]
pub struct NotesBuffer {
    text: String,
    last_saved: String,
    enabled: bool,
    debounce: Duration,
    deadline: Option<Instant>,
    indicator: Indicator,
}

impl NotesBuffer {
    pub fn new(debounce: Duration) -> Self {
        Self {
            text: String::new(),
            last_saved: String::new(),
            enabled: false,
            debounce,
            deadline: None,
            indicator: Indicator::Idle,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.text != self.last_saved
    }

    /// Clears the buffer and pending save. Used when a session starts
    /// (`enabled = true`) or ends (`enabled = false`).
    pub fn reset(&mut self, enabled: bool) {
        *self = Self {
            enabled,
            ..Self::new(self.debounce)
        };
    }

    /// Applies an edit and re-arms the debounce. Ignored while disabled.
    pub fn edit(&mut self, edit: NotesEdit, now: Instant) -> bool {
        if !self.enabled {
            return false;
        }
        match edit {
            NotesEdit::Insert(c) => self.text.push(c),
            NotesEdit::InsertStr(s) => self.text.push_str(&s),
            NotesEdit::Newline => self.text.push('\n'),
            NotesEdit::Backspace => {
                self.text.pop();
            }
        }
        self.deadline = Some(now + self.debounce);
        self.indicator = Indicator::Saving;
        true
    }

    pub fn save_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns the text to save once the debounce deadline has passed.
    pub fn take_due(&mut self, now: Instant, session_active: bool) -> Option<String> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.begin_save(session_active)
            }
            _ => None,
        }
    }

    /// Manual save: skips the debounce entirely.
    pub fn save_now(&mut self, session_active: bool) -> Option<String> {
        self.deadline = None;
        self.begin_save(session_active)
    }

    fn begin_save(&mut self, session_active: bool) -> Option<String> {
        if !session_active || !self.has_unsaved_changes() {
            if self.indicator == Indicator::Saving {
                self.indicator = Indicator::Idle;
            }
            return None;
        }
        self.indicator = Indicator::Saving;
        Some(self.text.clone())
    }

    pub fn mark_saved(&mut self, saved: String, now: Instant) {
        self.last_saved = saved;
        // A newer edit is already waiting on the debounce.
        if self.deadline.is_some() {
            return;
        }
        self.indicator = Indicator::Saved {
            until: now + SAVED_VISIBLE_FOR,
        };
    }

    pub fn mark_failed(&mut self, now: Instant) {
        self.indicator = Indicator::Error {
            until: now + ERROR_VISIBLE_FOR,
        };
    }

    pub fn status(&self, now: Instant) -> SaveStatus {
        match self.indicator {
            Indicator::Idle => SaveStatus::Idle,
            Indicator::Saving => SaveStatus::Saving,
            Indicator::Saved { until } if now < until => SaveStatus::Saved,
            Indicator::Error { until } if now < until => SaveStatus::Error,
            Indicator::Saved { .. } | Indicator::Error { .. } => SaveStatus::Idle,
        }
    }
}

impl Default for NotesBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> NotesBuffer {
        let mut notes = NotesBuffer::default();
        notes.reset(true);
        notes
    }

    fn type_str(notes: &mut NotesBuffer, s: &str, now: Instant) {
        for c in s.chars() {
            notes.edit(NotesEdit::Insert(c), now);
        }
    }

    #[test]
    fn edits_ignored_while_disabled() {
        let mut notes = NotesBuffer::default();
        assert!(!notes.edit(NotesEdit::Insert('a'), Instant::now()));
        assert_eq!(notes.text(), "");
        assert!(!notes.save_pending());
    }

    #[test]
    fn char_count_tracks_edits_immediately() {
        let mut notes = enabled();
        let now = Instant::now();
        type_str(&mut notes, "héllo", now);
        assert_eq!(notes.char_count(), 5);
        notes.edit(NotesEdit::Backspace, now);
        notes.edit(NotesEdit::Newline, now);
        assert_eq!(notes.text(), "héll\n");
        assert_eq!(notes.char_count(), 5);
    }

    #[test]
    fn saving_indicator_shown_as_soon_as_text_changes() {
        let mut notes = enabled();
        let now = Instant::now();
        assert_eq!(notes.status(now), SaveStatus::Idle);
        notes.edit(NotesEdit::Insert('a'), now);
        assert_eq!(notes.status(now), SaveStatus::Saving);
    }

    #[test]
    fn debounce_collapses_bursts_into_one_save() {
        let mut notes = enabled();
        let t0 = Instant::now();
        type_str(&mut notes, "abc", t0);
        notes.edit(NotesEdit::Insert('d'), t0 + Duration::from_millis(500));

        assert_eq!(notes.take_due(t0 + Duration::from_millis(2000), true), None);
        assert_eq!(
            notes.take_due(t0 + Duration::from_millis(2500), true),
            Some("abcd".to_string())
        );
        assert_eq!(notes.take_due(t0 + Duration::from_millis(5000), true), None);
    }

    #[test]
    fn unchanged_text_is_not_saved_again() {
        let mut notes = enabled();
        let t0 = Instant::now();
        type_str(&mut notes, "abc", t0);
        let text = notes.take_due(t0 + DEFAULT_DEBOUNCE, true).unwrap();
        notes.mark_saved(text, t0 + DEFAULT_DEBOUNCE);

        // Type and delete: content is back to what the server already has.
        let t1 = t0 + Duration::from_secs(10);
        notes.edit(NotesEdit::Insert('x'), t1);
        notes.edit(NotesEdit::Backspace, t1);
        assert_eq!(notes.take_due(t1 + DEFAULT_DEBOUNCE, true), None);
        assert_eq!(notes.status(t1 + DEFAULT_DEBOUNCE), SaveStatus::Idle);
        assert_eq!(notes.save_now(true), None);
    }

    #[test]
    fn no_save_without_active_session() {
        let mut notes = enabled();
        let t0 = Instant::now();
        type_str(&mut notes, "abc", t0);
        assert_eq!(notes.take_due(t0 + DEFAULT_DEBOUNCE, false), None);
        assert!(notes.has_unsaved_changes());
    }

    #[test]
    fn manual_save_bypasses_debounce() {
        let mut notes = enabled();
        let t0 = Instant::now();
        type_str(&mut notes, "abc", t0);
        assert_eq!(notes.save_now(true), Some("abc".to_string()));
        assert!(!notes.save_pending());
        assert_eq!(notes.take_due(t0 + DEFAULT_DEBOUNCE, true), None);
    }

    #[test]
    fn saved_indicator_clears_after_two_seconds() {
        let mut notes = enabled();
        let t0 = Instant::now();
        type_str(&mut notes, "a", t0);
        let text = notes.save_now(true).unwrap();
        notes.mark_saved(text, t0);
        assert_eq!(notes.status(t0 + Duration::from_millis(1999)), SaveStatus::Saved);
        assert_eq!(notes.status(t0 + Duration::from_secs(2)), SaveStatus::Idle);
        assert!(!notes.has_unsaved_changes());
    }

    #[test]
    fn error_indicator_clears_after_three_seconds() {
        let mut notes = enabled();
        let t0 = Instant::now();
        type_str(&mut notes, "a", t0);
        notes.mark_failed(t0);
        assert_eq!(notes.status(t0 + Duration::from_millis(2999)), SaveStatus::Error);
        assert_eq!(notes.status(t0 + Duration::from_secs(3)), SaveStatus::Idle);
        assert!(notes.has_unsaved_changes());
    }

    #[test]
    fn edit_during_in_flight_save_keeps_saving_state() {
        let mut notes = enabled();
        let t0 = Instant::now();
        type_str(&mut notes, "ab", t0);
        let sent = notes.save_now(true).unwrap();
        notes.edit(NotesEdit::Insert('c'), t0);
        notes.mark_saved(sent, t0);
        assert_eq!(notes.status(t0), SaveStatus::Saving);
        assert!(notes.has_unsaved_changes());
        assert_eq!(notes.take_due(t0 + DEFAULT_DEBOUNCE, true), Some("abc".into()));
    }

    #[test]
    fn reset_drops_text_and_pending_save() {
        let mut notes = enabled();
        let t0 = Instant::now();
        type_str(&mut notes, "abc", t0);
        notes.reset(false);
        assert_eq!(notes.text(), "");
        assert!(!notes.is_enabled());
        assert!(!notes.save_pending());
        assert!(!notes.has_unsaved_changes());
    }
}
