use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};

use crate::error::ClientError;
use crate::models::{Session, SessionId};

const PREVIEW_CHARS: usize = 100;
pub const EMPTY_HISTORY_MESSAGE: &str = "No study sessions yet. Start your first session!";
pub const HISTORY_ERROR_MESSAGE: &str = "Error loading sessions. Make sure the backend is running.";
const NO_NOTES_PREVIEW: &str = "No notes taken";
const NO_NOTES_DETAIL: &str = "No notes taken during this session.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryStatus {
    NotLoaded,
    Loading,
    Empty,
    Failed(String),
    Loaded,
}

/// One rendered row of the history list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: SessionId,
    pub name: String,
    pub duration: String,
    pub pomodoros: String,
    pub date: String,
    pub preview: String,
}

impl HistoryEntry {
    pub fn from_session(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            name: session.session_name.clone(),
            duration: format!("{} min", session.total_duration),
            pomodoros: format!("{} Pomodoros", session.pomodoros_completed),
            date: session
                .created_at
                .map(format_list_date)
                .unwrap_or_else(|| "Unknown date".to_string()),
            preview: notes_preview(&session.notes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryBrowser {
    status: HistoryStatus,
    sessions: Vec<Session>,
    selected: usize,
    detail: Option<Session>,
}

impl Default for HistoryBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBrowser {
    pub fn new() -> Self {
        Self {
            status: HistoryStatus::NotLoaded,
            sessions: Vec::new(),
            selected: 0,
            detail: None,
        }
    }

    pub fn status(&self) -> &HistoryStatus {
        &self.status
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.sessions.iter().map(HistoryEntry::from_session).collect()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_id(&self) -> Option<&SessionId> {
        self.sessions.get(self.selected).map(|s| &s.id)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.sessions.len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn begin_loading(&mut self) {
        self.status = HistoryStatus::Loading;
    }

    pub fn apply_list(&mut self, result: Result<Vec<Session>, &ClientError>) {
        match result {
            Ok(sessions) => {
                self.status = if sessions.is_empty() {
                    HistoryStatus::Empty
                } else {
                    HistoryStatus::Loaded
                };
                self.sessions = sessions;
                self.selected = self.selected.min(self.sessions.len().saturating_sub(1));
            }
            Err(_) => {
                self.status = HistoryStatus::Failed(HISTORY_ERROR_MESSAGE.to_string());
                self.sessions.clear();
                self.selected = 0;
            }
        }
    }

    pub fn detail(&self) -> Option<&Session> {
        self.detail.as_ref()
    }

    pub fn open_detail(&mut self, session: Session) {
        self.detail = Some(session);
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    /// Closes the detail view if it shows `id`.
    pub fn forget(&mut self, id: &SessionId) {
        if self.detail.as_ref().is_some_and(|s| &s.id == id) {
            self.detail = None;
        }
    }

    /// Writes the open detail view to `dir` as plain text.
    pub fn export_detail(&self, dir: &Path) -> Result<PathBuf, ClientError> {
        let session = self
            .detail
            .as_ref()
            .ok_or_else(|| ClientError::validation("Open a session to export its notes"))?;
        let path = dir.join(export_file_name(&session.session_name));
        fs::write(&path, export_contents(session)).map_err(|source| ClientError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// First 100 characters of the notes, with `...` when cut.
pub fn notes_preview(notes: &str) -> String {
    if notes.is_empty() {
        return NO_NOTES_PREVIEW.to_string();
    }
    let mut preview: String = notes.chars().take(PREVIEW_CHARS).collect();
    if notes.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

pub fn detail_notes(session: &Session) -> &str {
    if session.notes.is_empty() {
        NO_NOTES_DETAIL
    } else {
        &session.notes
    }
}

pub fn format_list_date(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%b %-d, %Y, %I:%M %p")
        .to_string()
}

pub fn format_detail_date(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%A, %B %-d, %Y at %I:%M %p")
        .to_string()
}

pub fn export_file_name(session_name: &str) -> String {
    let stem: String = session_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{stem}_notes.txt")
}

pub fn export_contents(session: &Session) -> String {
    let date = session
        .created_at
        .map(format_detail_date)
        .unwrap_or_default();
    format!(
        "Study Session: {}\nDate: {}\n\n{}",
        session.session_name,
        date,
        detail_notes(session)
    )
}
