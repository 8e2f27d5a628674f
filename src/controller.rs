//! Single dispatcher for UI intents and request replies.
//!
//! All client state lives here and is only touched from the UI thread:
//! intents and runtime ticks come in through [`StudyController::dispatch`]
//! and [`StudyController::on_tick`], request replies through
//! [`StudyController::on_response`]. Outgoing requests leave through a
//! [`RequestSink`], so the controller never blocks on the network.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::api::{ApiReply, ApiRequest, ApiResponse, Envelope, Generation, RequestSink};
use crate::error::ClientError;
use crate::history::HistoryBrowser;
use crate::models::{SessionCompletion, SessionId, SessionUpdate};
use crate::notes::{NotesBuffer, NotesEdit};
use crate::session::SessionLifecycle;
use crate::timer::{Phase, PhaseCompletion, PhaseDurations, PomodoroTimer};

const SECOND: Duration = Duration::from_secs(1);
const NOTICE_VISIBLE_FOR: Duration = Duration::from_secs(4);
const CUE_VISIBLE_FOR: Duration = Duration::from_secs(3);

/// Typed user intents. Confirmation prompts are resolved by the UI before
/// an intent is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    StartSession(String),
    ToggleTimer,
    SkipBreak,
    Interrupt,
    EndSession,
    EditNotes(NotesEdit),
    SaveNotes,
    LoadHistory,
    ShowDetail(SessionId),
    CloseDetail,
    DeleteSession(SessionId),
    ExportDetail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient status-bar message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
    until: Instant,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub durations: PhaseDurations,
    pub debounce: Duration,
    pub export_dir: PathBuf,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            durations: PhaseDurations::default(),
            debounce: crate::notes::DEFAULT_DEBOUNCE,
            export_dir: PathBuf::from("."),
        }
    }
}

pub struct StudyController {
    timer: PomodoroTimer,
    lifecycle: SessionLifecycle,
    notes: NotesBuffer,
    history: HistoryBrowser,
    sink: Box<dyn RequestSink>,
    export_dir: PathBuf,
    next_second: Option<Instant>,
    history_generation: Generation,
    detail_generation: Generation,
    notice: Option<Notice>,
    cue_until: Option<Instant>,
    bell_pending: bool,
}

impl StudyController {
    pub fn new(settings: ControllerSettings, sink: Box<dyn RequestSink>) -> Self {
        Self {
            timer: PomodoroTimer::new(settings.durations),
            lifecycle: SessionLifecycle::new(),
            notes: NotesBuffer::new(settings.debounce),
            history: HistoryBrowser::new(),
            sink,
            export_dir: settings.export_dir,
            next_second: None,
            history_generation: 0,
            detail_generation: 0,
            notice: None,
            cue_until: None,
            bell_pending: false,
        }
    }

    pub fn timer(&self) -> &PomodoroTimer {
        &self.timer
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    pub fn notes(&self) -> &NotesBuffer {
        &self.notes
    }

    pub fn history(&self) -> &HistoryBrowser {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryBrowser {
        &mut self.history
    }

    pub fn notice(&self, now: Instant) -> Option<&Notice> {
        self.notice.as_ref().filter(|n| now < n.until)
    }

    /// True while the phase-completion banner should be highlighted.
    pub fn cue_active(&self, now: Instant) -> bool {
        self.cue_until.is_some_and(|until| now < until)
    }

    /// Returns true once per completed phase so the caller can ring the bell.
    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell_pending)
    }

    pub fn dispatch(&mut self, intent: Intent, now: Instant) {
        match intent {
            Intent::StartSession(name) => self.start_session(&name, now),
            Intent::ToggleTimer => self.toggle_timer(now),
            Intent::SkipBreak => {
                if self.timer.skip_break() {
                    self.next_second = None;
                } else {
                    self.inform(NoticeLevel::Error, "Only breaks can be skipped", now);
                }
            }
            Intent::Interrupt => self.interrupt(now),
            Intent::EndSession => self.end_session(now),
            Intent::EditNotes(edit) => {
                if !self.notes.edit(edit, now) {
                    self.inform(NoticeLevel::Error, "Start a session to take notes", now);
                }
            }
            Intent::SaveNotes => {
                let active = self.lifecycle.is_active();
                if let Some(text) = self.notes.save_now(active) {
                    self.save_notes(text);
                }
            }
            Intent::LoadHistory => self.load_history(),
            Intent::ShowDetail(id) => {
                self.detail_generation += 1;
                self.submit(self.detail_generation, ApiRequest::Get { id });
            }
            Intent::CloseDetail => self.history.close_detail(),
            Intent::DeleteSession(id) => self.submit(0, ApiRequest::Delete { id }),
            Intent::ExportDetail => match self.history.export_detail(&self.export_dir) {
                Ok(path) => {
                    info!(path = %path.display(), "exported notes");
                    let message = format!("Notes exported to {}", path.display());
                    self.inform(NoticeLevel::Info, message, now);
                }
                Err(err) => {
                    warn!(error = %err, "export failed");
                    self.inform(NoticeLevel::Error, err.to_string(), now);
                }
            },
        }
    }

    /// Advances the countdown by whole seconds and fires due auto-saves.
    pub fn on_tick(&mut self, now: Instant) {
        while let Some(due) = self.next_second {
            if now < due || !self.timer.is_running() {
                break;
            }
            self.next_second = Some(due + SECOND);
            if let Some(completion) = self.timer.tick() {
                self.next_second = None;
                self.on_phase_complete(completion, now);
            }
        }

        let active = self.lifecycle.is_active();
        if let Some(text) = self.notes.take_due(now, active) {
            self.save_notes(text);
        }
    }

    pub fn on_response(&mut self, response: ApiResponse, now: Instant) {
        let ApiResponse {
            generation,
            request,
            result,
        } = response;

        match request {
            ApiRequest::Start { name } => match result {
                Ok(ApiReply::Started(session)) => {
                    if self.lifecycle.accept_started(generation, session) {
                        info!(session = %name, "session started");
                        self.timer.begin_session();
                        self.notes.reset(true);
                        self.next_second = None;
                        self.inform(
                            NoticeLevel::Info,
                            "Session started - press space to begin the first Pomodoro",
                            now,
                        );
                    } else {
                        debug!(generation, "discarding stale start reply");
                    }
                }
                Ok(other) => warn!(reply = ?other, "unexpected reply to start"),
                Err(err) => {
                    if self.lifecycle.start_failed(generation) {
                        warn!(error = %err, "failed to start session");
                        self.inform(
                            NoticeLevel::Error,
                            "Failed to start session. Make sure the backend server is running.",
                            now,
                        );
                    }
                }
            },
            ApiRequest::Update { id, .. } => {
                if let Err(err) = result {
                    warn!(session = %id, error = %err, "session update failed");
                }
            }
            ApiRequest::SaveNotes { notes, .. } => {
                if !self.lifecycle.is_current(generation) {
                    debug!(generation, "discarding stale notes reply");
                    return;
                }
                match result {
                    Ok(_) => self.notes.mark_saved(notes, now),
                    Err(err) => {
                        warn!(error = %err, "failed to save notes");
                        self.notes.mark_failed(now);
                    }
                }
            }
            ApiRequest::Complete { id, .. } => {
                if !self.lifecycle.is_current(generation) {
                    debug!(generation, "discarding stale completion reply");
                    return;
                }
                match result {
                    Ok(_) => {
                        self.lifecycle.finish_end(generation);
                        info!(session = %id, "session completed");
                        self.timer.reset();
                        self.notes.reset(false);
                        self.next_second = None;
                        self.inform(NoticeLevel::Info, "Study session completed and saved!", now);
                    }
                    Err(err) => {
                        self.lifecycle.end_failed(generation);
                        warn!(session = %id, error = %err, "failed to complete session");
                        self.inform(
                            NoticeLevel::Error,
                            "Failed to save session. Please try again.",
                            now,
                        );
                    }
                }
            }
            ApiRequest::List => {
                if generation != self.history_generation {
                    debug!(generation, "discarding superseded history reply");
                    return;
                }
                match result {
                    Ok(ApiReply::Sessions(sessions)) => self.history.apply_list(Ok(sessions)),
                    Ok(other) => warn!(reply = ?other, "unexpected reply to list"),
                    Err(err) => {
                        warn!(error = %err, "failed to load history");
                        self.history.apply_list(Err(&err));
                    }
                }
            }
            ApiRequest::Get { id } => {
                if generation != self.detail_generation {
                    debug!(generation, "discarding superseded detail reply");
                    return;
                }
                match result {
                    Ok(ApiReply::Session(session)) => self.history.open_detail(session),
                    Ok(other) => warn!(reply = ?other, "unexpected reply to get"),
                    Err(err) => {
                        warn!(session = %id, error = %err, "failed to load session details");
                        self.inform(NoticeLevel::Error, "Failed to load session details", now);
                    }
                }
            }
            ApiRequest::Delete { id } => match result {
                Ok(_) => {
                    info!(session = %id, "session deleted");
                    if self.lifecycle.forget(&id) {
                        info!(session = %id, "deleted session was active, clearing it");
                        self.timer.reset();
                        self.notes.reset(false);
                        self.next_second = None;
                    }
                    self.history.forget(&id);
                    self.inform(NoticeLevel::Info, "Session deleted successfully", now);
                    self.load_history();
                }
                Err(err) => {
                    warn!(session = %id, error = %err, "failed to delete session");
                    self.inform(NoticeLevel::Error, "Failed to delete session", now);
                }
            },
        }
    }

    /// Whether quitting now would lose notes the server has not seen.
    pub fn has_unsaved_notes(&self) -> bool {
        self.lifecycle.is_active() && self.notes.has_unsaved_changes()
    }

    /// Last-chance save before the process exits. Best effort only.
    pub fn unload_request(&self) -> Option<ApiRequest> {
        if !self.has_unsaved_notes() {
            return None;
        }
        self.lifecycle
            .envelope(|id| ApiRequest::SaveNotes {
                id,
                notes: self.notes.text().to_string(),
            })
            .map(|envelope| envelope.request)
    }

    /// One-line description of what the timer is doing.
    pub fn status_line(&self) -> String {
        if self.lifecycle.is_starting() {
            return "Starting session...".to_string();
        }
        if self.lifecycle.is_ending() {
            return "Saving session...".to_string();
        }
        if !self.lifecycle.is_active() {
            return "No active session - press n to start one".to_string();
        }

        let durations = self.timer.durations();
        let full = durations.seconds(self.timer.phase());
        let running = self.timer.is_running();
        let fresh = self.timer.time_remaining() == full;
        match self.timer.phase() {
            Phase::Idle => "Ready".to_string(),
            Phase::Work if running => "Focus! Pomodoro in progress".to_string(),
            Phase::Work if fresh => "Work session ready - press space to begin".to_string(),
            Phase::ShortBreak if fresh && !running => {
                format!("Take a {}-minute break", durations.short_break.as_secs() / 60)
            }
            Phase::LongBreak if fresh && !running => {
                format!(
                    "Take a {}-minute long break",
                    durations.long_break.as_secs() / 60
                )
            }
            Phase::ShortBreak | Phase::LongBreak if running => "On a break".to_string(),
            _ => "Paused".to_string(),
        }
    }

    fn start_session(&mut self, name: &str, now: Instant) {
        match self.lifecycle.request_start(name) {
            Ok(envelope) => self.sink.submit(envelope),
            Err(err) => self.inform(NoticeLevel::Error, err.to_string(), now),
        }
    }

    fn toggle_timer(&mut self, now: Instant) {
        if !self.lifecycle.is_active() {
            self.inform(NoticeLevel::Error, "Start a session first", now);
            return;
        }
        if self.lifecycle.is_ending() {
            return;
        }
        match self.timer.toggle() {
            Some(true) => self.next_second = Some(now + SECOND),
            Some(false) | None => self.next_second = None,
        }
    }

    fn interrupt(&mut self, now: Instant) {
        if !self.timer.interrupt() {
            return;
        }
        self.next_second = None;
        info!(
            interrupted = self.timer.interrupted_pomodoros(),
            "pomodoro interrupted"
        );
        self.report_progress();
        self.inform(
            NoticeLevel::Info,
            "Pomodoro marked as interrupted - it will not count",
            now,
        );
    }

    fn end_session(&mut self, now: Instant) {
        if !self.lifecycle.is_active() {
            self.inform(NoticeLevel::Error, ClientError::NoActiveSession.to_string(), now);
            return;
        }
        if !self.lifecycle.begin_end() {
            return;
        }
        // Counters are frozen once the completion is on the wire.
        self.timer.pause();
        self.next_second = None;
        let completion = SessionCompletion::from_study_secs(
            self.timer.total_study_secs(),
            self.timer.completed_pomodoros(),
            self.notes.text().to_string(),
        );
        if let Some(envelope) = self
            .lifecycle
            .envelope(|id| ApiRequest::Complete { id, completion })
        {
            self.sink.submit(envelope);
        }
    }

    fn on_phase_complete(&mut self, completion: PhaseCompletion, now: Instant) {
        self.bell_pending = true;
        self.cue_until = Some(now + CUE_VISIBLE_FOR);
        match completion {
            PhaseCompletion::PomodoroCompleted { completed, next } => {
                info!(completed, next = %next, "pomodoro completed");
                self.report_progress();
                self.inform(
                    NoticeLevel::Info,
                    "Pomodoro Complete! Great work! Time for a break.",
                    now,
                );
            }
            PhaseCompletion::BreakFinished => {
                self.inform(NoticeLevel::Info, "Break Over! Ready to focus again?", now);
            }
        }
    }

    /// Fire-and-forget counter update for the active session.
    fn report_progress(&mut self) {
        let update = SessionUpdate {
            notes: Some(self.notes.text().to_string()),
            pomodoros_completed: Some(self.timer.completed_pomodoros()),
            pomodoros_interrupted: Some(self.timer.interrupted_pomodoros()),
        };
        if let Some(envelope) = self
            .lifecycle
            .envelope(|id| ApiRequest::Update { id, update })
        {
            self.sink.submit(envelope);
        }
    }

    fn save_notes(&mut self, notes: String) {
        if let Some(envelope) = self
            .lifecycle
            .envelope(|id| ApiRequest::SaveNotes { id, notes })
        {
            self.sink.submit(envelope);
        }
    }

    fn load_history(&mut self) {
        self.history_generation += 1;
        self.history.begin_loading();
        self.submit(self.history_generation, ApiRequest::List);
    }

    fn submit(&self, generation: Generation, request: ApiRequest) {
        self.sink.submit(Envelope {
            generation,
            request,
        });
    }

    fn inform(&mut self, level: NoticeLevel, message: impl Into<String>, now: Instant) {
        self.notice = Some(Notice {
            message: message.into(),
            level,
            until: now + NOTICE_VISIBLE_FOR,
        });
    }
}
