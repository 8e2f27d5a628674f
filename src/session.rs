use crate::api::{ApiRequest, Envelope, Generation};
use crate::error::ClientError;
use crate::models::{Session, SessionId};

/// The session the client is currently recording into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub id: SessionId,
    pub name: String,
    pub generation: Generation,
}

/// Tracks which server session is active and which replies still apply to
/// it. At most one session is active at a time.
#[derive(Debug, Default)]
pub struct SessionLifecycle {
    active: Option<ActiveSession>,
    pending_start: Option<Generation>,
    ending: bool,
    generation: Generation,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_starting(&self) -> bool {
        self.pending_start.is_some()
    }

    pub fn is_ending(&self) -> bool {
        self.ending
    }

    /// Validates the name and builds the start request.
    pub fn request_start(&mut self, name: &str) -> Result<Envelope, ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::validation("Please enter a study topic name"));
        }
        if self.active.is_some() || self.pending_start.is_some() {
            return Err(ClientError::validation(
                "End the current session before starting a new one",
            ));
        }

        self.generation += 1;
        self.pending_start = Some(self.generation);
        Ok(Envelope {
            generation: self.generation,
            request: ApiRequest::Start {
                name: name.to_string(),
            },
        })
    }

    /// Activates the session returned by the server. Returns false when the
    /// reply does not belong to the outstanding start request.
    pub fn accept_started(&mut self, generation: Generation, session: Session) -> bool {
        if self.pending_start != Some(generation) {
            return false;
        }
        self.pending_start = None;
        self.ending = false;
        self.active = Some(ActiveSession {
            id: session.id,
            name: session.session_name,
            generation,
        });
        true
    }

    pub fn start_failed(&mut self, generation: Generation) -> bool {
        if self.pending_start != Some(generation) {
            return false;
        }
        self.pending_start = None;
        true
    }

    /// Whether a reply tagged `generation` still concerns the active session.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    }

    /// Wraps a request for the active session, or `None` without one.
    pub fn envelope(&self, build: impl FnOnce(SessionId) -> ApiRequest) -> Option<Envelope> {
        self.active.as_ref().map(|active| Envelope {
            generation: active.generation,
            request: build(active.id.clone()),
        })
    }

    /// Marks the active session as being finalized. Returns false when there
    /// is nothing to end or an end request is already in flight.
    pub fn begin_end(&mut self) -> bool {
        if self.active.is_none() || self.ending {
            return false;
        }
        self.ending = true;
        true
    }

    pub fn finish_end(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.active = None;
        self.ending = false;
        true
    }

    pub fn end_failed(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.ending = false;
        true
    }

    /// Drops the active session if it is `id`, e.g. after the server record
    /// was deleted. Replies still in flight for it become stale.
    pub fn forget(&mut self, id: &SessionId) -> bool {
        if !self.active.as_ref().is_some_and(|active| active.id == *id) {
            return false;
        }
        self.active = None;
        self.ending = false;
        true
    }
}
