use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{self, Sender};
use std::thread;

use tracing::{debug, error};

use super::client::SessionApi;
use crate::error::ClientError;
use crate::models::{Session, SessionCompletion, SessionId, SessionUpdate};

/// Tag attached to every request. Replies whose generation no longer matches
/// the state they were issued for are dropped by the controller.
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    Start {
        name: String,
    },
    /// Counter telemetry after a pomodoro completes or is interrupted.
    Update {
        id: SessionId,
        update: SessionUpdate,
    },
    /// Notes auto-save. Same endpoint as `Update`, but the reply drives the
    /// save indicator.
    SaveNotes {
        id: SessionId,
        notes: String,
    },
    Complete {
        id: SessionId,
        completion: SessionCompletion,
    },
    List,
    Get {
        id: SessionId,
    },
    Delete {
        id: SessionId,
    },
}

impl ApiRequest {
    pub fn execute(&self, api: &dyn SessionApi) -> Result<ApiReply, ClientError> {
        match self {
            ApiRequest::Start { name } => api.start_session(name).map(ApiReply::Started),
            ApiRequest::Update { id, update } => {
                api.update_session(id, update).map(|_| ApiReply::Acknowledged)
            }
            ApiRequest::SaveNotes { id, notes } => api
                .update_session(id, &SessionUpdate::notes(notes.clone()))
                .map(|_| ApiReply::Acknowledged),
            ApiRequest::Complete { id, completion } => api
                .complete_session(id, completion)
                .map(|_| ApiReply::Acknowledged),
            ApiRequest::List => api.list_sessions().map(ApiReply::Sessions),
            ApiRequest::Get { id } => api.get_session(id).map(ApiReply::Session),
            ApiRequest::Delete { id } => api.delete_session(id).map(|_| ApiReply::Acknowledged),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ApiRequest::Start { .. } => "start",
            ApiRequest::Update { .. } => "update",
            ApiRequest::SaveNotes { .. } => "save-notes",
            ApiRequest::Complete { .. } => "complete",
            ApiRequest::List => "list",
            ApiRequest::Get { .. } => "get",
            ApiRequest::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiReply {
    Started(Session),
    Sessions(Vec<Session>),
    Session(Session),
    Acknowledged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub generation: Generation,
    pub request: ApiRequest,
}

#[derive(Debug)]
pub struct ApiResponse {
    pub generation: Generation,
    pub request: ApiRequest,
    pub result: Result<ApiReply, ClientError>,
}

/// Where the controller hands off outgoing requests.
pub trait RequestSink {
    fn submit(&self, envelope: Envelope);
}

/// Runs requests one at a time on a background thread and posts each
/// response onto the UI event channel.
pub struct RequestWorker {
    tx: Sender<Envelope>,
}

impl RequestWorker {
    pub fn spawn<A, T>(api: A, events: Sender<T>) -> Self
    where
        A: SessionApi,
        T: From<ApiResponse> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Envelope>();

        thread::spawn(move || {
            while let Ok(Envelope {
                generation,
                request,
            }) = rx.recv()
            {
                debug!(request = request.name(), generation, "executing API request");
                let result = request.execute(&api);
                let response = ApiResponse {
                    generation,
                    request,
                    result,
                };
                if events.send(T::from(response)).is_err() {
                    break;
                }
            }
        });

        Self { tx }
    }
}

impl RequestSink for RequestWorker {
    fn submit(&self, envelope: Envelope) {
        if let Err(err) = self.tx.send(envelope) {
            error!(request = err.0.request.name(), "request worker has stopped");
        }
    }
}

/// Sink that only records envelopes, for driving the controller headless.
#[derive(Clone, Default)]
pub struct RecordingSink {
    submitted: Rc<RefCell<Vec<Envelope>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains everything submitted so far.
    pub fn take(&self) -> Vec<Envelope> {
        self.submitted.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.submitted.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.submitted.borrow().is_empty()
    }
}

impl RequestSink for RecordingSink {
    fn submit(&self, envelope: Envelope) {
        self.submitted.borrow_mut().push(envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct FakeApi {
        calls: Arc<Mutex<Vec<String>>>,
    }

    fn session(id: u64, name: &str) -> Session {
        serde_json::from_value(serde_json::json!({ "id": id, "session_name": name })).unwrap()
    }

    impl SessionApi for FakeApi {
        fn start_session(&self, name: &str) -> Result<Session, ClientError> {
            self.calls.lock().unwrap().push(format!("start {name}"));
            Ok(session(1, name))
        }
        fn update_session(&self, id: &SessionId, update: &SessionUpdate) -> Result<(), ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update {id} {:?}", update.notes));
            Ok(())
        }
        fn complete_session(
            &self,
            id: &SessionId,
            completion: &SessionCompletion,
        ) -> Result<(), ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("complete {id} {}", completion.total_duration));
            Ok(())
        }
        fn list_sessions(&self) -> Result<Vec<Session>, ClientError> {
            self.calls.lock().unwrap().push("list".into());
            Err(ClientError::Status(500))
        }
        fn get_session(&self, id: &SessionId) -> Result<Session, ClientError> {
            self.calls.lock().unwrap().push(format!("get {id}"));
            Ok(session(2, "Biology"))
        }
        fn delete_session(&self, id: &SessionId) -> Result<(), ClientError> {
            self.calls.lock().unwrap().push(format!("delete {id}"));
            Ok(())
        }
    }

    #[test]
    fn save_notes_goes_through_update_endpoint() {
        let api = FakeApi::default();
        let request = ApiRequest::SaveNotes {
            id: SessionId::from(4),
            notes: "abcd".into(),
        };
        assert_eq!(request.execute(&api).unwrap(), ApiReply::Acknowledged);
        assert_eq!(
            api.calls.lock().unwrap().as_slice(),
            ["update 4 Some(\"abcd\")"]
        );
    }

    #[test]
    fn worker_replies_in_submission_order_with_tags() {
        let api = FakeApi::default();
        let (tx, rx) = mpsc::channel::<ApiResponse>();
        let worker = RequestWorker::spawn(api.clone(), tx);

        worker.submit(Envelope {
            generation: 1,
            request: ApiRequest::Start {
                name: "Algebra".into(),
            },
        });
        worker.submit(Envelope {
            generation: 7,
            request: ApiRequest::List,
        });

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.generation, 1);
        assert!(matches!(first.result, Ok(ApiReply::Started(ref s)) if s.session_name == "Algebra"));

        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(second.generation, 7);
        assert_eq!(second.request, ApiRequest::List);
        assert!(matches!(second.result, Err(ClientError::Status(500))));

        assert_eq!(
            api.calls.lock().unwrap().as_slice(),
            ["start Algebra", "list"]
        );
    }
}
