use std::time::Duration;

use tracing::debug;

use crate::error::ClientError;
use crate::models::{Session, SessionCompletion, SessionId, SessionUpdate, StartSession};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000/api";
const API_TIMEOUT: Duration = Duration::from_secs(10);

/// The session endpoints the client consumes.
pub trait SessionApi: Send + 'static {
    fn start_session(&self, name: &str) -> Result<Session, ClientError>;
    fn update_session(&self, id: &SessionId, update: &SessionUpdate) -> Result<(), ClientError>;
    fn complete_session(
        &self,
        id: &SessionId,
        completion: &SessionCompletion,
    ) -> Result<(), ClientError>;
    fn list_sessions(&self) -> Result<Vec<Session>, ClientError>;
    fn get_session(&self, id: &SessionId) -> Result<Session, ClientError>;
    fn delete_session(&self, id: &SessionId) -> Result<(), ClientError>;
}

#[derive(Clone)]
pub struct HttpSessionApi {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpSessionApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(API_TIMEOUT))
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send_json<B: serde::Serialize>(
        &self,
        method: &str,
        path: &str,
        body: &B,
    ) -> Result<String, ClientError> {
        let url = self.url(path);
        let payload = serde_json::to_string(body)?;
        debug!(method, url = %url, "API request");

        let mut response = match method {
            "PUT" => self
                .agent
                .put(url.as_str())
                .header("Content-Type", "application/json")
                .send(&payload)?,
            _ => self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&payload)?,
        };
        Ok(response.body_mut().read_to_string()?)
    }

    fn get_text(&self, path: &str) -> Result<String, ClientError> {
        let url = self.url(path);
        debug!(method = "GET", url = %url, "API request");
        let mut response = self.agent.get(url.as_str()).call()?;
        Ok(response.body_mut().read_to_string()?)
    }
}

impl SessionApi for HttpSessionApi {
    fn start_session(&self, name: &str) -> Result<Session, ClientError> {
        let body = StartSession {
            session_name: name.to_string(),
        };
        let text = self.send_json("POST", "/sessions/start", &body)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn update_session(&self, id: &SessionId, update: &SessionUpdate) -> Result<(), ClientError> {
        self.send_json("PUT", &format!("/sessions/{id}/update"), update)?;
        Ok(())
    }

    fn complete_session(
        &self,
        id: &SessionId,
        completion: &SessionCompletion,
    ) -> Result<(), ClientError> {
        self.send_json("POST", &format!("/sessions/{id}/complete"), completion)?;
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<Session>, ClientError> {
        let text = self.get_text("/sessions")?;
        Ok(serde_json::from_str(&text)?)
    }

    fn get_session(&self, id: &SessionId) -> Result<Session, ClientError> {
        let text = self.get_text(&format!("/sessions/{id}"))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn delete_session(&self, id: &SessionId) -> Result<(), ClientError> {
        let url = self.url(&format!("/sessions/{id}"));
        debug!(method = "DELETE", url = %url, "API request");
        self.agent.delete(url.as_str()).call()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_dropped_from_base_url() {
        let api = HttpSessionApi::new("http://localhost:5000/api/");
        assert_eq!(api.base_url(), "http://localhost:5000/api");
        assert_eq!(
            api.url("/sessions/3/update"),
            "http://localhost:5000/api/sessions/3/update"
        );
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        // Port 9 (discard) is almost never listening on loopback.
        let api = HttpSessionApi::new("http://127.0.0.1:9/api");
        let err = api.list_sessions().unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)), "{err:?}");
    }
}
