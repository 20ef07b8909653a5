//! JSON client for the hosted note service.

use std::{
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::NoteStore;
use crate::{
    CreateNoteRequest, CredentialStore, Credentials, MerlionError, Note, Result, StoreKind,
};

pub const DEFAULT_BASE_URL: &str = "https://api.note.merlion.dev";
pub const REMOTE_STORE_NAME: &str = "Cloud";

/// Shown in place of a body the service did not return.
pub const NO_CONTENT: &str = "No Content";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const INVALID_CREDENTIALS: &str = "invalid credentials: please check your email and password";

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Session state; replaced as a whole on login.
#[derive(Default)]
struct Session {
    credentials: Option<Credentials>,
    token: Option<String>,
}

/// Note store backed by the remote REST service.
///
/// Requests authenticate with a bearer token when the last login returned
/// one, otherwise with HTTP Basic. Cookies set by the service are replayed
/// automatically.
pub struct RemoteStore {
    base_url: Url,
    client: Client,
    session: RwLock<Session>,
    credential_store: Option<Arc<CredentialStore>>,
}

impl RemoteStore {
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| MerlionError::ConfigError {
            message: format!("invalid service URL {}: {}", base_url, e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(MerlionError::ConfigError {
                message: format!("service URL {} cannot carry paths", base_url),
            });
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            base_url,
            client,
            session: RwLock::new(Session {
                credentials,
                token: None,
            }),
            credential_store: None,
        })
    }

    /// Builds a client from the saved credentials, if there are any.
    ///
    /// The store is kept so that later logins persist their credentials.
    pub fn from_credential_store(
        store: Arc<CredentialStore>,
        base_url: &str,
    ) -> Result<Option<Self>> {
        let Some(credentials) = store.load()? else {
            return Ok(None);
        };
        Ok(Some(
            Self::new(base_url, Some(credentials))?.with_credential_store(store),
        ))
    }

    pub fn with_credential_store(mut self, store: Arc<CredentialStore>) -> Self {
        self.credential_store = Some(store);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn has_credentials(&self) -> bool {
        self.read_session()
            .map(|s| s.credentials.is_some())
            .unwrap_or(false)
    }

    /// Logs in again with the held credentials.
    pub async fn login(&self) -> Result<()> {
        let credentials = self
            .read_session()?
            .credentials
            .clone()
            .ok_or_else(|| MerlionError::MissingCredentials {
                message: "no credentials provided".to_string(),
            })?;
        self.authenticate(credentials).await
    }

    /// Checks `credentials` against the service and keeps them on success.
    ///
    /// Any rejection is reported as the same generic error, whatever the
    /// service said.
    pub async fn validate(&self, credentials: Credentials) -> Result<()> {
        self.authenticate(credentials.clone()).await?;
        if let Some(store) = &self.credential_store {
            store.save(&credentials)?;
        }
        Ok(())
    }

    async fn authenticate(&self, credentials: Credentials) -> Result<()> {
        let login = LoginRequest {
            email: &credentials.email,
            password: &credentials.password,
        };
        let url = self.url(&["users", "login"])?;
        let request = self.client.post(url).json(&login);

        let body = match self.send(request).await {
            Ok(body) => body,
            Err(e @ (MerlionError::Unauthorized { .. } | MerlionError::Api { .. })) => {
                warn!("Login rejected (status {:?})", e.status());
                return Err(MerlionError::Unauthorized {
                    status: e.status(),
                    message: INVALID_CREDENTIALS.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let token = serde_json::from_str::<LoginResponse>(&body)
            .ok()
            .and_then(|r| r.token)
            .filter(|t| !t.is_empty());
        debug!("Login succeeded (bearer token: {})", token.is_some());

        let mut session = self.write_session()?;
        session.credentials = Some(credentials);
        session.token = token;
        info!("Logged in to {}", self.base_url);
        Ok(())
    }

    fn read_session(&self) -> Result<RwLockReadGuard<'_, Session>> {
        self.session
            .read()
            .map_err(|_| MerlionError::LockAcquisitionFailed {
                message: "Failed to acquire read lock on session".to_string(),
            })
    }

    fn write_session(&self) -> Result<RwLockWriteGuard<'_, Session>> {
        self.session
            .write()
            .map_err(|_| MerlionError::LockAcquisitionFailed {
                message: "Failed to acquire write lock on session".to_string(),
            })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MerlionError::ConfigError {
                message: format!("service URL {} cannot carry paths", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let session = self.read_session()?;
        Ok(match (&session.token, &session.credentials) {
            (Some(token), _) => request.bearer_auth(token),
            (None, Some(creds)) => request.basic_auth(&creds.email, Some(&creds.password)),
            (None, None) => request,
        })
    }

    /// Sends the request and returns the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let request = self.authorize(request)?;
        let response = request.send().await.map_err(|e| {
            error!("Request to note service failed: {}", e);
            MerlionError::Transport(e)
        })?;

        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::UNAUTHORIZED {
            return Err(MerlionError::Unauthorized {
                status: Some(status.as_u16()),
                message: body,
            });
        }
        if status.is_client_error() || status.is_server_error() {
            return Err(MerlionError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&CreateNoteRequest>,
    ) -> Result<T> {
        let url = self.url(segments)?;
        debug!("{} {}", method, url.path());
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let text = self.send(request).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl NoteStore for RemoteStore {
    fn name(&self) -> &str {
        REMOTE_STORE_NAME
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Remote
    }

    async fn list(&self) -> Result<Vec<Note>> {
        let notes: Vec<Note> = self.call(Method::GET, &["notes"], None).await?;
        debug!("Fetched {} notes from the service", notes.len());
        Ok(notes)
    }

    async fn get(&self, note_id: &str) -> Result<Note> {
        let mut note: Note = self.call(Method::GET, &["notes", note_id], None).await?;
        if note.content.is_none() {
            note.content = Some(NO_CONTENT.to_string());
        }
        Ok(note)
    }

    async fn create(&self, req: &CreateNoteRequest) -> Result<Note> {
        req.validate()?;
        let note: Note = self.call(Method::POST, &["notes"], Some(req)).await?;
        info!("Created remote note {}", note.note_id);
        Ok(note)
    }

    async fn update(&self, note_id: &str, req: &CreateNoteRequest) -> Result<Note> {
        req.validate()?;
        self.call(Method::PUT, &["notes", note_id], Some(req)).await
    }

    async fn delete(&self, note_id: &str) -> Result<()> {
        let url = self.url(&["notes", note_id])?;
        self.send(self.client.delete(url)).await?;
        info!("Deleted remote note {}", note_id);
        Ok(())
    }
}
