//! Login state for the whole process.
//!
//! [`Session`] is the one context object a front-end creates at startup. It
//! owns the client, the credential and the theme preference, and publishes
//! [`SessionState`] changes to anyone holding a receiver from
//! [`Session::subscribe`]. Identity only ever comes from the server: a stored
//! credential alone never makes a session authenticated.

use crate::storage::{CredentialStore, ThemePreference};
use crate::types::{AuthResponse, Identity, Theme, User};
use crate::{Body, Error, RequestOptions, VidshareClient};
use serde_json::json;
use tokio::sync::watch;

pub const LOGIN_PATH: &str = "/api/auth/login/";
pub const REGISTER_PATH: &str = "/api/auth/register/";
pub const LOGOUT_PATH: &str = "/api/auth/logout/";
pub const ME_PATH: &str = "/api/auth/me/";

/// Who the session belongs to, as last confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Not resolved yet. Only ever the initial state.
    Unknown,
    Anonymous,
    Authenticated(User),
}

impl SessionState {
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

pub struct Session {
    client: VidshareClient,
    theme: ThemePreference,
    state: watch::Sender<SessionState>,
}

impl Session {
    #[must_use]
    pub fn new(client: VidshareClient) -> Self {
        let theme = ThemePreference::new(client.storage());
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            client,
            theme,
            state,
        }
    }

    #[must_use]
    pub fn client(&self) -> &VidshareClient {
        &self.client
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        self.client.credentials()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receives every state published from now on.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn theme(&self) -> Theme {
        self.theme.get()
    }

    pub fn set_theme(&self, theme: Theme) {
        self.theme.set(theme);
    }

    fn publish(&self, next: SessionState) {
        match &next {
            SessionState::Authenticated(user) => {
                tracing::info!(username = %user.username, "session authenticated");
            }
            SessionState::Anonymous => tracing::info!("session anonymous"),
            SessionState::Unknown => {}
        }
        self.state.send_replace(next);
    }

    /// Logs in and stores the issued credential.
    ///
    /// # Errors
    /// Any dispatcher failure (bad credentials included) is returned unchanged
    /// and leaves both the credential and the state as they were.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, Error> {
        let body = json!({ "username": username, "password": password });
        self.authenticate(LOGIN_PATH, body, username).await
    }

    /// Creates an account and stores the issued credential.
    ///
    /// # Errors
    /// Any dispatcher failure (a taken username, mismatched passwords) is
    /// returned unchanged and leaves both the credential and the state as
    /// they were.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<AuthResponse, Error> {
        let body = json!({
            "username": username,
            "email": email,
            "password": password,
            "confirm_password": confirm_password,
        });
        self.authenticate(REGISTER_PATH, body, username).await
    }

    async fn authenticate(
        &self,
        path: &str,
        body: serde_json::Value,
        username: &str,
    ) -> Result<AuthResponse, Error> {
        let payload = self
            .client
            .send(path, RequestOptions::mutation(Body::Json(body)))
            .await?;
        // A success without a JSON body carries no token, so the old one goes.
        let response: AuthResponse = match payload {
            Some(payload) => serde_json::from_value(payload)?,
            None => AuthResponse::default(),
        };
        self.credentials().set(response.access_token.as_deref());
        let user = response
            .user
            .clone()
            .unwrap_or_else(|| User::named(username));
        self.publish(SessionState::Authenticated(user));
        Ok(response)
    }

    /// Logs out.
    ///
    /// The credential is cleared and the session becomes anonymous whatever
    /// the outcome of the server call.
    ///
    /// # Errors
    /// Returns the dispatcher failure, after the cleanup has happened.
    pub async fn logout(&self) -> Result<(), Error> {
        let result = self
            .client
            .send(LOGOUT_PATH, RequestOptions::mutation(Body::Empty))
            .await;
        self.credentials().clear();
        self.publish(SessionState::Anonymous);
        if let Err(err) = &result {
            tracing::warn!(error = %err, "logout request failed; local credential cleared");
        }
        result.map(|_| ())
    }

    /// Asks the server who the stored credential belongs to.
    ///
    /// An unauthenticated answer clears the credential. An authenticated
    /// answer without a user keeps the credential and the last known user,
    /// or a nameless one. A failed request leaves the credential alone but
    /// the session is treated as anonymous.
    ///
    /// # Errors
    /// Returns the dispatcher failure.
    pub async fn me(&self) -> Result<Identity, Error> {
        match self.fetch_identity().await {
            Ok(identity) => {
                if identity.authenticated {
                    let user = identity
                        .user
                        .clone()
                        .or_else(|| self.state().user().cloned())
                        .unwrap_or_else(|| User::named(""));
                    self.publish(SessionState::Authenticated(user));
                } else {
                    self.credentials().clear();
                    self.publish(SessionState::Anonymous);
                }
                Ok(identity)
            }
            Err(err) => {
                self.publish(SessionState::Anonymous);
                Err(err)
            }
        }
    }

    async fn fetch_identity(&self) -> Result<Identity, Error> {
        match self.client.send(ME_PATH, RequestOptions::get()).await? {
            Some(payload) => Ok(serde_json::from_value(payload)?),
            None => Ok(Identity::default()),
        }
    }

    /// Resolves the initial state with a `me` call. A failed call resolves
    /// to [`SessionState::Anonymous`].
    pub async fn resolve(&self) -> SessionState {
        if let Err(err) = self.me().await {
            tracing::warn!(error = %err, "identity check failed");
        }
        self.state()
    }

    /// Drops the credential without contacting the server.
    pub fn clear(&self) {
        self.credentials().clear();
        self.publish(SessionState::Anonymous);
    }
}
