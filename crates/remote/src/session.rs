use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use contactbook_core::{Identity, SubscriptionId};
use serde::Deserialize;
use serde_json::json;

use crate::error::AuthError;
use crate::traits::{IdentityListener, IdentityProvider};

pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub api_key: String,
    pub base_url: String,
    /// Exchanges a refresh token for a fresh ID token.
    pub token_url: String,
}

impl AuthConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_IDENTITY_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{method}", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Default)]
struct SessionState {
    settled: bool,
    current: Option<Identity>,
    listeners: BTreeMap<u64, IdentityListener>,
    next_id: u64,
}

/// Identity provider backed by the Identity Toolkit REST API.
///
/// The session starts unsettled: listeners registered before [`settle`]
/// are only called once the restored state is known. Credentials are only
/// ever created by explicit sign-in or sign-up calls.
///
/// [`settle`]: AuthSession::settle
pub struct AuthSession {
    http: reqwest::Client,
    config: AuthConfig,
    state: Mutex<SessionState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Secure Token API response. Field names are snake_case here, unlike the
/// Identity Toolkit.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    user_id: String,
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToolkitError {
    error: ToolkitErrorBody,
}

#[derive(Debug, Deserialize)]
struct ToolkitErrorBody {
    message: String,
}

impl AuthSession {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_settled(&self) -> bool {
        self.state().settled
    }

    /// Record the restored session (or its absence) and notify listeners.
    pub fn settle(&self, identity: Option<Identity>) {
        self.transition(identity);
    }

    pub fn sign_out(&self) {
        self.transition(None);
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.password_call("signInWithPassword", email, password).await
    }

    /// Register a new account for the given email. Only called on an explicit
    /// user request.
    pub async fn sign_up_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.password_call("signUp", email, password).await
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        if email.trim().is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let response = self
            .http
            .post(self.config.endpoint("sendOobCode"))
            .query(&[("key", self.config.api_key.as_str())])
            .json(&json!({ "requestType": "PASSWORD_RESET", "email": email.trim() }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }

    /// Exchange the current refresh token for a new ID token and publish the
    /// renewed identity. ID tokens expire after an hour, so a restored
    /// session has to go through here before it can talk to the database.
    pub async fn refresh(&self) -> Result<Identity, AuthError> {
        let current = self.current_identity().ok_or(AuthError::SignedOut)?;
        let refresh_token = current.refresh_token.clone().ok_or(AuthError::NoRefreshToken)?;
        let response = self
            .http
            .post(&self.config.token_url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&refresh_request(&refresh_token))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let renewed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))?;
        let identity = identity_from_refresh(&current, renewed)?;
        tracing::debug!(uid = %identity.uid, "session refreshed");
        self.transition(Some(identity.clone()));
        Ok(identity)
    }

    async fn password_call(&self, method: &str, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let response = self
            .http
            .post(self.config.endpoint(method))
            .query(&[("key", self.config.api_key.as_str())])
            .json(&json!({ "email": email, "password": password, "returnSecureToken": true }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))?;
        let identity = identity_from_token(token);
        tracing::info!(uid = %identity.uid, "signed in");
        self.transition(Some(identity.clone()));
        Ok(identity)
    }

    fn transition(&self, identity: Option<Identity>) {
        let listeners: Vec<IdentityListener> = {
            let mut state = self.state();
            state.settled = true;
            state.current = identity.clone();
            state.listeners.values().cloned().collect()
        };
        for listener in listeners {
            listener(identity.clone());
        }
    }
}

fn identity_from_token(token: TokenResponse) -> Identity {
    let mut identity = Identity::new(token.local_id).with_tokens(token.id_token, token.refresh_token);
    identity.email = token.email;
    identity
}

fn refresh_request(refresh_token: &str) -> serde_json::Value {
    json!({ "grant_type": "refresh_token", "refresh_token": refresh_token })
}

/// The renewed identity keeps the email of the session it replaces. A
/// response for a different user is refused.
fn identity_from_refresh(current: &Identity, renewed: RefreshResponse) -> Result<Identity, AuthError> {
    if renewed.user_id != current.uid {
        return Err(AuthError::Rejected(format!(
            "token refresh returned user {} for session {}",
            renewed.user_id, current.uid
        )));
    }
    let refresh_token = renewed.refresh_token.or_else(|| current.refresh_token.clone());
    let mut identity = Identity::new(renewed.user_id).with_tokens(renewed.id_token, refresh_token);
    identity.email = current.email.clone();
    Ok(identity)
}

async fn rejection(response: reqwest::Response) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ToolkitError>(&body) {
        Ok(err) => AuthError::Rejected(err.error.message),
        Err(_) => AuthError::Rejected(format!("{status}: {body}")),
    }
}

impl IdentityProvider for AuthSession {
    fn current_identity(&self) -> Option<Identity> {
        self.state().current.clone()
    }

    fn subscribe(&self, listener: IdentityListener) -> SubscriptionId {
        let (id, settled, current) = {
            let mut state = self.state();
            let id = state.next_id;
            state.next_id += 1;
            state.listeners.insert(id, listener.clone());
            (id, state.settled, state.current.clone())
        };
        if settled {
            listener(current);
        }
        SubscriptionId::from_raw(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.state().listeners.remove(&id.as_raw());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session() -> AuthSession {
        AuthSession::new(AuthConfig::new("test-key"))
    }

    fn counting_listener(hits: Arc<AtomicUsize>) -> IdentityListener {
        Arc::new(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn subscribers_wait_for_settlement() {
        let session = session();
        let hits = Arc::new(AtomicUsize::new(0));
        session.subscribe(counting_listener(hits.clone()));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        session.settle(None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(session.is_settled());
    }

    #[test]
    fn late_subscribers_get_current_state_immediately() {
        let session = session();
        session.settle(Some(Identity::new("u1")));
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        session.subscribe(Arc::new(move |identity| {
            *sink.lock().unwrap() = identity;
        }));
        assert_eq!(seen.lock().unwrap().as_ref().map(|i| i.uid.as_str()), Some("u1"));
    }

    #[test]
    fn unsubscribed_listeners_are_not_called() {
        let session = session();
        let hits = Arc::new(AtomicUsize::new(0));
        let id = session.subscribe(counting_listener(hits.clone()));
        session.unsubscribe(id);
        session.settle(Some(Identity::new("u1")));
        session.sign_out();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(session.current_identity().is_none());
    }

    #[tokio::test]
    async fn blank_credentials_never_hit_the_network() {
        let session = session();
        assert!(matches!(
            session.sign_in_with_password("  ", "pw").await,
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            session.sign_up_with_password("a@b.c", "").await,
            Err(AuthError::MissingCredentials)
        ));
        assert!(session.current_identity().is_none());
    }

    #[tokio::test]
    async fn refresh_needs_a_session_with_a_refresh_token() {
        let session = session();
        assert!(matches!(session.refresh().await, Err(AuthError::SignedOut)));

        session.settle(Some(Identity::new("u1").with_tokens("old", None)));
        assert!(matches!(session.refresh().await, Err(AuthError::NoRefreshToken)));
        assert_eq!(
            session.current_identity().and_then(|i| i.id_token).as_deref(),
            Some("old")
        );
    }

    #[test]
    fn refresh_request_uses_refresh_grant() {
        let body = refresh_request("ref-1");
        assert_eq!(body["grant_type"], "refresh_token");
        assert_eq!(body["refresh_token"], "ref-1");
        assert_eq!(AuthConfig::new("k").token_url, DEFAULT_TOKEN_URL);
    }

    #[test]
    fn refresh_response_renews_tokens_and_keeps_email() {
        let current = Identity::new("uid-1")
            .with_email("a@b.c")
            .with_tokens("old", Some("ref-1".into()));
        let renewed: RefreshResponse = serde_json::from_value(json!({
            "expires_in": "3600",
            "token_type": "Bearer",
            "refresh_token": "ref-2",
            "id_token": "new",
            "user_id": "uid-1",
            "project_id": "123"
        }))
        .unwrap();
        let identity = identity_from_refresh(&current, renewed).unwrap();
        assert_eq!(identity.uid, "uid-1");
        assert_eq!(identity.email.as_deref(), Some("a@b.c"));
        assert_eq!(identity.id_token.as_deref(), Some("new"));
        assert_eq!(identity.refresh_token.as_deref(), Some("ref-2"));

        let without_rotation: RefreshResponse =
            serde_json::from_value(json!({ "id_token": "newer", "user_id": "uid-1" })).unwrap();
        let identity = identity_from_refresh(&identity, without_rotation).unwrap();
        assert_eq!(identity.refresh_token.as_deref(), Some("ref-2"));
    }

    #[test]
    fn refresh_for_another_user_is_rejected() {
        let current = Identity::new("uid-1").with_tokens("old", Some("ref".into()));
        let renewed: RefreshResponse =
            serde_json::from_value(json!({ "id_token": "new", "user_id": "uid-2" })).unwrap();
        assert!(matches!(
            identity_from_refresh(&current, renewed),
            Err(AuthError::Rejected(_))
        ));
    }

    #[test]
    fn token_response_maps_to_identity() {
        let token: TokenResponse = serde_json::from_value(json!({
            "localId": "uid-1",
            "email": "a@b.c",
            "idToken": "tok",
            "refreshToken": "ref",
            "expiresIn": "3600"
        }))
        .unwrap();
        let identity = identity_from_token(token);
        assert_eq!(identity.uid, "uid-1");
        assert_eq!(identity.email.as_deref(), Some("a@b.c"));
        assert_eq!(identity.id_token.as_deref(), Some("tok"));
    }
}
