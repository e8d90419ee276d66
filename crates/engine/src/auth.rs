use std::sync::{Arc, Mutex, PoisonError};

use contactbook_core::{Identity, SubscriptionId};
use contactbook_remote::{IdentityListener, IdentityProvider};
use tokio::sync::oneshot;

use crate::config::AppConfig;

/// Lazily resolves the identity remote operations run under.
///
/// Never creates credentials: a provider that reports "signed out" resolves
/// to `None`, and the caller decides what an absent identity means.
#[derive(Clone)]
pub struct AuthGate {
    provider: Option<Arc<dyn IdentityProvider>>,
}

impl AuthGate {
    /// The provider is only kept when the remote database is configured, so
    /// local mode never touches it.
    pub fn new(config: &AppConfig, provider: Option<Arc<dyn IdentityProvider>>) -> Self {
        Self {
            provider: provider.filter(|_| config.remote_configured()),
        }
    }

    pub fn disabled() -> Self {
        Self { provider: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn ensure_identity(&self) -> Option<Identity> {
        let provider = self.provider.as_deref()?;
        if let Some(identity) = provider.current_identity() {
            return Some(identity);
        }

        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let listener: IdentityListener = Arc::new(move |identity: Option<Identity>| {
            let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(sender) = sender {
                let _ = sender.send(identity);
            }
        });

        let subscription = Subscription {
            id: provider.subscribe(listener),
            provider,
        };
        let identity = rx.await.ok().flatten();
        drop(subscription);

        match &identity {
            Some(identity) => tracing::debug!(uid = %identity.uid, "identity established"),
            None => tracing::debug!("no identity for remote session"),
        }
        identity
    }
}

/// Unsubscribes on drop, including when the waiting future is dropped.
struct Subscription<'a> {
    provider: &'a dyn IdentityProvider,
    id: SubscriptionId,
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        self.provider.unsubscribe(self.id);
    }
}
