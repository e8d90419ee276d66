use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use contactbook_core::{Identity, SubscriptionId};
use contactbook_remote::{IdentityListener, IdentityProvider};

#[derive(Default)]
struct ProviderState {
    settled: bool,
    current: Option<Identity>,
    listeners: BTreeMap<u64, IdentityListener>,
    next_id: u64,
    subscribes: usize,
    unsubscribes: usize,
}

/// Scriptable identity provider that records how it is subscribed to.
#[derive(Default)]
pub struct FakeIdentityProvider {
    state: Mutex<ProviderState>,
}

impl FakeIdentityProvider {
    /// Session state not yet known; subscribers wait for `settle`.
    pub fn unsettled() -> Self {
        Self::default()
    }

    pub fn signed_out() -> Self {
        let provider = Self::default();
        provider.state().settled = true;
        provider
    }

    pub fn signed_in(uid: &str) -> Self {
        let provider = Self::signed_out();
        provider.state().current = Some(Identity::new(uid).with_tokens(format!("token-{uid}"), None));
        provider
    }

    fn state(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settle(&self, identity: Option<Identity>) {
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

    pub fn subscribe_calls(&self) -> usize {
        self.state().subscribes
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.state().unsubscribes
    }

    pub fn active_subscriptions(&self) -> usize {
        self.state().listeners.len()
    }
}

impl IdentityProvider for FakeIdentityProvider {
    fn current_identity(&self) -> Option<Identity> {
        self.state().current.clone()
    }

    fn subscribe(&self, listener: IdentityListener) -> SubscriptionId {
        let (id, settled, current) = {
            let mut state = self.state();
            state.subscribes += 1;
            state.next_id += 1;
            let id = state.next_id;
            state.listeners.insert(id, listener.clone());
            (id, state.settled, state.current.clone())
        };
        if settled {
            listener(current);
        }
        SubscriptionId::from_raw(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.state();
        state.unsubscribes += 1;
        state.listeners.remove(&id.as_raw());
    }
}
