use std::sync::Arc;

use contactbook_core::Identity;
use contactbook_engine::{AppConfig, AuthGate};
use contactbook_harness::{FakeIdentityProvider, TestApp};
use contactbook_remote::IdentityProvider;
use futures::FutureExt;

#[tokio::test]
async fn existing_identity_needs_no_subscription() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::remote(FakeIdentityProvider::signed_in("u1"))?;
    let identity = app.gate().ensure_identity().await.ok_or("identity missing")?;
    assert_eq!(identity.uid, "u1");
    assert_eq!(app.identity.subscribe_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn waits_for_first_report_then_unsubscribes() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::remote(FakeIdentityProvider::unsettled())?;
    let gate = app.gate();

    let (identity, ()) = tokio::join!(gate.ensure_identity(), async {
        tokio::task::yield_now().await;
        assert_eq!(app.identity.active_subscriptions(), 1);
        app.identity.settle(Some(Identity::new("u2")));
    });

    assert_eq!(identity.map(|i| i.uid), Some("u2".to_string()));
    assert_eq!(app.identity.subscribe_calls(), 1);
    assert_eq!(app.identity.unsubscribe_calls(), 1);
    assert_eq!(app.identity.active_subscriptions(), 0);
    Ok(())
}

#[tokio::test]
async fn signed_out_resolves_none_without_signing_in() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::remote(FakeIdentityProvider::signed_out())?;
    assert_eq!(app.gate().ensure_identity().await, None);
    assert_eq!(app.identity.current_identity(), None);
    assert_eq!(app.identity.active_subscriptions(), 0);
    Ok(())
}

#[tokio::test]
async fn abandoned_wait_leaves_no_subscription() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::remote(FakeIdentityProvider::unsettled())?;
    assert!(app.gate().ensure_identity().now_or_never().is_none());
    assert_eq!(app.identity.subscribe_calls(), 1);
    assert_eq!(app.identity.active_subscriptions(), 0);
    Ok(())
}

#[tokio::test]
async fn concurrent_waiters_all_resolve() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::remote(FakeIdentityProvider::unsettled())?;
    let gate = app.gate();

    let (a, b, ()) = tokio::join!(gate.ensure_identity(), gate.ensure_identity(), async {
        tokio::task::yield_now().await;
        app.identity.settle(None);
    });

    assert_eq!((a, b), (None, None));
    assert_eq!(app.identity.active_subscriptions(), 0);
    Ok(())
}

#[tokio::test]
async fn local_mode_never_consults_provider() {
    let provider = Arc::new(FakeIdentityProvider::signed_in("u1"));
    let as_provider: Arc<dyn IdentityProvider> = provider.clone();
    let gate = AuthGate::new(&AppConfig::local("/tmp/unused"), Some(as_provider));

    assert!(!gate.is_enabled());
    assert_eq!(gate.ensure_identity().await, None);
    assert_eq!(provider.subscribe_calls(), 0);
}
