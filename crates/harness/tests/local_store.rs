use contactbook_core::{ContactDraft, ContactPatch};
use contactbook_engine::StoreStatus;
use contactbook_harness::TestApp;
use contactbook_storage::{StoreKind, file::HOST_FILE_NAME};

// ============================================================================
// Loading
// ============================================================================

#[tokio::test]
async fn empty_store_loads_ready_and_empty() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::local()?;
    let store = app.open_store().await?;
    assert_eq!(store.status(), StoreStatus::Ready);
    assert!(store.contacts().is_empty());
    assert!(store.error().is_none());
    Ok(())
}

#[tokio::test]
async fn contacts_survive_restart() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::local()?;
    let mut store = app.open_store().await?;
    store.add(ContactDraft::new("Grace Hopper").with_phone("+1 555 0100")).await?;
    store.add(ContactDraft::new("Ada Lovelace")).await?;
    drop(store);

    let store = app.open_store().await?;
    let names: Vec<_> = store.contacts().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Ada Lovelace", "Grace Hopper"]);
    assert_eq!(store.contacts()[1].phone.as_deref(), Some("+1 555 0100"));
    Ok(())
}

#[tokio::test]
async fn corrupt_cache_loads_empty() -> Result<(), Box<dyn std::error::Error>> {
    use contactbook_storage::BlobStore;

    let app = TestApp::local()?;
    app.blobs.write("contacts", "{not json")?;
    let store = app.open_store().await?;
    assert_eq!(store.status(), StoreStatus::Ready);
    assert!(store.contacts().is_empty());
    Ok(())
}

#[tokio::test]
async fn mistyped_cached_field_keeps_whole_list() -> Result<(), Box<dyn std::error::Error>> {
    use contactbook_storage::BlobStore;

    let app = TestApp::local()?;
    app.blobs.write(
        "contacts",
        r#"[{"id":"1","name":"Ann","created_at":"2024-01-01T00:00:00.000Z"},
            {"id":"2","name":"Bob","pincode":560001,"created_at":"2024-01-02T00:00:00.000Z"}]"#,
    )?;
    let mut store = app.open_store().await?;
    assert_eq!(store.contacts().len(), 2);
    assert_eq!(store.contacts()[1].pincode.as_deref(), Some("560001"));

    store.add(ContactDraft::new("Cy")).await?;
    drop(store);

    let store = app.open_store().await?;
    let names: Vec<_> = store.contacts().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Ann", "Bob", "Cy"]);
    Ok(())
}

#[tokio::test]
async fn names_sort_case_insensitively_and_numerically() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::local()?;
    let mut store = app.open_store().await?;
    for name in ["item 10", "Item 2", "item 1", "Zed", "alpha"] {
        store.add(ContactDraft::new(name)).await?;
    }
    let names: Vec<_> = store.contacts().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["alpha", "item 1", "Item 2", "item 10", "Zed"]);
    Ok(())
}

// ============================================================================
// Mutations
// ============================================================================

#[tokio::test]
async fn add_assigns_id_timestamp_and_avatar() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::local()?;
    let mut store = app.open_store().await?;
    let contact = store.add(ContactDraft::new("  Ada  ")).await?;

    assert_eq!(contact.name, "Ada");
    assert_eq!(contact.id.as_str().len(), 36);
    assert!(contact.created_at.ends_with('Z'));
    assert!(contact.avatar_url.as_deref().is_some_and(|url| url.ends_with("seed=Ada")));
    assert_eq!(app.cached(), store.contacts());
    Ok(())
}

#[tokio::test]
async fn update_overwrites_and_clears_fields() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::local()?;
    let mut store = app.open_store().await?;
    let contact = store
        .add(ContactDraft::new("Ada").with_email("ada@example.com").with_address("1 Way, London"))
        .await?;

    let patch = ContactPatch {
        email: Some(String::new()),
        city: Some("London".into()),
        ..ContactPatch::default()
    };
    let updated = store.update(&contact.id, patch).await?.ok_or("contact missing")?;
    assert_eq!(updated.email, None);
    assert_eq!(updated.city.as_deref(), Some("London"));
    assert_eq!(updated.address.as_deref(), Some("1 Way, London"));
    assert_eq!(app.cached()[0].city.as_deref(), Some("London"));
    Ok(())
}

#[tokio::test]
async fn delete_removes_from_memory_and_disk() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::local()?;
    let mut store = app.open_store().await?;
    let ada = store.add(ContactDraft::new("Ada")).await?;
    store.add(ContactDraft::new("Grace")).await?;

    assert!(store.delete(&ada.id).await?);
    assert!(store.get(&ada.id).is_none());
    assert_eq!(app.cached().len(), 1);

    // Second delete is a no-op, not an error.
    assert!(!store.delete(&ada.id).await?);
    Ok(())
}

#[tokio::test]
async fn local_mode_never_touches_remote() -> Result<(), Box<dyn std::error::Error>> {
    let app = TestApp::local()?;
    let mut store = app.open_store().await?;
    let contact = store.add(ContactDraft::new("Ada")).await?;
    store.update(&contact.id, ContactPatch::name("Ada L")).await?;
    store.delete(&contact.id).await?;

    assert!(!store.is_remote());
    assert_eq!(app.remote.calls().writes(), 0);
    assert_eq!(app.remote.calls().ordered_queries, 0);
    assert_eq!(app.identity.subscribe_calls(), 0);
    Ok(())
}

// ============================================================================
// Host file channel
// ============================================================================

#[tokio::test]
async fn desktop_mode_writes_host_file() -> Result<(), Box<dyn std::error::Error>> {
    use contactbook_storage::BlobStore;

    let app = TestApp::desktop()?;
    assert_eq!(app.adapter().kind(), StoreKind::HostFile);

    let mut store = app.open_store().await?;
    store.add(ContactDraft::new("Ada")).await?;

    let path = app.dir.path().join("host").join(HOST_FILE_NAME);
    let raw = std::fs::read_to_string(path)?;
    assert!(raw.contains("\n  {"), "host file is pretty-printed");
    assert!(raw.contains("\"name\": \"Ada\""));
    assert_eq!(app.blobs.read("contacts")?, None);

    let reopened = app.open_store().await?;
    assert_eq!(reopened.contacts().len(), 1);
    Ok(())
}
