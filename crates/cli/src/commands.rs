use anyhow::{Context, Result};
use contactbook_core::contact::format_address;
use contactbook_core::{Contact, ContactId};
use contactbook_engine::{
    ContactStore, StoreError, clear_remote_config, save_remote_config, save_session,
};
use contactbook_remote::{IdentityProvider, LegacyCredentials};

use crate::app::App;
use crate::cli::{Command, RemoteCmd};

impl Command {
    pub async fn run(self, app: &App) -> Result<()> {
        match self {
            Command::List { json } => list(app, json).await,
            Command::Add { name, fields } => {
                let mut store = app.store().await?;
                let contact = store.add(fields.into_draft(name)).await.map_err(explain)?;
                println!("added {} ({})", contact.name, contact.id);
                Ok(())
            }
            Command::Update { id, name, fields } => {
                let mut store = app.store().await?;
                let id = ContactId::from(id);
                match store.update(&id, fields.into_patch(name)).await.map_err(explain)? {
                    Some(contact) => println!("updated {} ({})", contact.name, contact.id),
                    None => println!("no contact with id {id}"),
                }
                Ok(())
            }
            Command::Delete { id } => {
                let mut store = app.store().await?;
                let id = ContactId::from(id);
                if store.delete(&id).await.map_err(explain)? {
                    println!("deleted {id}");
                } else {
                    println!("no contact with id {id}");
                }
                Ok(())
            }
            Command::Remote { cmd } => remote(app, cmd),
            Command::SignIn {
                email,
                password,
                create,
            } => {
                let session = app.require_session()?;
                let identity = if create {
                    session.sign_up_with_password(&email, &password).await?
                } else {
                    session.sign_in_with_password(&email, &password).await?
                };
                save_session(app.blobs.as_ref(), Some(&identity)).context("saving session")?;
                println!("signed in as {}", identity.email.as_deref().unwrap_or(&identity.uid));
                Ok(())
            }
            Command::SignOut => {
                if let Some(session) = &app.session {
                    session.sign_out();
                }
                save_session(app.blobs.as_ref(), None).context("clearing session")?;
                println!("signed out");
                Ok(())
            }
            Command::ResetPassword { email } => {
                app.require_session()?.send_password_reset(&email).await?;
                println!("password reset email sent to {email}");
                Ok(())
            }
            Command::Migrate { url, key } => {
                let credentials = LegacyCredentials::new(url, key);
                let progress = |msg: &str| println!("{msg}");
                let report = app.migrator().migrate(&credentials, &progress).await?;
                if report.count == 0 {
                    println!("{}", report.message);
                } else {
                    println!("{} ({} contacts)", report.message, report.count);
                }
                Ok(())
            }
        }
    }
}

async fn list(app: &App, json: bool) -> Result<()> {
    let store = app.store().await?;
    if let Some(error) = store.error() {
        tracing::warn!(error, "showing cached contacts");
    }
    if json {
        println!("{}", serde_json::to_string_pretty(store.contacts())?);
        return Ok(());
    }
    if store.contacts().is_empty() {
        println!("{}", empty_message(&store));
        return Ok(());
    }
    for contact in store.contacts() {
        print_contact(contact);
    }
    Ok(())
}

fn empty_message(store: &ContactStore) -> &'static str {
    if store.is_remote() {
        "no contacts (sign in to see remote contacts)"
    } else {
        "no contacts"
    }
}

fn print_contact(contact: &Contact) {
    println!("{}  {}", contact.id, contact.name);
    for value in [&contact.phone, &contact.email].into_iter().flatten() {
        println!("    {value}");
    }
    if let Some(address) = &contact.address {
        for line in format_address(address) {
            println!("    {line}");
        }
    }
    let locality: Vec<&str> = [&contact.city, &contact.state, &contact.pincode, &contact.country]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();
    if !locality.is_empty() {
        println!("    {}", locality.join(", "));
    }
}

fn remote(app: &App, cmd: RemoteCmd) -> Result<()> {
    let blobs = app.blobs.as_ref();
    match cmd {
        RemoteCmd::Set { .. } => {
            let config = cmd.remote_config().context("remote settings missing")?;
            let saved = save_remote_config(blobs, config)?;
            println!(
                "remote settings saved for project {}; they apply from the next run",
                saved.project_id
            );
        }
        RemoteCmd::Clear => {
            clear_remote_config(blobs)?;
            println!("remote settings cleared; contacts are stored locally from the next run");
        }
        RemoteCmd::Show => match &app.config.remote {
            Some(remote) => {
                println!("project id:   {}", remote.project_id);
                println!("app id:       {}", remote.app_id);
                if let Some(domain) = &remote.auth_domain {
                    println!("auth domain:  {domain}");
                }
                match app.session.as_ref().and_then(|s| s.current_identity()) {
                    Some(identity) => println!("signed in:    {}", identity.email.unwrap_or(identity.uid)),
                    None => println!("signed in:    no"),
                }
            }
            None => println!("remote database not configured; contacts are stored locally"),
        },
    }
    Ok(())
}

/// Add the recovery hint to a failed write.
fn explain(err: StoreError) -> anyhow::Error {
    let diverged = err.diverged();
    let err = anyhow::Error::new(err);
    if diverged {
        err.context("the change was kept in memory only; run `contactbook list` to reload")
    } else {
        err
    }
}
