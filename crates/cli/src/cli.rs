use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use contactbook_core::{ContactDraft, ContactPatch};
use contactbook_engine::RemoteConfig;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Manage an address book stored locally or in a remote document database"
)]
pub struct Cli {
    #[arg(
        long,
        env = "CONTACTBOOK_DATA_DIR",
        default_value = ".contactbook/",
        value_name = "DIR",
        help = "Directory holding the local database and settings"
    )]
    pub data_dir: PathBuf,

    #[arg(
        long,
        env = "CONTACTBOOK_HOST_DIR",
        value_name = "DIR",
        help = "Desktop host data directory; contacts are kept in a JSON file there when set"
    )]
    pub host_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(about = "List contacts in name order")]
    List {
        #[arg(long, help = "Print contacts as JSON")]
        json: bool,
    },
    #[command(about = "Add a contact")]
    Add {
        #[arg(value_name = "NAME")]
        name: String,
        #[command(flatten)]
        fields: ContactFields,
    },
    #[command(
        about = "Update a contact",
        long_about = "Overwrite the given fields of a contact. Pass an empty string to clear a field."
    )]
    Update {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: ContactFields,
    },
    #[command(about = "Delete a contact")]
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
    #[command(about = "Remote database settings")]
    Remote {
        #[command(subcommand)]
        cmd: RemoteCmd,
    },
    #[command(about = "Sign in to the remote database")]
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CONTACTBOOK_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, help = "Create the account instead of signing in")]
        create: bool,
    },
    #[command(about = "Forget the saved remote session")]
    SignOut,
    #[command(about = "Send a password reset email")]
    ResetPassword {
        #[arg(long)]
        email: String,
    },
    #[command(
        about = "Copy every contact from the legacy provider into the remote database",
        long_about = "Reads the legacy provider's contacts table in full and creates one remote document per row. Legacy credentials are used for this run only and never saved."
    )]
    Migrate {
        #[arg(long, env = "LEGACY_URL", value_name = "URL")]
        url: String,
        #[arg(long, env = "LEGACY_KEY", value_name = "KEY", hide_env_values = true)]
        key: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum RemoteCmd {
    #[command(about = "Save remote settings; they apply from the next run")]
    Set {
        #[arg(long, env = "REMOTE_API_KEY", hide_env_values = true)]
        api_key: String,
        #[arg(long, env = "REMOTE_PROJECT_ID")]
        project_id: String,
        #[arg(long, env = "REMOTE_APP_ID")]
        app_id: String,
        #[arg(long)]
        auth_domain: Option<String>,
        #[arg(long)]
        storage_bucket: Option<String>,
        #[arg(long)]
        messaging_sender_id: Option<String>,
    },
    #[command(about = "Remove remote settings and return to local mode")]
    Clear,
    #[command(about = "Show remote settings")]
    Show,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ContactFields {
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub state: Option<String>,
    #[arg(long)]
    pub country: Option<String>,
    #[arg(long)]
    pub pincode: Option<String>,
    #[arg(long)]
    pub avatar_url: Option<String>,
}

impl ContactFields {
    pub fn into_draft(self, name: String) -> ContactDraft {
        ContactDraft {
            name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            city: self.city,
            state: self.state,
            country: self.country,
            pincode: self.pincode,
            avatar_url: self.avatar_url,
        }
    }

    pub fn into_patch(self, name: Option<String>) -> ContactPatch {
        ContactPatch {
            name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            city: self.city,
            state: self.state,
            country: self.country,
            pincode: self.pincode,
            avatar_url: self.avatar_url,
        }
    }
}

impl RemoteCmd {
    pub fn remote_config(&self) -> Option<RemoteConfig> {
        match self {
            RemoteCmd::Set {
                api_key,
                project_id,
                app_id,
                auth_domain,
                storage_bucket,
                messaging_sender_id,
            } => Some(RemoteConfig {
                api_key: api_key.clone(),
                project_id: project_id.clone(),
                app_id: app_id.clone(),
                auth_domain: auth_domain.clone(),
                storage_bucket: storage_bucket.clone(),
                messaging_sender_id: messaging_sender_id.clone(),
            }),
            _ => None,
        }
    }
}
