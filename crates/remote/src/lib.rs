pub mod error;
pub mod firestore;
pub mod session;
pub mod supabase;
pub mod traits;
pub mod values;

pub use error::{AuthError, LegacyError, RemoteError};
pub use firestore::{FirestoreClient, FirestoreConfig};
pub use session::{AuthConfig, AuthSession};
pub use supabase::SupabaseConnector;
pub use traits::*;
