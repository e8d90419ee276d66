pub mod app;
pub mod identity;
pub mod legacy;
pub mod remote;

pub use app::{TestApp, document, test_remote_config};
pub use identity::FakeIdentityProvider;
pub use legacy::{MemoryLegacy, MemoryLegacySource};
pub use remote::{CallCounts, MemoryRemote};
