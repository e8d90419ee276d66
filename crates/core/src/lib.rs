pub mod collation;
pub mod contact;
pub mod error;
pub mod identity;
pub mod ids;
pub mod validation;

pub use collation::{compare_contacts, compare_names, sort_contacts};
pub use contact::{Contact, ContactDraft, ContactPatch, Document};
pub use error::CoreError;
pub use identity::Identity;
pub use ids::*;
