pub mod cell;
pub mod types;

pub use cell::CredentialCell;
pub use types::{Credentials, LoadableCredentials, RefreshableCredentials};
