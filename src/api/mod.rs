//! Identity-service collaborator: the trait the provider consumes plus the
//! shipped HTTP implementation and its wire types.

pub mod client;
pub mod types;

pub use client::{HttpIdentityClient, IdentityApi, IdentityError};
pub use types::{AccessTokenResponse, TokenInfo};
