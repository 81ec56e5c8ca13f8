// Authentication module
// Manages the bearer credential lifecycle against the identity endpoint

mod grant;
mod manager;
mod types;

pub use manager::{plan, TokenAction, TokenManager};
pub use types::{ClientIdentity, Credential, Origin, TokenResponse, TokenState, UserCredentials};
