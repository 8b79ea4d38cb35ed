// Authentication module
// Verifies externally issued bearer tokens; identity management itself
// lives in the upstream auth provider.

pub mod error;
pub mod middleware;
pub mod token;

pub use error::AuthError;
pub use middleware::{AdminUser, AuthenticatedCustomer};
pub use token::{Claims, Role, TokenVerifier};
