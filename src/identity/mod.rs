// Public API - what other modules can use
pub use models::Identity;
pub use repository::{IdentityResolver, InMemoryIdentityResolver, PostgresIdentityResolver};
pub use token::{JwtTokenVerifier, TokenClaims, TokenVerifier};

// Internal modules
mod models;
mod repository;
mod token;
