//! Authentication: JWT issuance, password hashing and the token registry.

pub mod jwt;
pub mod password;
pub mod tokens;

pub use jwt::{Claims, JwtKeys};
pub use tokens::TokenStore;
