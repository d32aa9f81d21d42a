//! Request extractors: authenticated user, client address, request session.

mod auth;
mod client;
mod session;

pub use auth::{AuthUser, TRANSFER_USER_HEADER};
pub use client::ClientIp;
pub use session::DbSession;
