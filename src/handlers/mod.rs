//! HTTP handlers for entity CRUD, authentication and batches.

pub mod auth;
pub mod batch;
pub mod entity;
