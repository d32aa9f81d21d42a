//! Request middleware: per-request transaction scope and HTTP method override.

mod method_override;
mod transaction;

pub use method_override::{method_override, with_method_override, METHOD_OVERRIDE_HEADER};
pub use transaction::{transaction_scope, RequestSession};
