//! Generic CRUD over configured entities, and request validation.

mod crud;
mod validation;

pub use crud::{Actor, CrudService};
pub(crate) use crud::as_flag;
pub use validation::RequestValidator;
