//! Database layer: connections, schema scan, table-name rewriting, routing and request sessions.

pub mod databases;
pub mod engine;
pub mod rewriter;
pub mod router;
pub mod scanner;
pub mod session;

pub use databases::{Database, Databases};
pub use engine::EngineKind;
pub use rewriter::SqlRewriter;
pub use router::ConnectionRouter;
pub use scanner::{scan, CatalogSlot, Introspect, SchemaCatalog};
pub use session::Session;
