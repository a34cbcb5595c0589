//! Schema Versioning Engine
//!
//! Everything that defines, checks, and evolves node type schemas:
//!
//! - `coercion`: the type promotion table and value conversions
//! - `validation`: per-version record validation and normalization
//! - `evolution`: one node type's append-only version history and the
//!   migration algorithm between versions
//! - `registry`: thread-safe lookup of evolutions by node type
//! - `error`: the engine's error taxonomy

pub mod coercion;
pub mod error;
pub mod evolution;
pub mod registry;
pub mod validation;

pub use coercion::{can_promote, coerce, coerce_loose, matches_declared};
pub use error::SchemaError;
pub use evolution::SchemaEvolution;
pub use registry::SchemaRegistry;
pub use validation::validate_record;
