//! External API version mapping

mod version_manager;

pub use version_manager::{ApiVersionBinding, ApiVersionManager};
