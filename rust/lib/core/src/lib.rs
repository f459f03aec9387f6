pub mod config;
pub mod error;
pub mod module;
pub mod types;

pub use config::DataPaths;
pub use error::{expose_internal_details, ServiceError};
pub use module::Module;
pub use types::{is_valid_id, merge_patch, new_id, now_rfc3339, ListParams, ListResult};
