pub mod error;
pub mod file;
pub mod traits;
pub mod upload;

pub use error::BlobError;
pub use file::FileStore;
pub use traits::BlobStore;
pub use upload::UploadPolicy;
