mod error;
mod storage;
mod store;

pub use error::{LocalResult, LocalStoreError};
pub use storage::LocalStorage;
pub use store::LocalDocumentStore;
