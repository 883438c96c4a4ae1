mod config;
mod error;
pub(crate) mod models;
mod store;

pub use config::CouchConfig;
pub use error::{CouchDaoError, CouchResult};
pub use store::CouchDocumentStore;
