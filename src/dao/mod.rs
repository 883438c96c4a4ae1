/// Document persistence backends (CouchDB and local files).
pub mod document_store;
/// Storage abstraction layer errors.
pub mod storage;
/// Image uploads for item pictures.
pub mod uploads;
