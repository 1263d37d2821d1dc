//! litscan-ingestion — literature retrieval, venue filtering and report export.
//!
//! Search terms and a date window go in; filtered, exportable article
//! records come out. Nothing here calls a language model.

pub mod export;
pub mod models;
pub mod sources;
pub mod venue;
