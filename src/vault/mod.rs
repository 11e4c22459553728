//! Owner-scoped storage for encrypted password records.

pub mod store;

pub use store::{RecordDraft, RecordStore};
