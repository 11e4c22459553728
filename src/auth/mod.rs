//! Account authentication: password hashing, the account store, and the
//! server-held session table.

pub mod hasher;
pub mod session;
pub mod store;

pub use session::Authenticator;
pub use store::AccountStore;
