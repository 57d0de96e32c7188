//! Credential status checks against cached revocation records and
//! bitstring status lists.

pub mod bitstring;
pub mod checker;
pub mod loader;

pub use checker::{RevocationCheckResult, RevocationChecker};
pub use loader::{LoadedStatusList, StatusListLoader};
