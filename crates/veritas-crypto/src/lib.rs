//! Veritas Crypto — canonical proof hashing and signature verification for
//! the Ed25519, RSA and secp256k1 suites used by linked-data credentials.

pub mod canonical;
pub mod encoding;
pub mod error;
pub mod jws;
pub mod keys;
pub mod signing;

pub use canonical::{canonicalize, sha256, verify_data};
pub use error::CryptoError;
pub use jws::{DetachedJws, JwsHeader};
pub use keys::{KeyPair, PublicKey};
pub use signing::{sign, verify, Signature};
