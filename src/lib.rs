//! Structural ingestion and validation of `OpenPGP` keys.
//!
//! This crate parses armored or binary `OpenPGP` key material into
//! [`Key`] objects and checks that each one is structurally complete
//! and re-exportable. It carries no cryptography of its own: signatures
//! are grouped, never verified, and rejected keys are reported through
//! a small typed error taxonomy rather than partial results.

mod errors;
mod ingest;
mod key;
mod packet;
mod types;
mod validate;

pub mod armor;

pub use errors::*;
pub use ingest::*;
pub use key::*;
pub use packet::*;
pub use types::*;
pub use validate::*;
