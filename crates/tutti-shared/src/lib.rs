//! # tutti-shared
//!
//! Domain types and pure rules shared by the store and client crates:
//! entity records, collection paths, the instrument-list rule for profiles
//! and the listing orders applied after every snapshot.

pub mod constants;
pub mod instruments;
pub mod models;
pub mod ordering;
pub mod paths;

pub use instruments::sanitize_instruments;
pub use models::*;
