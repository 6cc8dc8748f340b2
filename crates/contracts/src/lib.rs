//! # Contracts
//!
//! Frozen interface contracts shared by every lakeflow crate: run states,
//! table references, project manifests and application settings.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Reference Model
//! - A *ref* names a branch (`main`, `alice.taxi_zones`)
//! - Tables live inside a branch and a namespace (`bauplan` by default)

mod error;
mod manifest;
mod run;
mod settings;
mod table;

pub use error::*;
pub use manifest::*;
pub use run::*;
pub use settings::*;
pub use table::*;
