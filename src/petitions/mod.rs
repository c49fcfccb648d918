//! Client for the UK Parliament petitions API
//!
//! Provides the `Petition` value type, the paginated `PetitionsClient`, and
//! the `PetitionSource` seam the fetcher depends on.

pub mod client;
pub mod types;

pub use client::{PetitionSource, PetitionsClient};
pub use types::Petition;
