//! Core data structures: strategic-form games and mixed strategy profiles.

pub mod game;
pub mod profile;

pub use game::{Contingency, Player, TableGame};
pub use profile::MixedProfile;
