//! Gambit - Nash equilibria of strategic-form games
//!
//! This crate models finite games in strategic form, reads and writes
//! Gambit's `.nfg` files, and computes equilibria with the Global Newton
//! Method. A C entry point is exported for use as a shared library.

pub mod core;
pub mod ffi;
pub mod nfg;
pub mod solver;
pub mod util;

pub use core::{game::TableGame, profile::MixedProfile};

pub use solver::{random_perturbations, GnmSolver};
pub use util::config::{Config, GnmConfig};
pub use util::errors::{GambitError, Result};
