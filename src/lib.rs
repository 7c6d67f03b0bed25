/// Implemented solvers
pub mod algo;

/// Environment
pub mod env;

/// Error type
pub mod error;

/// Exploration policies
pub mod exploration;

/// Testing environments
pub mod gym;

/// Policies and policy diagnostics
pub mod policy;

mod util;

pub use error::MdpError;
pub use util::{seeded_rng, DEFAULT_SEED};
