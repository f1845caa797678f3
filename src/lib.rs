//! Localized multicommodity flow.
//!
//! Iteratively balances per-commodity node heights against shared edge
//! capacities until every edge's potential difference falls below a tolerance.

pub mod config;
pub mod error;
pub mod instances;
pub mod network;
pub mod parsers;
pub mod solvers;
pub mod telemetry;
pub mod utils;

pub use config::SolverConfig;
pub use error::FlowError;
pub use network::{FlowMatrix, Network, NetworkBuilder};
pub use solvers::localized::{Solution, Termination, localized_mcf};
