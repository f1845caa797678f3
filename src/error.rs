use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FlowError {
    #[error("Unknown node `{0}`")]
    UnknownNode(String),
    #[error("Node `{0}` declared twice")]
    DuplicateNode(String),
    #[error("Commodity `{0}` declared twice")]
    DuplicateCommodity(String),
    #[error("Unknown commodity `{commodity}` in demand of node `{node}`")]
    UnknownCommodity { node: String, commodity: String },
    #[error("Parallel edge {from} -> {to} is not supported")]
    ParallelEdge { from: String, to: String },
    #[error("Invalid capacity {capacity} on edge {from} -> {to}")]
    InvalidCapacity {
        from: String,
        to: String,
        capacity: f64,
    },
    #[error("Invalid demand {value} for commodity `{commodity}` at node `{node}`")]
    InvalidDemand {
        node: String,
        commodity: String,
        value: f64,
    },
    #[error("Flow matrix has shape {found:?}, expected {expected:?} (edges x commodities)")]
    FlowShape {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Invalid flow value {value} on edge #{edge} for commodity #{commodity}")]
    InvalidFlow {
        edge: usize,
        commodity: usize,
        value: f64,
    },
    #[error("Invalid solver configuration: {0}")]
    InvalidConfig(String),
    #[error("Step size did not stabilise after {attempts} shrink attempts (omega = {omega})")]
    StepSizeStalled { attempts: usize, omega: f64 },
    #[error("Stability ratio is not finite (beta = {beta})")]
    NonFiniteStability { beta: f64 },
}
