pub mod fitness;
pub mod generator;
pub mod operators;
pub mod optimizer;

pub use optimizer::{run_search, GeneticAlgorithm};
