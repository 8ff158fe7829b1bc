//! Weekly class timetable generation by genetic search.
//!
//! - **`models`**: domain description, candidate timetables, search parameters
//! - **`ga`**: random generation, binary/weighted fitness, crossover, mutation
//!   and the generation loop
//! - **`handlers`**: axum endpoints exposing the search over HTTP

pub mod config;
pub mod error;
pub mod ga;
pub mod handlers;
pub mod models;

pub use ga::run_search;
pub use handlers::{router, AppState};
