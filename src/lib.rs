//! Ring Search - Constrained layout search for concentric rings of detector tubes.
//!
//! A fixed stock of identical cylindrical objects in two length classes is
//! arranged on concentric rings inside a moderator block. The crate searches
//! ring radii, per-ring counts and class assignments, filters every candidate
//! through a geometric feasibility validator, and scores the feasible ones with
//! an external simulation.
//!
//! # Architecture
//!
//! - `schema`: Inventory, envelope, candidate layouts, configuration and history types
//! - `compute`: Validator, geometry builder, strategies, oracle and the search loop
//!
//! # Example
//!
//! ```rust,no_run
//! use ring_search::{
//!     compute::{CommandOracle, SearchEngine},
//!     schema::{CommandSpec, OracleConfig, SearchConfig},
//! };
//!
//! let config = SearchConfig::default();
//! let oracle_config = OracleConfig::new(
//!     CommandSpec::new("simulate").with_args(["{geometry}", "{macro}"]),
//!     "trials",
//! );
//! let oracle = CommandOracle::new(oracle_config, config.envelope.clone()).unwrap();
//!
//! let mut engine = SearchEngine::from_config(config, oracle).unwrap();
//! let result = engine.run().unwrap();
//!
//! if let Some(best) = result.best {
//!     println!("Best efficiency {:.3}% at {}", best.score, best.candidate.describe());
//! }
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{CommandOracle, SearchEngine, SearchError, Validator};
pub use schema::{Candidate, Inventory, SearchConfig, SearchResult};
