//! Compute module - Feasibility, geometry, strategies, oracle and the search loop.

pub mod archive;
mod feasibility;
mod geometry;
mod oracle;
mod search;
pub mod strategy;

pub use archive::ResultStore;
pub use feasibility::*;
pub use geometry::*;
pub use oracle::*;
pub use search::*;
pub use strategy::{
    GeneticStrategy, GenomeOps, ParametricStrategy, Proposal, RoundClose, SearchRng,
    SearchStrategy, SequentialStrategy,
};
