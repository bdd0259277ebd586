//! Schema module - Inventory, layout, configuration and history types.

mod config;
mod inventory;
mod layout;
mod trial;

pub use config::*;
pub use inventory::*;
pub use layout::*;
pub use trial::*;
