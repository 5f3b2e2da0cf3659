//! Competitive-density mapping over a state → city → neighborhood hierarchy.
//!
//! The pipeline is filter → aggregate or rank → dossier. Peer benchmarking
//! runs against the whole state regardless of the active filters.
pub mod category;
pub mod dossier;
pub mod error;
pub mod filter;
pub mod loader;
pub mod output;
pub mod peers;
pub mod radar;
pub mod rank;
pub mod reports;
pub mod types;
pub mod util;

pub use category::{Category, Market};
pub use filter::{FilterSelection, View};
pub use radar::{Radar, Scope};
pub use types::{Catalog, Entity};
