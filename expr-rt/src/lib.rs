//! State cache, lookups, and the external Interface seam for the expression
//! graph engine: the bridge between the purely in-process reactive graph in
//! `expr-core` and whatever system actually owns live state (telemetry bus,
//! simulator, spacecraft interface, ...).

mod cache;
mod connector;
mod interface;
mod lookup;
mod scheduler;
mod state;

pub use cache::Cache;
pub use connector::{insert_lookup_on_change, NodeConnector};
pub use interface::{Interface, ThresholdBand};
pub use lookup::{LookupNow, LookupOnChange};
pub use scheduler::Scheduler;
pub use state::State;
