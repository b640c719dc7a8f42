//! In-memory galera cluster and cluster store for tests.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod cluster;
mod error;
mod store;

pub use cluster::{MockCluster, MockCommands, SimulatedMember};
pub use error::Error;
pub use store::MemoryStore;
