//! Typed access to the row-store tables
//!
//! Repositories translate domain reads and writes into gateway calls and
//! decode rows into `fleet_core` records. They hold no business rules.

pub mod stops;
pub mod users;

pub use stops::StopRepository;
pub use users::{UserPatch, UserRepository};
