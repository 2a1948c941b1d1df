//! Entropy Source & DRNG Manager Library
//!
//! A user-space manager that aggregates entropy from heterogeneous noise
//! sources, tracks a conservative estimate of the collected entropy, and
//! drives deterministic random bit generators (DRNGs) through an
//! auditable seeding discipline: a reseed happens only when enough
//! estimated entropy has been collected, and the DRNG passes through
//! well-defined seed levels before it is considered operational.
//!
//! # Architecture
//!
//! ```text
//! sources (jitter, cpu, krng, aux) → accounting → reseed gate → DRNG pool
//!        ↑                               ↓              ↓
//!  startup monitor              seed-level state    wait queues
//! ```
//!
//! # Design Principles
//!
//! - **Conservative accounting**: entropy estimates never overstate, and
//!   the seed-buffer credit of a reseed event is authoritative for it
//! - **Single-writer reseed**: the gate is a non-blocking flag; losers
//!   skip instead of queueing
//! - **Monotonic seed levels**: promotions never regress without an
//!   explicit demotion or reset
//! - **Uncredited bootstrap**: the startup seed breaks the zero state but
//!   counts for nothing
//!
//! # Example
//!
//! ```no_run
//! use entropy_manager::{
//!     config::Config,
//!     drng::{DrngPool, DrngWorker},
//!     manager::Manager,
//!     sources::default_sources,
//!     status::{ProcessStatus, StatusSink},
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = Config::default();
//! let sources = default_sources(&config);
//! let drng = Arc::new(DrngPool::new(1));
//! let status = Arc::new(ProcessStatus::new());
//!
//! let mgr = Manager::initialize(
//!     config,
//!     sources,
//!     Arc::clone(&drng) as Arc<dyn DrngWorker>,
//!     Arc::clone(&status) as Arc<dyn StatusSink>,
//! )
//! .unwrap();
//!
//! // Background seeding until fully seeded or the budget expires.
//! mgr.monitor_initialize().unwrap();
//!
//! // Trigger reseeds as entropy estimates come in.
//! mgr.add_entropy();
//!
//! // Obtain random bytes at full security strength.
//! let mut buf = [0u8; 32];
//! if drng.generate_full(&mgr, &mut buf, Duration::from_secs(5)).is_ok() {
//!     println!("{:02x?}", buf);
//! }
//!
//! mgr.finalize();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod buffer;
pub mod config;
pub mod drng;
pub mod error;
pub mod manager;
pub mod sources;
pub mod status;
pub mod wait;

// Re-export commonly used types at crate root
pub use buffer::{EntropyBuffer, SeedSlot};
pub use config::Config;
pub use drng::{Drng, DrngPool, DrngWorker};
pub use error::Error;
pub use manager::Manager;
pub use sources::{EntropySource, MockSource, SourceRegistry};
pub use status::{ProcessStatus, StatusSink};
pub use wait::WaitQueue;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
