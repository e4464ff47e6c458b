//! # inbibw
//!
//! Injection and bisection bandwidth benchmark for distributed-memory
//! clusters.
//!
//! Every participant exchanges fixed-size messages with its peers for a
//! number of iterations and times the exchange. Two traffic patterns are
//! measured:
//!
//! - **Injection**: all-to-all, each participant sends to and receives from
//!   every other one; reports how fast the network absorbs traffic.
//! - **Bisection**: the lower half of the participants pairs with the upper
//!   half; reports the throughput across the cut.
//!
//! Per-participant rates are summed per node and over the whole job, and
//! the ratio of bisection to injection bandwidth tells how close the network
//! comes to being non-blocking.
//!
//! ## Quick Start
//!
//! ```no_run
//! use inbibw::{run_suite, Config, ConsoleReporter, LocalCluster, TestSelection, Transport};
//!
//! fn main() -> inbibw::Result<()> {
//!     let config = Config::new(1 << 20, 100, TestSelection::ALL)?;
//!     let cluster = LocalCluster::new(4, 2)?;
//!     cluster.run(|world| {
//!         let node = world.split_shared()?;
//!         let mut reporter = ConsoleReporter::stdout();
//!         run_suite(&world, &node, &config, &mut reporter)
//!     })?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description | Dependencies |
//! |---------|-------------|--------------|
//! | `mpi`   | MPI transport through the C shim in `csrc/` | an MPI installation |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::similar_names)]

pub mod aggregate;
pub mod bench;
pub mod config;
pub mod engine;
mod error;
pub mod hostfile;
pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi;
pub mod pattern;
pub mod report;
pub mod size;
pub mod slurm;
mod transport;
pub mod workspace;

pub use aggregate::{Bandwidth, Contribution, GlobalFigures, MeasurementResult, NonBlockingRatio};
pub use bench::{run_suite, run_test, SuiteReport, TestOutcome, TestResult, Topology};
pub use config::{Config, Pattern, TestSelection};
pub use engine::ExchangeEngine;
pub use error::{Error, Result};
pub use local::{LocalCluster, LocalComm};
pub use pattern::{partner, TrafficPattern};
pub use report::{ConsoleReporter, Reporter};
pub use size::parse_size;
pub use slurm::JobEnvironment;
pub use transport::Transport;
pub use workspace::Workspace;
