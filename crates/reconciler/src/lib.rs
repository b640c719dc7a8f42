//! Membership reconciliation engine for galera clusters.
//!
//! Every pass re-derives the full membership from observation, chooses at
//! most one mutating action and publishes status. The [`Controller`] runs one
//! pass loop per cluster.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod action;
mod actuator;
mod config;
mod controller;
mod election;
mod error;
mod history;
mod observer;
mod planner;
mod quorum;
mod reconciler;
mod upgrade;

pub use action::Action;
pub use actuator::Actuator;
pub use config::{ControllerConfig, ReconcilerConfig};
pub use controller::Controller;
pub use election::elect_seed;
pub use error::Error;
pub use history::ObservationHistory;
pub use observer::{ObserveMode, Observer};
pub use planner::{Plan, plan};
pub use quorum::{QuorumGuard, Verdict, required_primaries};
pub use reconciler::{PassReport, Reconciler};
pub use upgrade::{UpgradeStep, is_outdated, next_upgrade};
