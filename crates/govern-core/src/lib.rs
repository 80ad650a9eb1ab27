//! Governance core for governd
//!
//! This crate owns the process-governance machinery:
//! - [`HostedApplication`]: the per-application governance record
//! - [`ActivationContext`] / `ProcessHandle`: the activator-owned process handle
//! - [`Activator`] / [`ProcessActivator`]: OS-level start/stop mechanics with
//!   timeout-driven escalation to force-kill
//! - [`Governor`]: the registry of hosted applications and bulk sequencing
//! - [`Application`]: the container a host entry point boots and stops
//! - The remote administrative terminal with its static command registry

mod activation;
mod activator;
mod app;
mod application;
mod governor;
mod terminal;

pub use activation::*;
pub use activator::*;
pub use app::*;
pub use application::*;
pub use governor::*;
pub use terminal::*;
