//! Presence load generator.
//!
//! A [`supervisor::PoolSupervisor`] launches a population of
//! [`worker::WorkerLifecycle`]s at a randomized pace. Each worker repeatedly
//! opens a session, negotiates a broadcast lease and keeps it alive with
//! heartbeats until the lease's tick budget is spent, then starts over.

pub mod config;
pub mod gauge;
pub mod heartbeat;
pub mod identity;
pub mod supervisor;
pub mod telemetry;
pub mod worker;

#[cfg(test)]
mod testing;
