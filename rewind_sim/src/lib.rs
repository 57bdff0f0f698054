//! Rewind Deterministic Simulation Harness
//!
//! This crate provides a controlled world where tracked entities move under a
//! toy physics model while a single [`rewind_core::TimeController`] rewinds,
//! scrubs and fast-forwards them.
//!
//! # Core Principle: Seeded, Ordered Ticks
//!
//! - **Time**: Virtual clock advances only when the world ticks
//! - **Frames**: Frame lengths optionally jittered from a seeded RNG
//! - **Ordering**: Physics steps every body before any tracker records
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (Virtual Clock + Frame Jitter)            │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                            │                                │
//! │  ┌─────────────────────────▼────────────────────────────┐   │
//! │  │ TimeController ── events ──► RewindTracker  ...      │   │
//! │  └──────────────────────────────────────┬───────────────┘   │
//! │                                         │ owns              │
//! │                                    ┌────▼────┐              │
//! │                                    │ SimBody │              │
//! │                                    └─────────┘              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rewind_sim::{SimConfig, SimWorld};
//!
//! let mut world = SimWorld::new(SimConfig { seed: 42, ..Default::default() })?;
//! world.run_for(2.0);
//! world.start_rewind();
//! world.run_for(0.5);
//! world.stop_rewind();
//! ```

mod context;
mod error;
mod exporter;
mod physics;
mod runner;
pub mod scenarios;
mod world;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{EntityFrame, SimEvent, SimExport, SimFrame};
pub use physics::{BodyCall, BodyKind, SimBody, CALL_LOG_CAPACITY};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{SimConfig, SimWorld};
