//! herdwatch-autoscale — threshold-triggered scale-up with hysteresis.
//!
//! Consumes cluster load totals from the poller and, when the cluster is
//! both loaded (ratio above threshold) and short on headroom, asks the
//! orchestrator for more instances. A cooldown window gates successive
//! scale-ups so a noisy signal cannot thrash the orchestrator.
//!
//! # Decision
//!
//! ```text
//! ratio    = load / capacity        (capacity == 0 → no action)
//! headroom = capacity - load
//!
//! if ratio > 0.5 and headroom < 120 and cooldown elapsed:
//!     scale to current_instances + 2
//! ```
//!
//! The cooldown window is consumed the moment a trigger passes the gate,
//! before any orchestrator call returns. A failed attempt therefore still
//! spends its window, which keeps a struggling orchestrator from being
//! hammered once per tick.

pub mod controller;

pub use controller::{ScaleController, ScalePolicy};
