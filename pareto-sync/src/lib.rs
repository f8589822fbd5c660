//! # pareto-sync
//!
//! Client-side reconciliation of sprint records pushed over the live channel.
//!
//! Derive a [`Subscription`] from the sprints fetched on entry, decode every
//! inbound payload once into a [`Frame`], and let a [`Reconciler`] fold it
//! into the single [`SprintStore`] that all views observe.

pub mod error;
pub mod frame;
pub mod reconcile;
pub mod store;
pub mod subscription;

pub use error::FrameError;
pub use frame::Frame;
pub use reconcile::{reconcile, Notice, Outcome, Reconciler};
pub use store::{SprintStore, SprintView};
pub use subscription::Subscription;
