//! Resource booking operator.
//!
//! Reserves cloud resource groups for time-bounded bookings and starts and
//! stops them to match, so shared capacity only runs while someone holds it.
//!
//! ## Architecture
//!
//! - **api**: the four object kinds (Booking, Resource, ResourceMonitor,
//!   BookingScheduler) in a declarative store
//! - **controllers**: one reconciler per kind, driven by
//!   [`rbo_reconcile::ControllerWorker`]
//! - **cloud**: start/stop/status over provider resource groups, with a lease
//!   recorded on instance tags to keep two holders apart
//! - **notify**: pre-expiry notices per booking
//!
//! ```text
//! BookingScheduler ──creates──▶ Booking ──books──▶ Resource ──start/stop──▶ provider
//!                                                     ▲
//!                              ResourceMonitor ──discovers──┘
//! ```

pub mod api;
pub mod clock;
pub mod cloud;
pub mod config;
pub mod controllers;
pub mod error;
pub mod notify;
pub mod runtime;
pub mod seed;
pub mod store;

pub use error::{ReconcileError, ReconcileResult};
