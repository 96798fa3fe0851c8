//! Declarative object model.
//!
//! Every object is an [`Object<K>`]: store-managed metadata, a user-owned
//! spec, and a reconciler-owned status. The spec type names the kind and
//! fixes the status type through [`Kind`].
//!
//! Timestamps inside specs and statuses are RFC 3339 strings. They are parsed
//! by the reconcilers, so a malformed value degrades one object instead of
//! making the whole kind unreadable.

mod booking;
mod meta;
mod monitor;
mod resource;
mod scheduler;

pub use booking::{Booking, BookingPhase, BookingSpec, BookingStatus, Notification};
pub use meta::{format_timestamp, parse_timestamp, Kind, Object, ObjectMeta};
pub use monitor::{ResourceMonitor, ResourceMonitorSpec, ResourceMonitorStatus};
pub use resource::{
    Resource, ResourcePhase, ResourceSpec, ResourceStatus, BOOKING_LABEL, DEFAULT_RESOURCE_TYPE,
};
pub use scheduler::{BookingScheduler, BookingSchedulerSpec, BookingSchedulerStatus};
