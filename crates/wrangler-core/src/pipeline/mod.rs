//! End-to-end acquisition flows, one per remote source.
//!
//! Each pipeline runs its steps sequentially and reports through the
//! [`ProgressSink`](crate::progress::ProgressSink) it is given.

mod hub;
mod registry;

pub use hub::HubPipeline;
pub use registry::RegistryPipeline;
