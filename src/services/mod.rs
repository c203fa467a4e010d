//! # Service abstractions.
//!
//! This module provides the service-related types:
//! - [`Service`] - capability trait for long-running units with a start/stop lifecycle
//! - [`ServiceRef`] - shared reference to a service (`Arc<dyn Service>`)
//! - [`ServiceFn`] - closure-backed service implementation

mod service;
mod service_fn;

pub use service::{Service, ServiceRef};
pub use service_fn::ServiceFn;
