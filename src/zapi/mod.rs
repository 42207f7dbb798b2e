//! Storage controller API
//!
//! Element trees, their XML wire form, the transport port and the client
//! that ties them together.

pub mod client;
pub mod codec;
pub mod element;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ApiVersion, ControllerClient, Response};
pub use element::Element;
pub use transport::{ControllerTransport, HttpTransport, TransportType};
