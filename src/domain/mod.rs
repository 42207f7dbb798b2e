//! Domain layer - Core records, naming rules and port definitions
//!
//! This module defines the records drivers operate on and the traits (ports)
//! that adapters implement, following hexagonal architecture principles.

pub mod export;
pub mod naming;
pub mod ports;
pub mod share;

pub use export::*;
pub use ports::*;
pub use share::*;
