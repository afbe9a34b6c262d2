//! Outer surfaces of the service.

pub mod http;
