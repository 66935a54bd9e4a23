//! The `connection` module describes how a session reaches its broker:
//! the endpoint and credentials (`SessionProperties`) and the reconnection
//! policy applied after transport loss (`Backoff`).

pub mod backoff;
pub mod properties;

pub use backoff::Backoff;
pub use properties::SessionProperties;
