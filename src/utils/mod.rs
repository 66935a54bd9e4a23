//! The `utils` module holds the pieces shared by every other module of
//! `popsub-client`: the error taxonomy and the logging setup.

pub mod error;
pub mod logging;
