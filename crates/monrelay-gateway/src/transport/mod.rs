//! Transport layer: HTTP event intake and error mapping.

pub mod http;

pub use http::{intake, HttpError};
