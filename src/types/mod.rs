//! Type definitions for the clearance proxy
//!
//! This module contains the main data structures used for requests and responses.

pub mod request;
pub mod response;

pub use request::ProxyRequest;
pub use response::{ClearanceInfo, ErrorResponse, HealthResponse, ProxyResponse};
