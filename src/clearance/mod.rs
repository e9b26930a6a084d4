//! Clearance management
//!
//! A clearance is the cookie set and user agent that an origin accepts as a
//! passed challenge. This module owns the per-domain cache of clearances and
//! the single-flight refresh logic around it.

pub mod cache;

pub use cache::{Clearance, ClearanceCache};
