//! Browser session management
//!
//! This module defines the opaque [`ChallengeSession`] capability used to drive
//! a real browser through an anti-bot challenge, the [`BrowserPool`] that bounds
//! how many of those expensive sessions exist at once, and the
//! chromiumoxide-backed production adapter.

pub mod chromium;
pub mod pool;
pub mod session;

pub use chromium::ChromiumSessionFactory;
pub use pool::{BrowserPool, PoolStats, SessionLease};
pub use session::{ChallengeSession, ElementRef, SessionFactory};
