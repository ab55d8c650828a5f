//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → Pass to pipeline
//!
//! Origin response:
//!     → headers.rs (strip hop-by-hop)
//!     → policy (security headers, CSP)
//! ```
//!
//! # Design Decisions
//! - Fail closed: missing information selects the stricter policy
//! - No trust in client-supplied hop-by-hop headers

pub mod headers;
