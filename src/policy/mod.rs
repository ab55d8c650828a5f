//! Response policy subsystem.
//!
//! # Data Flow
//! ```text
//! Per request:
//!     nonce.rs (fresh nonce)
//!     → classifier.rs (path + content type → Branch)
//!     → rewriter.rs (text bodies only: bind nonce into markup)
//!     → headers.rs (Branch + nonce → outbound header set)
//! ```
//!
//! # Design Decisions
//! - The nonce is a value threaded through calls, never ambient state
//! - Everything configurable is compiled once into a `PolicySet`
//! - Missing or inconsistent information selects the strictest branch

pub mod classifier;
pub mod headers;
pub mod nonce;
pub mod rewriter;

use thiserror::Error;

use crate::config::EdgeConfig;

pub use classifier::{AssetClassifier, Branch, Classification, ContentTypeOverride};
pub use headers::HeaderPolicy;
pub use nonce::{EntropyUnavailable, Nonce};
pub use rewriter::HtmlRewriter;

/// Failure compiling configuration into a policy set.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy.{0}: invalid header value")]
    HeaderValue(&'static str),

    #[error("policy.{0}: invalid header name")]
    HeaderName(&'static str),

    #[error("policy.report_to: {0}")]
    ReportTo(#[from] serde_json::Error),

    #[error("rewrite.placeholder: {0}")]
    Placeholder(#[from] regex::Error),
}

/// Compiled, immutable policy shared by all requests.
#[derive(Debug, Clone)]
pub struct PolicySet {
    pub classifier: AssetClassifier,
    pub rewriter: HtmlRewriter,
    pub headers: HeaderPolicy,
}

impl PolicySet {
    pub fn from_config(config: &EdgeConfig) -> Result<Self, PolicyError> {
        Ok(Self {
            classifier: AssetClassifier::new(&config.classifier),
            rewriter: HtmlRewriter::new(&config.rewrite)?,
            headers: HeaderPolicy::new(&config.policy)?,
        })
    }
}
