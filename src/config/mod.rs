//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EdgeConfig (validated, immutable)
//!     → compiled into a PolicySet, shared via ArcSwap
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server compiles and swaps the PolicySet
//!     → in-flight requests keep the set they started with
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only the policy sections are hot-reloadable; listener and origin
//!   changes need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ClassifierConfig, EdgeConfig, ListenerConfig, ObservabilityConfig, OriginConfig,
    PolicyConfig, ReportEndpoint, ReportToConfig, RewriteConfig, SecurityConfig, TimeoutConfig,
};
