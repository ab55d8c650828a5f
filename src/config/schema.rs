//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge.
//! All types derive Serde traits for deserialization from config files.
//! Every section has defaults so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the nonce edge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Upstream origin the edge sits in front of.
    pub origin: OriginConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request/response size limits.
    pub security: SecurityConfig,

    /// Asset classification rules.
    pub classifier: ClassifierConfig,

    /// HTML nonce rewriting rules.
    pub rewrite: RewriteConfig,

    /// Outbound header policy.
    pub policy: PolicyConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Origin server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Base URL of the origin (http only, e.g. "http://127.0.0.1:3000").
    pub url: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for the origin to produce response headers, in seconds.
    pub origin_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            origin_secs: 15,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound request body size in bytes.
    pub max_request_body: usize,

    /// Maximum text body buffered for rewriting, in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_request_body: 2 * 1024 * 1024, // 2MB
            max_body_size: 8 * 1024 * 1024,    // 8MB
        }
    }
}

/// Asset classification rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Path extensions (without the dot) treated as immutable static files.
    pub static_extensions: Vec<String>,

    /// max-age for static files, in seconds.
    pub static_ttl_secs: u64,
}

const STATIC_EXTENSIONS: &[&str] = &[
    "ac3", "avi", "bmp", "br", "bz2", "css", "cue", "dat", "doc", "docx", "dts", "eot", "exe",
    "flv", "gif", "gz", "ico", "img", "iso", "jpeg", "jpg", "js", "json", "map", "mkv", "mp3",
    "mp4", "mpeg", "mpg", "ogg", "pdf", "png", "ppt", "pptx", "qt", "rar", "rm", "svg", "swf",
    "tar", "tgz", "ttf", "txt", "wav", "webp", "webm", "webmanifest", "woff", "woff2", "xls",
    "xlsx", "xml", "zip",
];

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            static_extensions: STATIC_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            static_ttl_secs: 31_536_000, // 1 year
        }
    }
}

/// HTML rewriting rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Token in origin markup replaced by the nonce (matched case-insensitively).
    pub placeholder: String,

    /// Analytics host whose `src="https://…"` script tags get a nonce.
    pub analytics_host: String,

    /// CDN host whose `src="https://…"` script tags get a nonce.
    pub cdn_host: String,

    /// Script reference followed by `"` that gets a trailing nonce attribute.
    pub email_decode_script: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            placeholder: "DhcnhD3khTMePgXw".to_string(),
            analytics_host: "static.cloudflareinsights.com".to_string(),
            cdn_host: "ajax.cloudflare.com".to_string(),
            email_decode_script: "cloudflare-static/email-decode.min.js".to_string(),
        }
    }
}

/// Outbound header policy values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// max-age for non-text responses whose path is not a known static file.
    pub binary_max_age_secs: u64,

    /// Strict-Transport-Security value.
    pub hsts: String,

    /// X-Frame-Options value.
    pub frame_options: String,

    /// X-Content-Type-Options value.
    pub content_type_options: String,

    /// Referrer-Policy value.
    pub referrer_policy: String,

    /// X-XSS-Protection value (documents only).
    pub xss_protection: String,

    /// Content-Security-Policy-Report-Only template; `{nonce}` is substituted.
    pub csp_report_only: String,

    /// Report-To group advertised alongside the CSP.
    pub report_to: ReportToConfig,

    /// Header signalling a response went through the policy layer.
    pub marker_header: String,
    pub marker_value: String,

    /// Extra diagnostic header set on non-text responses.
    pub binary_marker_header: String,
    pub binary_marker_value: String,
}

const DEFAULT_CSP: &str = "report-uri https://example.report-uri.com/r/d/csp/reportOnly; \
default-src 'self'; \
connect-src 'self' https://*.cloudflareinsights.com https://cloudflareinsights.com; \
base-uri 'self'; \
frame-src 'self'; \
frame-ancestors 'self'; \
form-action 'self'; \
style-src 'self' data:; \
style-src-attr 'self'; \
img-src 'self' data:; \
font-src 'self'; \
script-src 'nonce-{nonce}' 'strict-dynamic' https: 'self'; \
script-src-elem 'self' 'nonce-{nonce}'";

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            binary_max_age_secs: 2_678_400, // 31 days
            hsts: "max-age=63072000; includeSubDomains; preload".to_string(),
            frame_options: "SAMEORIGIN".to_string(),
            content_type_options: "nosniff".to_string(),
            referrer_policy: "no-referrer, strict-origin-when-cross-origin".to_string(),
            xss_protection: "1".to_string(),
            csp_report_only: DEFAULT_CSP.to_string(),
            report_to: ReportToConfig::default(),
            marker_header: "x-nonce-generator".to_string(),
            marker_value: "HIT".to_string(),
            binary_marker_header: "x-edge-asset".to_string(),
            binary_marker_value: "Non-text item - headers edited!".to_string(),
        }
    }
}

/// A single `Report-To` endpoint group.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReportToConfig {
    pub group: String,
    pub max_age: u64,
    pub endpoints: Vec<ReportEndpoint>,
    pub include_subdomains: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ReportEndpoint {
    pub url: String,
}

impl Default for ReportToConfig {
    fn default() -> Self {
        Self {
            group: "default".to_string(),
            max_age: 31_536_000,
            endpoints: vec![ReportEndpoint {
                url: "https://example.report-uri.com/a/d/g".to_string(),
            }],
            include_subdomains: true,
        }
    }
}
