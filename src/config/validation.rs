//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, TTLs > 0)
//! - Check that the origin is a plain http URL
//! - Check that the CSP template actually binds the nonce
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::config::schema::EdgeConfig;
use crate::policy::headers::NONCE_MARKER;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("origin.url: {0}")]
    InvalidOrigin(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field}: invalid header name {value:?}")]
    InvalidHeaderName { field: &'static str, value: String },

    #[error("{field}: invalid header value {value:?}")]
    InvalidHeaderValue { field: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("classifier.static_extensions: {0:?} is not a bare extension")]
    InvalidExtension(String),

    #[error("policy.csp_report_only must contain the {{nonce}} marker")]
    CspWithoutNonce,
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    match Url::parse(&config.origin.url) {
        Ok(url) if url.scheme() != "http" => errors.push(ValidationError::InvalidOrigin(format!(
            "unsupported scheme {:?}, only http is forwarded",
            url.scheme()
        ))),
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::InvalidOrigin("missing host".to_string()))
        }
        Ok(url) if url.path() != "/" || url.query().is_some() => errors.push(
            ValidationError::InvalidOrigin("path and query are taken from the request".to_string()),
        ),
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::InvalidOrigin(e.to_string())),
    }

    let positive: [(&'static str, u64); 5] = [
        ("listener.max_connections", config.listener.max_connections as u64),
        ("timeouts.origin_secs", config.timeouts.origin_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("classifier.static_ttl_secs", config.classifier.static_ttl_secs),
        ("policy.binary_max_age_secs", config.policy.binary_max_age_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::Zero("security.max_body_size"));
    }

    for ext in &config.classifier.static_extensions {
        if ext.is_empty() || ext.contains(['.', '/']) {
            errors.push(ValidationError::InvalidExtension(ext.clone()));
        }
    }

    let rewrite = &config.rewrite;
    for (field, value) in [
        ("rewrite.placeholder", &rewrite.placeholder),
        ("rewrite.analytics_host", &rewrite.analytics_host),
        ("rewrite.cdn_host", &rewrite.cdn_host),
        ("rewrite.email_decode_script", &rewrite.email_decode_script),
    ] {
        if value.is_empty() {
            errors.push(ValidationError::Empty(field));
        }
    }

    let policy = &config.policy;
    for (field, value) in [
        ("policy.marker_header", &policy.marker_header),
        ("policy.binary_marker_header", &policy.binary_marker_header),
    ] {
        if HeaderName::from_bytes(value.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName {
                field,
                value: value.clone(),
            });
        }
    }
    for (field, value) in [
        ("policy.hsts", &policy.hsts),
        ("policy.frame_options", &policy.frame_options),
        ("policy.content_type_options", &policy.content_type_options),
        ("policy.referrer_policy", &policy.referrer_policy),
        ("policy.xss_protection", &policy.xss_protection),
        ("policy.csp_report_only", &policy.csp_report_only),
        ("policy.marker_value", &policy.marker_value),
        ("policy.binary_marker_value", &policy.binary_marker_value),
    ] {
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::InvalidHeaderValue {
                field,
                value: value.clone(),
            });
        }
    }
    if !policy.csp_report_only.contains(NONCE_MARKER) {
        errors.push(ValidationError::CspWithoutNonce);
    }
    if policy.report_to.endpoints.is_empty() {
        errors.push(ValidationError::Empty("policy.report_to.endpoints"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
