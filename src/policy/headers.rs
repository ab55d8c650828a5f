//! Outbound header policy.
//!
//! One-shot decision per response, driven by [`Branch`]:
//!
//! ```text
//! Binary       → immutable caching (static TTL or binary max-age), marker
//! StaticAsset  → immutable caching (static TTL)
//! Document     → max-age=0, CSP report-only with nonce, Report-To, XSS
//! every branch → HSTS, framing, nosniff, referrer, content-type override,
//!                policy marker
//! ```
//!
//! All configured values are parsed into header values up front, so building
//! the header set for a response cannot fail.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::PolicyConfig;
use crate::policy::classifier::{Branch, Classification};
use crate::policy::nonce::Nonce;
use crate::policy::PolicyError;

/// Marker substituted with the nonce in the CSP template.
pub const NONCE_MARKER: &str = "{nonce}";

pub static CDN_CACHE_CONTROL: HeaderName = HeaderName::from_static("cdn-cache-control");
pub static REPORT_TO: HeaderName = HeaderName::from_static("report-to");

static REVALIDATE: HeaderValue = HeaderValue::from_static("public, max-age=0");
static CSP_FALLBACK: HeaderValue = HeaderValue::from_static("script-src 'none'");

#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    binary_max_age_secs: u64,
    hsts: HeaderValue,
    frame_options: HeaderValue,
    content_type_options: HeaderValue,
    referrer_policy: HeaderValue,
    xss_protection: HeaderValue,
    csp_template: String,
    report_to: HeaderValue,
    marker: (HeaderName, HeaderValue),
    binary_marker: (HeaderName, HeaderValue),
}

impl HeaderPolicy {
    pub fn new(config: &PolicyConfig) -> Result<Self, PolicyError> {
        let report_to = serde_json::to_string(&config.report_to)?;

        Ok(Self {
            binary_max_age_secs: config.binary_max_age_secs,
            hsts: value("hsts", &config.hsts)?,
            frame_options: value("frame_options", &config.frame_options)?,
            content_type_options: value("content_type_options", &config.content_type_options)?,
            referrer_policy: value("referrer_policy", &config.referrer_policy)?,
            xss_protection: value("xss_protection", &config.xss_protection)?,
            csp_template: config.csp_report_only.clone(),
            report_to: value("report_to", &report_to)?,
            marker: (
                name("marker_header", &config.marker_header)?,
                value("marker_value", &config.marker_value)?,
            ),
            binary_marker: (
                name("binary_marker_header", &config.binary_marker_header)?,
                value("binary_marker_value", &config.binary_marker_value)?,
            ),
        })
    }

    /// Build the outbound header set from the origin headers.
    pub fn build(
        &self,
        mut headers: HeaderMap,
        classification: &Classification,
        nonce: &Nonce,
    ) -> HeaderMap {
        match classification.branch() {
            Branch::Binary { ttl_secs } => {
                self.set_immutable(&mut headers, ttl_secs.unwrap_or(self.binary_max_age_secs));
                let (name, value) = &self.binary_marker;
                headers.insert(name.clone(), value.clone());
            }
            Branch::StaticAsset { ttl_secs } => self.set_immutable(&mut headers, ttl_secs),
            Branch::Document => {
                headers.insert(header::CACHE_CONTROL, REVALIDATE.clone());
                headers.remove(&CDN_CACHE_CONTROL);
                headers.insert(header::CONTENT_SECURITY_POLICY_REPORT_ONLY, self.csp(nonce));
                headers.insert(REPORT_TO.clone(), self.report_to.clone());
                headers.insert(header::X_XSS_PROTECTION, self.xss_protection.clone());
            }
        }

        headers.insert(header::STRICT_TRANSPORT_SECURITY, self.hsts.clone());
        headers.insert(header::X_FRAME_OPTIONS, self.frame_options.clone());
        headers.insert(header::X_CONTENT_TYPE_OPTIONS, self.content_type_options.clone());
        headers.insert(header::REFERRER_POLICY, self.referrer_policy.clone());

        if let Some(content_type) = classification.content_type_override {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(content_type.mime()),
            );
        }

        let (name, value) = &self.marker;
        headers.insert(name.clone(), value.clone());

        headers
    }

    // Immutable caching and a CSP never share a response.
    fn set_immutable(&self, headers: &mut HeaderMap, max_age: u64) {
        let cache = immutable(max_age);
        headers.insert(header::CACHE_CONTROL, cache.clone());
        headers.insert(CDN_CACHE_CONTROL.clone(), cache);
        headers.remove(header::CONTENT_SECURITY_POLICY_REPORT_ONLY);
        headers.remove(&REPORT_TO);
    }

    fn csp(&self, nonce: &Nonce) -> HeaderValue {
        let rendered = self.csp_template.replace(NONCE_MARKER, nonce.as_str());
        HeaderValue::from_str(&rendered).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Rendered CSP is not a valid header value, using fallback");
            CSP_FALLBACK.clone()
        })
    }
}

fn immutable(max_age: u64) -> HeaderValue {
    // Digits and ASCII punctuation only, always a valid value.
    HeaderValue::from_str(&format!("public, max-age={max_age}, immutable"))
        .unwrap_or_else(|_| REVALIDATE.clone())
}

fn value(field: &'static str, raw: &str) -> Result<HeaderValue, PolicyError> {
    HeaderValue::from_str(raw).map_err(|_| PolicyError::HeaderValue(field))
}

fn name(field: &'static str, raw: &str) -> Result<HeaderName, PolicyError> {
    HeaderName::from_bytes(raw.as_bytes()).map_err(|_| PolicyError::HeaderName(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::policy::classifier::{AssetClassifier, ContentTypeOverride};
    use crate::policy::nonce::tests::CountingRng;

    fn setup() -> (HeaderPolicy, AssetClassifier, Nonce) {
        (
            HeaderPolicy::new(&PolicyConfig::default()).unwrap(),
            AssetClassifier::new(&ClassifierConfig::default()),
            Nonce::generate_from(&mut CountingRng(0)).unwrap(),
        )
    }

    fn get<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers.get(name).map(|v| v.to_str().unwrap())
    }

    fn assert_security_set(headers: &HeaderMap) {
        assert_eq!(
            get(headers, "strict-transport-security"),
            Some("max-age=63072000; includeSubDomains; preload")
        );
        assert_eq!(get(headers, "x-frame-options"), Some("SAMEORIGIN"));
        assert_eq!(get(headers, "x-content-type-options"), Some("nosniff"));
        assert_eq!(
            get(headers, "referrer-policy"),
            Some("no-referrer, strict-origin-when-cross-origin")
        );
        assert_eq!(get(headers, "x-nonce-generator"), Some("HIT"));
    }

    #[test]
    fn test_binary_image_branch() {
        let (policy, classifier, nonce) = setup();
        let mut base = HeaderMap::new();
        base.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));

        let headers = policy.build(base, &classifier.classify("/logo.png", "image/png"), &nonce);

        assert_eq!(get(&headers, "cache-control"), Some("public, max-age=31536000, immutable"));
        assert_eq!(get(&headers, "cdn-cache-control"), Some("public, max-age=31536000, immutable"));
        assert_eq!(get(&headers, "content-type"), Some("image/png"));
        assert_eq!(get(&headers, "x-edge-asset"), Some("Non-text item - headers edited!"));
        assert!(headers.get("content-security-policy-report-only").is_none());
        assert!(headers.get("x-xss-protection").is_none());
        assert_security_set(&headers);
    }

    #[test]
    fn test_binary_without_static_path_uses_binary_max_age() {
        let (policy, classifier, nonce) = setup();
        let classification = classifier.classify("/api/items", "application/json");

        let headers = policy.build(HeaderMap::new(), &classification, &nonce);
        assert_eq!(get(&headers, "cache-control"), Some("public, max-age=2678400, immutable"));
    }

    #[test]
    fn test_javascript_override_in_binary_branch() {
        let (policy, classifier, nonce) = setup();
        let classification = classifier.classify("/app.js", "application/javascript");

        let headers = policy.build(HeaderMap::new(), &classification, &nonce);
        assert_eq!(get(&headers, "content-type"), Some("application/javascript; charset=utf-8"));
        assert_eq!(get(&headers, "cache-control"), Some("public, max-age=31536000, immutable"));
        assert!(headers.get("content-security-policy-report-only").is_none());
    }

    #[test]
    fn test_static_text_asset_branch() {
        let (policy, classifier, nonce) = setup();
        let classification = classifier.classify("/icons/menu.svg", "text/plain");
        assert_eq!(classification.content_type_override, Some(ContentTypeOverride::Svg));

        let headers = policy.build(HeaderMap::new(), &classification, &nonce);
        assert_eq!(get(&headers, "cache-control"), Some("public, max-age=31536000, immutable"));
        assert_eq!(get(&headers, "content-type"), Some("image/svg+xml; charset=utf-8"));
        assert!(headers.get("content-security-policy-report-only").is_none());
        assert!(headers.get("report-to").is_none());
        assert!(headers.get("x-edge-asset").is_none());
        assert_security_set(&headers);
    }

    #[test]
    fn test_document_branch() {
        let (policy, classifier, nonce) = setup();
        let mut base = HeaderMap::new();
        base.insert(CDN_CACHE_CONTROL.clone(), HeaderValue::from_static("max-age=600"));
        base.insert("x-origin", HeaderValue::from_static("kept"));

        let headers = policy.build(base, &classifier.classify("/index.html", "text/html"), &nonce);

        assert_eq!(get(&headers, "cache-control"), Some("public, max-age=0"));
        assert!(headers.get("cdn-cache-control").is_none());
        assert_eq!(get(&headers, "x-origin"), Some("kept"));
        assert_eq!(get(&headers, "x-xss-protection"), Some("1"));
        assert_eq!(
            get(&headers, "report-to"),
            Some(r#"{"group":"default","max_age":31536000,"endpoints":[{"url":"https://example.report-uri.com/a/d/g"}],"include_subdomains":true}"#)
        );

        let csp = get(&headers, "content-security-policy-report-only").unwrap();
        assert!(csp.contains(&format!("script-src 'nonce-{nonce}' 'strict-dynamic'")));
        assert!(csp.contains(&format!("script-src-elem 'self' 'nonce-{nonce}'")));
        assert!(!csp.contains(NONCE_MARKER));
        assert_security_set(&headers);
    }

    #[test]
    fn test_origin_csp_removed_from_immutable_responses() {
        let (policy, classifier, nonce) = setup();
        let mut base = HeaderMap::new();
        base.insert(
            header::CONTENT_SECURITY_POLICY_REPORT_ONLY,
            HeaderValue::from_static("default-src 'none'"),
        );

        let headers = policy.build(base, &classifier.classify("/a.css", "text/css"), &nonce);
        assert!(headers.get("content-security-policy-report-only").is_none());
    }

    #[test]
    fn test_malformed_classification_gets_document_policy() {
        let (policy, _, nonce) = setup();
        let classification = Classification {
            is_text: false,
            cacheable_static: true,
            ttl_secs: None,
            content_type_override: None,
        };

        let headers = policy.build(HeaderMap::new(), &classification, &nonce);
        assert_eq!(get(&headers, "cache-control"), Some("public, max-age=0"));
        assert!(headers.get("content-security-policy-report-only").is_some());
    }

    #[test]
    fn test_invalid_config_value_rejected() {
        let config = PolicyConfig {
            hsts: "max-age=1\n".into(),
            ..PolicyConfig::default()
        };
        assert!(matches!(
            HeaderPolicy::new(&config),
            Err(PolicyError::HeaderValue("hsts"))
        ));
    }
}
