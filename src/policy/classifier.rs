//! Asset classification.
//!
//! Decides, from the request path and the origin's content type, which
//! header policy a response gets. Classification is pure: the same path and
//! content type always produce the same result.

use std::collections::HashSet;

use crate::config::ClassifierConfig;

/// Content type forced onto a response regardless of what the origin sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTypeOverride {
    Javascript,
    Svg,
}

impl ContentTypeOverride {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Javascript => "application/javascript; charset=utf-8",
            Self::Svg => "image/svg+xml; charset=utf-8",
        }
    }
}

/// Raw classification of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Origin content type starts with `text/`.
    pub is_text: bool,
    /// Path extension is in the static allow-list.
    pub cacheable_static: bool,
    /// Immutable max-age, set only alongside `cacheable_static`.
    pub ttl_secs: Option<u64>,
    pub content_type_override: Option<ContentTypeOverride>,
}

/// Header policy branch a classification selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Non-text body, streamed untouched. `ttl_secs` is set when the path is
    /// also a known static file.
    Binary { ttl_secs: Option<u64> },
    /// Text body at a static-file path: immutable caching, no CSP.
    StaticAsset { ttl_secs: u64 },
    /// Text document: revalidate on every request, CSP report-only.
    Document,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Binary { .. } => "binary",
            Branch::StaticAsset { .. } => "static",
            Branch::Document => "document",
        }
    }
}

impl Classification {
    /// Project onto a policy branch.
    ///
    /// A static flag without a positive TTL (or a TTL without the flag) is
    /// inconsistent and always lands on `Document`, the strictest branch.
    pub fn branch(&self) -> Branch {
        let ttl = match (self.cacheable_static, self.ttl_secs) {
            (true, Some(ttl)) if ttl > 0 => Some(ttl),
            (false, None) => None,
            _ => return Branch::Document,
        };

        match (self.is_text, ttl) {
            (false, ttl_secs) => Branch::Binary { ttl_secs },
            (true, Some(ttl_secs)) => Branch::StaticAsset { ttl_secs },
            (true, None) => Branch::Document,
        }
    }
}

/// Path/content-type classifier built from configuration.
#[derive(Debug, Clone)]
pub struct AssetClassifier {
    static_extensions: HashSet<String>,
    static_ttl_secs: u64,
}

impl AssetClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            static_extensions: config.static_extensions.iter().cloned().collect(),
            static_ttl_secs: config.static_ttl_secs,
        }
    }

    pub fn classify(&self, path: &str, content_type: &str) -> Classification {
        let extension = extension(path);
        let cacheable_static = extension.is_some_and(|ext| self.static_extensions.contains(ext));

        let content_type_override = match extension {
            Some("js") => Some(ContentTypeOverride::Javascript),
            Some("svg") => Some(ContentTypeOverride::Svg),
            _ => None,
        };

        Classification {
            is_text: is_text(content_type),
            cacheable_static,
            ttl_secs: cacheable_static.then_some(self.static_ttl_secs),
            content_type_override,
        }
    }
}

/// Whether a content type selects the text (rewriting) path.
pub fn is_text(content_type: &str) -> bool {
    content_type.starts_with("text/")
}

/// Text after the last `.` of the path, if that text has no `/`.
fn extension(path: &str) -> Option<&str> {
    let (_, ext) = path.rsplit_once('.')?;
    (!ext.contains('/')).then_some(ext)
}
