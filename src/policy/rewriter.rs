//! HTML nonce rewriting.
//!
//! Binds the markup to the CSP header by writing the request's nonce into
//! the document. Four global substitutions run in order:
//!
//! 1. the placeholder token (any case) becomes the nonce;
//! 2. `src="https://<analytics host>` gains a preceding `nonce="…"`;
//! 3. `src="https://<cdn host>` gains a preceding `nonce="…"`;
//! 4. `<email decode script>"` gains a trailing ` nonce="…"`.

use regex::{NoExpand, Regex, RegexBuilder};

use crate::config::RewriteConfig;
use crate::policy::nonce::Nonce;

#[derive(Debug, Clone)]
pub struct HtmlRewriter {
    placeholder: Regex,
    script_sources: [String; 2],
    email_decode: String,
}

impl HtmlRewriter {
    pub fn new(config: &RewriteConfig) -> Result<Self, regex::Error> {
        let placeholder = RegexBuilder::new(&regex::escape(&config.placeholder))
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            placeholder,
            script_sources: [
                format!("src=\"https://{}", config.analytics_host),
                format!("src=\"https://{}", config.cdn_host),
            ],
            email_decode: format!("{}\"", config.email_decode_script),
        })
    }

    /// Rewrite `html` for one response. Returns the input unchanged when
    /// none of the patterns occur.
    pub fn rewrite(&self, html: &str, nonce: &Nonce) -> String {
        let nonce = nonce.as_str();
        let mut out = self.placeholder.replace_all(html, NoExpand(nonce)).into_owned();

        let attribute = format!("nonce=\"{nonce}\"");
        for source in &self.script_sources {
            if out.contains(source.as_str()) {
                out = out.replace(source.as_str(), &format!("{attribute} {source}"));
            }
        }

        if out.contains(self.email_decode.as_str()) {
            out = out.replace(
                self.email_decode.as_str(),
                &format!("{} {attribute}", self.email_decode),
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::nonce::tests::CountingRng;

    fn setup() -> (HtmlRewriter, Nonce) {
        let rewriter = HtmlRewriter::new(&RewriteConfig::default()).unwrap();
        let nonce = Nonce::generate_from(&mut CountingRng(0)).unwrap();
        (rewriter, nonce)
    }

    #[test]
    fn test_placeholder_replaced_in_any_case() {
        let (rewriter, nonce) = setup();
        let html = r#"<script nonce="DhcnhD3khTMePgXw">a()</script><style nonce="dhcnhd3khtmepgxw"></style>"#;

        let out = rewriter.rewrite(html, &nonce);
        assert_eq!(
            out,
            format!(r#"<script nonce="{nonce}">a()</script><style nonce="{nonce}"></style>"#)
        );
    }

    #[test]
    fn test_analytics_and_cdn_scripts_annotated_everywhere() {
        let (rewriter, nonce) = setup();
        let html = concat!(
            r#"<script defer src="https://static.cloudflareinsights.com/beacon.min.js"></script>"#,
            r#"<script src="https://ajax.cloudflare.com/a.js"></script>"#,
            r#"<script src="https://ajax.cloudflare.com/b.js"></script>"#,
        );

        let out = rewriter.rewrite(html, &nonce);
        assert_eq!(
            out,
            format!(
                concat!(
                    r#"<script defer nonce="{n}" src="https://static.cloudflareinsights.com/beacon.min.js"></script>"#,
                    r#"<script nonce="{n}" src="https://ajax.cloudflare.com/a.js"></script>"#,
                    r#"<script nonce="{n}" src="https://ajax.cloudflare.com/b.js"></script>"#,
                ),
                n = nonce
            )
        );
    }

    #[test]
    fn test_email_decode_script_gets_trailing_nonce() {
        let (rewriter, nonce) = setup();
        let html = r#"<script src="/cdn-cgi/scripts/5c5dd728/cloudflare-static/email-decode.min.js"></script>"#;

        let out = rewriter.rewrite(html, &nonce);
        assert_eq!(
            out,
            format!(
                r#"<script src="/cdn-cgi/scripts/5c5dd728/cloudflare-static/email-decode.min.js" nonce="{nonce}"></script>"#
            )
        );
    }

    #[test]
    fn test_no_patterns_is_identity() {
        let (rewriter, nonce) = setup();
        let html = r#"<html><script src="https://other.example.com/x.js"></script></html>"#;
        assert_eq!(rewriter.rewrite(html, &nonce), html);
        assert_eq!(rewriter.rewrite("", &nonce), "");
    }

    #[test]
    fn test_placeholder_is_literal_not_pattern() {
        let config = RewriteConfig {
            placeholder: "__NONCE.*__".into(),
            ..RewriteConfig::default()
        };
        let rewriter = HtmlRewriter::new(&config).unwrap();
        let nonce = Nonce::generate_from(&mut CountingRng(0)).unwrap();

        assert_eq!(rewriter.rewrite("__NONCE__", &nonce), "__NONCE__");
        assert_eq!(rewriter.rewrite("__nonce.*__", &nonce), nonce.as_str());
    }

    #[test]
    fn test_same_nonce_in_every_substitution() {
        let (rewriter, nonce) = setup();
        let html = concat!(
            r#"<meta name="n" content="DhcnhD3khTMePgXw">"#,
            r#"<script src="https://static.cloudflareinsights.com/b.js"></script>"#,
        );

        let out = rewriter.rewrite(html, &nonce);
        assert_eq!(out.matches(nonce.as_str()).count(), 2);
    }
}
