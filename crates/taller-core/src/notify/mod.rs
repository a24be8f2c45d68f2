//! Outbound tracking links and notification messages.
//!
//! Anything handed to an external channel must never carry a loopback
//! address, even when the stored configuration or the template itself was
//! authored against a development server. Pure functions, no I/O.

use regex::Regex;

use crate::error::{Error, Result};

/// Public tracking base used whenever the configured one is absent or unsafe.
pub const DEFAULT_TRACKING_BASE: &str = "https://taller-seguimiento.web.app";

/// Ready-for-pickup notification template.
pub const TEMPLATE_READY: &str = "Hola {CLIENT}, tu {DEVICE} ya está listo para recoger. \
     Puedes consultar el estado aquí: {URL} (ref. {ID})";

/// Status-change notification template.
pub const TEMPLATE_STATUS: &str = "Hola {CLIENT}, el estado de tu {DEVICE} (ref. {ID}) \
     ha cambiado a: {STATUS}. Sigue tu reparación en {URL}";

fn contains_loopback(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("127.0.0.1") || lowered.contains("localhost")
}

fn loopback_url_regex() -> Regex {
    Regex::new(r"https?://(?:127\.0\.0\.1|localhost)(?::\d+)?[^\s]*").expect("Invalid regex")
}

/// Build the customer-facing tracking URL for a repair.
///
/// A missing or loopback-tainted configured base falls back to the fixed
/// public base; the repair id always survives as the query parameter.
#[must_use]
pub fn resolve_tracking_url(configured_base: Option<&str>, repair_id: &str) -> String {
    let base = configured_base
        .map(str::trim)
        .filter(|base| !base.is_empty() && !contains_loopback(base))
        .unwrap_or(DEFAULT_TRACKING_BASE);

    format!("{}/tracking.html?id={repair_id}", base.trim_end_matches('/'))
}

/// Render a notification message by literal placeholder substitution.
///
/// After substitution the text is re-scanned: any loopback URL segment is
/// rewritten to the public tracking base, keeping the `id` query value. The
/// returned message is guaranteed free of `127.0.0.1`/`localhost`; if the
/// rewrite cannot get there, the error must block the send.
pub fn render_message(template: &str, vars: &[(&str, &str)], fallback_base: &str) -> Result<String> {
    let mut message = template.to_string();
    for (key, value) in vars {
        message = message.replace(&format!("{{{key}}}"), value);
    }

    let rewritten = loopback_url_regex()
        .replace_all(&message, |caps: &regex::Captures<'_>| {
            let base = fallback_base.trim_end_matches('/');
            extract_query_id(&caps[0]).map_or_else(
                || format!("{base}/tracking.html"),
                |id| format!("{base}/tracking.html?id={id}"),
            )
        })
        .into_owned();

    if contains_loopback(&rewritten) {
        return Err(Error::TemplatePostcondition(format!(
            "loopback address survived the rewrite: {rewritten}"
        )));
    }

    Ok(rewritten)
}

/// Pull the `id` query value out of a URL, if present.
fn extract_query_id(url: &str) -> Option<&str> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("id="))
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolve_tracking_url_uses_public_base_when_unset() {
        let url = resolve_tracking_url(None, "abc");
        assert_eq!(url, format!("{DEFAULT_TRACKING_BASE}/tracking.html?id=abc"));
    }

    #[test]
    fn resolve_tracking_url_replaces_loopback_base() {
        let url = resolve_tracking_url(Some("http://127.0.0.1:5500"), "abc");
        assert!(!url.contains("127.0.0.1"));
        assert!(url.contains("id=abc"));
        assert!(url.starts_with(DEFAULT_TRACKING_BASE));

        let url = resolve_tracking_url(Some("http://localhost:5500"), "abc");
        assert!(!url.contains("localhost"));
    }

    #[test]
    fn resolve_tracking_url_keeps_configured_public_base() {
        let url = resolve_tracking_url(Some("https://tracking.example.com/"), "abc");
        assert_eq!(url, "https://tracking.example.com/tracking.html?id=abc");
    }

    #[test]
    fn render_message_substitutes_placeholders() {
        let message = render_message(
            "Hola {CLIENT}, tu {DEVICE} está listo",
            &[("CLIENT", "Ana"), ("DEVICE", "Samsung A52")],
            DEFAULT_TRACKING_BASE,
        )
        .unwrap();
        assert_eq!(message, "Hola Ana, tu Samsung A52 está listo");
    }

    #[test]
    fn render_message_rewrites_hardcoded_loopback_url() {
        let message = render_message(
            "Sigue tu reparación en http://localhost:5500/tracking.html?id={ID} ¡gracias!",
            &[("ID", "xyz")],
            DEFAULT_TRACKING_BASE,
        )
        .unwrap();

        assert!(!message.contains("localhost"));
        assert!(message.contains(&format!("{DEFAULT_TRACKING_BASE}/tracking.html?id=xyz")));
        assert!(message.ends_with("¡gracias!"));
    }

    #[test]
    fn render_message_rewrites_ip_loopback_preserving_id() {
        let message = render_message(
            "Estado: http://127.0.0.1:8080/tracking.html?id=abc&lang=es",
            &[],
            "https://tracking.example.com",
        )
        .unwrap();

        assert!(!message.contains("127.0.0.1"));
        assert!(message.contains("https://tracking.example.com/tracking.html?id=abc"));
    }

    #[test]
    fn render_message_blocks_unfixable_loopback() {
        // A bare hostname outside a URL cannot be rewritten; the caller must
        // treat this as a templating bug and block the send.
        let error = render_message(
            "Nuestro servidor localhost sigue caído",
            &[],
            DEFAULT_TRACKING_BASE,
        )
        .unwrap_err();
        assert!(matches!(error, Error::TemplatePostcondition(_)));
    }

    #[test]
    fn render_message_rejects_loopback_fallback_base() {
        let error = render_message(
            "Sigue tu reparación en http://localhost:5500/tracking.html?id=a",
            &[],
            "http://127.0.0.1:5500",
        )
        .unwrap_err();
        assert!(matches!(error, Error::TemplatePostcondition(_)));
    }

    #[test]
    fn default_templates_render_clean() {
        let vars = [
            ("CLIENT", "Ana"),
            ("DEVICE", "Samsung A52"),
            ("ID", "abc"),
            ("STATUS", "ready"),
            ("URL", "https://tracking.example.com/tracking.html?id=abc"),
        ];
        for template in [TEMPLATE_READY, TEMPLATE_STATUS] {
            let message = render_message(template, &vars, DEFAULT_TRACKING_BASE).unwrap();
            assert!(!message.contains('{'));
            assert!(!contains_loopback(&message));
        }
    }

    #[test]
    fn extract_query_id_handles_extra_params() {
        assert_eq!(
            extract_query_id("http://localhost/tracking.html?lang=es&id=abc"),
            Some("abc")
        );
        assert_eq!(extract_query_id("http://localhost/tracking.html"), None);
    }
}
