//! Link and pixel rewriting keyed to a per-message tracking identifier.
//!
//! The match is attribute-level (`href="http…"`), not a DOM parse:
//! every http/https href in the body gets rewritten, intended CTA or
//! not, matching how organizations' hand-authored templates are
//! actually tracked.

use regex::Regex;

/// Rewrite every http/https `href` attribute to go through the
/// redirect endpoint, carrying the tracking id and the URL-encoded
/// original target.
pub fn rewrite_links(html: &str, base_url: &str, tracking_id: &str) -> String {
    let re = Regex::new(r#"(?i)href="(https?:[^"]+)""#).expect("valid regex");
    re.replace_all(html, |caps: &regex::Captures| {
        let target = &caps[1];
        format!(
            "href=\"{}/redirect?tid={}&target={}\"",
            base_url,
            urlencoding::encode(tracking_id),
            urlencoding::encode(target),
        )
    })
    .into_owned()
}

/// Build the invisible open-tracking image for one message.
pub fn build_tracking_pixel(base_url: &str, tracking_id: &str) -> String {
    format!(
        "<img src=\"{}/open?tid={}\" width=\"1\" height=\"1\" style=\"display:none;\"/>",
        base_url,
        urlencoding::encode(tracking_id),
    )
}

/// Instrument a merged body for one recipient: rewrite links, then
/// append exactly one tracking pixel at the end of the body.
pub fn instrument_body(html: &str, base_url: &str, tracking_id: &str) -> String {
    let mut body = rewrite_links(html, base_url, tracking_id);
    body.push('\n');
    body.push_str(&build_tracking_pixel(base_url, tracking_id));
    body
}
