//! Stylesheet pass.

use crate::consts::CSS_URL;
use crate::link::LinkInterceptor;
use crate::replace::apply_literal;
use crate::representation::Representation;
use regex::Captures;

/// Rewrite every `url(...)` in a stylesheet or `style` attribute.
///
/// Inline values have their newlines removed so they stay valid attribute
/// text.
pub(crate) fn rewrite(css: &str, inline: bool, links: &mut LinkInterceptor<'_>) -> String {
    let site = links.site();
    let css = apply_literal(css, &site.replacements_css_pre);

    let rewritten = CSS_URL.replace_all(&css, |caps: &Captures| {
        let (url, quote) = match (caps.get(1), caps.get(2), caps.get(3)) {
            (Some(url), _, _) => (url.as_str(), "\""),
            (_, Some(url), _) => (url.as_str(), "'"),
            (_, _, Some(url)) => (url.as_str(), ""),
            _ => return caps[0].to_string(),
        };
        // `@import` targets.
        let hint = match url.trim().to_ascii_lowercase().ends_with(".css") {
            true => Representation::Css,
            false => Representation::None,
        };
        format!("url({quote}{}{quote})", links.format_url(url.trim(), hint))
    });

    let mut output = apply_literal(&rewritten, &site.replacements_css_post);
    if inline {
        output.retain(|c| c != '\n' && c != '\r');
    }
    output
}
