//! Script pass.
//!
//! Scripts build URLs at runtime, so only the shapes a site's rules point
//! out are rewritten: absolute URLs in text, bare or quoted paths ending in
//! a known extension, and quoted directory paths.

use crate::consts::{BLOCK_COMMENT, LINE_COMMENT, QUOTED_DIRECTORY};
use crate::link::LinkInterceptor;
use crate::replace::apply_literal;
use crate::representation::Representation;
use regex::Captures;

/// Rewrite one script. `inline` scripts (attributes, `javascript:` URLs and
/// `<script>` bodies) skip the anywhere heuristic, which the HTML pass has
/// already applied to the whole document.
pub(crate) fn rewrite(js: &str, inline: bool, links: &mut LinkInterceptor<'_>) -> String {
    let site = links.site();
    let patterns = links.patterns();
    if site.deactivate_scripts {
        return String::new();
    }

    let mut js = apply_literal(js, &site.replacements_javascript_pre);
    if site.javascript_strip_comments {
        js = BLOCK_COMMENT.replace_all(&js, "").into_owned();
        js = LINE_COMMENT.replace_all(&js, "").into_owned();
    }

    if site.find_urls_suspect_anywhere_in_javascript
        && let Some(suspect) = patterns.suspect_file.as_ref()
    {
        js = suspect
            .replace_all(&js, |caps: &Captures| {
                let trailing = caps.get(2).map_or("", |m| m.as_str());
                format!("{}{trailing}", links.format_url(&caps[1], hint_for(&caps[1])))
            })
            .into_owned();
    } else if site.find_urls_suspect_anywhere_in_javascript_strings
        && let Some(suspect) = patterns.suspect_string.as_ref()
    {
        js = suspect
            .replace_all(&js, |caps: &Captures| {
                let (quote, found) = match (caps.get(1), caps.get(2)) {
                    (Some(found), _) => ("\"", found.as_str()),
                    (_, Some(found)) => ("'", found.as_str()),
                    _ => return caps[0].to_string(),
                };
                format!("{quote}{}{quote}", links.format_url(found, hint_for(found)))
            })
            .into_owned();
    }

    if !inline {
        js = links.rewrite_anywhere(&js);
    }

    if site.find_urls_suspect_directories_in_javascript_strings {
        js = QUOTED_DIRECTORY
            .replace_all(&js, |caps: &Captures| {
                let (quote, found) = match (caps.get(1), caps.get(2)) {
                    (Some(found), _) => ("\"", found.as_str()),
                    (_, Some(found)) => ("'", found.as_str()),
                    _ => return caps[0].to_string(),
                };
                format!("{quote}{}{quote}", links.format_url(found, Representation::None))
            })
            .into_owned();
    }

    apply_literal(&js, &site.replacements_javascript_post)
}

fn hint_for(path: &str) -> Representation {
    let path = path.split('?').next().unwrap_or(path).to_ascii_lowercase();
    if path.ends_with(".js") {
        Representation::Js
    } else if path.ends_with(".css") {
        Representation::Css
    } else {
        Representation::None
    }
}
