//! Document pass.
//!
//! Raw markup is cleaned up with a handful of textual fixes first (things a
//! tolerant parser would otherwise swallow or mangle), then parsed, and
//! every resource-bearing attribute is routed through the link interceptor.

use crate::consts::{
    BASE_HREF, CONDITIONAL_COMMENT, CONDITIONAL_ENDIF, ESCAPED_DOCTYPE, HEAD_CLOSE, HEAD_OPEN, HTML_OPEN,
    JAVASCRIPT_TYPES, META_REFRESH_URL, NOSCRIPT, NOSCRIPT_IN_HEAD, SCRIPT, SCRIPT_TYPE, SOCIAL_IMAGE, STYLE_ELEMENTS,
};
use crate::link::LinkInterceptor;
use crate::replace::apply_literal;
use crate::representation::Representation;
use crate::{css, javascript};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use mirror_config::SiteConfig;
use regex::Captures;
use scraper::node::Element;
use scraper::{Html, Node, Selector};
use tendril::StrTendril;

/// Elements whose `src` family of attributes name embedded media.
const MEDIA_ELEMENTS: &[&str] = &["img", "video", "audio", "source", "frame", "iframe", "applet"];

/// Inline handlers dropped with scripts, or rewritten as scripts.
const EVENT_HANDLERS: &[&str] =
    &["onclick", "onmouseover", "onmouseout", "onfocus", "onblur", "onchange", "onsubmit", "onload", "onerror"];

/// Site flag an attribute rule depends on.
#[derive(Debug, Clone, Copy)]
enum Gate {
    Always,
    LegacyBackground,
    OptionTags,
}

impl Gate {
    fn allows(self, site: &SiteConfig) -> bool {
        match self {
            Gate::Always => true,
            Gate::LegacyBackground => site.find_urls_in_legacy_background_attributes,
            Gate::OptionTags => site.find_urls_in_option_tags,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Treatment {
    /// The value is one URL of the given kind.
    Url(Representation),
    /// `<link href>`, a stylesheet when `rel` or `type` says so.
    LinkHref,
    /// Comma-separated `url descriptor` candidates.
    Srcset,
    /// `<meta http-equiv="refresh" content="N; url=...">`.
    MetaRefresh,
    /// Rewritten only when the value looks like a URL.
    UrlLike,
}

struct AttributeRule {
    elements: &'static [&'static str],
    attributes: &'static [&'static str],
    treatment: Treatment,
    gate: Gate,
}

const ATTRIBUTE_RULES: &[AttributeRule] = &[
    AttributeRule { elements: &["link"], attributes: &["href"], treatment: Treatment::LinkHref, gate: Gate::Always },
    AttributeRule {
        elements: &["script"],
        attributes: &["src"],
        treatment: Treatment::Url(Representation::Js),
        gate: Gate::Always,
    },
    AttributeRule {
        elements: MEDIA_ELEMENTS,
        attributes: &["src", "data-src", "poster"],
        treatment: Treatment::Url(Representation::None),
        gate: Gate::Always,
    },
    AttributeRule {
        elements: MEDIA_ELEMENTS,
        attributes: &["srcset", "data-srcset", "data-expanded-srcset"],
        treatment: Treatment::Srcset,
        gate: Gate::Always,
    },
    AttributeRule {
        elements: &["a", "area"],
        attributes: &["href"],
        treatment: Treatment::Url(Representation::None),
        gate: Gate::Always,
    },
    AttributeRule { elements: &["meta"], attributes: &["content"], treatment: Treatment::MetaRefresh, gate: Gate::Always },
    AttributeRule {
        elements: &["body", "table", "td", "th"],
        attributes: &["background"],
        treatment: Treatment::Url(Representation::None),
        gate: Gate::LegacyBackground,
    },
    AttributeRule {
        elements: &["option"],
        attributes: &["value"],
        treatment: Treatment::UrlLike,
        gate: Gate::OptionTags,
    },
];

enum Action {
    Keep,
    Replace(String),
    Remove,
}

/// Rewrite one HTML document.
#[tracing::instrument(skip_all, fields(length = html.len()))]
pub(crate) fn rewrite(html: &str, links: &mut LinkInterceptor<'_>) -> String {
    let site = links.site();
    let prepared = prepare(html, links);

    let mut document = Html::parse_document(&prepared);
    rewrite_elements(&mut document, &site, links);
    rewrite_style_elements(&mut document, links);
    add_attributes(&mut document, &site);
    delete_nodes(&mut document, &site);

    apply_literal(&document.html(), &site.replacements_html_post)
}

/// The `og:image` or `twitter:image` a page declares.
pub(crate) fn social_image(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&SOCIAL_IMAGE)
        .filter_map(|meta| meta.attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
}

/// Textual fixes applied before parsing.
fn prepare(html: &str, links: &mut LinkInterceptor<'_>) -> String {
    let site = links.site();
    let mut html = apply_literal(html, &site.replacements_html_pre);

    if let Some(caps) = BASE_HREF.captures(&html) {
        let href = caps[1].to_string();
        links.set_base(&href);
        html = BASE_HREF.replace_all(&html, "").into_owned();
    }

    html = CONDITIONAL_COMMENT.replace_all(&html, "").into_owned();
    html = CONDITIONAL_ENDIF.replace_all(&html, "").into_owned();
    html = html.replace("--!>", "-->").replace("//-->", "-->");

    if site.deactivate_scripts {
        html = NOSCRIPT_IN_HEAD.replace_all(&html, "${2}</head>${3}<body${4}>${1}").into_owned();
        html = NOSCRIPT.replace_all(&html, "${1}").into_owned();
        html = SCRIPT.replace_all(&html, "").into_owned();
    }

    if HEAD_CLOSE.is_match(&html) && !HEAD_OPEN.is_match(&html) {
        html = HTML_OPEN.replacen(&html, 1, "<html${1}><head>").into_owned();
    }

    html = links.rewrite_anywhere(&html);
    html = SCRIPT.replace_all(&html, |caps: &Captures| wrap_script(&caps[0], &caps[1], &caps[2], links)).into_owned();
    ESCAPED_DOCTYPE.replace_all(&html, r#"<!DOCTYPE HTML PUBLIC "${1}">"#).into_owned()
}

/// Inline scripts are rewritten and carried base64-encoded so the parser
/// never sees their text.
fn wrap_script(whole: &str, attributes: &str, body: &str, links: &mut LinkInterceptor<'_>) -> String {
    if body.trim().is_empty() {
        return whole.to_string();
    }
    let script_type = SCRIPT_TYPE.captures(attributes).map(|caps| caps[1].to_ascii_lowercase());
    match script_type.as_deref() {
        None => {},
        // Module scripts can't be evaluated.
        Some("module") => return whole.to_string(),
        Some(kind) if JAVASCRIPT_TYPES.contains(&kind.split(';').next().unwrap_or(kind).trim()) => {},
        Some(_) => return whole.to_string(),
    }
    let encoded = STANDARD.encode(javascript::rewrite(body, true, links));
    format!(r#"<script{attributes}>eval(decodeURIComponent(escape(atob("{encoded}"))))</script>"#)
}

fn rewrite_elements(document: &mut Html, site: &SiteConfig, links: &mut LinkInterceptor<'_>) {
    let ids: Vec<_> = document.tree.root().descendants().filter(|node| node.value().is_element()).map(|node| node.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id)
            && let Node::Element(element) = node.value()
            && let Some(rewritten) = rewrite_element(element, site, links)
        {
            *element = rewritten;
        }
    }
}

/// The element with its attributes rewritten, or `None` if nothing changed.
fn rewrite_element(element: &Element, site: &SiteConfig, links: &mut LinkInterceptor<'_>) -> Option<Element> {
    let tag = element.name();
    let mut changed = false;
    let mut attributes = Vec::new();
    for (name, value) in element.attrs.iter() {
        match rewrite_attribute(element, tag, &name.local, value, site, links) {
            Action::Replace(rewritten) if rewritten != **value => {
                changed = true;
                attributes.push(Attribute { name: name.clone(), value: StrTendril::from(rewritten) });
            },
            Action::Remove => changed = true,
            Action::Keep | Action::Replace(_) => attributes.push(Attribute { name: name.clone(), value: value.clone() }),
        }
    }
    changed.then(|| Element::new(element.name.clone(), attributes))
}

fn rewrite_attribute(
    element: &Element,
    tag: &str,
    attribute: &str,
    value: &str,
    site: &SiteConfig,
    links: &mut LinkInterceptor<'_>,
) -> Action {
    if attribute == "style" {
        return Action::Replace(css::rewrite(value, true, links));
    }
    if EVENT_HANDLERS.contains(&attribute) {
        return match site.deactivate_scripts {
            true => Action::Remove,
            false => Action::Replace(javascript::rewrite(value, true, links).replace(['\n', '\r'], "")),
        };
    }

    let rule = ATTRIBUTE_RULES
        .iter()
        .find(|rule| rule.elements.contains(&tag) && rule.attributes.contains(&attribute) && rule.gate.allows(site));
    if let Some(rule) = rule {
        return apply(rule.treatment, element, value, links);
    }

    if MEDIA_ELEMENTS.contains(&tag)
        && site.find_urls_additional_src_attributes.iter().any(|extra| extra.eq_ignore_ascii_case(attribute))
    {
        return Action::Replace(links.format_url(value, Representation::None));
    }
    if site.find_urls_in_all_html_attributes && links.is_url(value) {
        return Action::Replace(links.format_url(value, Representation::None));
    }
    Action::Keep
}

fn apply(treatment: Treatment, element: &Element, value: &str, links: &mut LinkInterceptor<'_>) -> Action {
    match treatment {
        Treatment::Url(hint) => Action::Replace(links.format_url(value, hint)),
        Treatment::LinkHref => {
            let hint = match is_stylesheet(element) {
                true => Representation::Css,
                false => Representation::None,
            };
            Action::Replace(links.format_url(value, hint))
        },
        Treatment::Srcset => match value.trim_start().starts_with("data:") {
            true => Action::Keep,
            false => Action::Replace(rewrite_srcset(value, links)),
        },
        Treatment::MetaRefresh => {
            let refresh = element.attr("http-equiv").is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"));
            match META_REFRESH_URL.captures(value) {
                Some(caps) if refresh => {
                    let target = links.format_url(&caps[2], Representation::None);
                    Action::Replace(format!("{}url={target}{}", &caps[1], &caps[3]))
                },
                _ => Action::Keep,
            }
        },
        Treatment::UrlLike => match links.is_url(value) {
            true => Action::Replace(links.format_url(value, Representation::None)),
            false => Action::Keep,
        },
    }
}

fn is_stylesheet(element: &Element) -> bool {
    element.attr("type").is_some_and(|t| t.trim().eq_ignore_ascii_case("text/css"))
        || element.attr("rel").is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")))
}

fn rewrite_srcset(value: &str, links: &mut LinkInterceptor<'_>) -> String {
    value
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(|candidate| match candidate.split_once(char::is_whitespace) {
            Some((url, descriptor)) => format!("{} {}", links.format_url(url, Representation::None), descriptor.trim()),
            None => links.format_url(candidate, Representation::None),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn rewrite_style_elements(document: &mut Html, links: &mut LinkInterceptor<'_>) {
    let ids: Vec<_> = document
        .select(&STYLE_ELEMENTS)
        .flat_map(|style| style.children().filter(|child| child.value().is_text()).map(|child| child.id()).collect::<Vec<_>>())
        .collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id)
            && let Node::Text(text) = node.value()
        {
            let rewritten = css::rewrite(&text.text, false, links);
            text.text = StrTendril::from(rewritten);
        }
    }
}

fn add_attributes(document: &mut Html, site: &SiteConfig) {
    for rule in &site.add_attributes {
        let Ok(selector) = Selector::parse(&rule.selector) else {
            tracing::warn!(selector = %rule.selector, "skipping attribute rule with an invalid selector");
            continue;
        };
        let ids: Vec<_> = document.select(&selector).map(|element| element.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id)
                && let Node::Element(element) = node.value()
            {
                *element = with_attribute(element, &rule.attribute, &rule.value);
            }
        }
    }
}

fn with_attribute(element: &Element, attribute: &str, value: &str) -> Element {
    let mut attributes: Vec<_> = element
        .attrs
        .iter()
        .filter(|(name, _)| !(*name.local).eq_ignore_ascii_case(attribute))
        .map(|(name, existing)| Attribute { name: name.clone(), value: existing.clone() })
        .collect();
    attributes.push(Attribute {
        name: QualName::new(None, Namespace::from(""), LocalName::from(attribute.to_ascii_lowercase())),
        value: StrTendril::from(value),
    });
    Element::new(element.name.clone(), attributes)
}

fn delete_nodes(document: &mut Html, site: &SiteConfig) {
    for rule in &site.delete_nodes {
        let Ok(selector) = Selector::parse(rule) else {
            tracing::warn!(selector = %rule, "skipping delete rule with an invalid selector");
            continue;
        };
        let ids: Vec<_> = document.select(&selector).map(|element| element.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_config::SiteConfigs;

    const PAGE: &str = "https://site.test/index";

    fn run(html: &str, toml: &str) -> (String, Vec<String>) {
        let sites = SiteConfigs::from_toml_str(toml).unwrap();
        let site = sites.for_url(PAGE).unwrap();
        let mut links = LinkInterceptor::new("http://localhost/", &sites, site, Some(PAGE));
        let output = rewrite(html, &mut links);
        (output, links.into_outlinks().into_vec())
    }

    #[test]
    fn anchors_point_into_the_archive() {
        let (output, outlinks) = run(r#"<p><a href="/foo">one</a> <a href="/foo">two</a></p>"#, "");
        assert_eq!(output.matches(r#"href="http://localhost/https://site.test/foo""#).count(), 2);
        assert_eq!(outlinks, ["https://site.test/foo"]);
    }

    #[test]
    fn resources_carry_their_representation() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/main.css">
            <link rel="icon" href="/favicon.ico">
            <script src="app.js"></script>
        </head><body><img src="a.png" srcset="a.png 1x, b.png 2x"></body></html>"#;
        let (output, outlinks) = run(html, "");
        assert!(output.contains(r#"href="http://localhost/_css/https://site.test/main.css""#));
        assert!(output.contains(r#"href="http://localhost/https://site.test/favicon.ico""#));
        assert!(output.contains(r#"src="http://localhost/_js/https://site.test/app.js""#));
        assert!(output.contains(
            r#"srcset="http://localhost/https://site.test/a.png 1x, http://localhost/https://site.test/b.png 2x""#
        ));
        assert_eq!(
            outlinks,
            [
                "https://site.test/main.css",
                "https://site.test/favicon.ico",
                "https://site.test/app.js",
                "https://site.test/a.png",
                "https://site.test/b.png",
            ]
        );
    }

    #[test]
    fn base_href_is_removed_and_used() {
        let (output, outlinks) = run(r#"<html><head><base href="https://cdn.test/assets/"></head><body><img src="x.png"></body></html>"#, "");
        assert!(!output.contains("<base"));
        assert_eq!(outlinks, ["https://cdn.test/assets/x.png"]);
    }

    #[test]
    fn scripts_can_be_deactivated() {
        let toml = "[\"*\"]\ndeactivate_scripts = true";
        let html = r#"<html><head><script>alert(1)</script><noscript><link rel="stylesheet" href="/ns.css"></noscript></head><body class="b"><button onclick="go()">x</button></body></html>"#;
        let (output, outlinks) = run(html, toml);
        assert!(!output.contains("<script"));
        assert!(!output.contains("alert"));
        assert!(!output.contains("onclick"));
        assert!(!output.contains("noscript"));
        assert!(output.contains(r#"<body class="b">"#));
        assert_eq!(outlinks, ["https://site.test/ns.css"]);
    }

    #[test]
    fn inline_scripts_are_wrapped() {
        let (output, _) = run(r#"<html><head><script>var a = "<b>";</script></head></html>"#, "");
        let encoded = output.split(r#"atob(""#).nth(1).and_then(|rest| rest.split('"').next()).unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), br#"var a = "<b>";"#);
        assert!(!output.contains("<b>"));
    }

    #[test]
    fn other_script_types_are_not_wrapped() {
        let (output, _) = run(r#"<script type="text/template"><p>{{x}}</p></script>"#, "");
        assert!(!output.contains("atob"));
        assert!(output.contains("{{x}}"));
    }

    #[test]
    fn styles_are_rewritten() {
        let html = r#"<html><head><style>body { background: url(/bg.png) }</style></head><body><div style="background: url('/d.png')"></div></body></html>"#;
        let (output, _) = run(html, "");
        assert!(output.contains("url(http://localhost/https://site.test/bg.png)"));
        assert!(output.contains("url('http://localhost/https://site.test/d.png')"));
    }

    #[test]
    fn meta_refresh_targets_are_rewritten() {
        let html = r#"<html><head><meta http-equiv="refresh" content="0; url=/next"><meta name="x" content="url=/kept"></head></html>"#;
        let (output, outlinks) = run(html, "");
        assert!(output.contains(r#"content="0; url=http://localhost/https://site.test/next""#));
        assert!(output.contains(r#"content="url=/kept""#));
        assert_eq!(outlinks, ["https://site.test/next"]);
    }

    #[test]
    fn gated_attributes_follow_site_flags() {
        let html = r#"<table background="/t.png"><tr><td><select><option value="/page/">p</option><option value="plain">q</option></select></td></tr></table>"#;
        let (output, _) = run(html, "");
        assert!(output.contains(r#"background="http://localhost/https://site.test/t.png""#));
        assert!(output.contains(r#"value="/page/""#));

        let toml = "[\"*\"]\nfind_urls_in_legacy_background_attributes = false\nfind_urls_in_option_tags = true";
        let (output, _) = run(html, toml);
        assert!(output.contains(r#"background="/t.png""#));
        assert!(output.contains(r#"value="http://localhost/https://site.test/page/""#));
        assert!(output.contains(r#"value="plain""#));
    }

    #[test]
    fn additional_src_attributes() {
        let toml = "[\"*\"]\nfind_urls_additional_src_attributes = [\"data-lazy\"]";
        let (output, _) = run(r#"<img data-lazy="/lazy.png">"#, toml);
        assert!(output.contains(r#"data-lazy="http://localhost/https://site.test/lazy.png""#));
    }

    #[test]
    fn attribute_and_delete_rules_run_last() {
        let toml = r#"
            ["*"]
            add_attributes = [{ selector = "img", attribute = "loading", value = "eager" }, { selector = "[[", attribute = "x" }]
            delete_nodes = ["div.ad"]
        "#;
        let (output, _) = run(r#"<img src="a.png" loading="lazy"><div class="ad"><a href="/ad">ad</a></div>"#, toml);
        assert!(output.contains(r#"loading="eager""#));
        assert!(!output.contains("lazy"));
        assert!(!output.contains("class=\"ad\""));
    }

    #[test]
    fn conditional_comments_are_dropped() {
        let html = "<html><head><!--[if lt IE 9]><script src=\"ie.js\"></script><![endif]--></head><body>ok</body></html>";
        let (output, outlinks) = run(html, "");
        assert!(!output.contains("ie.js"));
        assert!(outlinks.is_empty());
    }

    #[test]
    fn replacements_wrap_the_pass() {
        let toml = r#"
            ["*"]
            replacements_html_pre = [{ find = "data-original", replace = "src" }]
            replacements_html_post = [{ find = "</body>", replace = "<footer>replayed</footer></body>" }]
        "#;
        let (output, _) = run(r#"<img data-original="/x.png">"#, toml);
        assert!(output.contains(r#"src="http://localhost/https://site.test/x.png""#));
        assert!(output.contains("<footer>replayed</footer></body>"));
    }

    #[test]
    fn missing_head_open_tags_are_added() {
        let sites = SiteConfigs::from_toml_str("").unwrap();
        let site = sites.for_url(PAGE).unwrap();
        let mut links = LinkInterceptor::new("http://localhost/", &sites, site, Some(PAGE));
        let prepared = prepare("<html lang=\"en\"><title>t</title></head><body></body></html>", &mut links);
        assert!(prepared.starts_with("<html lang=\"en\"><head><title>"));
    }

    #[test]
    fn social_images_are_found() {
        let html = r#"<html><head><meta property="og:image" content=" https://img.test/card.png "></head></html>"#;
        assert_eq!(social_image(html).as_deref(), Some("https://img.test/card.png"));
        assert_eq!(social_image("<p>none</p>"), None);
    }
}
