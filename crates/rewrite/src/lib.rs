//! Rewriting archived documents so everything they link to is replayed from
//! the archive.
//!
//! A [`Replayer`] holds what every request shares: the replay host, site
//! rules, an optional [`IndexResolver`](mirror_resolve::IndexResolver) and
//! [`MediaConverter`], and memoized renders. Each request binds one record
//! to a [`RewriteEngine`], which decides whether the record is streamed as
//! stored, rewritten, converted to a thumbnail, or swapped for the media a
//! page links to.
//!
//! - HTML: textual cleanup, then a parsed pass over every resource-bearing
//!   attribute, `<style>` element and inline script
//! - CSS: every `url(...)`
//! - JavaScript: only the URL shapes a site's rules ask for
//!
//! Every link goes through a [`LinkInterceptor`], which resolves it against
//! the document, records it as an outlink and points it at the replay host.
//!
//! ```
//! use mirror_config::SiteConfigs;
//! use mirror_rewrite::{Representation, Replayer};
//! use mirror_warc::{ArchivedRecord, Body, Headers, HttpHead, HTTP_RESPONSE_TYPES};
//! use std::sync::Arc;
//!
//! let headers: Headers = [
//!     ("WARC-Type", "response"),
//!     ("WARC-Target-URI", "https://site.test/index"),
//!     ("Content-Type", HTTP_RESPONSE_TYPES[0]),
//! ]
//! .into_iter()
//! .collect();
//! let http = HttpHead::new(200, [("Content-Type", "text/html")].into_iter().collect());
//! let record = ArchivedRecord::new(headers, Some(http), Body::from_bytes(r#"<a href="/foo">foo</a>"#));
//!
//! let replayer = Replayer::new("http://localhost/", Arc::new(SiteConfigs::from_toml_str("").unwrap()));
//! let rendered = replayer.engine(record, Representation::None).render().unwrap();
//! assert_eq!(rendered.outlinks, ["https://site.test/foo"]);
//! ```

mod consts;
mod context;
mod css;
mod engine;
pub mod error;
mod html;
mod javascript;
mod link;
mod media;
mod replace;
mod representation;

pub use crate::context::{Outlinks, RewriteContext};
pub use crate::engine::{Output, Rendered, Replayer, RewriteEngine};
pub use crate::link::LinkInterceptor;
pub use crate::media::{Ffmpeg, MediaConverter};
pub use crate::representation::Representation;
