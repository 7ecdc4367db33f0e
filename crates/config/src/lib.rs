//! Configuration for archive replay.
//!
//! - [`Settings`]: process-wide paths, limits and media options, layered from
//!   defaults, a TOML file and the environment with [`figment`]
//! - [`SiteConfigs`]: typed per-site rewrite rules, merged `"*"` then host
//! - [`CanonicalTables`]: the three tiers of URL canonicalization rules
//! - [`Memo`]: the get-or-populate cache used for memoized lookups

mod assets;
mod canonical;
pub mod error;
mod memo;
mod settings;
mod site;

pub use crate::assets::Builtins;
pub use crate::canonical::{CanonicalTables, Rule, RuleTable};
pub use crate::memo::Memo;
pub use crate::settings::{
    ArchiveSettings, MediaSettings, ReplaySettings, RuleSettings, Settings, ThumbnailMethod, WriterSettings,
};
pub use crate::site::{AttributeRule, Replacement, SiteConfig, SiteConfigs};
