use std::ops::{BitOr, BitOrAssign};

/// Options controlling [`Canonicalizer::canonicalize`](crate::Canonicalizer::canonicalize).
///
/// The `NO_*` flags switch off steps that run by default; the others switch
/// on steps that are off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u16);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// Keep `http:` instead of upgrading to `https:`.
    pub const NO_HTTPS_EXPANSION: Flags = Flags(1);
    /// Keep trailing `/` and `/index.*`.
    pub const NO_TRAILING_SLASH: Flags = Flags(1 << 1);
    /// Keep query strings on image and video URLs.
    pub const NO_IMAGE_QUERY_REMOVAL: Flags = Flags(1 << 2);
    /// Skip the "certain" rule tier.
    pub const NO_CERTAIN_DUPLICATES: Flags = Flags(1 << 3);
    /// Expand media URLs into every sibling extension.
    pub const FILETYPE_EQUIVALENTS: Flags = Flags(1 << 6);
    /// Apply the "duplicate" rule tier.
    pub const DUPLICATES: Flags = Flags(1 << 7);
    /// Apply the "uncertain duplicate" rule tier.
    pub const UNCERTAIN_DUPLICATES: Flags = Flags(1 << 8);

    #[inline]
    #[must_use]
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    #[must_use]
    pub const fn union(self, other: Flags) -> Flags {
        Flags(self.0 | other.0)
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }
}

impl BitOr for Flags {
    type Output = Flags;
    fn bitor(self, rhs: Flags) -> Flags {
        self.union(rhs)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        *self = self.union(rhs);
    }
}
