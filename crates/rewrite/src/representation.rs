use std::fmt;

/// The form a replayed resource was requested in.
///
/// Links rewritten from a context that implies a type (a stylesheet `<link>`,
/// a `<script src>`) carry it in the replay URL, so the resource is rendered
/// as that type whatever its capture claims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Representation {
    #[default]
    None,
    Html,
    Css,
    Js,
    Image,
    Video,
}

impl Representation {
    /// Path segment naming the representation in replay URLs.
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            Representation::None => None,
            Representation::Html => Some("html"),
            Representation::Css => Some("css"),
            Representation::Js => Some("js"),
            Representation::Image => Some("image"),
            Representation::Video => Some("video"),
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Some(match prefix {
            "html" => Representation::Html,
            "css" => Representation::Css,
            "js" => Representation::Js,
            "image" => Representation::Image,
            "video" => Representation::Video,
            _ => return None,
        })
    }

    /// The media type this representation forces, if any.
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            Representation::Html => Some("text/html"),
            Representation::Css => Some("text/css"),
            Representation::Js => Some("text/javascript"),
            Representation::None | Representation::Image | Representation::Video => None,
        }
    }

    pub fn is_media(&self) -> bool {
        matches!(self, Representation::Image | Representation::Video)
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().unwrap_or("none"))
    }
}
