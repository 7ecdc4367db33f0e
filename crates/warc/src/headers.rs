/// An ordered header block.
///
/// Names compare case-insensitively and may repeat; repeats keep their
/// original order, so a block written back out matches what was read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every value of `name` with a single `value`, keeping the
    /// position of the first occurrence.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter().position(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(index) => {
                self.entries[index].1 = value;
                let mut seen = 0;
                self.entries.retain(|(n, _)| {
                    let keep = !n.eq_ignore_ascii_case(&name) || seen == index;
                    seen += 1;
                    keep
                });
            },
            None => self.entries.push((name, value)),
        }
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// Every value of `name`, in order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse one `Name: value` line. Both sides are trimmed; lines without a
    /// colon return `false` and are not stored.
    pub(crate) fn push_line(&mut self, line: &str) -> bool {
        match line.split_once(':') {
            Some((name, value)) => {
                self.append(name.trim(), value.trim());
                true
            },
            None => false,
        }
    }

    /// Serialized `Name: value\r\n` lines, without the terminating blank line.
    pub(crate) fn to_wire(&self) -> String {
        self.iter().map(|(name, value)| format!("{name}: {value}\r\n")).collect()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(n, v)| (n.into(), v.into())).collect(),
        }
    }
}
