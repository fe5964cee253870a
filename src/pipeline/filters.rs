use serde::Serialize;
use std::collections::BTreeMap;

/// Include flags per structure or unit type.
///
/// Types that were never registered are excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FilterSet {
    flags: BTreeMap<String, bool>,
}

impl FilterSet {
    /// A filter that includes every given type.
    pub fn all_enabled<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flags: types.into_iter().map(|t| (t.into(), true)).collect(),
        }
    }

    pub fn allows(&self, kind: &str) -> bool {
        self.flags.get(kind).copied().unwrap_or(false)
    }

    /// Returns a copy with `kind` switched on or off.
    pub fn with(&self, kind: &str, include: bool) -> Self {
        let mut next = self.clone();
        next.flags.insert(kind.to_string(), include);
        next
    }

    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .filter(|(_, on)| **on)
            .map(|(k, _)| k.as_str())
    }

    pub fn disabled(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .filter(|(_, on)| !**on)
            .map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_is_excluded() {
        let filter = FilterSet::all_enabled(["Bachelor units"]);
        assert!(filter.allows("Bachelor units"));
        assert!(!filter.allows("Two bedroom units"));
    }

    #[test]
    fn test_with_returns_new_filter() {
        let filter = FilterSet::all_enabled(["a", "b"]);
        let off = filter.with("a", false);

        assert!(filter.allows("a"));
        assert!(!off.allows("a"));
        assert_eq!(off.disabled().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(off.enabled().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(off.with("a", true), filter);
    }
}
