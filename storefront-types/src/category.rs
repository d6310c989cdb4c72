use derive_more::{Deref, Display};
use lazy_regex::regex;
use serde::{Deserialize, Serialize};

/// Slug of the synthetic category listing the most recently added products.
pub const RECENTLY_ADDED: &str = "novedades";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deref)]
pub struct CategorySlug(String);

impl CategorySlug {
    /// Normalizes and validates a raw slug. Returns `None` for anything that
    /// could not have been produced by [`CategorySlug::as_str`].
    pub fn parse<S: AsRef<str>>(s: S) -> Option<Self> {
        let s = s.as_ref().trim().to_lowercase();
        regex!(r"^[a-z0-9][a-z0-9_-]{0,63}$")
            .is_match(&s)
            .then_some(Self(s))
    }

    pub fn recently_added() -> Self {
        Self(RECENTLY_ADDED.to_string())
    }

    pub fn is_recently_added(&self) -> bool {
        self.0 == RECENTLY_ADDED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Categories a `tab` value may name, plus the fixed fallback used when the
/// recently added listing turns out empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet {
    known: Vec<CategorySlug>,
    fallback: CategorySlug,
}

impl CategorySet {
    pub fn new(known: Vec<CategorySlug>, fallback: CategorySlug) -> Self {
        let mut known = known;
        if !known.contains(&fallback) {
            known.push(fallback.clone());
        }
        let recent = CategorySlug::recently_added();
        if !known.contains(&recent) {
            known.push(recent);
        }
        Self { known, fallback }
    }

    pub fn resolve<S: AsRef<str>>(&self, raw: S) -> Option<CategorySlug> {
        CategorySlug::parse(raw).filter(|slug| self.known.contains(slug))
    }

    pub fn contains(&self, slug: &CategorySlug) -> bool {
        self.known.contains(slug)
    }

    pub fn fallback(&self) -> &CategorySlug {
        &self.fallback
    }

    pub fn known(&self) -> &[CategorySlug] {
        &self.known
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> CategorySet {
        CategorySet::new(
            vec![
                CategorySlug::parse("mujer").expect("slug"),
                CategorySlug::parse("hombre").expect("slug"),
            ],
            CategorySlug::parse("mujer").expect("slug"),
        )
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        assert_eq!(
            CategorySlug::parse("  Hombre ").map(|s| s.as_str().to_string()),
            Some("hombre".to_string())
        );
        assert_eq!(CategorySlug::parse(""), None);
        assert_eq!(CategorySlug::parse("a b"), None);
        assert_eq!(CategorySlug::parse("../etc"), None);
    }

    #[test]
    fn unknown_slugs_do_not_resolve() {
        let set = set();
        assert!(set.resolve("hombre").is_some());
        assert!(set.resolve("novedades").is_some());
        assert_eq!(set.resolve("juguetes"), None);
    }
}
