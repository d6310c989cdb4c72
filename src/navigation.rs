//! Maps the navigation state (category tab and selected SKU) to and from the
//! page URL query.

use serde::Serialize;
use std::fmt::Display;
use storefront_types::category::{CategorySet, CategorySlug};
use storefront_types::product::Sku;
use url::Url;

pub const TAB_PARAM: &str = "tab";
pub const SKU_PARAM: &str = "sku";

/// The only state mirrored into the URL. `tab: None` means the default
/// category, `sku: None` means no detail overlay.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    pub tab: Option<CategorySlug>,
    pub sku: Option<Sku>,
}

/// How one query parameter is treated by [`NavigationCodec::encode`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParamUpdate {
    /// Leave whatever the URL holds.
    #[default]
    Keep,
    Clear,
    Set(String),
}

impl ParamUpdate {
    /// `None` keeps, an empty string clears, anything else sets.
    pub fn from_field(field: Option<&str>) -> Self {
        match field {
            None => Self::Keep,
            Some("") => Self::Clear,
            Some(v) => Self::Set(v.to_string()),
        }
    }

    fn from_value<T: Display>(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Set(v.to_string()),
            None => Self::Clear,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationPatch {
    pub tab: ParamUpdate,
    pub sku: ParamUpdate,
}

impl NavigationPatch {
    pub fn tab(tab: &CategorySlug) -> Self {
        Self {
            tab: ParamUpdate::Set(tab.to_string()),
            sku: ParamUpdate::Keep,
        }
    }

    pub fn sku(sku: &Sku) -> Self {
        Self {
            tab: ParamUpdate::Keep,
            sku: ParamUpdate::Set(sku.to_string()),
        }
    }

    pub fn clear_sku() -> Self {
        Self {
            tab: ParamUpdate::Keep,
            sku: ParamUpdate::Clear,
        }
    }
}

impl From<&NavigationState> for NavigationPatch {
    fn from(state: &NavigationState) -> Self {
        Self {
            tab: ParamUpdate::from_value(state.tab.as_ref()),
            sku: ParamUpdate::from_value(state.sku.as_ref()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavigationCodec {
    categories: CategorySet,
}

impl NavigationCodec {
    pub fn new(categories: CategorySet) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    /// Applies `patch` to the query of `current`. Unrelated parameters and
    /// kept fields are carried over untouched.
    pub fn encode(&self, patch: &NavigationPatch, current: &Url) -> Url {
        let mut pairs = current
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect::<Vec<_>>();
        apply(&mut pairs, TAB_PARAM, &patch.tab);
        apply(&mut pairs, SKU_PARAM, &patch.sku);
        let mut url = current.clone();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        url
    }

    /// Reads the state back. Unknown categories and blank SKUs are
    /// dropped, as if the parameter were absent.
    pub fn decode(&self, url: &Url) -> NavigationState {
        let mut state = NavigationState::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                TAB_PARAM if state.tab.is_none() => {
                    state.tab = self.categories.resolve(value.as_ref());
                    if state.tab.is_none() && !value.is_empty() {
                        log::debug!("Ignoring unknown tab {value:?}");
                    }
                }
                SKU_PARAM if state.sku.is_none() => {
                    state.sku = Sku::parse(value.as_ref());
                    if state.sku.is_none() && !value.is_empty() {
                        log::debug!("Ignoring blank sku {value:?}");
                    }
                }
                _ => (),
            }
        }
        state
    }
}

fn apply(pairs: &mut Vec<(String, String)>, key: &str, update: &ParamUpdate) {
    match update {
        ParamUpdate::Keep => (),
        ParamUpdate::Clear => pairs.retain(|(k, _)| k != key),
        ParamUpdate::Set(value) => match pairs.iter().position(|(k, _)| k == key) {
            Some(first) => {
                pairs[first].1 = value.clone();
                let mut index = 0;
                pairs.retain(|(k, _)| {
                    let keep = k != key || index == first;
                    index += 1;
                    keep
                });
            }
            None => pairs.push((key.to_string(), value.clone())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> NavigationCodec {
        NavigationCodec::new(CategorySet::new(
            vec![slug("mujer"), slug("hombre")],
            slug("mujer"),
        ))
    }

    fn slug(s: &str) -> CategorySlug {
        CategorySlug::parse(s).expect("slug")
    }

    fn sku(s: &str) -> Sku {
        Sku::parse(s).expect("sku")
    }

    fn url(s: &str) -> Url {
        Url::parse(s).expect("url")
    }

    #[test]
    fn round_trips_every_combination() {
        let codec = codec();
        let tabs = [None, Some(slug("hombre"))];
        let skus = [None, Some(sku("SKU-2"))];
        let bases = [
            "http://shop.test/catalogo",
            "http://shop.test/catalogo?tab=mujer&sku=X-1",
            "http://shop.test/catalogo?utm=mail&sku=old%20sku",
        ];
        for base in bases {
            for tab in &tabs {
                for sku in &skus {
                    let state = NavigationState {
                        tab: tab.clone(),
                        sku: sku.clone(),
                    };
                    let encoded = codec.encode(&(&state).into(), &url(base));
                    assert_eq!(codec.decode(&encoded), state, "{base} {state:?}");
                }
            }
        }
    }

    #[test]
    fn keep_never_touches_the_existing_value() {
        let codec = codec();
        let base = url("http://shop.test/c?tab=hombre&sku=SKU-1&utm=x");
        let encoded = codec.encode(&NavigationPatch::sku(&sku("SKU-2")), &base);
        assert_eq!(codec.decode(&encoded).tab, Some(slug("hombre")));
        assert_eq!(encoded.as_str(), "http://shop.test/c?tab=hombre&sku=SKU-2&utm=x");

        let encoded = codec.encode(&NavigationPatch::tab(&slug("mujer")), &base);
        assert_eq!(codec.decode(&encoded).sku, Some(sku("SKU-1")));

        let weird = url("http://shop.test/c?tab=juguetes");
        let encoded = codec.encode(&NavigationPatch::clear_sku(), &weird);
        assert_eq!(encoded.query(), Some("tab=juguetes"));
    }

    #[test]
    fn three_state_fields() {
        assert_eq!(ParamUpdate::from_field(None), ParamUpdate::Keep);
        assert_eq!(ParamUpdate::from_field(Some("")), ParamUpdate::Clear);
        assert_eq!(
            ParamUpdate::from_field(Some("SKU-2")),
            ParamUpdate::Set("SKU-2".into())
        );
        let codec = codec();
        let patch = NavigationPatch {
            tab: ParamUpdate::from_field(None),
            sku: ParamUpdate::from_field(Some("")),
        };
        let encoded = codec.encode(&patch, &url("http://shop.test/c?tab=hombre&sku=SKU-1"));
        assert_eq!(encoded.query(), Some("tab=hombre"));
    }

    #[test]
    fn clearing_everything_drops_the_query() {
        let codec = codec();
        let encoded = codec.encode(
            &NavigationPatch {
                tab: ParamUpdate::Clear,
                sku: ParamUpdate::Clear,
            },
            &url("http://shop.test/c?tab=hombre&sku=SKU-1"),
        );
        assert_eq!(encoded.as_str(), "http://shop.test/c");
    }

    #[test]
    fn set_collapses_duplicate_parameters() {
        let codec = codec();
        let encoded = codec.encode(
            &NavigationPatch::sku(&sku("B-2")),
            &url("http://shop.test/c?sku=A&x=1&sku=C"),
        );
        assert_eq!(encoded.query(), Some("sku=B-2&x=1"));
    }

    #[test]
    fn invalid_input_decodes_as_absent() {
        let codec = codec();
        let state = codec.decode(&url("http://shop.test/c?tab=juguetes&sku=%20%20"));
        assert_eq!(state, NavigationState::default());
        let state = codec.decode(&url("http://shop.test/c?tab=&sku="));
        assert_eq!(state, NavigationState::default());
        let state = codec.decode(&url("http://shop.test/c?tab=HOMBRE&sku=SKU-2"));
        assert_eq!(state.tab, Some(slug("hombre")));
        assert_eq!(state.sku, Some(sku("SKU-2")));
    }

    #[test]
    fn store_skus_survive_the_url() {
        let codec = codec();
        for raw in ["ZAP NEG 38", "AÑO-39", "A#1+2"] {
            let encoded = codec.encode(
                &NavigationPatch {
                    tab: ParamUpdate::Keep,
                    sku: ParamUpdate::Set(raw.to_string()),
                },
                &url("http://shop.test/c?tab=mujer"),
            );
            assert_eq!(codec.decode(&encoded).sku, Some(sku(raw)));
        }
    }
}
