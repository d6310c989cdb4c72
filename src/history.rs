//! Push/replace decisions for the browser history and reconciliation of
//! back/forward navigation against the last observed state.

use crate::navigation::{NavigationCodec, NavigationPatch, NavigationState};
use std::sync::{Mutex, PoisonError};
use storefront_types::category::CategorySlug;
use storefront_types::product::Sku;
use url::Url;

/// Where history entries go. External navigation (back/forward) is fed back
/// into the controller as a `PopState` message.
pub trait NavigationBackend: Send + Sync {
    fn current(&self) -> Url;
    fn push(&self, url: &Url);
    fn replace(&self, url: &Url);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOp {
    Push(Url),
    Replace(Url),
    Skip,
}

impl HistoryOp {
    pub fn apply(&self, backend: &dyn NavigationBackend) {
        match self {
            Self::Push(url) => backend.push(url),
            Self::Replace(url) => backend.replace(url),
            Self::Skip => (),
        }
    }
}

#[derive(Debug)]
struct Entries {
    urls: Vec<Url>,
    cursor: usize,
    log: Vec<HistoryOp>,
}

/// A history stack kept in memory, with the same truncate-on-push behaviour
/// as a browser tab.
#[derive(Debug)]
pub struct MemoryHistory {
    entries: Mutex<Entries>,
}

impl MemoryHistory {
    pub fn new(initial: Url) -> Self {
        Self {
            entries: Mutex::new(Entries {
                urls: vec![initial],
                cursor: 0,
                log: vec![],
            }),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves one entry back and returns the URL to hand to `PopState`.
    pub fn back(&self) -> Option<Url> {
        let mut e = self.entries();
        if e.cursor == 0 {
            return None;
        }
        e.cursor -= 1;
        Some(e.urls[e.cursor].clone())
    }

    pub fn forward(&self) -> Option<Url> {
        let mut e = self.entries();
        if e.cursor + 1 >= e.urls.len() {
            return None;
        }
        e.cursor += 1;
        Some(e.urls[e.cursor].clone())
    }

    pub fn len(&self) -> usize {
        self.entries().urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().urls.is_empty()
    }

    /// Every push/replace applied so far, oldest first.
    pub fn ops(&self) -> Vec<HistoryOp> {
        self.entries().log.clone()
    }
}

impl NavigationBackend for MemoryHistory {
    fn current(&self) -> Url {
        let e = self.entries();
        e.urls[e.cursor].clone()
    }

    fn push(&self, url: &Url) {
        let mut e = self.entries();
        let keep = e.cursor + 1;
        e.urls.truncate(keep);
        e.urls.push(url.clone());
        e.cursor = keep;
        e.log.push(HistoryOp::Push(url.clone()));
    }

    fn replace(&self, url: &Url) {
        let mut e = self.entries();
        let cursor = e.cursor;
        e.urls[cursor] = url.clone();
        e.log.push(HistoryOp::Replace(url.clone()));
    }
}

/// A user initiated change of the navigation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SwitchTab(CategorySlug),
    OpenSku(Sku),
    ChangeVariant(Sku),
    CloseOverlay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayAction {
    Close,
    Keep,
    Resolve(Sku),
}

/// What a back/forward navigation requires from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopTransition {
    pub state: NavigationState,
    /// Set only when the effective category changed.
    pub reload: Option<CategorySlug>,
    pub overlay: OverlayAction,
}

#[derive(Debug, Clone)]
pub struct HistorySync {
    codec: NavigationCodec,
    state: NavigationState,
    last_tab: Option<CategorySlug>,
}

impl HistorySync {
    pub fn new(codec: NavigationCodec) -> Self {
        Self {
            codec,
            state: NavigationState::default(),
            last_tab: None,
        }
    }

    pub fn codec(&self) -> &NavigationCodec {
        &self.codec
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn last_tab(&self) -> Option<&CategorySlug> {
        self.last_tab.as_ref()
    }

    /// Takes over the state found in the URL on page load. The entry already
    /// exists, so nothing is written to history.
    pub fn adopt(&mut self, url: &Url) -> NavigationState {
        self.state = self.codec.decode(url);
        self.last_tab = self.state.tab.clone();
        self.state.clone()
    }

    /// Records the category actually shown, e.g. once the default was resolved.
    pub fn observe_tab(&mut self, tab: CategorySlug) {
        self.last_tab = Some(tab);
    }

    pub fn navigate(&mut self, intent: Intent, current: &Url) -> HistoryOp {
        match intent {
            // tab switches are not undoable steps of their own
            Intent::SwitchTab(tab) => {
                let unchanged = self.last_tab.as_ref() == Some(&tab) && self.state.tab.is_some();
                self.last_tab = Some(tab.clone());
                if unchanged {
                    return HistoryOp::Skip;
                }
                let url = self.codec.encode(&NavigationPatch::tab(&tab), current);
                self.state.tab = Some(tab);
                HistoryOp::Replace(url)
            }
            Intent::OpenSku(sku) => {
                if self.state.sku.as_ref() == Some(&sku) {
                    return HistoryOp::Skip;
                }
                let was_open = self.state.sku.is_some();
                let url = self.codec.encode(&NavigationPatch::sku(&sku), current);
                self.state.sku = Some(sku);
                if was_open {
                    HistoryOp::Replace(url)
                } else {
                    HistoryOp::Push(url)
                }
            }
            Intent::ChangeVariant(sku) => {
                if self.state.sku.as_ref() == Some(&sku) {
                    return HistoryOp::Skip;
                }
                let url = self.codec.encode(&NavigationPatch::sku(&sku), current);
                self.state.sku = Some(sku);
                HistoryOp::Replace(url)
            }
            Intent::CloseOverlay => {
                if self.state.sku.is_none() {
                    return HistoryOp::Skip;
                }
                let url = self.codec.encode(&NavigationPatch::clear_sku(), current);
                self.state.sku = None;
                HistoryOp::Replace(url)
            }
        }
    }

    /// Reconciles a back/forward navigation. `default_tab` stands in for an
    /// absent `tab`, `displayed` is the SKU the overlay currently shows.
    pub fn pop_state(
        &mut self,
        url: &Url,
        default_tab: &CategorySlug,
        displayed: Option<&Sku>,
    ) -> PopTransition {
        let state = self.codec.decode(url);
        let effective = state.tab.clone().unwrap_or_else(|| default_tab.clone());
        let reload = (self.last_tab.as_ref() != Some(&effective)).then(|| effective.clone());
        self.last_tab = Some(effective);
        let overlay = match &state.sku {
            None => OverlayAction::Close,
            Some(sku) if displayed == Some(sku) => OverlayAction::Keep,
            Some(sku) => OverlayAction::Resolve(sku.clone()),
        };
        self.state = state.clone();
        PopTransition {
            state,
            reload,
            overlay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_types::category::CategorySet;

    fn slug(s: &str) -> CategorySlug {
        CategorySlug::parse(s).expect("slug")
    }

    fn sku(s: &str) -> Sku {
        Sku::parse(s).expect("sku")
    }

    fn url(s: &str) -> Url {
        Url::parse(s).expect("url")
    }

    fn sync() -> HistorySync {
        HistorySync::new(NavigationCodec::new(CategorySet::new(
            vec![slug("mujer"), slug("hombre")],
            slug("mujer"),
        )))
    }

    fn step(sync: &mut HistorySync, history: &MemoryHistory, intent: Intent) -> HistoryOp {
        let op = sync.navigate(intent, &history.current());
        op.apply(history);
        op
    }

    #[test]
    fn tab_switches_replace_and_overlays_push() {
        let history = MemoryHistory::new(url("http://shop.test/c"));
        let mut sync = sync();
        sync.adopt(&history.current());

        let op = step(&mut sync, &history, Intent::SwitchTab(slug("hombre")));
        assert_eq!(op, HistoryOp::Replace(url("http://shop.test/c?tab=hombre")));
        assert_eq!(history.len(), 1);

        let op = step(&mut sync, &history, Intent::OpenSku(sku("SKU-8")));
        assert_eq!(
            op,
            HistoryOp::Push(url("http://shop.test/c?tab=hombre&sku=SKU-8"))
        );
        assert_eq!(history.len(), 2);

        let op = step(&mut sync, &history, Intent::ChangeVariant(sku("SKU-9")));
        assert!(matches!(op, HistoryOp::Replace(_)));
        let op = step(&mut sync, &history, Intent::OpenSku(sku("SKU-1")));
        assert!(matches!(op, HistoryOp::Replace(_)));
        assert_eq!(history.len(), 2);

        let op = step(&mut sync, &history, Intent::CloseOverlay);
        assert_eq!(op, HistoryOp::Replace(url("http://shop.test/c?tab=hombre")));
        assert_eq!(sync.state().sku, None);
        assert_eq!(sync.state().tab, Some(slug("hombre")));
        assert_eq!(step(&mut sync, &history, Intent::CloseOverlay), HistoryOp::Skip);
    }

    #[test]
    fn repeated_requests_do_not_touch_history() {
        let history = MemoryHistory::new(url("http://shop.test/c?tab=mujer&sku=SKU-1"));
        let mut sync = sync();
        sync.adopt(&history.current());
        assert_eq!(
            step(&mut sync, &history, Intent::OpenSku(sku("SKU-1"))),
            HistoryOp::Skip
        );
        assert_eq!(
            step(&mut sync, &history, Intent::SwitchTab(slug("mujer"))),
            HistoryOp::Skip
        );
        assert!(history.ops().is_empty());
    }

    #[test]
    fn back_after_push_closes_the_overlay() {
        let history = MemoryHistory::new(url("http://shop.test/c?tab=mujer"));
        let mut sync = sync();
        sync.adopt(&history.current());
        step(&mut sync, &history, Intent::OpenSku(sku("SKU-2")));

        let back = history.back().expect("entry");
        let t = sync.pop_state(&back, &slug("mujer"), Some(&sku("SKU-2")));
        assert_eq!(t.reload, None);
        assert_eq!(t.overlay, OverlayAction::Close);
        assert_eq!(t.state.tab, Some(slug("mujer")));
        assert_eq!(t.state.sku, None);

        let forward = history.forward().expect("entry");
        let t = sync.pop_state(&forward, &slug("mujer"), None);
        assert_eq!(t.overlay, OverlayAction::Resolve(sku("SKU-2")));
        assert!(history.forward().is_none());
    }

    #[test]
    fn same_tab_pop_skips_the_reload() {
        let mut sync = sync();
        sync.adopt(&url("http://shop.test/c?tab=mujer&sku=SKU-1"));
        let t = sync.pop_state(
            &url("http://shop.test/c?tab=mujer&sku=SKU-2"),
            &slug("mujer"),
            Some(&sku("SKU-1")),
        );
        assert_eq!(t.reload, None);
        assert_eq!(t.overlay, OverlayAction::Resolve(sku("SKU-2")));

        let t = sync.pop_state(
            &url("http://shop.test/c?tab=mujer&sku=SKU-2"),
            &slug("mujer"),
            Some(&sku("SKU-2")),
        );
        assert_eq!(t.overlay, OverlayAction::Keep);
    }

    #[test]
    fn tab_change_on_pop_requests_a_reload() {
        let mut sync = sync();
        sync.adopt(&url("http://shop.test/c?tab=mujer"));
        let t = sync.pop_state(&url("http://shop.test/c?tab=hombre"), &slug("mujer"), None);
        assert_eq!(t.reload, Some(slug("hombre")));
        assert_eq!(sync.last_tab(), Some(&slug("hombre")));

        // absent tab falls back to the default, which differs again
        let t = sync.pop_state(&url("http://shop.test/c"), &slug("mujer"), None);
        assert_eq!(t.reload, Some(slug("mujer")));
    }

    #[test]
    fn push_truncates_forward_entries() {
        let history = MemoryHistory::new(url("http://shop.test/a"));
        history.push(&url("http://shop.test/b"));
        history.push(&url("http://shop.test/c"));
        history.back();
        history.back();
        history.push(&url("http://shop.test/d"));
        assert_eq!(history.len(), 2);
        assert_eq!(history.current(), url("http://shop.test/d"));
        assert!(history.forward().is_none());
    }
}
