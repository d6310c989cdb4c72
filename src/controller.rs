//! The view consistency controller: owns the displayed catalog, the overlay
//! and the history state, and serialises every change to them through its
//! mailbox.

use crate::history::{HistoryOp, HistorySync, Intent, NavigationBackend, OverlayAction};
use crate::index::{Catalog, Resolution};
use crate::loader::CatalogLoader;
use crate::navigation::NavigationCodec;
use crate::resolver::RemoteResolver;
use crate::stock::StockBook;
use crate::view::{stock_keys, GridView, OverlayState, OverlayView, StockKey, ViewSnapshot};
use actix::fut::LocalBoxActorFuture;
use actix::prelude::*;
use actix_broker::BrokerIssue;
use derive_more::{Display, Error};
use serde::Serialize;
use std::sync::Arc;
use storefront_types::cart::{CartOutcome, CartService};
use storefront_types::category::CategorySlug;
use storefront_types::product::Sku;
use storefront_types::VariantId;
use url::Url;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[display("{raw:?} is not a valid SKU")]
    InvalidSku { raw: String },
    #[display("Unknown category {raw:?}")]
    UnknownCategory { raw: String },
    #[display("No product is open")]
    NoOverlay,
    #[display("Color {color:?} is not offered")]
    UnknownColor { color: String },
    #[display("Color {color:?} has no size that can be selected")]
    NoSelectableSize { color: String },
    #[display("Size {size:?} cannot be selected")]
    SizeUnavailable { size: String },
}

/// Published after every change of the visible state.
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct ViewChanged(pub ViewSnapshot);

/// Initial page load with the URL the page was opened at.
#[derive(Message, Debug)]
#[rtype(result = "ViewSnapshot")]
pub struct Boot(pub Url);

#[derive(Message, Debug)]
#[rtype(result = "Result<LoadOutcome, NavigationError>")]
pub struct LoadCategory(pub String);

#[derive(Debug)]
pub enum LoadOutcome {
    Rendered(ViewSnapshot),
    /// A newer load was requested before this one finished.
    Stale,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<ViewSnapshot, NavigationError>")]
pub struct OpenBySku(pub String);

#[derive(Message, Debug)]
#[rtype(result = "Result<ViewSnapshot, NavigationError>")]
pub struct SelectColor(pub String);

#[derive(Message, Debug)]
#[rtype(result = "Result<ViewSnapshot, NavigationError>")]
pub struct SelectSize(pub String);

#[derive(Message, Debug)]
#[rtype(result = "ViewSnapshot")]
pub struct CloseOverlay;

/// Back/forward navigation landed on `0`.
#[derive(Message, Debug)]
#[rtype(result = "ViewSnapshot")]
pub struct PopState(pub Url);

#[derive(Message, Debug)]
#[rtype(result = "CartResult")]
pub struct CartAdd {
    pub variant: VariantId,
    pub quantity: u32,
}

#[derive(Message, Debug)]
#[rtype(result = "ViewSnapshot")]
pub struct GetView;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    pub sku: Sku,
    pub size: String,
    pub available: u32,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum CartResult {
    Added,
    Conflict {
        available: Option<u32>,
        alternatives: Vec<Alternative>,
    },
    Failed {
        reason: String,
    },
}

enum LoadTarget {
    Category(CategorySlug),
    /// Recently added products, or `fallback` when there are none.
    Default { fallback: CategorySlug },
}

struct Fetched {
    catalog: Option<Catalog>,
    overlay: Option<(Sku, Option<Resolution>)>,
}

enum CartFlow {
    Added,
    Conflict {
        book: StockBook,
        remaining: Option<u32>,
    },
    Failed(String),
}

pub struct CatalogController {
    loader: Arc<CatalogLoader>,
    resolver: Arc<RemoteResolver>,
    cart: Arc<dyn CartService>,
    backend: Arc<dyn NavigationBackend>,
    history: HistorySync,
    catalog: Option<Arc<Catalog>>,
    default_tab: Option<CategorySlug>,
    overlay: OverlayState,
    load_token: u64,
    nav_token: u64,
}

impl CatalogController {
    pub fn new(
        loader: Arc<CatalogLoader>,
        resolver: Arc<RemoteResolver>,
        cart: Arc<dyn CartService>,
        backend: Arc<dyn NavigationBackend>,
        codec: NavigationCodec,
    ) -> Self {
        Self {
            loader,
            resolver,
            cart,
            backend,
            history: HistorySync::new(codec),
            catalog: None,
            default_tab: None,
            overlay: OverlayState::Closed,
            load_token: 0,
            nav_token: 0,
        }
    }

    fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            url: self.backend.current().to_string(),
            state: self.history.state().clone(),
            grid: self.catalog.as_deref().map(GridView::from),
            overlay: self.overlay.clone(),
        }
    }

    fn publish(&self) {
        self.issue_system_async(ViewChanged(self.snapshot()));
    }

    fn apply(&self, op: HistoryOp) {
        match &op {
            HistoryOp::Push(url) => log::debug!("history push {url}"),
            HistoryOp::Replace(url) => log::debug!("history replace {url}"),
            HistoryOp::Skip => (),
        }
        op.apply(self.backend.as_ref());
    }

    /// Category shown when the URL carries none.
    fn default_tab(&self) -> CategorySlug {
        self.default_tab
            .clone()
            .unwrap_or_else(|| self.history.codec().categories().fallback().clone())
    }

    fn show(&mut self, sku: Sku, resolution: Option<Resolution>) {
        self.overlay = match resolution {
            Some(r) => OverlayState::Open(Box::new(OverlayView::from_resolution(&r))),
            None => {
                log::info!("SKU {sku} is not available");
                OverlayState::NotAvailable { sku }
            }
        };
    }

    /// Fetches a catalog and/or resolves a SKU off the mailbox. The returned
    /// flag is false when the catalog load was overtaken by a newer one.
    fn run(
        &mut self,
        target: Option<LoadTarget>,
        sku: Option<Sku>,
    ) -> LocalBoxActorFuture<Self, bool> {
        let load_token = target.as_ref().map(|_| {
            self.load_token += 1;
            self.load_token
        });
        let nav_token = sku.as_ref().map(|_| {
            self.nav_token += 1;
            self.nav_token
        });
        let is_default = matches!(target, Some(LoadTarget::Default { .. }));
        if let Some(sku) = &sku {
            self.overlay = OverlayState::Loading { sku: sku.clone() };
        }
        let loader = self.loader.clone();
        let resolver = self.resolver.clone();
        Box::pin(
            fetch(loader, resolver, target, sku)
                .into_actor(self)
                .map(move |fetched, act, _| {
                    let fresh = act.settle(fetched, load_token, nav_token, is_default);
                    act.publish();
                    fresh
                }),
        )
    }

    fn settle(
        &mut self,
        fetched: Fetched,
        load_token: Option<u64>,
        nav_token: Option<u64>,
        is_default: bool,
    ) -> bool {
        let mut fresh = true;
        if let (Some(catalog), Some(token)) = (fetched.catalog, load_token) {
            if token == self.load_token {
                if is_default {
                    self.default_tab = Some(catalog.category.clone());
                    self.history.observe_tab(catalog.category.clone());
                }
                self.catalog = Some(Arc::new(catalog));
            } else {
                log::debug!("Discarding stale load of {}", catalog.category);
                fresh = false;
            }
        }
        if let (Some((sku, resolution)), Some(token)) = (fetched.overlay, nav_token) {
            if token == self.nav_token {
                self.show(sku, resolution);
            } else {
                log::debug!("Discarding stale resolution of {sku}");
            }
        }
        fresh
    }

    /// Shows `sku`, from the loaded index when possible.
    fn resolve(&mut self, sku: Sku) -> LocalBoxActorFuture<Self, ()> {
        let hit = self
            .catalog
            .as_ref()
            .and_then(|c| c.index.get(&sku).cloned());
        match hit {
            Some(resolution) => {
                self.nav_token += 1;
                self.show(sku, Some(resolution));
                self.publish();
                Box::pin(actix::fut::ready(()))
            }
            None => Box::pin(self.run(None, Some(sku)).map(|_, _, _| ())),
        }
    }

    fn change_variant(&mut self, next: OverlayView) -> ViewSnapshot {
        let op = self
            .history
            .navigate(Intent::ChangeVariant(next.sku.clone()), &self.backend.current());
        self.apply(op);
        self.nav_token += 1;
        self.overlay = OverlayState::Open(Box::new(next));
        self.publish();
        self.snapshot()
    }

    /// Sizes of the colour `variant` belongs to, preferring the overlay.
    fn stock_keys_for(&self, variant: VariantId) -> Vec<StockKey> {
        let contains = |keys: &[StockKey]| keys.iter().any(|k| k.variant_id == variant);
        if let Some(keys) = self
            .overlay
            .view()
            .map(OverlayView::stock_keys)
            .filter(|k| contains(k.as_slice()))
        {
            return keys;
        }
        self.catalog
            .iter()
            .flat_map(|c| c.products.iter())
            .flat_map(|p| p.colors.iter())
            .map(stock_keys)
            .find(|k| contains(k.as_slice()))
            .unwrap_or_default()
    }
}

async fn fetch(
    loader: Arc<CatalogLoader>,
    resolver: Arc<RemoteResolver>,
    target: Option<LoadTarget>,
    sku: Option<Sku>,
) -> Fetched {
    let catalog = match target {
        None => None,
        Some(LoadTarget::Category(tab)) => Some(loader.load(&tab).await),
        Some(LoadTarget::Default { fallback }) => {
            let recent = loader.load(&CategorySlug::recently_added()).await;
            if recent.is_empty() {
                log::info!("Nothing added recently, showing {fallback}");
                Some(loader.load(&fallback).await)
            } else {
                Some(recent)
            }
        }
    };
    let overlay = match sku {
        None => None,
        Some(sku) => {
            let hit = catalog.as_ref().and_then(|c| c.index.get(&sku).cloned());
            let resolution = match hit {
                Some(r) => Some(r),
                None => resolver.resolve(&sku).await,
            };
            Some((sku, resolution))
        }
    };
    Fetched { catalog, overlay }
}

impl Actor for CatalogController {
    type Context = Context<Self>;

    fn started(&mut self, _: &mut Self::Context) {
        log::info!("Catalog controller started");
    }
}

impl Handler<Boot> for CatalogController {
    type Result = ResponseActFuture<Self, ViewSnapshot>;

    fn handle(&mut self, Boot(url): Boot, _: &mut Self::Context) -> Self::Result {
        let state = self.history.adopt(&url);
        log::info!("Booting at {url}");
        let target = match state.tab {
            Some(tab) => LoadTarget::Category(tab),
            None => LoadTarget::Default {
                fallback: self.history.codec().categories().fallback().clone(),
            },
        };
        Box::pin(
            self.run(Some(target), state.sku)
                .map(|_, act, _| act.snapshot()),
        )
    }
}

impl Handler<LoadCategory> for CatalogController {
    type Result = ResponseActFuture<Self, Result<LoadOutcome, NavigationError>>;

    fn handle(&mut self, LoadCategory(raw): LoadCategory, _: &mut Self::Context) -> Self::Result {
        let Some(tab) = self.history.codec().categories().resolve(&raw) else {
            return Box::pin(actix::fut::ready(Err(NavigationError::UnknownCategory { raw })));
        };
        let op = self
            .history
            .navigate(Intent::SwitchTab(tab.clone()), &self.backend.current());
        self.apply(op);
        Box::pin(
            self.run(Some(LoadTarget::Category(tab)), None)
                .map(|fresh, act, _| {
                    Ok(if fresh {
                        LoadOutcome::Rendered(act.snapshot())
                    } else {
                        LoadOutcome::Stale
                    })
                }),
        )
    }
}

impl Handler<OpenBySku> for CatalogController {
    type Result = ResponseActFuture<Self, Result<ViewSnapshot, NavigationError>>;

    fn handle(&mut self, OpenBySku(raw): OpenBySku, _: &mut Self::Context) -> Self::Result {
        let Some(sku) = Sku::parse(&raw) else {
            return Box::pin(actix::fut::ready(Err(NavigationError::InvalidSku { raw })));
        };
        let op = self
            .history
            .navigate(Intent::OpenSku(sku.clone()), &self.backend.current());
        if op == HistoryOp::Skip && self.overlay.is_open() {
            return Box::pin(actix::fut::ready(Ok(self.snapshot())));
        }
        self.apply(op);
        Box::pin(self.resolve(sku).map(|_, act, _| Ok(act.snapshot())))
    }
}

impl Handler<SelectColor> for CatalogController {
    type Result = Result<ViewSnapshot, NavigationError>;

    fn handle(&mut self, SelectColor(color): SelectColor, _: &mut Self::Context) -> Self::Result {
        let product = self
            .overlay
            .view()
            .map(|v| v.product.clone())
            .ok_or(NavigationError::NoOverlay)?;
        let group = product
            .color(&color)
            .ok_or_else(|| NavigationError::UnknownColor {
                color: color.clone(),
            })?;
        let next = group
            .preferred_variant()
            .and_then(|v| OverlayView::select(product.clone(), group, v))
            .ok_or(NavigationError::NoSelectableSize { color })?;
        Ok(self.change_variant(next))
    }
}

impl Handler<SelectSize> for CatalogController {
    type Result = Result<ViewSnapshot, NavigationError>;

    fn handle(&mut self, SelectSize(size): SelectSize, _: &mut Self::Context) -> Self::Result {
        let view = self.overlay.view().ok_or(NavigationError::NoOverlay)?;
        let next = view
            .color_group()
            .and_then(|group| {
                group
                    .size(&size)
                    .and_then(|v| OverlayView::select(view.product.clone(), group, v))
            })
            .ok_or(NavigationError::SizeUnavailable { size })?;
        Ok(self.change_variant(next))
    }
}

impl Handler<CloseOverlay> for CatalogController {
    type Result = MessageResult<CloseOverlay>;

    fn handle(&mut self, _: CloseOverlay, _: &mut Self::Context) -> Self::Result {
        let op = self
            .history
            .navigate(Intent::CloseOverlay, &self.backend.current());
        self.apply(op);
        self.nav_token += 1;
        self.overlay = OverlayState::Closed;
        self.publish();
        MessageResult(self.snapshot())
    }
}

impl Handler<PopState> for CatalogController {
    type Result = ResponseActFuture<Self, ViewSnapshot>;

    fn handle(&mut self, PopState(url): PopState, _: &mut Self::Context) -> Self::Result {
        let default_tab = self.default_tab();
        let displayed = self.overlay.sku().cloned();
        let transition = self
            .history
            .pop_state(&url, &default_tab, displayed.as_ref());
        log::debug!("popstate {url}: {transition:?}");
        let sku = match transition.overlay {
            OverlayAction::Close => {
                self.nav_token += 1;
                self.overlay = OverlayState::Closed;
                None
            }
            OverlayAction::Keep => None,
            OverlayAction::Resolve(sku) => Some(sku),
        };
        match (transition.reload, sku) {
            (Some(tab), sku) => Box::pin(
                self.run(Some(LoadTarget::Category(tab)), sku)
                    .map(|_, act, _| act.snapshot()),
            ),
            (None, Some(sku)) => Box::pin(self.resolve(sku).map(|_, act, _| act.snapshot())),
            (None, None) => {
                self.publish();
                Box::pin(actix::fut::ready(self.snapshot()))
            }
        }
    }
}

impl Handler<CartAdd> for CatalogController {
    type Result = ResponseActFuture<Self, CartResult>;

    fn handle(&mut self, msg: CartAdd, _: &mut Self::Context) -> Self::Result {
        let CartAdd { variant, quantity } = msg;
        let keys = self.stock_keys_for(variant);
        let ids = keys.iter().map(|k| k.variant_id).collect::<Vec<_>>();
        let cart = self.cart.clone();
        let loader = self.loader.clone();
        Box::pin(
            async move {
                match cart.add(variant, quantity).await {
                    Ok(CartOutcome::Added) => CartFlow::Added,
                    Ok(CartOutcome::InsufficientStock { remaining }) => {
                        log::info!("Not enough stock for {variant}, refreshing");
                        let ids = if ids.is_empty() { vec![variant] } else { ids };
                        CartFlow::Conflict {
                            book: loader.stock_book(&ids).await,
                            remaining,
                        }
                    }
                    Err(err) => {
                        log::error!("Unable to add {variant} to cart: {err:#}");
                        CartFlow::Failed(err.to_string())
                    }
                }
            }
            .into_actor(self)
            .map(move |flow, act, _| match flow {
                CartFlow::Added => CartResult::Added,
                CartFlow::Failed(reason) => CartResult::Failed { reason },
                CartFlow::Conflict { book, remaining } => {
                    let reserved = keys
                        .iter()
                        .find(|k| k.variant_id == variant)
                        .map(|k| k.reserved)
                        .unwrap_or_default();
                    let available = book.aggregate(&variant, reserved).available.or(remaining);
                    if let OverlayState::Open(view) = &mut act.overlay {
                        if view.stock_keys().iter().any(|k| k.variant_id == variant) {
                            view.refresh_stock(&book);
                            act.publish();
                        }
                    }
                    let alternatives = keys
                        .into_iter()
                        .filter(|k| k.variant_id != variant)
                        .filter_map(|k| {
                            let available = book.aggregate(&k.variant_id, k.reserved).available?;
                            (available >= quantity).then_some(Alternative {
                                sku: k.sku,
                                size: k.size,
                                available,
                            })
                        })
                        .collect();
                    CartResult::Conflict {
                        available,
                        alternatives,
                    }
                }
            }),
        )
    }
}

impl Handler<GetView> for CatalogController {
    type Result = MessageResult<GetView>;

    fn handle(&mut self, _: GetView, _: &mut Self::Context) -> Self::Result {
        MessageResult(self.snapshot())
    }
}
