#![deny(clippy::unwrap_used)]

pub mod config;
pub mod console;
pub mod controller;
pub mod history;
pub mod index;
pub mod inventory;
pub mod loader;
pub mod navigation;
pub mod resolver;
pub mod stock;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use storefront_types as types;

/// Start of the window the synthetic "recently added" category lists.
pub fn recent_since(days: i64) -> time::OffsetDateTime {
    let now = time::OffsetDateTime::now_utc();
    now.replace_time(time::Time::MIDNIGHT) - time::Duration::days(days.max(0))
}
