use anyhow::{anyhow, Context};
use storefront_types::category::{CategorySet, CategorySlug};
use url::Url;

const DEFAULT_CATEGORIES: &str = "mujer,hombre,ninos,accesorios";
const DEFAULT_BASE_URL: &str = "http://localhost/catalogo";

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub categories: CategorySet,
    pub recent_days: i64,
    pub stock_batch: usize,
    pub db_path: String,
    pub base_url: Url,
    pub seed: Option<String>,
}

impl CatalogConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let known = parse_categories(&envmnt::get_or("CATALOG_CATEGORIES", DEFAULT_CATEGORIES))?;
        let fallback = match envmnt::get_or("CATALOG_FALLBACK_CATEGORY", "").trim() {
            "" => known
                .first()
                .cloned()
                .ok_or_else(|| anyhow!("CATALOG_CATEGORIES is empty"))?,
            raw => CategorySlug::parse(raw)
                .ok_or_else(|| anyhow!("Invalid CATALOG_FALLBACK_CATEGORY {raw:?}"))?,
        };
        let recent_days: i64 = envmnt::get_parse("CATALOG_RECENT_DAYS").unwrap_or(30);
        let stock_batch: Option<usize> = envmnt::get_parse("CATALOG_STOCK_BATCH").ok();
        let stock_batch = stock_batch.filter(|v| *v > 0).unwrap_or(100);
        let base_url = envmnt::get_or("CATALOG_BASE_URL", DEFAULT_BASE_URL);
        let base_url = Url::parse(&base_url)
            .with_context(|| format!("Invalid CATALOG_BASE_URL {base_url}"))?;
        let seed = Some(envmnt::get_or("CATALOG_SEED", "")).filter(|s| !s.trim().is_empty());
        Ok(Self {
            categories: CategorySet::new(known, fallback),
            recent_days,
            stock_batch,
            db_path: envmnt::get_or("CATALOG_DB", "storage/catalog.db"),
            base_url,
            seed,
        })
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        #[allow(clippy::unwrap_used)]
        let known = parse_categories(DEFAULT_CATEGORIES).unwrap();
        let fallback = known[0].clone();
        #[allow(clippy::unwrap_used)]
        let base_url = Url::parse(DEFAULT_BASE_URL).unwrap();
        Self {
            categories: CategorySet::new(known, fallback),
            recent_days: 30,
            stock_batch: 100,
            db_path: "storage/catalog.db".to_string(),
            base_url,
            seed: None,
        }
    }
}

fn parse_categories(raw: &str) -> Result<Vec<CategorySlug>, anyhow::Error> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| CategorySlug::parse(s).ok_or_else(|| anyhow!("Invalid category slug {s:?}")))
        .collect()
}
