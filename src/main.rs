use actix::prelude::*;
use actix_broker::BrokerSubscribe;
use anyhow::Context as AnyhowContext;
use std::env;
use std::path::Path;
use std::sync::Arc;
use storefront::config::CatalogConfig;
use storefront::console::{Command, StockCheckedCart, HELP};
use storefront::controller::{
    Boot, CartAdd, CatalogController, CloseOverlay, GetView, LoadCategory, OpenBySku, PopState,
    SelectColor, SelectSize, ViewChanged,
};
use storefront::history::{MemoryHistory, NavigationBackend};
use storefront::inventory::{Seed, SqliteInventoryStore};
use storefront::loader::CatalogLoader;
use storefront::navigation::NavigationCodec;
use storefront::resolver::RemoteResolver;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_rusqlite::Connection;
use url::Url;

/// Prints every view change as JSON.
struct ViewPrinter;

impl Actor for ViewPrinter {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.subscribe_system_async::<ViewChanged>(ctx);
    }
}

impl Handler<ViewChanged> for ViewPrinter {
    type Result = ();

    fn handle(&mut self, ViewChanged(view): ViewChanged, _: &mut Self::Context) -> Self::Result {
        match serde_json::to_string_pretty(&view) {
            Ok(json) => println!("{json}"),
            Err(err) => log::error!("Unable to render view: {err}"),
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => log::error!("Unable to render result: {err}"),
    }
}

async fn pop(controller: &Addr<CatalogController>, url: Option<Url>) -> Result<(), MailboxError> {
    match url {
        Some(url) => {
            controller.send(PopState(url)).await?;
        }
        None => log::info!("No history entry in that direction"),
    }
    Ok(())
}

#[actix_rt::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();

    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env")?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            std::fs::File::create(".env")?;
            envmnt::load_file(".env")?;
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to open .env file: {err}"));
        }
    }
    let config = CatalogConfig::from_env()?;

    if let Some(dir) = Path::new(&config.db_path)
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Unable to create {}", dir.display()))?;
    }
    let conn = Connection::open(&config.db_path).await?;
    let store = Arc::new(SqliteInventoryStore::init(conn).await?);
    if let Some(path) = &config.seed {
        if store.row_count().await? == 0 {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Unable to read seed {path}"))?;
            let seed: Seed = serde_json::from_str(&raw)
                .with_context(|| format!("Unable to parse seed {path}"))?;
            store.seed(seed).await?;
        } else {
            log::info!("Inventory already populated, skipping seed {path}");
        }
    }

    let initial = match env::args().nth(1) {
        Some(raw) => Url::parse(&raw).with_context(|| format!("Invalid start URL {raw}"))?,
        None => config.base_url.clone(),
    };
    let history = Arc::new(MemoryHistory::new(initial.clone()));
    let loader = Arc::new(CatalogLoader::new(store.clone(), store.clone(), &config));
    let resolver = Arc::new(RemoteResolver::new(
        store.clone(),
        store.clone(),
        store.clone(),
    ));
    let cart = Arc::new(StockCheckedCart::new(store.clone()));

    let _printer = ViewPrinter.start();
    let controller = CatalogController::new(
        loader,
        resolver,
        cart,
        history.clone(),
        NavigationCodec::new(config.categories.clone()),
    )
    .start();
    controller.send(Boot(initial)).await?;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            res = signal::ctrl_c() => {
                if let Err(err) = res {
                    log::error!("Unable to listen to shutdown: {err}");
                }
                None
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<Command>() {
            Ok(c) => c,
            Err(err) => {
                log::warn!("{err}");
                continue;
            }
        };
        let rejected = match command {
            Command::Tab(tab) => controller.send(LoadCategory(tab)).await?.err(),
            Command::Open(sku) => controller.send(OpenBySku(sku)).await?.err(),
            Command::Color(color) => controller.send(SelectColor(color)).await?.err(),
            Command::Size(size) => controller.send(SelectSize(size)).await?.err(),
            Command::Close => {
                controller.send(CloseOverlay).await?;
                None
            }
            Command::Back => {
                pop(&controller, history.back()).await?;
                None
            }
            Command::Forward => {
                pop(&controller, history.forward()).await?;
                None
            }
            Command::Cart(quantity) => {
                let view = controller.send(GetView).await?;
                match view.overlay.view() {
                    Some(overlay) => {
                        let result = controller
                            .send(CartAdd {
                                variant: overlay.variant_id,
                                quantity,
                            })
                            .await?;
                        print_json(&result);
                    }
                    None => log::warn!("Open a product before adding it to the cart"),
                }
                None
            }
            Command::Url(url) => {
                history.push(&url);
                controller.send(PopState(url)).await?;
                None
            }
            Command::Show => {
                print_json(&controller.send(GetView).await?);
                None
            }
            Command::Help => {
                println!("{HELP}");
                None
            }
            Command::Quit => break,
        };
        if let Some(err) = rejected {
            log::warn!("{err}");
        }
    }
    log::info!("Bye");
    System::current().stop();
    Ok(())
}
