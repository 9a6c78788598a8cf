//! Pomelo configuration service entry point

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pomelo_server::{
    BranchResolver, MainBranchResolver, MemoryReleaseStore, ReleaseStore, ServerArgs, WatchHub,
    api, seed,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = Arc::new(MemoryReleaseStore::new());
    if let Some(dir) = &args.seed_dir {
        let loaded = seed::load_seed_dir(store.as_ref(), dir).await?;
        info!(loaded, dir = %dir.display(), "seeded releases");
    }

    let store_dyn: Arc<dyn ReleaseStore> = store.clone();
    let hub = Arc::new(WatchHub::new(
        store_dyn.clone(),
        Duration::from_secs(args.hold_timeout_secs),
        args.max_waiters,
    ));
    let resolver: Arc<dyn BranchResolver> = Arc::new(MainBranchResolver::new(store_dyn));

    info!(listen = %args.listen, hold_timeout_secs = args.hold_timeout_secs, "starting server");

    let hub_data = web::Data::new(hub);
    let resolver_data = web::Data::new(resolver);
    HttpServer::new(move || {
        App::new()
            .app_data(hub_data.clone())
            .app_data(resolver_data.clone())
            .configure(api::configure_routes)
    })
    .bind(&args.listen)?
    .run()
    .await?;

    Ok(())
}
