use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carlot_decision::{Decider, EmbeddedDecider, FixedDecider, HttpDecider};
use carlot_storage::FileStore;

use carlot_server::{
    load, shutdown_signal, version, App, AppConfig, AppRouter, AppState,
    DeciderMode,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = env::args().collect::<Vec<_>>();
    let config =
        if args.len() == 3 && (args[1] == "-c" || args[1] == "--config") {
            load(&args[2])?
        } else {
            AppConfig::parse()
        };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    debug!("{:#?}", &config);
    info!("{}", version());
    run_server(config).await
}

async fn run_server(config: AppConfig) -> Result<()> {
    let store = FileStore::new(&config.storage)
        .map_err(|err| anyhow::anyhow!("{err}"))
        .context("could not initialize the data store")?;
    store
        .load()
        .map_err(|err| anyhow::anyhow!("{err}"))
        .context("could not load persisted data")?;

    let mut embedded = None;
    let decider: Option<Arc<dyn Decider>> = match config.mode {
        DeciderMode::Embedded => {
            let policy = config
                .policy
                .as_deref()
                .context("--policy must be provided in embedded mode")?;
            let engine = Arc::new(EmbeddedDecider::open(
                policy,
                config.cache_size,
            )?);
            embedded = Some(Arc::clone(&engine));
            Some(engine)
        }
        DeciderMode::Http => {
            let url = config
                .decision_url
                .as_deref()
                .context("--decision-url must be provided in http mode")?;
            Some(Arc::new(HttpDecider::new(url)))
        }
        DeciderMode::AllowAll => Some(Arc::new(FixedDecider::allow_all())),
        DeciderMode::DenyAll => Some(Arc::new(FixedDecider::deny_all())),
        DeciderMode::Disabled => None,
    };

    let mut app = App::new(config.clone(), store, decider)?;
    if let Some(ref engine) = embedded {
        app = app.with_embedded(Arc::clone(engine));
    }
    let app = Arc::new(app);

    if let Some(engine) = embedded {
        if config.refresh_seconds > 0 {
            policy_reload(engine, config.refresh_seconds);
        }
    }

    if config.playground {
        info!("playground enabled at /playground");
    }

    let router = AppRouter::build(AppState(app))
        .context("could not initialize application routes")?;
    let host = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&host)
        .await
        .context("could not bind to endpoint")?;

    info!("api server, listening on {}", host);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("error while starting API server")?;

    Ok(())
}

fn policy_reload(engine: Arc<EmbeddedDecider>, refresh_seconds: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(
            tokio::time::Duration::from_secs(refresh_seconds),
        );
        // the first tick fires immediately and would re-read the file
        // we just loaded
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = engine.reload() {
                        error!("policy reload failed: {}", err);
                    } else {
                        debug!("policy reloaded ({} refreshes)", engine.refresh_count());
                    }
                },
                _ = shutdown_signal() => {
                    break;
                }
            }
        }
        info!("policy reload loop stopped");
    });
}
