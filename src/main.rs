use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auther::api::{self, AppState};
use auther::auth::{otp, password, Authenticator};
use auther::cache::TokenCache;
use auther::clock::{Clock, SystemClock};
use auther::config::{self, Config};
use auther::dispatch::Dispatcher;
use auther::resolver::Resolver;
use auther::store::postgres::PgAccountStore;
use auther::store::redis_store::RedisStore;
use auther::tokens::TokenService;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;
    init_tracing(&cfg);
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Otp { secret }) => {
            println!("{}", otp::compute_otp(&secret)?);
            Ok(())
        }
        Some(cli::Commands::HashPassword { password }) => {
            println!("{}", password::hash_password(&password)?);
            Ok(())
        }
        Some(cli::Commands::NewOtpSecret { username, issuer }) => {
            let secret = otp::generate_secret();
            println!("secret: {}", secret);
            println!("uri:    {}", otp::provisioning_uri(&issuer, &username, &secret));
            Ok(())
        }
        None => run_server(cfg, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing(cfg: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "auther=debug,tower_http=debug".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if cfg.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(cfg: Config, port: Option<u16>) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let accounts = PgAccountStore::connect(&cfg.database_url)
        .await
        .context("connecting to postgres")?;

    tracing::info!("Running migrations...");
    accounts.migrate().await?;

    tracing::info!("Connecting to Redis...");
    let durable = RedisStore::connect(&cfg.redis_url)
        .await
        .context("connecting to redis")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(TokenCache::new(Arc::new(durable), clock.clone(), cfg.cache()));
    let tokens = TokenService::new(
        cache,
        cfg.token_secret.as_bytes(),
        clock.clone(),
        cfg.token_lifetime,
    )
    .context("initialising token signer")?;
    let authenticator = Authenticator::new(Arc::new(accounts), clock)
        .context("preparing authenticator")?;
    let resolver = Arc::new(Resolver::new(authenticator, tokens));

    let (dispatch, dispatcher) =
        Dispatcher::spawn(resolver, cfg.dispatch_workers, cfg.dispatch_queue);
    let app = api::router(Arc::new(AppState { dispatch }));

    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(cfg.port)));
    tracing::info!("Auther listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // the router (and its dispatch handle) is gone; let in-flight jobs finish
    dispatcher.join().await;
    tracing::info!("Auther stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
