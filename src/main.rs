use anyhow::{anyhow, Result};
use is_terminal::IsTerminal;
use std::sync::Arc;
use tokio::signal;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tunneldns::acme::DynAcmeTokenSource;
use tunneldns::api::AppState;
use tunneldns::dns::Handler;
use tunneldns::session::events::SessionEvents;
use tunneldns::{
    Config, FileAcmeTokens, InMemoryAcmeTokens, ProxyEntryMap, SessionCache, Shared,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut first_args = std::env::args().take(2);
    let (program_name, config_file) = (
        first_args.next().unwrap_or("tunneldns".to_string()),
        first_args.next(),
    );

    let (config_file, config) = config_init(&program_name, config_file)?;
    let session_store = config.session_store().await?;
    let cache = Arc::new(SessionCache::new(&config.session_cache));
    let proxy_map = Arc::new(ProxyEntryMap::new(&config.entry_ip_address_map));
    let static_tokens = Arc::new(InMemoryAcmeTokens::from_config(
        &config.acme,
        config.acme_ttl(),
    ));
    let acme_tokens: DynAcmeTokenSource = match &config.acme.tokens_path {
        Some(path) => {
            tracing::info!("reading ACME tokens from {path}");
            Arc::new(FileAcmeTokens::new(path, config.acme_ttl()))
        }
        None => static_tokens.clone(),
    };
    tracing::info!(
        "serving zones {:?} with {} proxy entries",
        config.authoritative_zones,
        proxy_map.len()
    );

    let handler = Handler::new(
        config.clone(),
        cache.clone(),
        session_store.clone(),
        proxy_map.clone(),
        acme_tokens,
    );
    let dns_server = tunneldns::dns::new(config.dns_udp_bind_addr, handler).await?;
    tracing::info!("DNS listening on UDP {}", dns_server.local_addr()?);
    let mut dns_handle = tokio::spawn(dns_server.block_until_done());

    let cleanup_handle = tunneldns::session::cleanup::spawn(
        session_store.clone(),
        config.session_store.cleanup_interval,
    );

    tracing::info!("API listening on {}", &config.api_bind_addr);
    let events = SessionEvents::new(config.clone(), session_store, proxy_map.clone(), cache.clone());
    let api_server = tunneldns::api::new(AppState {
        config: config.clone(),
        cache,
        events,
    });
    let mut api_handle = tokio::spawn(api_server);

    let mut hangup = unix_signal(SignalKind::hangup())?;

    // TODO(XXX): drain in-flight DNS tasks before exiting.
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("quitting from signal");
                break;
            },
            _ = hangup.recv() => reload(&config_file, &proxy_map, &static_tokens),
            dns_res = &mut dns_handle => {
                return Err(anyhow!("DNS server stopped: {dns_res:?}"));
            },
            api_res = &mut api_handle => {
                api_res??;
                return Err(anyhow!("API server stopped"));
            }
        }
    }

    cleanup_handle.abort();
    dns_handle.abort();
    api_handle.abort();
    tracing::info!("goodbye");
    Ok(())
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(std::io::stdout().is_terminal()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunneldns=info".into()),
        )
        .init();
}

fn config_init(program_name: &str, config_file: Option<String>) -> Result<(String, Shared)> {
    match config_file {
        None => Err(anyhow!("usage: {program_name} /path/to/config.json")),
        Some(config_file) => {
            let config = Config::try_from_file(&config_file)?;
            tracing::debug!("loaded config from {config_file}");
            Ok((config_file, Arc::new(config)))
        }
    }
}

/// Re-read the config file, swapping in its proxy entries and static ACME tokens. Everything
/// else needs a restart.
fn reload(config_file: &str, proxy_map: &ProxyEntryMap, static_tokens: &InMemoryAcmeTokens) {
    match Config::try_from_file(config_file) {
        Ok(config) => {
            proxy_map.replace(&config.entry_ip_address_map);
            static_tokens.replace(config.acme.tokens());
            tracing::info!("reloaded config from {config_file}");
        }
        Err(err) => {
            tracing::error!("config reload from {config_file} failed, keeping current: {err}");
        }
    }
}
