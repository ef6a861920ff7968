//! chatlinkd - status sync and chat core daemon.
//!
//! Runs either end of the topology: the proxy accepts backend links, a
//! backend dials the proxy.

use std::sync::Arc;
use std::time::Duration;

use chatlink::channels::ChannelRegistry;
use chatlink::collab::WordFilter;
use chatlink::config::{self, Config};
use chatlink::events::{EventBus, EventProvider};
use chatlink::game::GameThread;
use chatlink::state::{InMemoryMembership, SessionRegistry};
use chatlink::sync::{LinkOptions, Role, SyncManager, connect_to_proxy, start_listener, start_resync};
use chatlink::ChatContext;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long shutdown waits for queued game tasks to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "chatlink.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {config_path}",
            errors.len()
        ));
    }

    info!(
        server = %config.server.name,
        role = %config.server.role,
        channels = config.channels.len(),
        "Starting chatlinkd"
    );

    let game = GameThread::spawn("chatlink-game")?;
    let bus = Arc::new(EventBus::new());
    let events = EventProvider::new(bus, game.handle());
    let sessions = Arc::new(SessionRegistry::new(
        Some(tokio::runtime::Handle::current()),
        events.clone(),
    ));
    let channels = Arc::new(ChannelRegistry::new(
        config.channels.iter().map(|c| c.to_channel()).collect(),
        &*config.default_channel,
        Arc::new(InMemoryMembership::new()),
    ));
    let manager = SyncManager::new(
        config.server.role,
        &*config.server.name,
        &*config.sync.channel,
        config.sync.queue_capacity,
    );

    let mut ctx = ChatContext::new(
        sessions.clone(),
        events,
        channels,
        manager.clone(),
        config.chat.clone(),
    );
    let words = WordFilter::new(&config.chat.blocked_words);
    if !words.is_empty() {
        ctx = ctx.with_filter(Arc::new(words));
    }

    let options = LinkOptions {
        max_frame_len: config.sync.max_frame_len,
        allowed_backends: config.sync.allowed_backends.clone(),
    };

    let mut tasks = Vec::new();
    match config.server.role {
        Role::Proxy => {
            let Some(addr) = config.sync.listen else {
                return Err(anyhow::anyhow!("sync.listen is required for a proxy"));
            };
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tasks.push(start_listener(listener, ctx.router(), options));
            if let Some(every) = config.sync.resync_interval() {
                tasks.push(start_resync(manager.clone(), sessions, every));
            }
        }
        Role::Backend => {
            let Some(addr) = config.sync.proxy_addr.clone() else {
                return Err(anyhow::anyhow!("sync.proxy_addr is required for a backend"));
            };
            if config.sync.resync_interval().is_some() {
                warn!("sync.resync_interval_secs only applies to the proxy; ignoring");
            }
            tasks.push(connect_to_proxy(addr, ctx.router(), options));
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    manager.shutdown();
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Link task ended abnormally");
        }
    }
    drop(ctx);
    drop(manager);

    let drained = tokio::task::spawn_blocking(move || game.join());
    if tokio::time::timeout(DRAIN_TIMEOUT, drained).await.is_err() {
        warn!("Game thread still busy at shutdown");
    }
    info!("chatlinkd stopped");
    Ok(())
}
