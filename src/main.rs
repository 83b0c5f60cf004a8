use std::sync::Arc;
use tokio::net::TcpListener;

use chatrelay::config::Config;
use chatrelay::gateway::channels::ChannelTable;
use chatrelay::gateway::hub::Hub;
use chatrelay::registry::SessionRegistry;
use chatrelay::shutdown::{self, ShutdownCoordinator};
use chatrelay::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatrelay=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let registry = Arc::new(SessionRegistry::new());
    let channels = Arc::new(ChannelTable::new());
    let (hub, intake_rx) = Hub::new(Arc::clone(&channels), config.intake_capacity);
    let hub = Arc::new(hub);
    let dispatch = tokio::spawn(Arc::clone(&hub).run(intake_rx));

    let coordinator = ShutdownCoordinator::new();
    tokio::spawn(shutdown::watch(
        coordinator.clone(),
        Arc::clone(&hub),
        dispatch,
    ));

    let state = AppState {
        registry,
        channels,
        hub,
        shutdown: coordinator.token(),
        outbox_capacity: config.outbox_capacity,
    };

    let app = chatrelay::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{actual_port}\x1b[0m");
    eprintln!();

    axum::serve(listener, app)
        .with_graceful_shutdown(coordinator.token().cancelled_owned())
        .await
        .expect("server error");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");

    eprintln!();
    eprintln!("  \x1b[1;36mchatrelay\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m          {}", config.port);
    eprintln!("  \x1b[2mintake queue\x1b[0m  {}", config.intake_capacity);
    eprintln!("  \x1b[2mclient queue\x1b[0m  {}", config.outbox_capacity);
    eprintln!();
}
