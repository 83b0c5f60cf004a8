use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::gateway::channels::ChannelTable;
use crate::gateway::hub::Hub;
use crate::registry::SessionRegistry;

/// Shared server state, explicitly constructed in `main` and cloned into
/// every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub channels: Arc<ChannelTable>,
    pub hub: Arc<Hub>,
    /// Root shutdown token; streams derive per-connection child tokens.
    pub shutdown: CancellationToken,
    pub outbox_capacity: usize,
}
