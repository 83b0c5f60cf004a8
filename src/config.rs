#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Capacity of the hub's intake queue; producers block when it is full.
    pub intake_capacity: usize,
    /// Capacity of each client's outbound queue; the oldest frame is dropped
    /// for that client when it overflows.
    pub outbox_capacity: usize,
}

fn env_capacity(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&c| c > 0)
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(50051),
            intake_capacity: env_capacity("CHATRELAY_INTAKE_CAPACITY", 100),
            outbox_capacity: env_capacity("CHATRELAY_OUTBOX_CAPACITY", 20),
        }
    }
}
