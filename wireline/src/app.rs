use crate::config::RelayConfig;
use crate::proxy::TcpInbound;
use anyhow::Context;

pub struct App {
    inbound: TcpInbound,
}

impl App {
    /// Create a running App instance.
    pub async fn create(config: RelayConfig) -> anyhow::Result<Self> {
        let inbound = TcpInbound::bind(&config)
            .await
            .context("Failed to start inbound")?;
        Ok(Self { inbound })
    }

    /// Serve until ctrl-c. In-flight connections are cut when the process
    /// exits; the listener stops accepting immediately.
    pub async fn run(self) {
        tokio::select! {
            _ = self.inbound.run() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, exiting");
            }
        }
    }
}
