//! pairlink-server – Bibliotheks-Root
//!
//! Verdrahtet Kontenspeicher, Anrufverlauf, Auth und den
//! Signalisierungs-Relay zu einem lauffaehigen Prozess.

pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use pairlink_auth::service::AuthService;
use pairlink_auth::token::TokenStore;
use pairlink_db::memory::{MemoryAnrufRepository, MemoryBenutzerRepository};
use pairlink_signaling::{RelayConfig, RelayServer, RelayZustand};
use tokio::sync::watch;

use config::ServerConfig;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den Relay und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Speicher (Konten, Anrufverlauf) anlegen
    /// 2. Token-Store mit Ablauf-Cleanup starten
    /// 3. TCP-Listener fuer den Signalisierungskanal starten
    /// 4. Auf Ctrl-C warten und den Shutdown signalisieren
    pub async fn starten(self) -> Result<()> {
        let bind_addr: SocketAddr = self
            .config
            .tcp_bind_adresse()
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.config.tcp_bind_adresse()))?;

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %bind_addr,
            max_clients = self.config.server.max_clients,
            "Relay startet"
        );

        let benutzer_repo = Arc::new(MemoryBenutzerRepository::neu());
        let anruf_repo = Arc::new(MemoryAnrufRepository::neu());
        let token_store = TokenStore::neu_mit_cleanup(TokenStore::neu());
        let auth_service = Arc::new(AuthService::neu(token_store, benutzer_repo.clone()));

        let relay_config = RelayConfig {
            max_clients: self.config.server.max_clients,
            handshake_timeout_sek: self.config.server.handshake_timeout_sek,
        };
        let state = RelayZustand::neu(relay_config, auth_service, benutzer_repo, anruf_repo);
        let relay = RelayServer::neu(state, bind_addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown-Signal empfangen, Relay wird beendet");
                let _ = shutdown_tx.send(true);
            }
        });

        relay.starten(shutdown_rx).await?;
        tracing::info!("Relay beendet");
        Ok(())
    }
}
