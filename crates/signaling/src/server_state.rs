//! Geteilter Zustand des Relay-Servers
//!
//! Ein `RelayZustand` pro Prozess, als `Arc` an jede Verbindung gereicht.
//! Buendelt Register, Vermittlung, Anrufversuche und Verlauf hinter einer
//! Stelle, damit Verbindungs-Tasks nur ein Handle tragen.

use std::sync::Arc;

use pairlink_auth::service::AuthService;
use pairlink_db::repository::{AnrufRepository, BenutzerRepository};

use crate::matchmaker::PartnerVermittlung;
use crate::registry::VerbindungsRegister;
use crate::relay::AnrufVersuche;
use crate::verlauf::AnrufVerlauf;

/// Konfiguration des Relays
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: u32,
    /// Zeitfenster fuer die Anmeldung nach dem TCP-Accept
    pub handshake_timeout_sek: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_clients: 512,
            handshake_timeout_sek: 10,
        }
    }
}

/// Gesamtzustand des Relays, geteilt zwischen allen Verbindungs-Tasks
pub struct RelayZustand<U: BenutzerRepository, A: AnrufRepository> {
    pub config: Arc<RelayConfig>,
    pub auth_service: Arc<AuthService<U>>,
    pub benutzer_repo: Arc<U>,
    pub anruf_verlauf: AnrufVerlauf<A>,
    pub vermittlung: PartnerVermittlung<U>,
    pub register: VerbindungsRegister,
    pub versuche: AnrufVersuche,
}

impl<U: BenutzerRepository, A: AnrufRepository> RelayZustand<U, A> {
    pub fn neu(
        config: RelayConfig,
        auth_service: Arc<AuthService<U>>,
        benutzer_repo: Arc<U>,
        anruf_repo: Arc<A>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            auth_service,
            benutzer_repo: benutzer_repo.clone(),
            anruf_verlauf: AnrufVerlauf::neu(anruf_repo),
            vermittlung: PartnerVermittlung::neu(benutzer_repo),
            register: VerbindungsRegister::neu(),
            versuche: AnrufVersuche::neu(),
        })
    }
}
