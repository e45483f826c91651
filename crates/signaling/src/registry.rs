//! Verbindungs-Register – einzige Wahrheit darueber, wer erreichbar ist
//!
//! Haelt pro Benutzer hoechstens einen Eintrag mit der Send-Queue seiner
//! aktiven Verbindung. Eine zweite authentifizierte Verbindung desselben
//! Benutzers ueberschreibt den bestehenden Eintrag (last-registered wins);
//! die verdraengte Verbindung erkennt das am Schliessen ihrer Queue.
//!
//! Das Register blockiert nie: Nachschlagen ist ein Momentaufnahme-Zugriff,
//! Zustellen geschieht via `try_send` in die gepufferte Queue des Ziels.
//! Der Praesenz-Abgleich mit dem Kontenspeicher (online/offline) ist Sache
//! des Verbindungs-Lebenszyklus, nicht des Registers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use pairlink_core::types::UserId;
use pairlink_protocol::signal::ServerEreignis;
use tokio::sync::mpsc;

/// Groesse der Send-Queue pro Verbindung
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// VerbindungsHandle
// ---------------------------------------------------------------------------

/// Transientes Handle auf die Send-Queue einer registrierten Verbindung
///
/// Wird beim Nachschlagen herausgegeben; das Register bleibt der einzige
/// Eigentuemer des Eintrags.
#[derive(Clone, Debug)]
pub struct VerbindungsHandle {
    pub user_id: UserId,
    pub display_name: String,
    tx: mpsc::Sender<ServerEreignis>,
}

impl VerbindungsHandle {
    /// Stellt ein Ereignis nicht-blockierend an die Verbindung zu
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, ereignis: ServerEreignis) -> bool {
        match self.tx.try_send(ereignis) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(user_id = %self.user_id, "Send-Queue voll – Ereignis verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(user_id = %self.user_id, "Send-Queue geschlossen (Verbindung weg)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// VerbindungsRegister
// ---------------------------------------------------------------------------

struct RegisterEintrag {
    handle: VerbindungsHandle,
    /// Laufende Nummer der Registrierung, unterscheidet verdraengte
    /// Verbindungen von der aktuellen
    verbindungs_nr: u64,
}

/// In-Memory-Register aller aktiven Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
/// Operationen fuer denselben Benutzer werden durch die Map linearisiert.
#[derive(Clone)]
pub struct VerbindungsRegister {
    inner: Arc<VerbindungsRegisterInner>,
}

struct VerbindungsRegisterInner {
    verbindungen: DashMap<UserId, RegisterEintrag>,
    naechste_nr: AtomicU64,
}

impl VerbindungsRegister {
    /// Erstellt ein neues, leeres Register
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(VerbindungsRegisterInner {
                verbindungen: DashMap::new(),
                naechste_nr: AtomicU64::new(1),
            }),
        }
    }

    /// Registriert eine Verbindung und gibt ihre Empfangs-Queue zurueck
    ///
    /// Ueberschreibt einen bestehenden Eintrag desselben Benutzers
    /// (idempotent, kein Fehlerzustand). Die zurueckgegebene Nummer
    /// identifiziert diese Registrierung fuer [`entfernen_wenn`].
    ///
    /// [`entfernen_wenn`]: VerbindungsRegister::entfernen_wenn
    pub fn registrieren(
        &self,
        user_id: UserId,
        display_name: String,
    ) -> (mpsc::Receiver<ServerEreignis>, u64) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        let verbindungs_nr = self.inner.naechste_nr.fetch_add(1, Ordering::Relaxed);
        let eintrag = RegisterEintrag {
            handle: VerbindungsHandle {
                user_id,
                display_name,
                tx,
            },
            verbindungs_nr,
        };

        if self.inner.verbindungen.insert(user_id, eintrag).is_some() {
            tracing::info!(user_id = %user_id, "Bestehende Verbindung verdraengt (Neuanmeldung)");
        }
        tracing::debug!(user_id = %user_id, verbindungs_nr, "Verbindung registriert");
        (rx, verbindungs_nr)
    }

    /// Schlaegt die aktive Verbindung eines Benutzers nach
    ///
    /// Nicht-blockierende Momentaufnahme; `None` wenn der Benutzer gerade
    /// nicht erreichbar ist.
    pub fn nachschlagen(&self, user_id: &UserId) -> Option<VerbindungsHandle> {
        self.inner
            .verbindungen
            .get(user_id)
            .map(|e| e.handle.clone())
    }

    /// Entfernt den Eintrag eines Benutzers; No-op wenn keiner existiert
    pub fn entfernen(&self, user_id: &UserId) -> bool {
        let entfernt = self.inner.verbindungen.remove(user_id).is_some();
        if entfernt {
            tracing::debug!(user_id = %user_id, "Verbindung entfernt");
        }
        entfernt
    }

    /// Entfernt den Eintrag nur wenn er noch zu dieser Registrierung gehoert
    ///
    /// Schuetzt davor, dass der Cleanup einer verdraengten Verbindung den
    /// Eintrag ihrer Nachfolgerin loescht.
    pub fn entfernen_wenn(&self, user_id: &UserId, verbindungs_nr: u64) -> bool {
        let entfernt = self
            .inner
            .verbindungen
            .remove_if(user_id, |_, e| e.verbindungs_nr == verbindungs_nr)
            .is_some();
        if entfernt {
            tracing::debug!(user_id = %user_id, verbindungs_nr, "Verbindung entfernt");
        }
        entfernt
    }

    /// Stellt ein Ereignis an einen Benutzer zu, falls er registriert ist
    pub fn an_user_senden(&self, user_id: &UserId, ereignis: ServerEreignis) -> bool {
        match self.nachschlagen(user_id) {
            Some(handle) => handle.senden(ereignis),
            None => {
                tracing::debug!(user_id = %user_id, "Zustellung an nicht registrierten Benutzer");
                false
            }
        }
    }

    /// Prueft ob ein Benutzer registriert ist
    pub fn ist_registriert(&self, user_id: &UserId) -> bool {
        self.inner.verbindungen.contains_key(user_id)
    }

    /// Gibt die Anzahl der registrierten Verbindungen zurueck
    pub fn anzahl(&self) -> usize {
        self.inner.verbindungen.len()
    }
}

impl Default for VerbindungsRegister {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
