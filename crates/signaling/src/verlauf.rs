//! Anrufverlauf – Nachfuehrung des Lebenszyklus im Speicher
//!
//! Jeder Einleitungsversuch wird zunaechst als "missed" abgelegt und erst
//! beim Annehmen oder Ablehnen umgeschrieben; bleibt beides aus, steht der
//! Eintrag korrekt als verpasster Anruf da. Die Dauer wird nach Gespraechsende
//! an den juengsten akzeptierten Eintrag des Paares angehaengt, egal in
//! welcher Richtung er angelegt wurde.
//!
//! Speicherfehler werden hier protokolliert und verschluckt: die Zustellung
//! der Signalisierung haengt nie am Verlauf.

use std::sync::Arc;

use pairlink_core::types::UserId;
use pairlink_db::models::{AnrufFilter, AnrufStatus, AnrufUpdate, NeuerAnruf};
use pairlink_db::repository::AnrufRepository;

/// Fuehrt den Anrufverlauf anhand der Signalisierungs-Ereignisse nach
pub struct AnrufVerlauf<A: AnrufRepository> {
    anruf_repo: Arc<A>,
}

impl<A: AnrufRepository> AnrufVerlauf<A> {
    pub fn neu(anruf_repo: Arc<A>) -> Self {
        Self { anruf_repo }
    }

    /// Vermerkt einen eingeleiteten Anruf als "missed"
    pub async fn initiiert_vermerken(&self, caller: UserId, callee: UserId) {
        let ergebnis = self
            .anruf_repo
            .erstellen(NeuerAnruf {
                caller_id: caller.inner(),
                callee_id: callee.inner(),
                status: AnrufStatus::Missed,
            })
            .await;
        if let Err(e) = ergebnis {
            tracing::error!(caller = %caller, callee = %callee, fehler = %e,
                "Anrufverlauf: Einleitung konnte nicht vermerkt werden");
        }
    }

    /// Schreibt den juengsten "missed"-Eintrag des Paares auf "accepted" um
    pub async fn angenommen_vermerken(&self, caller: UserId, callee: UserId) {
        self.status_umschreiben(caller, callee, AnrufStatus::Accepted)
            .await;
    }

    /// Schreibt den juengsten "missed"-Eintrag des Paares auf "rejected" um
    pub async fn abgelehnt_vermerken(&self, caller: UserId, callee: UserId) {
        self.status_umschreiben(caller, callee, AnrufStatus::Rejected)
            .await;
    }

    /// Haengt die Gespraechsdauer an den juengsten akzeptierten Eintrag an
    ///
    /// Das Paar wird ungeordnet gesucht, da jede Seite das Gespraech beenden
    /// kann und der Eintrag aus Sicht des Einleiters angelegt wurde.
    pub async fn dauer_vermerken(&self, a: UserId, b: UserId, dauer_sek: u32) {
        let ergebnis = self
            .anruf_repo
            .neuesten_aktualisieren(
                AnrufFilter {
                    caller_id: a.inner(),
                    callee_id: b.inner(),
                    beide_richtungen: true,
                    status: AnrufStatus::Accepted,
                },
                AnrufUpdate {
                    duration_sek: Some(dauer_sek),
                    ..Default::default()
                },
            )
            .await;
        match ergebnis {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(a = %a, b = %b,
                "Anrufverlauf: kein akzeptierter Eintrag fuer Dauer gefunden"),
            Err(e) => tracing::error!(a = %a, b = %b, fehler = %e,
                "Anrufverlauf: Dauer konnte nicht vermerkt werden"),
        }
    }

    async fn status_umschreiben(&self, caller: UserId, callee: UserId, neu: AnrufStatus) {
        let ergebnis = self
            .anruf_repo
            .neuesten_aktualisieren(
                AnrufFilter {
                    caller_id: caller.inner(),
                    callee_id: callee.inner(),
                    beide_richtungen: false,
                    status: AnrufStatus::Missed,
                },
                AnrufUpdate {
                    status: Some(neu),
                    ..Default::default()
                },
            )
            .await;
        match ergebnis {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(caller = %caller, callee = %callee, status = neu.als_str(),
                "Anrufverlauf: kein offener Eintrag zum Umschreiben gefunden"),
            Err(e) => tracing::error!(caller = %caller, callee = %callee, fehler = %e,
                "Anrufverlauf: Statuswechsel konnte nicht vermerkt werden"),
        }
    }
}
