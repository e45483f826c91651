//! Anruf-Relay – Weiterleitung der Verhandlungs-Nachrichten
//!
//! Der Relay reicht Offer, Answer und ICE-Kandidaten zwischen genau zwei
//! Benutzern weiter und fuehrt dabei pro Anrufversuch einen expliziten
//! Zustand: `Eingeleitet` ab dem Offer, `Angenommen` ab der Answer. Annahme
//! und Ablehnung sind nur aus `Eingeleitet` gueltig, das Beenden nur aus
//! `Angenommen`; alles andere ist ein verspaetetes oder gefaelschtes
//! Ereignis und wird kommentarlos verworfen.
//!
//! Zustellfehler sind fire-and-forget: ist der Empfaenger einer Antwort
//! inzwischen weg, erfaehrt der Sender nichts davon.

use std::sync::Arc;

use dashmap::DashMap;
use pairlink_core::types::UserId;
use pairlink_db::repository::{AnrufRepository, BenutzerRepository};
use pairlink_protocol::signal::{
    AcceptCallRequest, EndCallRequest, IceCandidateRequest, InitiateCallRequest, PartnerInfo,
    RejectCallRequest, ServerEreignis,
};

use crate::server_state::RelayZustand;

// ---------------------------------------------------------------------------
// Anrufversuche
// ---------------------------------------------------------------------------

/// Phase eines laufenden Anrufversuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersuchsPhase {
    /// Offer zugestellt, Antwort steht aus
    Eingeleitet,
    /// Answer zugestellt, Gespraech laeuft
    Angenommen,
}

/// Tabelle aller laufenden Anrufversuche, Schluessel (Anrufer, Angerufener)
///
/// Entscheidet allein anhand des vermerkten Zustands ob ein Ereignis
/// gueltig ist; der Anrufverlauf wird hier nie befragt.
#[derive(Clone, Default)]
pub struct AnrufVersuche {
    versuche: Arc<DashMap<(UserId, UserId), VersuchsPhase>>,
}

impl AnrufVersuche {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Vermerkt einen neuen Versuch; ein bestehender Versuch desselben
    /// Paares wird ueberschrieben (erneutes Offer)
    pub fn einleiten(&self, caller: UserId, callee: UserId) {
        self.versuche
            .insert((caller, callee), VersuchsPhase::Eingeleitet);
    }

    /// Annahme ist nur aus `Eingeleitet` gueltig
    pub fn annehmen(&self, caller: UserId, callee: UserId) -> bool {
        let mut gueltig = false;
        if let Some(mut eintrag) = self.versuche.get_mut(&(caller, callee)) {
            if *eintrag == VersuchsPhase::Eingeleitet {
                *eintrag = VersuchsPhase::Angenommen;
                gueltig = true;
            }
        }
        gueltig
    }

    /// Ablehnung ist nur aus `Eingeleitet` gueltig und beendet den Versuch
    pub fn ablehnen(&self, caller: UserId, callee: UserId) -> bool {
        self.versuche
            .remove_if(&(caller, callee), |_, phase| {
                *phase == VersuchsPhase::Eingeleitet
            })
            .is_some()
    }

    /// Beenden ist nur aus `Angenommen` gueltig; die Richtung des Paares
    /// ist dabei egal, da jede Seite auflegen kann
    pub fn beenden(&self, a: UserId, b: UserId) -> bool {
        for schluessel in [(a, b), (b, a)] {
            if self
                .versuche
                .remove_if(&schluessel, |_, phase| *phase == VersuchsPhase::Angenommen)
                .is_some()
            {
                return true;
            }
        }
        false
    }

    /// Prueft ob fuer das Paar (in beliebiger Richtung) ein eingeleiteter,
    /// noch nicht angenommener Versuch offen ist
    pub fn offen_eingeleitet(&self, a: UserId, b: UserId) -> bool {
        [(a, b), (b, a)].iter().any(|schluessel| {
            self.versuche
                .get(schluessel)
                .map_or(false, |phase| *phase == VersuchsPhase::Eingeleitet)
        })
    }

    /// Entfernt alle Versuche an denen der Benutzer beteiligt ist
    /// (Verbindungsabbruch) und gibt die betroffenen Paare zurueck
    pub fn trennen(&self, user: UserId) -> Vec<(UserId, UserId)> {
        let betroffen: Vec<(UserId, UserId)> = self
            .versuche
            .iter()
            .map(|e| *e.key())
            .filter(|(c, k)| *c == user || *k == user)
            .collect();
        for schluessel in &betroffen {
            self.versuche.remove(schluessel);
        }
        betroffen
    }

    pub fn anzahl(&self) -> usize {
        self.versuche.len()
    }

    #[cfg(test)]
    fn phase(&self, caller: UserId, callee: UserId) -> Option<VersuchsPhase> {
        self.versuche.get(&(caller, callee)).map(|e| *e)
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Leitet einen Anruf ein: Offer an den Angerufenen, Eintrag im Verlauf
pub async fn anruf_einleiten<U: BenutzerRepository, A: AnrufRepository>(
    state: &Arc<RelayZustand<U, A>>,
    caller: UserId,
    caller_name: &str,
    req: InitiateCallRequest,
) {
    let callee = req.callee_id;

    let Some(ziel) = state.register.nachschlagen(&callee) else {
        tracing::debug!(caller = %caller, callee = %callee, "Angerufener nicht erreichbar");
        state.register.an_user_senden(
            &caller,
            ServerEreignis::CallUnavailable {
                message: "User is not available".into(),
            },
        );
        return;
    };

    ziel.senden(ServerEreignis::IncomingCall {
        caller_id: caller,
        caller_name: caller_name.to_owned(),
        offer: req.offer,
    });

    state.versuche.einleiten(caller, callee);
    state.anruf_verlauf.initiiert_vermerken(caller, callee).await;
    tracing::info!(caller = %caller, callee = %callee, "Anruf eingeleitet");
}

/// Nimmt einen eingeleiteten Anruf an: Answer zurueck an den Anrufer
pub async fn anruf_annehmen<U: BenutzerRepository, A: AnrufRepository>(
    state: &Arc<RelayZustand<U, A>>,
    callee: UserId,
    req: AcceptCallRequest,
) {
    let caller = req.caller_id;

    let Some(ziel) = state.register.nachschlagen(&caller) else {
        tracing::debug!(caller = %caller, callee = %callee,
            "Annahme fuer nicht mehr erreichbaren Anrufer verworfen");
        return;
    };
    if !state.versuche.annehmen(caller, callee) {
        tracing::debug!(caller = %caller, callee = %callee,
            "Annahme ohne eingeleiteten Versuch verworfen");
        return;
    }

    ziel.senden(ServerEreignis::CallAccepted {
        callee_id: callee,
        answer: req.answer,
    });
    state.anruf_verlauf.angenommen_vermerken(caller, callee).await;
    tracing::info!(caller = %caller, callee = %callee, "Anruf angenommen");
}

/// Lehnt einen eingeleiteten Anruf ab
pub async fn anruf_ablehnen<U: BenutzerRepository, A: AnrufRepository>(
    state: &Arc<RelayZustand<U, A>>,
    callee: UserId,
    req: RejectCallRequest,
) {
    let caller = req.caller_id;

    let Some(ziel) = state.register.nachschlagen(&caller) else {
        tracing::debug!(caller = %caller, callee = %callee,
            "Ablehnung fuer nicht mehr erreichbaren Anrufer verworfen");
        return;
    };
    if !state.versuche.ablehnen(caller, callee) {
        tracing::debug!(caller = %caller, callee = %callee,
            "Ablehnung ohne eingeleiteten Versuch verworfen");
        return;
    }

    ziel.senden(ServerEreignis::CallRejected { callee_id: callee });
    state.anruf_verlauf.abgelehnt_vermerken(caller, callee).await;
    tracing::info!(caller = %caller, callee = %callee, "Anruf abgelehnt");
}

/// Beendet ein laufendes Gespraech; die Dauer haengt am Verlaufseintrag
///
/// Best-effort: die Gegenseite kann schon getrennt sein, ihr Versuchseintrag
/// ist dann bereits abgeraeumt. Das Beenden und der Dauer-Vermerk laufen
/// trotzdem; nur ein nie angenommener Versuch laesst sich nicht beenden.
pub async fn anruf_beenden<U: BenutzerRepository, A: AnrufRepository>(
    state: &Arc<RelayZustand<U, A>>,
    sender: UserId,
    req: EndCallRequest,
) {
    let gegenpart = req.other_user_id;

    let beendet = state.versuche.beenden(sender, gegenpart);
    if !beendet && state.versuche.offen_eingeleitet(sender, gegenpart) {
        tracing::debug!(sender = %sender, gegenpart = %gegenpart,
            "Beenden ohne angenommenes Gespraech verworfen");
        return;
    }

    state
        .register
        .an_user_senden(&gegenpart, ServerEreignis::CallEnded { user_id: sender });
    if let Some(dauer) = req.duration_sek {
        state.anruf_verlauf.dauer_vermerken(sender, gegenpart, dauer).await;
    }
    tracing::info!(sender = %sender, gegenpart = %gegenpart, "Anruf beendet");
}

/// Reicht einen ICE-Kandidaten an den Gegenpart weiter
///
/// Reine Weiterleitung ohne Zustandspruefung: Kandidaten duerfen schon
/// waehrend der Verhandlung in beide Richtungen fliessen.
pub fn ice_weiterleiten<U: BenutzerRepository, A: AnrufRepository>(
    state: &Arc<RelayZustand<U, A>>,
    sender: UserId,
    req: IceCandidateRequest,
) {
    let zugestellt = state.register.an_user_senden(
        &req.target_user_id,
        ServerEreignis::IceCandidate {
            from_user_id: sender,
            candidate: req.candidate,
        },
    );
    if !zugestellt {
        tracing::debug!(sender = %sender, ziel = %req.target_user_id,
            "ICE-Kandidat an nicht erreichbaren Benutzer verworfen");
    }
}

/// Sucht einen zufaelligen Gespraechspartner fuer den Anfrager
pub async fn partner_suchen<U: BenutzerRepository, A: AnrufRepository>(
    state: &Arc<RelayZustand<U, A>>,
    anfrager: UserId,
) {
    let antwort = match state.vermittlung.partner_finden(anfrager).await {
        Ok(Some(partner)) => ServerEreignis::PeerFound(PartnerInfo {
            id: UserId::from(partner.id),
            username: partner.username,
            gender: partner.geschlecht.als_str().into(),
        }),
        Ok(None) => ServerEreignis::NoPeer {
            message: "No online users available".into(),
        },
        Err(e) => {
            tracing::error!(anfrager = %anfrager, fehler = %e, "Partnersuche fehlgeschlagen");
            ServerEreignis::NoPeer {
                message: "No online users available".into(),
            }
        }
    };
    state.register.an_user_senden(&anfrager, antwort);
}

/// Raeumt beim Verbindungsabbruch alle Anrufversuche des Benutzers ab
///
/// Ohne Benachrichtigung der Gegenseite: der eigentliche Medienkanal
/// laeuft peer-to-peer und bricht dort von selbst ab.
pub fn versuche_abraeumen<U: BenutzerRepository, A: AnrufRepository>(
    state: &Arc<RelayZustand<U, A>>,
    user: UserId,
) {
    let betroffen = state.versuche.trennen(user);
    if !betroffen.is_empty() {
        tracing::debug!(user = %user, anzahl = betroffen.len(),
            "Offene Anrufversuche nach Trennung entfernt");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
