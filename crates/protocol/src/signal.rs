//! Signalisierungs-Protokoll
//!
//! Definiert alle Nachrichten die ueber den Echtzeitkanal zwischen Client
//! und Relay ausgetauscht werden. Es fliessen ausschliesslich
//! Verhandlungs-Metadaten (SDP-Offer/-Answer, ICE-Kandidaten) – nie
//! Mediendaten.
//!
//! ## Design
//! - Fire-and-forget: keine Request-IDs, keine Quittungen
//! - JSON-Serialisierung via serde, tagged Enums fuer typsichere Ereignisse
//! - SDP- und ICE-Nutzlasten sind fuer den Relay undurchsichtige JSON-Werte

use pairlink_core::types::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Anmeldung als erste Nachricht jeder Verbindung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Zugangs-Token des externen Credential-Dienstes
    pub token: String,
}

/// Bestaetigung der erfolgreichen Anmeldung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginOk {
    pub user_id: UserId,
    pub username: String,
}

/// Authentifizierungsfehler – die Verbindung wird danach geschlossen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthFehler {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Anruf-Signalisierung (Client -> Relay)
// ---------------------------------------------------------------------------

/// Anruf einleiten: Offer an den gewuenschten Gespraechspartner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateCallRequest {
    pub callee_id: UserId,
    pub offer: Value,
}

/// Eingehenden Anruf annehmen: Answer zurueck an den Anrufer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptCallRequest {
    pub caller_id: UserId,
    pub answer: Value,
}

/// Eingehenden Anruf ablehnen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectCallRequest {
    pub caller_id: UserId,
}

/// Laufenden Anruf beenden, optional mit Gespraechsdauer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndCallRequest {
    pub other_user_id: UserId,
    pub duration_sek: Option<u32>,
}

/// ICE-Kandidat an den Gegenpart weiterreichen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidateRequest {
    pub target_user_id: UserId,
    pub candidate: Value,
}

/// Alle Ereignisse die ein Client an den Relay senden kann
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEreignis {
    /// Handshake, muss die erste Nachricht sein
    Login(LoginRequest),
    /// Zufaelligen Gespraechspartner suchen
    FindPeer,
    InitiateCall(InitiateCallRequest),
    AcceptCall(AcceptCallRequest),
    RejectCall(RejectCallRequest),
    EndCall(EndCallRequest),
    IceCandidate(IceCandidateRequest),
}

// ---------------------------------------------------------------------------
// Anruf-Signalisierung (Relay -> Client)
// ---------------------------------------------------------------------------

/// Vermittelter Gespraechspartner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerInfo {
    pub id: UserId,
    pub username: String,
    pub gender: String,
}

/// Alle Ereignisse die der Relay an einen Client senden kann
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEreignis {
    LoginOk(LoginOk),
    AuthError(AuthFehler),
    /// Ein Partner wurde gefunden
    PeerFound(PartnerInfo),
    /// Kein vermittelbarer Partner online – normales Ergebnis, kein Fehler
    NoPeer { message: String },
    /// Eingehender Anruf beim Angerufenen
    IncomingCall {
        caller_id: UserId,
        caller_name: String,
        offer: Value,
    },
    /// Der gewuenschte Partner ist nicht erreichbar
    CallUnavailable { message: String },
    /// Der Angerufene hat angenommen
    CallAccepted { callee_id: UserId, answer: Value },
    /// Der Angerufene hat abgelehnt
    CallRejected { callee_id: UserId },
    /// Der Gegenpart hat den Anruf beendet
    CallEnded { user_id: UserId },
    /// ICE-Kandidat vom Gegenpart
    IceCandidate {
        from_user_id: UserId,
        candidate: Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ereignis_tagged_json() {
        let ereignis = ClientEreignis::InitiateCall(InitiateCallRequest {
            callee_id: UserId::new(),
            offer: serde_json::json!({"sdp": "v=0"}),
        });
        let json = serde_json::to_string(&ereignis).unwrap();
        assert!(json.contains("\"type\":\"initiate_call\""));

        let geparst: ClientEreignis = serde_json::from_str(&json).unwrap();
        assert!(matches!(geparst, ClientEreignis::InitiateCall(_)));
    }

    #[test]
    fn server_ereignis_roundtrip() {
        let ereignis = ServerEreignis::IncomingCall {
            caller_id: UserId::new(),
            caller_name: "anna".into(),
            offer: serde_json::json!({"sdp": "v=0"}),
        };
        let json = serde_json::to_string(&ereignis).unwrap();
        assert!(json.contains("\"type\":\"incoming_call\""));
        let _: ServerEreignis = serde_json::from_str(&json).unwrap();
    }

    #[test]
    fn fehlendes_pflichtfeld_schlaegt_fehl() {
        // initiate_call ohne offer darf nicht parsen – solche Nachrichten
        // werden vom Relay verworfen
        let json = r#"{"type":"initiate_call","callee_id":"00000000-0000-0000-0000-000000000000"}"#;
        assert!(serde_json::from_str::<ClientEreignis>(json).is_err());
    }

    #[test]
    fn unbekannter_typ_schlaegt_fehl() {
        let json = r#"{"type":"kaffee_kochen"}"#;
        assert!(serde_json::from_str::<ClientEreignis>(json).is_err());
    }

    #[test]
    fn end_call_ohne_dauer() {
        let json = format!(
            r#"{{"type":"end_call","other_user_id":"{}"}}"#,
            uuid::Uuid::nil()
        );
        let ereignis: ClientEreignis = serde_json::from_str(&json).unwrap();
        match ereignis {
            ClientEreignis::EndCall(req) => assert!(req.duration_sek.is_none()),
            _ => panic!("EndCall erwartet"),
        }
    }
}
