//! Fehlertypen fuer den Signalisierungs-Relay

use pairlink_auth::AuthError;
use thiserror::Error;

/// Fehlertyp fuer den Signalisierungs-Relay
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Authentifizierungsfehler – fatal fuer den Verbindungsversuch
    #[error("Authentifizierungsfehler: {0}")]
    Auth(#[from] AuthError),

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Protokollfehler (ungueltiges Frame, falscher Zustand)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),
}

impl SignalingError {
    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }
}

/// Result-Typ fuer den Signalisierungs-Relay
pub type SignalingResult<T> = Result<T, SignalingError>;
