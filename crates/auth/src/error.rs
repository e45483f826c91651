//! Fehlertypen fuer die Token-Pruefung

use thiserror::Error;

/// Alle moeglichen Fehler bei der Verbindungs-Authentifizierung
///
/// Jeder dieser Fehler ist fatal fuer den Verbindungsversuch: die
/// Verbindung wird abgewiesen bevor ein Protokoll-Ereignis angenommen wird.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Zugangs-Token fehlt")]
    TokenFehlt,

    #[error("Zugangs-Token ungueltig")]
    TokenUngueltig,

    #[error("Zugangs-Token abgelaufen")]
    TokenAbgelaufen,

    #[error("Konto nicht gefunden: {0}")]
    BenutzerNichtGefunden(String),

    #[error("Konto nicht verifiziert")]
    NichtVerifiziert,

    #[error("Speicherfehler: {0}")]
    Datenbank(#[from] pairlink_db::DbError),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Alias fuer die Token-Pruefung
pub type AuthResult<T> = Result<T, AuthError>;
