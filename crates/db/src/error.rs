//! Fehlertypen fuer das Speicher-Crate

use thiserror::Error;

/// Speicher-Fehlertypen
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Datensatz nicht gefunden: {0}")]
    NichtGefunden(String),

    #[error("Ungueltige Daten: {0}")]
    UngueltigeDaten(String),

    #[error("Speicher nicht erreichbar: {0}")]
    NichtErreichbar(String),

    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Interner Speicherfehler: {0}")]
    Intern(String),
}

impl DbError {
    pub fn nicht_gefunden(msg: impl Into<String>) -> Self {
        Self::NichtGefunden(msg.into())
    }

    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Alias fuer Speicherzugriffe
pub type DbResult<T> = Result<T, DbError>;
