//! Speichermodelle fuer Pairlink
//!
//! Diese Typen repraesentieren Datensaetze aus dem Konten- und dem
//! Anrufverlauf-Speicher. Sie sind von den Domain-Typen getrennt und
//! dienen als reine Datenuebertragungsobjekte.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Benutzer
// ---------------------------------------------------------------------------

/// Praesenz-Status eines Kontos
///
/// Spiegelt die Registry-Mitgliedschaft: `Online` genau dann, wenn der
/// Benutzer aktuell eine Echtzeitverbindung zu diesem Prozess haelt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PraesenzStatus {
    Online,
    Offline,
}

impl PraesenzStatus {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl std::str::FromStr for PraesenzStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            other => Err(format!("Unbekannter Praesenz-Status: {other}")),
        }
    }
}

/// Geschlecht eines Kontos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Geschlecht {
    Male,
    Female,
    Other,
}

impl Geschlecht {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

/// Benutzer-Datensatz aus dem Kontenspeicher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenutzerRecord {
    pub id: Uuid,
    pub username: String,
    pub geschlecht: Geschlecht,
    /// Nur verifizierte Konten duerfen sich verbinden und vermittelt werden
    pub is_verified: bool,
    pub status: PraesenzStatus,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Anrufverlauf
// ---------------------------------------------------------------------------

/// Status eines Anrufverlauf-Eintrags
///
/// Jeder Eintrag beginnt als `Missed` und wird hoechstens einmal nach
/// `Accepted` oder `Rejected` aufgeloest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnrufStatus {
    Missed,
    Accepted,
    Rejected,
}

impl AnrufStatus {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Missed => "missed",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// Anrufverlauf-Datensatz
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnrufRecord {
    pub id: Uuid,
    pub caller_id: Uuid,
    pub callee_id: Uuid,
    pub status: AnrufStatus,
    /// Gespraechsdauer in Sekunden, erst nach Anrufende gesetzt
    pub duration_sek: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

/// Daten zum Erstellen eines neuen Anrufverlauf-Eintrags
#[derive(Debug, Clone)]
pub struct NeuerAnruf {
    pub caller_id: Uuid,
    pub callee_id: Uuid,
    pub status: AnrufStatus,
}

/// Filter fuer die Suche nach dem juengsten passenden Eintrag
#[derive(Debug, Clone)]
pub struct AnrufFilter {
    pub caller_id: Uuid,
    pub callee_id: Uuid,
    /// `true`: das Paar zaehlt ungeordnet (Anrufer und Angerufener vertauschbar)
    pub beide_richtungen: bool,
    pub status: AnrufStatus,
}

impl AnrufFilter {
    /// Prueft ob ein Datensatz auf den Filter passt
    pub fn passt(&self, record: &AnrufRecord) -> bool {
        if record.status != self.status {
            return false;
        }
        let genau = record.caller_id == self.caller_id && record.callee_id == self.callee_id;
        if self.beide_richtungen {
            genau
                || (record.caller_id == self.callee_id && record.callee_id == self.caller_id)
        } else {
            genau
        }
    }
}

/// Daten zum Aktualisieren eines Anrufverlauf-Eintrags
#[derive(Debug, Clone, Default)]
pub struct AnrufUpdate {
    pub status: Option<AnrufStatus>,
    pub duration_sek: Option<u32>,
}
