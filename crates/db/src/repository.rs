//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt den Relay von den konkreten
//! Speicher-Implementierungen. Der Kontenspeicher und der
//! Anrufverlauf-Speicher sind externe Kollaborateure; der Relay kennt
//! nur diese schmalen Vertraege.

use uuid::Uuid;

use crate::error::DbResult;
use crate::models::{AnrufFilter, AnrufRecord, AnrufUpdate, BenutzerRecord, NeuerAnruf, PraesenzStatus};

/// Repository fuer Konten-Datenzugriffe
#[allow(async_fn_in_trait)]
pub trait BenutzerRepository: Send + Sync {
    /// Ein Konto anhand seiner ID laden
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<BenutzerRecord>>;

    /// Praesenz-Status eines Kontos setzen (online/offline)
    async fn praesenz_setzen(&self, id: Uuid, status: PraesenzStatus) -> DbResult<()>;

    /// Alle verifizierten, aktuell online markierten Konten ausser dem angegebenen
    ///
    /// Grundlage fuer die Partnervermittlung; die zufaellige Auswahl trifft
    /// der Aufrufer.
    async fn verifizierte_online(&self, ausser: Uuid) -> DbResult<Vec<BenutzerRecord>>;
}

/// Repository fuer Anrufverlauf-Datenzugriffe
#[allow(async_fn_in_trait)]
pub trait AnrufRepository: Send + Sync {
    /// Einen neuen Verlaufseintrag anlegen, gibt die Eintrags-ID zurueck
    async fn erstellen(&self, neu: NeuerAnruf) -> DbResult<Uuid>;

    /// Den juengsten auf den Filter passenden Eintrag aktualisieren
    ///
    /// Vertrag: passende Eintraege absteigend nach `timestamp` sortieren,
    /// den ersten nehmen, den Patch anwenden. Gibt `None` zurueck wenn kein
    /// Eintrag passt; das ist kein Fehler.
    async fn neuesten_aktualisieren(
        &self,
        filter: AnrufFilter,
        update: AnrufUpdate,
    ) -> DbResult<Option<AnrufRecord>>;
}
