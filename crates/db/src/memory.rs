//! In-Memory-Implementierungen der Repositories
//!
//! Halten alle Datensaetze in einer `RwLock`-geschuetzten Struktur.
//! Ausreichend fuer den Single-Prozess-Betrieb des Relays und fuer Tests;
//! ein persistenter Speicher kann die Traits spaeter hinter derselben
//! Schnittstelle implementieren.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::{
    AnrufFilter, AnrufRecord, AnrufUpdate, BenutzerRecord, NeuerAnruf, PraesenzStatus,
};
use crate::repository::{AnrufRepository, BenutzerRepository};

// ---------------------------------------------------------------------------
// Kontenspeicher
// ---------------------------------------------------------------------------

/// In-Memory-Kontenspeicher
#[derive(Debug, Default)]
pub struct MemoryBenutzerRepository {
    benutzer: RwLock<HashMap<Uuid, BenutzerRecord>>,
}

impl MemoryBenutzerRepository {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt ein Konto direkt ab (Kontoerstellung ist Sache des externen
    /// Kontodienstes, hier nur fuer Bootstrap und Tests)
    pub async fn einfuegen(&self, record: BenutzerRecord) {
        self.benutzer.write().await.insert(record.id, record);
    }
}

impl BenutzerRepository for MemoryBenutzerRepository {
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<BenutzerRecord>> {
        Ok(self.benutzer.read().await.get(&id).cloned())
    }

    async fn praesenz_setzen(&self, id: Uuid, status: PraesenzStatus) -> DbResult<()> {
        if let Some(benutzer) = self.benutzer.write().await.get_mut(&id) {
            benutzer.status = status;
        }
        Ok(())
    }

    async fn verifizierte_online(&self, ausser: Uuid) -> DbResult<Vec<BenutzerRecord>> {
        Ok(self
            .benutzer
            .read()
            .await
            .values()
            .filter(|b| b.id != ausser && b.is_verified && b.status == PraesenzStatus::Online)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Anrufverlauf-Speicher
// ---------------------------------------------------------------------------

/// In-Memory-Anrufverlauf
#[derive(Debug, Default)]
pub struct MemoryAnrufRepository {
    anrufe: RwLock<Vec<AnrufRecord>>,
}

impl MemoryAnrufRepository {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Gibt alle Eintraege zurueck (fuer Tests und Reporting)
    pub async fn alle(&self) -> Vec<AnrufRecord> {
        self.anrufe.read().await.clone()
    }
}

impl AnrufRepository for MemoryAnrufRepository {
    async fn erstellen(&self, neu: NeuerAnruf) -> DbResult<Uuid> {
        let record = AnrufRecord {
            id: Uuid::new_v4(),
            caller_id: neu.caller_id,
            callee_id: neu.callee_id,
            status: neu.status,
            duration_sek: None,
            timestamp: Utc::now(),
        };
        let id = record.id;
        self.anrufe.write().await.push(record);
        Ok(id)
    }

    async fn neuesten_aktualisieren(
        &self,
        filter: AnrufFilter,
        update: AnrufUpdate,
    ) -> DbResult<Option<AnrufRecord>> {
        let mut anrufe = self.anrufe.write().await;

        // Expliziter Sortier-Vertrag: passende Eintraege absteigend nach
        // Zeitstempel, der juengste gewinnt.
        let mut passende: Vec<usize> = anrufe
            .iter()
            .enumerate()
            .filter(|(_, r)| filter.passt(r))
            .map(|(i, _)| i)
            .collect();
        passende.sort_by(|a, b| anrufe[*b].timestamp.cmp(&anrufe[*a].timestamp));

        let Some(&index) = passende.first() else {
            return Ok(None);
        };

        let record = &mut anrufe[index];
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(dauer) = update.duration_sek {
            record.duration_sek = Some(dauer);
        }
        Ok(Some(record.clone()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
