//! Partner-Vermittlung – zufaellige Auswahl eines Gespraechspartners
//!
//! Kandidaten sind alle verifizierten Konten mit Praesenz "online",
//! den Anfrager selbst ausgenommen. Aus dieser Menge wird gleichverteilt
//! ein Partner gezogen; ob dessen Verbindung noch steht, prueft erst
//! der Anrufaufbau selbst.

use std::sync::Arc;

use pairlink_core::types::UserId;
use pairlink_db::models::BenutzerRecord;
use pairlink_db::repository::BenutzerRepository;
use pairlink_db::DbResult;
use rand::seq::IndexedRandom;

/// Vermittelt zufaellige Gespraechspartner aus dem Kontenspeicher
pub struct PartnerVermittlung<U: BenutzerRepository> {
    benutzer_repo: Arc<U>,
}

impl<U: BenutzerRepository> PartnerVermittlung<U> {
    pub fn neu(benutzer_repo: Arc<U>) -> Self {
        Self { benutzer_repo }
    }

    /// Zieht einen zufaelligen Partner fuer den Anfrager
    ///
    /// `None` wenn gerade kein verifizierter Benutzer online ist.
    pub async fn partner_finden(&self, anfrager: UserId) -> DbResult<Option<BenutzerRecord>> {
        let kandidaten = self
            .benutzer_repo
            .verifizierte_online(anfrager.inner())
            .await?;

        let partner = kandidaten.choose(&mut rand::rng()).cloned();
        match &partner {
            Some(p) => tracing::debug!(
                anfrager = %anfrager,
                partner = %p.id,
                kandidaten = kandidaten.len(),
                "Partner vermittelt"
            ),
            None => tracing::debug!(anfrager = %anfrager, "Keine Kandidaten online"),
        }
        Ok(partner)
    }
}
