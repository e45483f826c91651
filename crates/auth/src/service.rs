//! Auth-Service fuer den Verbindungsaufbau
//!
//! Zentraler Einstiegspunkt fuer die Pruefung eines Verbindungs-Handshakes:
//! Token validieren, Konto laden, Verifikationsstatus pruefen. Jeder
//! Fehlschlag weist die Verbindung ab, bevor sie den aktiven Zustand erreicht.

use std::sync::Arc;

use pairlink_db::{repository::BenutzerRepository, BenutzerRecord};

use crate::{
    error::{AuthError, AuthResult},
    token::TokenStore,
};

/// Auth-Service – prueft Zugangs-Tokens gegen den Kontenspeicher
pub struct AuthService<U: BenutzerRepository> {
    token_store: Arc<TokenStore>,
    benutzer_repo: Arc<U>,
}

impl<U: BenutzerRepository> AuthService<U> {
    /// Erstellt einen neuen AuthService
    pub fn neu(token_store: Arc<TokenStore>, benutzer_repo: Arc<U>) -> Self {
        Self {
            token_store,
            benutzer_repo,
        }
    }

    /// Authentifiziert einen Verbindungsversuch anhand des Handshake-Tokens
    ///
    /// Ablauf: Token -> Konto-ID -> Konto existiert -> Konto verifiziert.
    /// Gibt das Konto zurueck; jeder Fehler ist fatal fuer die Verbindung.
    pub async fn verbindung_authentifizieren(
        &self,
        token: Option<&str>,
    ) -> AuthResult<BenutzerRecord> {
        let token = token.ok_or(AuthError::TokenFehlt)?;
        let eintrag = self.token_store.validieren(token).await?;

        let benutzer = self
            .benutzer_repo
            .get_by_id(eintrag.user_id)
            .await?
            .ok_or_else(|| AuthError::BenutzerNichtGefunden(eintrag.user_id.to_string()))?;

        if !benutzer.is_verified {
            tracing::warn!(
                user_id = %benutzer.id,
                "Verbindungsversuch mit unverifiziertem Konto abgelehnt"
            );
            return Err(AuthError::NichtVerifiziert);
        }

        Ok(benutzer)
    }
}
