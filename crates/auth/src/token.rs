//! Zugangs-Token-Verwaltung
//!
//! Kurzlebige, undurchsichtige Tokens fuer den Verbindungsaufbau.
//! Tokens werden im Speicher gehalten (in-memory HashMap mit TTL).
//! Ein Hintergrund-Task bereinigt abgelaufene Tokens automatisch.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::RngCore;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Standard-Token-Lebensdauer: 15 Minuten
const TOKEN_TTL_SEKUNDEN: i64 = 15 * 60;

/// Intervall fuer den automatischen Cleanup-Task: 5 Minuten
const CLEANUP_INTERVALL: Duration = Duration::from_secs(5 * 60);

/// Ein ausgestelltes Zugangs-Token
#[derive(Debug, Clone)]
pub struct ZugangsToken {
    /// Der Token-String (URL-sicheres Base64)
    pub token: String,
    /// ID des Kontos dem dieses Token gehoert
    pub user_id: Uuid,
    /// Zeitpunkt der Ausstellung
    pub erstellt_am: DateTime<Utc>,
    /// Zeitpunkt des Ablaufs
    pub laeuft_ab_am: DateTime<Utc>,
}

impl ZugangsToken {
    /// Gibt `true` zurueck wenn das Token noch gueltig ist
    pub fn ist_gueltig(&self) -> bool {
        Utc::now() < self.laeuft_ab_am
    }
}

/// In-Memory Token-Store mit TTL-Unterstuetzung
#[derive(Debug, Default)]
pub struct TokenStore {
    /// token -> ZugangsToken
    tokens: RwLock<HashMap<String, ZugangsToken>>,
}

impl TokenStore {
    /// Erstellt einen neuen leeren Token-Store
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Erstellt einen neuen Token-Store und startet den Cleanup-Task
    pub fn neu_mit_cleanup(store: Arc<Self>) -> Arc<Self> {
        let store_klon = Arc::clone(&store);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(CLEANUP_INTERVALL).await;
                let entfernt = store_klon.cleanup_abgelaufene().await;
                if entfernt > 0 {
                    tracing::debug!(anzahl = entfernt, "Abgelaufene Tokens bereinigt");
                }
            }
        });
        store
    }

    /// Stellt ein neues Token fuer das angegebene Konto aus
    pub async fn ausstellen(&self, user_id: Uuid) -> AuthResult<ZugangsToken> {
        let token = token_generieren();
        let jetzt = Utc::now();
        let eintrag = ZugangsToken {
            token: token.clone(),
            user_id,
            erstellt_am: jetzt,
            laeuft_ab_am: jetzt + chrono::Duration::seconds(TOKEN_TTL_SEKUNDEN),
        };

        self.tokens.write().await.insert(token, eintrag.clone());
        tracing::debug!(user_id = %user_id, "Neues Zugangs-Token ausgestellt");
        Ok(eintrag)
    }

    /// Validiert ein Token und gibt den Eintrag zurueck
    ///
    /// Gibt `AuthError::TokenUngueltig` zurueck wenn das Token unbekannt ist,
    /// `AuthError::TokenAbgelaufen` wenn es abgelaufen ist.
    pub async fn validieren(&self, token: &str) -> AuthResult<ZugangsToken> {
        let tokens = self.tokens.read().await;
        match tokens.get(token) {
            None => Err(AuthError::TokenUngueltig),
            Some(eintrag) if !eintrag.ist_gueltig() => Err(AuthError::TokenAbgelaufen),
            Some(eintrag) => Ok(eintrag.clone()),
        }
    }

    /// Widerruft ein Token (z.B. beim Logout)
    pub async fn widerrufen(&self, token: &str) -> bool {
        self.tokens.write().await.remove(token).is_some()
    }

    /// Entfernt alle abgelaufenen Tokens, gibt die Anzahl zurueck
    pub async fn cleanup_abgelaufene(&self) -> usize {
        let mut tokens = self.tokens.write().await;
        let vorher = tokens.len();
        tokens.retain(|_, t| t.ist_gueltig());
        vorher - tokens.len()
    }

    /// Gibt die Anzahl der gespeicherten Tokens zurueck
    pub async fn anzahl(&self) -> usize {
        self.tokens.read().await.len()
    }
}

/// Generiert einen zufaelligen, URL-sicheren Token-String (32 Bytes Entropie)
fn token_generieren() -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
