//! pairlink-auth – Zugangs-Token-Pruefung
//!
//! Dieses Crate implementiert den Credential-Kollaborateur des Relays:
//! - TokenStore: kurzlebige Zugangs-Tokens (in-memory mit TTL)
//! - AuthService: Token -> Konto -> Verifikationspruefung beim Verbindungsaufbau
//!
//! Die Ausstellung von Anmeldedaten (Registrierung, Passwort, E-Mail-
//! Verifikation) ist bewusst NICHT Teil dieses Crates; der Relay prueft
//! Tokens nur.

pub mod error;
pub mod service;
pub mod token;

// Bequeme Re-Exporte
pub use error::{AuthError, AuthResult};
pub use service::AuthService;
pub use token::{TokenStore, ZugangsToken};
