//! pairlink-signaling – Praesenz & Signalisierungs-Relay
//!
//! Dieser Crate implementiert den Kern von Pairlink: er verwaltet die
//! Echtzeitverbindungen authentifizierter Benutzer, vermittelt zufaellige
//! Gespraechspartner und leitet die Verhandlungsnachrichten
//! (Offer/Answer/ICE) zwischen genau zwei Parteien weiter.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RelayServer)
//!     |
//!     v
//! ClientVerbindung (pro Verbindung ein Task)
//!     |  State Machine: Verbunden -> Authentifizierung -> Aktiv -> Beendet
//!     |
//!     v
//! relay::* Handler (initiate/accept/reject/end/ice, Partnersuche)
//!     |
//!     +-- VerbindungsRegister  – wer ist gerade erreichbar (einzige Wahrheit)
//!     +-- AnrufVersuche        – expliziter Zustand je Anrufversuch
//!     +-- AnrufVerlauf         – Verlaufseintraege (missed/accepted/rejected)
//!     +-- PartnerVermittlung   – zufaelliger, verifizierter, erreichbarer Partner
//! ```
//!
//! Mediendaten fliessen nie durch dieses Crate – nur Verhandlungs-Metadaten.

pub mod connection;
pub mod error;
pub mod matchmaker;
pub mod registry;
pub mod relay;
pub mod server_state;
pub mod tcp;
pub mod verlauf;

// Bequeme Re-Exporte
pub use connection::{ClientVerbindung, VerbindungsZustand};
pub use error::{SignalingError, SignalingResult};
pub use matchmaker::PartnerVermittlung;
pub use registry::VerbindungsRegister;
pub use relay::AnrufVersuche;
pub use server_state::{RelayConfig, RelayZustand};
pub use tcp::RelayServer;
pub use verlauf::AnrufVerlauf;
