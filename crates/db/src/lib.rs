//! pairlink-db – Speicher-Abstraktion
//!
//! Dieses Crate stellt das Repository-Pattern bereit, das den Konten- und
//! den Anrufverlauf-Speicher hinter einheitlichen Schnittstellen abstrahiert.
//! Mitgeliefert werden In-Memory-Implementierungen; eine echte Datenbank
//! ist fuer den Relay-Betrieb bewusst keine Voraussetzung.

pub mod error;
pub mod memory;
pub mod models;
pub mod repository;

// Bequeme Re-Exporte
pub use error::{DbError, DbResult};
pub use memory::{MemoryAnrufRepository, MemoryBenutzerRepository};
pub use models::{
    AnrufFilter, AnrufRecord, AnrufStatus, AnrufUpdate, BenutzerRecord, Geschlecht, NeuerAnruf,
    PraesenzStatus,
};
pub use repository::{AnrufRepository, BenutzerRepository};
