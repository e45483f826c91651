//! pairlink-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Pairlink-Crates gemeinsam genutzt werden. Fehlertypen definiert
//! jedes Crate selbst via thiserror.

pub mod types;

// Re-Export fuer bequemen Zugriff
pub use types::UserId;
