//! pairlink-protocol – Nachrichten- und Wire-Format des Signalisierungskanals

pub mod signal;
pub mod wire;

pub use signal::{ClientEreignis, ServerEreignis};
pub use wire::FrameCodec;
