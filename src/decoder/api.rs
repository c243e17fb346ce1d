use std::sync::Arc;

use crate::error::Result;
use crate::event::ExiEvent;
use crate::grammar::GrammarCache;
use crate::options::{GrammarOptions, StreamOptions};

use super::Decoder;

/// Decoder-Konfiguration.
///
/// `stream` gilt, wenn der Header keine Options enthält (Spec 5.4: "the EXI
/// options are communicated out-of-band").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderConfig {
    pub stream: StreamOptions,
}

impl DecoderConfig {
    pub fn with_stream(stream: StreamOptions) -> Self {
        Self { stream }
    }

    /// Prüft die Konfiguration gegen die Grammar-Optionen des Caches.
    pub fn validate(&self, grammar: &GrammarOptions) -> Result<()> {
        self.stream.validate(grammar)
    }
}

/// Decodiert einen EXI Stream zu einer Event-Sequenz.
///
/// # Errors
///
/// Header-Fehler, [`crate::Error::OptionsMismatch`] oder der erste
/// Decodier-Fehler im Body.
pub fn decode(cache: Arc<GrammarCache>, config: DecoderConfig, data: &[u8]) -> Result<Vec<ExiEvent>> {
    Decoder::new(cache, config, data)?.process_header()?.collect()
}
