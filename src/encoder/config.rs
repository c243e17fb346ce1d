use crate::Result;
use crate::options::{GrammarOptions, StreamOptions};

/// Encoder-Konfiguration: Stream-Layout und Header-Optionen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncoderConfig {
    /// Alignment, Block-Größe und Value-Table Grenzen.
    pub stream: StreamOptions,
    /// Whitespace-only CH auch dort schreiben, wo kein Text deklariert ist.
    pub preserve_whitespace: bool,
    /// "$EXI" Cookie am Anfang schreiben.
    pub include_cookie: bool,
    /// Options im Header übertragen (Spec 5.4).
    pub include_options: bool,
}

impl EncoderConfig {
    /// Konfiguration mit Cookie.
    pub fn with_cookie() -> Self {
        Self { include_cookie: true, ..Self::default() }
    }

    pub fn with_stream(mut self, stream: StreamOptions) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_options(mut self) -> Self {
        self.include_options = true;
        self
    }

    pub fn with_whitespace(mut self) -> Self {
        self.preserve_whitespace = true;
        self
    }

    /// Prüft die Konfiguration gegen die Grammar-Optionen des Caches.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidBlockSize`] oder
    /// [`crate::Error::InvalidOptionCombination`].
    pub fn validate(&self, grammar: &GrammarOptions) -> Result<()> {
        self.stream.validate(grammar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::options::Alignment;

    #[test]
    fn default_ohne_header_optionen() {
        let c = EncoderConfig::default();
        assert!(!c.include_cookie);
        assert!(!c.include_options);
        assert!(EncoderConfig::with_cookie().include_cookie);
    }

    #[test]
    fn block_size_null_ungueltig() {
        let c = EncoderConfig::default().with_stream(StreamOptions::default().with_block_size(0));
        assert_eq!(c.validate(&GrammarOptions::default()), Err(Error::InvalidBlockSize));
    }

    // Spec 5.4: selfContained nicht mit Channels
    #[test]
    fn self_contained_mit_compression_ungueltig() {
        let c = EncoderConfig::default()
            .with_stream(StreamOptions::default().with_alignment(Alignment::Compression));
        let g = GrammarOptions::default().with_self_contained();
        assert!(matches!(c.validate(&g), Err(Error::InvalidOptionCombination(_))));
    }
}
