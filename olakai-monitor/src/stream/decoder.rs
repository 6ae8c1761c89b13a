use olakai_core::PartialMetadata;

/// What one streamed unit contributed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedChunk {
    pub text: Option<String>,
    pub metadata: PartialMetadata,
    /// The provider marked this as the last record.
    pub terminal: bool,
    /// The provider signalled failure in-band.
    pub error: Option<String>,
}

impl DecodedChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn terminal() -> Self {
        Self {
            terminal: true,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            terminal: true,
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: PartialMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Provider-specific reading of stream chunks. Implementations must accept
/// any shape; unknown chunks decode to `DecodedChunk::default()`.
pub trait ChunkDecoder<C>: Send + Sync {
    fn decode(&self, chunk: &C) -> DecodedChunk;

    /// Reads the aggregate a final-result future resolves to. Its text, when
    /// present, replaces whatever was accumulated from deltas.
    fn decode_final(&self, result: &C) -> DecodedChunk {
        self.decode(result)
    }
}

impl<C, F> ChunkDecoder<C> for F
where
    F: Fn(&C) -> DecodedChunk + Send + Sync,
{
    fn decode(&self, chunk: &C) -> DecodedChunk {
        self(chunk)
    }
}
