//! Codec Module
//!
//! Turns raw bytes into a decoded artifact ready for presentation.

use std::sync::Arc;

use crate::error::DecodeError;
use crate::key::SizeHint;

// == Artifact Trait ==
/// A decoded result that can be held in the memory tier.
pub trait Artifact: Clone + Send + Sync + 'static {
    /// Byte-weight charged against the memory cost limit. Read at every insertion.
    fn cost(&self) -> usize;
}

// == Codec Trait ==
/// Decodes raw bytes, optionally targeting a rendition size.
///
/// Decoding is CPU work; the loader runs it on the blocking pool.
pub trait Codec: Send + Sync + 'static {
    type Artifact: Artifact;

    fn decode(&self, bytes: &[u8], size_hint: Option<SizeHint>)
        -> Result<Self::Artifact, DecodeError>;
}

// == Raw Artifact ==
/// Undecoded payload shared by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtifact {
    bytes: Arc<Vec<u8>>,
}

impl RawArtifact {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Artifact for RawArtifact {
    fn cost(&self) -> usize {
        self.bytes.len()
    }
}

// == Raw Codec ==
/// Passthrough codec: the artifact is the payload itself. Size hints are
/// ignored; an empty payload is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    type Artifact = RawArtifact;

    fn decode(&self, bytes: &[u8], _size_hint: Option<SizeHint>) -> Result<RawArtifact, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::new("empty payload"));
        }
        Ok(RawArtifact::new(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_codec_passthrough() {
        let artifact = RawCodec.decode(b"abc", Some(SizeHint::new(1, 1))).unwrap();
        assert_eq!(artifact.as_bytes(), b"abc");
        assert_eq!(artifact.cost(), 3);
    }

    #[test]
    fn test_raw_codec_rejects_empty() {
        let err = RawCodec.decode(&[], None).unwrap_err();
        assert_eq!(err, DecodeError::new("empty payload"));
    }
}
