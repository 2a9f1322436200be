//! Scripted collaborators shared by the loader unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{DecodeError, FetchError};
use crate::key::SizeHint;
use crate::loader::{Artifact, Codec, Fetcher};

/// Fetcher that holds every call until the gate opens, then returns a fixed response.
pub(crate) struct GatedFetcher {
    calls: AtomicUsize,
    gate: watch::Receiver<bool>,
    response: Result<Vec<u8>, FetchError>,
}

impl GatedFetcher {
    pub(crate) fn new(response: Result<Vec<u8>, FetchError>) -> (Arc<Self>, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let fetcher = Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: rx,
            response,
        });
        (fetcher, tx)
    }

    /// Gate already open.
    pub(crate) fn open(response: Result<Vec<u8>, FetchError>) -> Arc<Self> {
        let (fetcher, gate) = Self::new(response);
        gate.send_replace(true);
        fetcher
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self, _address: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.gate.clone();
        let _ = gate.wait_for(|open| *open).await;
        self.response.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextArtifact(pub String);

impl Artifact for TextArtifact {
    fn cost(&self) -> usize {
        self.0.len()
    }
}

/// Decodes UTF-8 text, tagging it with the size hint, and counts calls.
#[derive(Clone, Default)]
pub(crate) struct CountingCodec {
    calls: Arc<AtomicUsize>,
}

impl CountingCodec {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Codec for CountingCodec {
    type Artifact = TextArtifact;

    fn decode(&self, bytes: &[u8], size_hint: Option<SizeHint>) -> Result<TextArtifact, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = std::str::from_utf8(bytes).map_err(|e| DecodeError::new(e.to_string()))?;
        Ok(match size_hint {
            Some(hint) => TextArtifact(format!("{}@{}", text, hint.variant())),
            None => TextArtifact(text.to_string()),
        })
    }
}
