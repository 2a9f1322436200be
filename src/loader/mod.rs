//! Loader Module
//!
//! Collaborator traits, request coalescing, and the loader that ties them to
//! the two-tier cache.

mod codec;
mod coalesce;
mod fetcher;
mod resolver;
mod slot;

#[cfg(test)]
mod test_support;

// Re-export public types
pub use codec::{Artifact, Codec, RawArtifact, RawCodec};
pub use coalesce::LoaderStats;
pub use fetcher::{Fetcher, HttpFetcher};
pub use resolver::Loader;
pub use slot::ResolveSlot;
