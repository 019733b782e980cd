use bm25::{Embedder, EmbedderBuilder, Embedding, LanguageMode};
use tracing::debug;

use crate::chunking::Chunk;

const DEFAULT_AVGDL: f32 = 5.75;

fn embedder() -> Embedder {
    EmbedderBuilder::with_avgdl(DEFAULT_AVGDL)
        .language_mode(LanguageMode::Detect)
        .build()
}

pub fn embed_chunks(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
    debug!("Starting to embed {} chunks", chunks.len());
    let embedder = embedder();
    let total = chunks.len();
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.embedding = Some(embedder.embed(&chunk.content));
        if (i + 1) % 100 == 0 {
            debug!("Progress: {}/{}", i + 1, total);
        }
    }
    chunks
}

pub fn embed_text(text: &str) -> Embedding {
    embedder().embed(text)
}

/// Sparse vector form of an embedding: duplicate token indices are summed
/// and indices are sorted ascending.
pub fn to_sparse(embedding: &Embedding) -> (Vec<u32>, Vec<f32>) {
    let mut pairs: Vec<(u32, f32)> = embedding.0.iter().map(|t| (t.index, t.value)).collect();
    pairs.sort_by_key(|(idx, _)| *idx);
    let mut merged: Vec<(u32, f32)> = Vec::with_capacity(pairs.len());
    for (idx, value) in pairs {
        match merged.last_mut() {
            Some((last, total)) if *last == idx => *total += value,
            _ => merged.push((idx, value)),
        }
    }
    merged.into_iter().unzip()
}
