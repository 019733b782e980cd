use bm25::Embedding;
use memchunk::chunk;
use tracing::debug;

use crate::parsing::Page;

#[derive(Debug)]
pub struct Chunk {
    pub content: String,
    /// 0-based page the chunk was cut from.
    pub page: usize,
    pub embedding: Option<Embedding>,
}

impl Chunk {
    pub fn new(content: String, page: usize) -> Self {
        Self {
            content,
            page,
            embedding: None,
        }
    }
}

/// Last `n` bytes of `text`, moved forward to the nearest char boundary.
fn tail(text: &str, n: usize) -> &str {
    if n >= text.len() {
        return text;
    }
    let mut start = text.len() - n;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Byte offsets where `text` is cut. Cuts follow the memchunk piece ends, but
/// never fall inside a char and never leave more than `step` bytes between
/// two cuts (unless a single char is wider than `step`).
fn cut_points(text: &str, step: usize) -> Vec<usize> {
    let mut cuts = Vec::new();
    let (mut start, mut end) = (0, 0);
    for piece in chunk(text.as_bytes()).size(step) {
        end += piece.len();
        while end > start + step {
            let mut cut = start + step;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            if cut == start {
                cut = start + step + 1;
                while !text.is_char_boundary(cut) {
                    cut += 1;
                }
            }
            cuts.push(cut);
            start = cut;
        }
        if end > start && text.is_char_boundary(end) {
            cuts.push(end);
            start = end;
        }
    }
    if start < text.len() {
        cuts.push(text.len());
    }
    cuts
}

/// Splits `text` at delimiter boundaries into pieces of at most
/// `size - overlap` bytes, then prefixes each piece with the last `overlap`
/// bytes of the piece before it.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let step = size.saturating_sub(overlap).max(1);
    let mut pieces: Vec<&str> = Vec::new();
    let mut start = 0;
    for cut in cut_points(text, step) {
        pieces.push(&text[start..cut]);
        start = cut;
    }
    let mut chunks = Vec::with_capacity(pieces.len());
    let mut previous: Option<&str> = None;
    for piece in pieces.into_iter().filter(|piece| !piece.trim().is_empty()) {
        let content = match previous {
            Some(prev) if overlap > 0 => format!("{}{}", tail(prev, overlap), piece),
            _ => piece.to_string(),
        };
        chunks.push(content);
        previous = Some(piece);
    }
    chunks
}

pub fn chunk_pages(pages: &[Page], size: usize, overlap: usize) -> Vec<Chunk> {
    let chunks: Vec<Chunk> = pages
        .iter()
        .flat_map(|page| {
            chunk_text(&page.text, size, overlap)
                .into_iter()
                .map(move |content| Chunk::new(content, page.number))
        })
        .collect();
    debug!("Created {} chunks from {} pages", chunks.len(), pages.len());
    chunks
}
