use std::path::Path;

use tracing::info;

use crate::{
    chunking::chunk_pages, embedding::embed_chunks, parsing::parse_pdf, vectordb::VectorDB,
};

/// Turns a stored PDF into searchable chunks in the vector store.
#[derive(Clone)]
pub struct Pipeline {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    vectordb: VectorDB,
}

impl Pipeline {
    pub fn new(vectordb: VectorDB, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            vectordb,
        }
    }

    /// Parses, chunks, embeds and uploads a document. Returns the number of chunks stored.
    pub async fn run(&self, document_id: i64, document_path: &Path) -> anyhow::Result<usize> {
        let now = tokio::time::Instant::now();
        let pages = parse_pdf(document_path).await?;
        let (size, overlap) = (self.chunk_size, self.chunk_overlap);
        let chunks = tokio::task::spawn_blocking(move || {
            let chunks = chunk_pages(&pages, size, overlap);
            embed_chunks(chunks)
        })
        .await?;
        let uploaded = self.vectordb.upload_chunks(document_id, chunks).await?;
        info!(
            event = "DocumentIngested",
            document_id,
            chunks = uploaded,
            "Ingested document in {} ms",
            now.elapsed().as_millis()
        );
        Ok(uploaded)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parsing::test_pdf;

    #[tokio::test]
    async fn test_pipeline_ingests_pdf() {
        let qdrant_url = match std::env::var("QDRANT_URL") {
            Ok(s) => s,
            Err(_) => {
                println!("Skipping test because Qdrant is not available");
                return;
            }
        };
        let collection = format!("test-pipeline-{}", uuid::Uuid::new_v4());
        let vectordb =
            VectorDB::new(&qdrant_url, std::env::var("QDRANT_API_KEY").ok(), collection)
                .unwrap();
        vectordb.ensure_collection().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        tokio::fs::write(&path, test_pdf(&["Lighthouses guide ships", "Keepers trim the lamps"]))
            .await
            .unwrap();

        let pipeline = Pipeline::new(vectordb.clone(), 500, 100);
        assert_eq!(pipeline.run(42, &path).await.unwrap(), 2);
        let hits = vectordb.search(42, "lighthouses ships", 4).await.unwrap();
        assert!(!hits.is_empty());

        vectordb.drop_collection().await.unwrap();
    }

    #[tokio::test]
    async fn test_pdf_without_text_uploads_nothing() {
        let qdrant_url = match std::env::var("QDRANT_URL") {
            Ok(s) => s,
            Err(_) => {
                println!("Skipping test because Qdrant is not available");
                return;
            }
        };
        let collection = format!("test-pipeline-{}", uuid::Uuid::new_v4());
        let vectordb =
            VectorDB::new(&qdrant_url, std::env::var("QDRANT_API_KEY").ok(), collection)
                .unwrap();
        vectordb.ensure_collection().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.pdf");
        tokio::fs::write(&path, test_pdf(&["   "])).await.unwrap();

        let pipeline = Pipeline::new(vectordb.clone(), 500, 100);
        assert_eq!(pipeline.run(7, &path).await.unwrap(), 0);
        assert!(vectordb.search(7, "anything", 4).await.unwrap().is_empty());

        vectordb.drop_collection().await.unwrap();
    }
}
