use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::{
    Payload, Qdrant,
    qdrant::{
        Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder,
        FieldType, Filter, NamedVectors, PointStruct, QueryPointsBuilder, SparseVectorParamsBuilder,
        SparseVectorsConfigBuilder, UpsertPointsBuilder, Value, Vector, value::Kind,
    },
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    chain::Retriever,
    chunking::Chunk,
    embedding::{embed_text, to_sparse},
};

const SPARSE_VECTOR_NAME: &str = "text";
const UPSERT_BATCH_SIZE: usize = 256;

/// Document chunks stored in a Qdrant collection, one point per chunk with
/// payload `{document_id, page, text}`.
#[derive(Clone)]
pub struct VectorDB {
    client: Arc<Qdrant>,
    pub collection_name: String,
}

fn document_filter(document_id: i64) -> Filter {
    Filter::must([Condition::matches("document_id", document_id)])
}

fn payload_text(payload: &HashMap<String, Value>) -> Option<String> {
    match payload.get("text").and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

impl VectorDB {
    pub fn new(url: &str, api_key: Option<String>, collection_name: String) -> anyhow::Result<Self> {
        let client = Qdrant::from_url(url).api_key(api_key).build()?;
        Ok(Self {
            client: Arc::new(client),
            collection_name,
        })
    }

    pub async fn ensure_collection(&self) -> anyhow::Result<()> {
        if self.client.collection_exists(&self.collection_name).await? {
            info!("Collection {} already exists", self.collection_name);
            return Ok(());
        }
        info!("Starting to create collection {}", self.collection_name);
        let mut sparse_vector_config = SparseVectorsConfigBuilder::default();
        sparse_vector_config
            .add_named_vector_params(SPARSE_VECTOR_NAME, SparseVectorParamsBuilder::default());
        let response = self
            .client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection_name)
                    .sparse_vectors_config(sparse_vector_config),
            )
            .await?;
        if !response.result {
            return Err(anyhow::anyhow!(
                "There was an error creating the Qdrant collection {}",
                self.collection_name
            ));
        }
        self.client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(
                    &self.collection_name,
                    "document_id",
                    FieldType::Integer,
                )
                .wait(true),
            )
            .await?;
        info!("Collection {} successfully created", self.collection_name);
        Ok(())
    }

    /// Uploads embedded chunks of a document. Chunks without an embedding are skipped.
    pub async fn upload_chunks(&self, document_id: i64, chunks: Vec<Chunk>) -> anyhow::Result<usize> {
        let mut points: Vec<PointStruct> = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.into_iter().enumerate() {
            let embedding = match chunk.embedding {
                Some(e) => e,
                None => {
                    warn!(document_id, "Chunk {} does not have an associated embedding, skipping...", i);
                    continue;
                }
            };
            let (indices, values) = to_sparse(&embedding);
            let mut payload = Payload::new();
            payload.insert("document_id", document_id);
            payload.insert("page", chunk.page as i64);
            payload.insert("text", chunk.content);
            points.push(PointStruct::new(
                Uuid::new_v4().to_string(),
                NamedVectors::default()
                    .add_vector(SPARSE_VECTOR_NAME, Vector::new_sparse(indices, values)),
                payload,
            ));
        }
        let total = points.len();
        debug!(document_id, "Starting to upload {} points to {}", total, self.collection_name);
        while !points.is_empty() {
            let rest = points.split_off(points.len().min(UPSERT_BATCH_SIZE));
            let batch = std::mem::replace(&mut points, rest);
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection_name, batch).wait(true))
                .await?;
        }
        info!(document_id, "Uploaded {} points", total);
        Ok(total)
    }

    /// Returns the text of the `limit` chunks of `document_id` closest to the query.
    pub async fn search(&self, document_id: i64, query: &str, limit: u64) -> anyhow::Result<Vec<String>> {
        let (indices, values) = to_sparse(&embed_text(query));
        let indices_values: Vec<(u32, f32)> = indices.into_iter().zip(values).collect();
        if indices_values.is_empty() {
            debug!(document_id, "Query has no indexable terms");
            return Ok(vec![]);
        }
        let query = QueryPointsBuilder::new(&self.collection_name)
            .query(indices_values)
            .filter(document_filter(document_id))
            .limit(limit)
            .with_payload(true)
            .using(SPARSE_VECTOR_NAME);
        let results = self.client.query(query).await?;
        let mut contents: Vec<String> = vec![];
        for point in results.result {
            match payload_text(&point.payload) {
                Some(text) => contents.push(text),
                None => warn!(document_id, "Point does not have an associated text content"),
            }
        }
        Ok(contents)
    }

    pub async fn delete_document(&self, document_id: i64) -> anyhow::Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(document_filter(document_id))
                    .wait(true),
            )
            .await?;
        info!(document_id, "Deleted document points from {}", self.collection_name);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn drop_collection(&self) -> anyhow::Result<()> {
        self.client
            .delete_collection(qdrant_client::qdrant::DeleteCollectionBuilder::new(
                &self.collection_name,
            ))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Retriever for VectorDB {
    async fn retrieve(&self, document_id: i64, query: &str, limit: u64) -> anyhow::Result<Vec<String>> {
        self.search(document_id, query, limit).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::embedding::embed_chunks;

    #[test]
    fn test_payload_text() {
        let mut map = HashMap::new();
        map.insert("text".to_string(), Value::from("some chunk"));
        map.insert("page".to_string(), Value::from(2_i64));
        assert_eq!(payload_text(&map).as_deref(), Some("some chunk"));

        let mut no_text = HashMap::new();
        no_text.insert("page".to_string(), Value::from(1_i64));
        assert!(payload_text(&no_text).is_none());
    }

    #[tokio::test]
    async fn test_search_is_scoped_to_document() {
        let qdrant_url = match std::env::var("QDRANT_URL") {
            Ok(s) => s,
            Err(_) => {
                println!("Skipping test because Qdrant is not available");
                return;
            }
        };
        let collection = format!("test-pdfchat-{}", Uuid::new_v4());
        let vectordb =
            VectorDB::new(&qdrant_url, std::env::var("QDRANT_API_KEY").ok(), collection)
                .unwrap();
        vectordb.ensure_collection().await.unwrap();
        // second call is a no-op
        vectordb.ensure_collection().await.unwrap();

        let first = embed_chunks(vec![
            Chunk::new("The capybara is the largest living rodent.".to_string(), 0),
            Chunk::new("Capybaras live in South America.".to_string(), 1),
        ]);
        let second = embed_chunks(vec![Chunk::new("Capybara recipes are not included.".to_string(), 0)]);
        assert_eq!(vectordb.upload_chunks(1, first).await.unwrap(), 2);
        assert_eq!(vectordb.upload_chunks(2, second).await.unwrap(), 1);

        let hits = vectordb.search(1, "capybara rodent south america", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| !h.contains("recipes")));

        vectordb.delete_document(1).await.unwrap();
        assert!(vectordb.search(1, "capybara rodent south america", 10).await.unwrap().is_empty());
        assert_eq!(vectordb.search(2, "capybara", 10).await.unwrap().len(), 1);

        vectordb.drop_collection().await.unwrap();
    }
}
