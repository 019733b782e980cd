//! Retrieval-augmented answering over a single document.
//!
//! A follow-up question is first rewritten into a standalone one using the
//! chat history, the standalone question drives retrieval, and the answer is
//! generated from the retrieved chunks plus the history.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    llm::{LanguageModel, Prompt},
    models::HistoryMessage,
};

pub const CONTEXTUALIZE_SYSTEM_PROMPT: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question \
which can be understood without the chat history. Do NOT answer the question, \
just reformulate it if needed and otherwise return it as is.";

pub const QA_SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.\n\n{context}";

/// Looks up the chunks of one document most relevant to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, document_id: i64, query: &str, limit: u64) -> anyhow::Result<Vec<String>>;
}

pub fn format_docs(docs: &[String]) -> String {
    docs.join("\n\n")
}

pub struct RagChain<'a> {
    llm: &'a dyn LanguageModel,
    retriever: &'a dyn Retriever,
    document_id: i64,
    k: u64,
}

impl<'a> RagChain<'a> {
    pub fn new(
        llm: &'a dyn LanguageModel,
        retriever: &'a dyn Retriever,
        document_id: i64,
        k: u64,
    ) -> Self {
        Self {
            llm,
            retriever,
            document_id,
            k,
        }
    }

    async fn standalone_question(&self, input: &str, history: &[HistoryMessage]) -> anyhow::Result<String> {
        if history.is_empty() {
            return Ok(input.to_string());
        }
        let prompt = Prompt {
            system: CONTEXTUALIZE_SYSTEM_PROMPT.to_string(),
            history: history.to_vec(),
            input: input.to_string(),
        };
        let question = self.llm.complete(&prompt).await?;
        let question = question.trim();
        debug!(event = "QuestionRephrased", document_id = self.document_id, "Standalone question: {}", question);
        if question.is_empty() {
            return Ok(input.to_string());
        }
        Ok(question.to_string())
    }

    pub async fn invoke(&self, input: &str, history: &[HistoryMessage]) -> anyhow::Result<String> {
        let question = self.standalone_question(input, history).await?;
        info!(event = "RagSearchStart", document_id = self.document_id, "Starting vector search operation");
        let now = tokio::time::Instant::now();
        let docs = self.retriever.retrieve(self.document_id, &question, self.k).await?;
        info!(
            event = "RagSearchEnd",
            document_id = self.document_id,
            "Retrieved {}/{} chunks in {} ms",
            docs.len(),
            self.k,
            now.elapsed().as_millis()
        );
        let prompt = Prompt {
            system: QA_SYSTEM_PROMPT.replace("{context}", &format_docs(&docs)),
            history: history.to_vec(),
            input: input.to_string(),
        };
        self.llm.complete(&prompt).await
    }
}
