use async_openai::{
    Client,
    config::OpenAIConfig,
    types::responses::{
        CreateResponseArgs, EasyInputContent, EasyInputMessage, InputItem, MessageType,
        Role as InputRole,
    },
};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::models::{HistoryMessage, Role};

/// A single request to a chat model.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub history: Vec<HistoryMessage>,
    pub input: String,
}

fn input_message(role: InputRole, content: &str) -> InputItem {
    InputItem::EasyMessage(EasyInputMessage {
        r#type: MessageType::Message,
        role,
        content: EasyInputContent::Text(content.to_string()),
    })
}

impl Prompt {
    /// Prior turns as role-tagged messages, followed by the new user input.
    pub fn input_items(&self) -> Vec<InputItem> {
        let mut items: Vec<InputItem> = self
            .history
            .iter()
            .map(|message| {
                let role = match message.role {
                    Role::Human => InputRole::User,
                    Role::Ai => InputRole::Assistant,
                };
                input_message(role, &message.content)
            })
            .collect();
        items.push(input_message(InputRole::User, &self.input));
        items
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> anyhow::Result<String>;
}

#[derive(Clone, Debug)]
pub struct OpenAIModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIModel {
    pub fn new(api_key: &str, model: String, temperature: f32) -> Self {
        Self {
            client: Client::with_config(OpenAIConfig::new().with_api_key(api_key)),
            model,
            temperature,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAIModel {
    async fn complete(&self, prompt: &Prompt) -> anyhow::Result<String> {
        let request = CreateResponseArgs::default()
            .model(self.model.clone())
            .instructions(prompt.system.clone())
            .input(prompt.input_items())
            .temperature(self.temperature)
            .build()
            .map_err(|e| anyhow::anyhow!("Could not generate an OpenAI request because of {}", e))?;
        info!(event = "OpenAIResponseStart", model = %self.model, "Starting OpenAI response generation");
        let now = tokio::time::Instant::now();
        let response = self
            .client
            .responses()
            .create(request)
            .await
            .map_err(|e| anyhow::anyhow!("Could not generate an OpenAI response because of {}", e))?;
        let text = response
            .output_text()
            .ok_or_else(|| anyhow::anyhow!("No response was generated by OpenAI"))?;
        info!(
            event = "OpenAIResponseEnd",
            model = %self.model,
            "Finished OpenAI response generation in {} ms",
            now.elapsed().as_millis()
        );
        debug!(event = "OpenAIResponseReport", chars = text.len(), "OpenAI response received");
        Ok(text)
    }
}
