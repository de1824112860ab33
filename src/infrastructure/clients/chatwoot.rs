//! Chatwoot helpdesk client

use async_trait::async_trait;
use serde_json::{json, Value};

use super::base::{ApiClient, RetryPolicy};
use crate::application::errors::ApiError;
use crate::domain::entities::UserData;
use crate::domain::traits::Helpdesk;

pub struct ChatwootClient {
    api: ApiClient,
    url_prefix: Option<String>,
    inbox_id: i64,
    chat_id_attribute: String,
}

impl ChatwootClient {
    pub fn new(
        url_prefix: Option<String>,
        api_token: &str,
        inbox_id: i64,
        chat_id_attribute: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            api: ApiClient::new(retry).with_header("api_access_token", api_token),
            url_prefix: url_prefix
                .map(|p| p.trim_end_matches('/').to_string())
                .filter(|p| !p.is_empty()),
            inbox_id,
            chat_id_attribute: chat_id_attribute.into(),
        }
    }

    /// A client that never forwards anything
    pub fn disabled() -> Self {
        Self::new(None, "", 0, "bot_chat_id", RetryPolicy::default())
    }

    fn url(&self, path: &str) -> Result<String, ApiError> {
        match &self.url_prefix {
            Some(prefix) => Ok(format!("{}/{}", prefix, path)),
            None => Err(ApiError::Logic("Chatwoot is not configured".into())),
        }
    }
}

#[async_trait]
impl Helpdesk for ChatwootClient {
    fn is_enabled(&self) -> bool {
        self.url_prefix.is_some()
    }

    async fn start_conversation(&self, chat_id: i64, user_data: &UserData) -> Result<i64, ApiError> {
        let mut attributes = serde_json::Map::new();
        attributes.insert(self.chat_id_attribute.clone(), json!(chat_id));

        let contact = self
            .api
            .post_json(
                &self.url("contacts")?,
                &json!({
                    "inbox_id": self.inbox_id,
                    "name": user_data.full_name(),
                    "email": user_data.email,
                    "phone_number": user_data.phone_number,
                    "custom_attributes": Value::Object(attributes),
                }),
                &[200],
            )
            .await?;

        let payload = &contact.body["payload"];
        let source_id = payload["contact_inbox"]["source_id"]
            .as_str()
            .ok_or_else(|| ApiError::Json(format!("no source_id in {}", contact.body)))?;
        let contact_id = payload["contact"]["id"]
            .as_i64()
            .ok_or_else(|| ApiError::Json(format!("no contact id in {}", contact.body)))?;

        let conversation = self
            .api
            .post_json(
                &self.url("conversations")?,
                &json!({ "source_id": source_id, "inbox_id": self.inbox_id, "contact_id": contact_id }),
                &[200],
            )
            .await?;
        let conversation_id = conversation.i64_field("id")?;
        tracing::info!("Started Chatwoot conversation {} for chat {}", conversation_id, chat_id);
        Ok(conversation_id)
    }

    async fn send_message(&self, conversation_id: i64, text: &str) -> Result<(), ApiError> {
        self.api
            .post_json(
                &self.url(&format!("conversations/{}/messages", conversation_id))?,
                &json!({ "content": text, "message_type": "incoming" }),
                &[200],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_client_refuses_calls() {
        let client = ChatwootClient::disabled();
        assert!(!client.is_enabled());
        assert!(matches!(client.send_message(1, "hi").await, Err(ApiError::Logic(_))));
    }
}
