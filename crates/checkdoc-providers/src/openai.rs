//! OpenAI Assistants API provider.
//!
//! Conversation contexts are threads; a turn appends a user message and
//! creates a run of the configured assistant on the thread.
//! Docs: <https://platform.openai.com/docs/api-reference/assistants>

use async_trait::async_trait;
use checkdoc_core::{
    assistant::{ContextId, Role, RunId, RunStatus, ThreadMessage},
    error::CheckdocError,
    traits::Provider,
};
use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Provider backed by a single OpenAI assistant.
pub struct OpenAiAssistantProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    assistant_id: String,
}

impl OpenAiAssistantProvider {
    /// Create from config values.
    pub fn from_config(
        base_url: String,
        api_key: String,
        assistant_id: String,
        request_timeout: Duration,
    ) -> Result<Self, CheckdocError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| CheckdocError::Provider(format!("openai: failed to build client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key,
            assistant_id,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{path}", self.base_url.trim_end_matches('/'));
        debug!("openai: {method} {url}");
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
    }

    /// Send a request and parse a JSON body, turning non-2xx into provider errors.
    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        what: &str,
    ) -> Result<T, CheckdocError> {
        let resp = req
            .send()
            .await
            .map_err(|e| CheckdocError::Provider(format!("openai {what} failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(CheckdocError::Provider(format!(
                "openai {what} returned {status}: {text}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| CheckdocError::Provider(format!("openai {what}: failed to parse response: {e}")))
    }
}

#[derive(Deserialize)]
pub(crate) struct ObjectRef {
    pub id: String,
}

#[derive(Serialize)]
pub(crate) struct CreateMessageRequest<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Serialize)]
pub(crate) struct CreateRunRequest<'a> {
    pub assistant_id: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct RunObject {
    pub id: String,
    pub status: String,
    pub last_error: Option<RunError>,
}

#[derive(Deserialize)]
pub(crate) struct RunError {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct MessageList {
    #[serde(default)]
    pub data: Vec<MessageObject>,
}

#[derive(Deserialize)]
pub(crate) struct MessageObject {
    pub role: String,
    #[serde(default)]
    pub content: Vec<ContentPart>,
    pub run_id: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<TextContent>,
}

#[derive(Deserialize)]
pub(crate) struct TextContent {
    pub value: String,
}

/// Collapse the API's run lifecycle onto pending / completed / failed.
pub(crate) fn map_run_status(status: &str) -> RunStatus {
    match status {
        "completed" => RunStatus::Completed,
        "failed" | "cancelled" | "expired" | "incomplete" => RunStatus::Failed,
        // queued, in_progress, requires_action, cancelling, and anything new.
        _ => RunStatus::Pending,
    }
}

/// Convert an API message, dropping roles other than user and assistant.
pub(crate) fn to_thread_message(msg: MessageObject) -> Option<ThreadMessage> {
    let role = match msg.role.as_str() {
        "assistant" => Role::Assistant,
        "user" => Role::User,
        _ => return None,
    };
    let text = msg
        .content
        .into_iter()
        .filter(|part| part.kind == "text")
        .filter_map(|part| part.text.map(|t| t.value))
        .find(|value| !value.is_empty())
        .unwrap_or_default();
    Some(ThreadMessage {
        role,
        text,
        run_id: msg.run_id.map(RunId::new),
    })
}

#[async_trait]
impl Provider for OpenAiAssistantProvider {
    fn name(&self) -> &str {
        "openai-assistants"
    }

    async fn create_context(&self) -> Result<ContextId, CheckdocError> {
        let req = self
            .request(Method::POST, "threads")
            .json(&serde_json::json!({}));
        let thread: ObjectRef = self.send_json(req, "create thread").await?;
        Ok(ContextId::new(thread.id))
    }

    async fn create_message(
        &self,
        context: &ContextId,
        role: Role,
        text: &str,
    ) -> Result<(), CheckdocError> {
        let req = self
            .request(Method::POST, &format!("threads/{context}/messages"))
            .json(&CreateMessageRequest {
                role: role.as_str(),
                content: text,
            });
        let _: ObjectRef = self.send_json(req, "create message").await?;
        Ok(())
    }

    async fn start_run(&self, context: &ContextId) -> Result<RunId, CheckdocError> {
        let req = self
            .request(Method::POST, &format!("threads/{context}/runs"))
            .json(&CreateRunRequest {
                assistant_id: &self.assistant_id,
            });
        let run: RunObject = self.send_json(req, "create run").await?;
        Ok(RunId::new(run.id))
    }

    async fn get_run_status(
        &self,
        context: &ContextId,
        run: &RunId,
    ) -> Result<RunStatus, CheckdocError> {
        let req = self.request(Method::GET, &format!("threads/{context}/runs/{run}"));
        let obj: RunObject = self.send_json(req, "retrieve run").await?;
        let status = map_run_status(&obj.status);
        if status == RunStatus::Failed {
            let (code, message) = obj
                .last_error
                .map(|e| (e.code, e.message))
                .unwrap_or_default();
            warn!(
                "openai run {} ended as {}: {} {}",
                obj.id,
                obj.status,
                code.unwrap_or_default(),
                message.unwrap_or_default()
            );
        }
        Ok(status)
    }

    async fn list_messages(&self, context: &ContextId) -> Result<Vec<ThreadMessage>, CheckdocError> {
        let req = self.request(
            Method::GET,
            &format!("threads/{context}/messages?order=desc"),
        );
        let list: MessageList = self.send_json(req, "list messages").await?;
        Ok(list.data.into_iter().filter_map(to_thread_message).collect())
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("openai: no API key configured");
            return false;
        }
        let req = self.request(Method::GET, &format!("assistants/{}", self.assistant_id));
        match req.send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!("openai assistant {} not available: {}", self.assistant_id, resp.status());
                false
            }
            Err(e) => {
                warn!("openai not available: {e}");
                false
            }
        }
    }
}
