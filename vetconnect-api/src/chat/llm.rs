/// Language-model backend for the assistant
///
/// Any OpenAI-compatible `chat/completions` endpoint works. The assistant
/// never depends on it: callers fall back to [`OFFLINE_REPLY`] or to the
/// deterministic keyword rules when no backend is configured or a call fails.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub const OFFLINE_REPLY: &str = "I'm currently unable to reach the AI service. Please book a consultation through VetConnect so a vet can assess your pet directly. Only a licensed veterinarian can confirm the exact cause.";

pub const SYSTEM_PROMPT: &str = r#"You are "VetBot", the assistant of VetConnect Veterinary Clinic.
Rules:
1. Only discuss these animals: Dog, Cat, Rabbit, Hamster, Turtle, Bird, Cow, Hen, Pig, Goat, Sheep, Horse, Duck, Buffalo, Cattle, Donkey, Mule. For any other animal reply: "We only treat domestic and farm animals at VetConnect."
2. Talk only about the animal the user mentions. Never bring up another species.
3. If symptoms include bleeding, seizures, unconsciousness, poisoning or breathing difficulty, reply only: "EMERGENCY ALERT: Critical symptoms detected. Book an emergency appointment immediately through VetConnect."
4. Never state a diagnosis as fact. Use "Possible causes include" or "This could be related to".
5. End every medical answer with: "Only a licensed veterinarian can confirm the exact cause."
6. Keep answers to 2-3 sentences with no lists, headers or bold text.
7. Never tell the user to phone the clinic. Encourage booking through this chat instead.
8. For anything unrelated to pet health, clinic services or booking reply: "I can only assist with veterinary questions."
9. If unsure, say so and recommend a consultation. Never invent drug names, dosages or tests."#;

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("empty completion")]
    Empty,
}

/// Text generation used by the booking assistant
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Answers a user-facing question under [`SYSTEM_PROMPT`]
    async fn advise(&self, prompt: &str) -> Result<String, AssistantError>;

    /// Runs a bare instruction (extraction, yes/no checks)
    async fn instruct(&self, prompt: &str) -> Result<String, AssistantError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageOut>,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    #[serde(default)]
    content: String,
}

/// OpenAI-compatible HTTP backend
pub struct OpenAiAssistant {
    http: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiAssistant {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String, AssistantError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });

        let mut request = self
            .http
            .post(&self.config.url)
            .timeout(REQUEST_TIMEOUT)
            .json(&ChatCompletionRequest {
                model: &self.config.model,
                messages,
            });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body: String = response.text().await.unwrap_or_default().chars().take(500).collect();
            return Err(AssistantError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .map(|m| m.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(AssistantError::Empty)
    }
}

#[async_trait]
impl Assistant for OpenAiAssistant {
    async fn advise(&self, prompt: &str) -> Result<String, AssistantError> {
        self.complete(Some(SYSTEM_PROMPT), prompt).await
    }

    async fn instruct(&self, prompt: &str) -> Result<String, AssistantError> {
        self.complete(None, prompt).await
    }
}

const ANSWER_PREFIXES: [&str; 8] = [
    "output:", "answer:", "result:", "entity:", "breed:", "species:", "name:", "animal:",
];

/// Strips labels, quotes and trailing chatter from an extraction answer
///
/// Short answers (up to three words) are kept whole, longer ones are cut to
/// their first word.
pub fn clean_extracted(raw: &str) -> String {
    let mut text = raw.replace(['\n', '\r'], " ").trim().to_string();

    loop {
        let lower = text.to_ascii_lowercase();
        match ANSWER_PREFIXES.iter().find(|p| lower.starts_with(**p)) {
            Some(prefix) => text = text[prefix.len()..].trim().to_string(),
            None => break,
        }
    }

    let text = text.trim_matches(|c: char| "\"'.,;:()[]".contains(c)).trim();
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= 3 {
        words.join(" ")
    } else {
        words[0].to_string()
    }
}

/// True for the placeholder answers a model gives when nothing was found
pub fn is_empty_answer(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "" | "none" | "null" | "n/a")
}

pub fn extraction_prompt(user_input: &str, entity: &str, exclude: Option<&str>) -> String {
    let exclude_note = exclude
        .map(|e| format!("\n5. Do NOT return \"{e}\", that is the pet's name, not the {entity}."))
        .unwrap_or_default();

    format!(
        "TASK: Extract the {entity} from the user's input.\n\
         USER INPUT: \"{user_input}\"\n\
         RULES:\n\
         1. Return ONLY the {entity} (no extra words).\n\
         2. If a correction is present (e.g. \"Wait no it's Coco\"), extract the corrected value.\n\
         3. If no valid {entity} is found, return \"None\".\n\
         4. Remove punctuation. Use Title Case.{exclude_note}\n\
         Output:"
    )
}

pub fn breed_check_prompt(breed: &str, animal: &str) -> String {
    format!(
        "You are a veterinary breed validator.\n\
         Is \"{breed}\" a recognized or commonly known breed, variety, or type of {animal}?\n\
         Philippine local breeds are valid, e.g. \"Aspin\" for dogs, \"Puspin\" for cats, \"Carabao\" for buffalo.\n\
         Answer ONLY \"yes\" or \"no\"."
    )
}
