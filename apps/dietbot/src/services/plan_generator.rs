use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use dietbot_db::models::UserProfile;
use serde::{Deserialize, Serialize};
use tracing::info;

const SYSTEM_PROMPT: &str = "You are an experienced dietitian. Your task is to create a \
    personalized meal plan based on the user's parameters.";

#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate(&self, profile: &UserProfile) -> Result<String>;
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiPlanGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiPlanGenerator {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn gender_label(value: &str) -> &str {
    match value {
        "male" => "Male",
        "female" => "Female",
        other => other,
    }
}

fn goal_label(value: &str) -> &str {
    match value {
        "reduce" => "lose weight",
        "maintain" => "maintain weight",
        "gain" => "gain weight",
        other => other,
    }
}

pub fn build_prompt(profile: &UserProfile) -> String {
    format!(
        "Create a personalized meal plan for a person with the following parameters:\n\
         - Gender: {}\n\
         - Height: {} cm\n\
         - Weight: {} kg\n\
         - Goal: {}\n\n\
         The plan should include:\n\
         1. Total daily calories\n\
         2. Protein, fat and carbohydrate breakdown\n\
         3. A sample 7-day menu with meal times\n\
         4. Hydration recommendations\n\
         5. Additional recommendations for reaching the goal\n",
        gender_label(&profile.gender),
        profile.height_cm,
        profile.weight_kg,
        goal_label(&profile.goal),
    )
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn extract_plan(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| anyhow!("no response from the completion API"))
}

#[async_trait]
impl PlanGenerator for OpenAiPlanGenerator {
    async fn generate(&self, profile: &UserProfile) -> Result<String> {
        let prompt = build_prompt(profile);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: 2500,
            temperature: 0.7,
        };

        info!("Requesting diet plan for user {} from {}", profile.tg_id, self.model);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Completion request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Completion API error ({}): {}", status, body));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;
        extract_plan(parsed)
    }
}
