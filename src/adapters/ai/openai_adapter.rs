//! OpenAI-compatible adapter for listing-copy generation.
//!
//! Works against the OpenAI API, Azure OpenAI, or any compatible endpoint.
//! A photo, when provided, goes along as a data-URL image part; if the
//! image-bearing request fails, comes back empty, or reads like a refusal,
//! the adapter retries text-only against a cheaper fallback model.

use crate::domain::{DomainError, ListingCopy, ListingDraft};
use crate::ports::AiPort;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Model used for the text-only retry.
const FALLBACK_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible AI adapter.
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiAdapter {
    /// Create a new adapter.
    ///
    /// # Arguments
    /// * `api_url` - API endpoint (e.g., "https://api.openai.com/v1/chat/completions")
    /// * `api_key` - API key
    /// * `model` - Primary model name (e.g., "gpt-4o")
    pub fn new(api_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            model,
        }
    }

    fn system_prompt(with_image: bool) -> String {
        let base = "You ghost-write listings for a secondhand marketplace. \
                    Work out what the item is from the photo and the seller's notes, \
                    then produce, in this order: a one-line listing title, a short \
                    price remark (going rate, whether the price is negotiable), and \
                    a detailed description covering condition, colour, quirks and \
                    intended use. State the usage period explicitly, e.g. \
                    \"Used for about 2 years\", and hedge it when unclear. \
                    Plain text only, no markdown headings.";
        if with_image {
            base.to_string()
        } else {
            format!("{base}\nNo photo was provided. Work from the text alone.")
        }
    }

    fn user_prompt(draft: &ListingDraft) -> String {
        let or_blank = |s: &str| {
            if s.trim().is_empty() {
                "(not given)".to_string()
            } else {
                s.trim().to_string()
            }
        };
        format!(
            "Write the sale copy for this secondhand item.\n\
             Seller's notes:\n\
             - Draft title: {}\n\
             - Asking price: {}\n\
             - Meetup area: {}\n\
             - Extra notes: {}",
            or_blank(&draft.title),
            draft
                .price
                .map(|p| format!("{p}"))
                .unwrap_or_else(|| "(not given)".to_string()),
            or_blank(&draft.location),
            or_blank(&draft.extra_description),
        )
    }

    /// Models occasionally decline image requests outright; those answers
    /// are useless as listing copy and trigger the text-only retry.
    fn looks_like_refusal(text: &str) -> bool {
        let lower = text.to_lowercase();
        ["i'm sorry", "i am sorry", "i can't help", "i cannot help"]
            .iter()
            .any(|phrase| lower.contains(phrase))
    }

    /// First non-empty line becomes the title, the rest the body. Falls
    /// back to the seller's draft title when the model returned nothing
    /// usable.
    fn split_copy(text: &str, draft: &ListingDraft) -> ListingCopy {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let title = lines
            .next()
            .map(|l| l.trim().trim_matches('#').trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| {
                let draft_title = draft.title.trim();
                if draft_title.is_empty() {
                    "Secondhand item for sale".to_string()
                } else {
                    format!("{draft_title} — secondhand")
                }
            });
        let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
        let body = if body.is_empty() {
            text.trim().to_string()
        } else {
            body
        };
        ListingCopy { title, body }
    }

    async fn request(
        &self,
        model: &str,
        draft: &ListingDraft,
        include_image: bool,
    ) -> Result<String, DomainError> {
        let mut parts = vec![ContentPart::Text {
            text: Self::user_prompt(draft),
        }];
        if include_image {
            if let Some(image) = draft.image_base64.as_deref() {
                let mime = if draft.image_mime.is_empty() {
                    "image/jpeg"
                } else {
                    draft.image_mime.as_str()
                };
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{mime};base64,{image}"),
                    },
                });
            }
        }

        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: MessageContent::Text(Self::system_prompt(include_image)),
                },
                ChatMessage {
                    role: "user".into(),
                    content: MessageContent::Parts(parts),
                },
            ],
            temperature: 0.7,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::Ai(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DomainError::Ai(format!("API returned {status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Ai(format!("bad API response: {e}")))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl AiPort for OpenAiAdapter {
    async fn generate_listing(&self, draft: &ListingDraft) -> Result<ListingCopy, DomainError> {
        let with_image = draft.image_base64.is_some();
        let mut text = String::new();

        if with_image {
            match self.request(&self.model, draft, true).await {
                Ok(t) => text = t,
                Err(e) => {
                    warn!(error = %e, "image request failed, retrying text-only");
                }
            }
        } else {
            text = self.request(&self.model, draft, false).await?;
        }

        if text.trim().is_empty() || Self::looks_like_refusal(&text) {
            debug!(model = FALLBACK_MODEL, "falling back to text-only request");
            text = self.request(FALLBACK_MODEL, draft, false).await?;
        }

        Ok(Self::split_copy(&text, draft))
    }
}

/// OpenAI API request structure.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

/// OpenAI API response structure.
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}
