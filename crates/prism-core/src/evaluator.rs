//! The optional Evaluator: asks an external LLM whether a candidate Skill
//! should be added, merged into an existing one, dropped as redundant, or
//! should invalidate an existing Skill.
//!
//! Absence of an LLM credential disables this component cleanly —
//! [`Evaluator::from_env`] returns [`PrismError::ConfigurationMissing`]
//! rather than failing later mid-operation. Callers (the CLI's `evaluate`
//! subcommand, or an automated capture pipeline) decide whether to apply the
//! verdict; the Evaluator itself never mutates the Store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{PrismError, Result};
use crate::skill::Skill;

/// A chat message in the minimal shape every provider backend accepts.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// `"system"` or `"user"`.
    pub role: &'static str,
    /// Message content.
    pub content: String,
}

/// The verdict an Evaluator returns for one candidate Skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum Verdict {
    /// Store the candidate as a new Skill.
    Add,
    /// Merge the candidate into an existing Skill instead of adding a new one.
    Update {
        /// The `skill_id` the candidate should be merged into.
        target_skill_id: String,
    },
    /// The candidate is redundant with existing memory; do nothing.
    Noop,
    /// The candidate invalidates an existing Skill, which should be
    /// retired (status flipped to `deprecated`, never physically deleted).
    Delete {
        /// The `skill_id` the candidate invalidates.
        target_skill_id: String,
    },
}

/// Minimal async LLM backend the Evaluator drives. Each feature-gated
/// provider (`evaluator-ollama`, `evaluator-openai`) implements this against
/// its own client; the Evaluator's prompt-construction and verdict-parsing
/// logic is provider-agnostic.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// The model identifier, for logging.
    fn model(&self) -> &str;

    /// Send `messages` and return the raw completion text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Asks an [`LlmBackend`] for an ADD/UPDATE/NOOP/DELETE verdict on a
/// candidate Skill against the current store contents.
pub struct Evaluator {
    backend: Box<dyn LlmBackend>,
}

impl Evaluator {
    /// Build an Evaluator around an explicit backend (for tests, or a
    /// caller supplying its own credential resolution).
    pub fn new(backend: Box<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// Build an Evaluator from environment configuration, preferring
    /// OpenAI if `OPENAI_API_KEY` is set, falling back to a local Ollama
    /// host if `PRISM_OLLAMA_HOST` is set. Returns
    /// [`PrismError::ConfigurationMissing`] if neither is configured, or if
    /// the corresponding feature was not compiled in.
    pub fn from_env() -> Result<Self> {
        #[cfg(feature = "evaluator-openai")]
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            let model = std::env::var("PRISM_EVALUATOR_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
            return Ok(Self::new(Box::new(openai::OpenAiBackend::new(key, model))));
        }

        #[cfg(feature = "evaluator-ollama")]
        if let Ok(host) = std::env::var("PRISM_OLLAMA_HOST") {
            let model = std::env::var("PRISM_EVALUATOR_MODEL").unwrap_or_else(|_| "llama3".to_string());
            return Ok(Self::new(Box::new(ollama::OllamaBackend::new(host, model)?)));
        }

        Err(PrismError::ConfigurationMissing(
            "no Evaluator LLM credential configured (set OPENAI_API_KEY or PRISM_OLLAMA_HOST)".into(),
        ))
    }

    /// Ask for a verdict on `candidate` against up to `context` existing
    /// Skills judged most likely to overlap (typically the Ranker's top
    /// hits for the candidate's own title/body as a query).
    pub async fn evaluate(&self, candidate: &Skill, context: &[Skill]) -> Result<Verdict> {
        let messages = build_prompt(candidate, context);
        let raw = self.backend.complete(&messages).await?;
        parse_verdict(&raw)
    }
}

fn build_prompt(candidate: &Skill, context: &[Skill]) -> Vec<ChatMessage> {
    let mut context_block = String::new();
    for skill in context {
        context_block.push_str(&format!(
            "- {} ({}): {}\n",
            skill.frontmatter.skill_id,
            skill.title(),
            skill.key_insight(),
        ));
    }
    if context_block.is_empty() {
        context_block.push_str("(no existing skills overlap this candidate)\n");
    }

    let system = ChatMessage {
        role: "system",
        content: "You curate a shared memory of reusable engineering skills, patterns, gotchas, \
                  and decisions. Given a new candidate and the existing entries it might overlap \
                  with, reply with exactly one JSON object and no other text, matching one of: \
                  {\"verdict\":\"add\"} | {\"verdict\":\"update\",\"target_skill_id\":\"<id>\"} | \
                  {\"verdict\":\"noop\"} | {\"verdict\":\"delete\",\"target_skill_id\":\"<id>\"}."
            .to_string(),
    };
    let user = ChatMessage {
        role: "user",
        content: format!(
            "Candidate:\nTitle: {}\nTags: {}\nBody:\n{}\n\nExisting entries:\n{context_block}",
            candidate.title(),
            candidate.frontmatter.domain_tags.join(", "),
            candidate.body,
        ),
    };
    vec![system, user]
}

fn parse_verdict(raw: &str) -> Result<Verdict> {
    let json_slice = extract_json_object(raw)
        .ok_or_else(|| PrismError::ExternalUnavailable(format!("evaluator reply had no JSON object: {raw:?}")))?;
    serde_json::from_str(json_slice)
        .map_err(|e| PrismError::ExternalUnavailable(format!("malformed evaluator verdict {json_slice:?}: {e}")))
}

/// The model sometimes wraps its JSON in prose or a code fence despite
/// instructions; take the first balanced `{...}` span.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0i32;
    for (i, c) in raw[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(feature = "evaluator-openai")]
mod openai {
    use super::*;
    use async_openai::config::OpenAIConfig;
    use async_openai::types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    };
    use async_openai::Client;

    pub struct OpenAiBackend {
        client: Client<OpenAIConfig>,
        model: String,
    }

    impl OpenAiBackend {
        pub fn new(api_key: String, model: String) -> Self {
            let config = OpenAIConfig::new().with_api_key(api_key);
            Self { client: Client::with_config(config), model }
        }
    }

    #[async_trait]
    impl LlmBackend for OpenAiBackend {
        fn model(&self) -> &str {
            &self.model
        }

        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            let mut built = Vec::with_capacity(messages.len());
            for m in messages {
                let message: ChatCompletionRequestMessage = if m.role == "system" {
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| PrismError::ExternalUnavailable(e.to_string()))?
                        .into()
                } else {
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| PrismError::ExternalUnavailable(e.to_string()))?
                        .into()
                };
                built.push(message);
            }

            let request = CreateChatCompletionRequestArgs::default()
                .model(&self.model)
                .messages(built)
                .temperature(0.0)
                .build()
                .map_err(|e| PrismError::ExternalUnavailable(e.to_string()))?;

            let response = self
                .client
                .chat()
                .create(request)
                .await
                .map_err(|e| PrismError::ExternalUnavailable(format!("openai request failed: {e}")))?;

            response
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| PrismError::ExternalUnavailable("openai returned no completion".into()))
        }
    }
}

#[cfg(feature = "evaluator-ollama")]
mod ollama {
    use super::*;
    use ollama_rs::generation::chat::request::ChatMessageRequest;
    use ollama_rs::generation::chat::{ChatMessage as OllamaMessage, MessageRole};
    use ollama_rs::Ollama;

    pub struct OllamaBackend {
        client: Ollama,
        model: String,
    }

    impl OllamaBackend {
        pub fn new(host: String, model: String) -> Result<Self> {
            let url = url::Url::parse(&host)
                .map_err(|e| PrismError::InvalidInput(format!("invalid ollama host {host:?}: {e}")))?;
            let host_str = url.host_str().unwrap_or("localhost");
            let port = url.port().unwrap_or(11434);
            Ok(Self {
                client: Ollama::new(format!("http://{host_str}"), port),
                model,
            })
        }
    }

    #[async_trait]
    impl LlmBackend for OllamaBackend {
        fn model(&self) -> &str {
            &self.model
        }

        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            let converted: Vec<OllamaMessage> = messages
                .iter()
                .map(|m| {
                    let role = if m.role == "system" { MessageRole::System } else { MessageRole::User };
                    OllamaMessage::new(role, m.content.clone())
                })
                .collect();

            let request = ChatMessageRequest::new(self.model.clone(), converted);
            let response = self
                .client
                .send_chat_messages(request)
                .await
                .map_err(|e| PrismError::ExternalUnavailable(format!("ollama request failed: {e}")))?;

            response
                .message
                .map(|m| m.content)
                .ok_or_else(|| PrismError::ExternalUnavailable("ollama returned no completion".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubBackend {
        reply: String,
    }

    #[async_trait]
    impl LlmBackend for StubBackend {
        fn model(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok(self.reply.clone())
        }
    }

    fn candidate() -> Skill {
        use crate::skill::{Scope, SkillFrontmatter, SkillStatus, SkillType, VerifiedBy};
        use chrono::NaiveDate;

        let today = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let frontmatter = SkillFrontmatter {
            skill_id: "candidate".into(),
            skill_type: SkillType::Skill,
            domain_tags: vec!["networking".into()],
            scope: Scope::Global,
            stack_context: vec![],
            created: today,
            last_used: today,
            reuse_count: 0,
            project_origin: None,
            status: SkillStatus::Active,
            verified_by: VerifiedBy::Agent,
            extra: Default::default(),
        };
        Skill::new(frontmatter, "# Candidate\n\nSome insight.\n".into()).unwrap()
    }

    #[tokio::test]
    async fn parses_add_verdict() {
        let evaluator = Evaluator::new(Box::new(StubBackend { reply: "{\"verdict\":\"add\"}".into() }));
        assert_eq!(evaluator.evaluate(&candidate(), &[]).await.unwrap(), Verdict::Add);
    }

    #[tokio::test]
    async fn parses_update_verdict_with_target() {
        let evaluator = Evaluator::new(Box::new(StubBackend {
            reply: "Sure, here you go:\n{\"verdict\":\"update\",\"target_skill_id\":\"retry-with-jitter\"}".into(),
        }));
        assert_eq!(
            evaluator.evaluate(&candidate(), &[]).await.unwrap(),
            Verdict::Update { target_skill_id: "retry-with-jitter".into() }
        );
    }

    #[tokio::test]
    async fn unrecognized_reply_is_external_unavailable() {
        let evaluator = Evaluator::new(Box::new(StubBackend { reply: "MAYBE".into() }));
        assert!(matches!(
            evaluator.evaluate(&candidate(), &[]).await,
            Err(PrismError::ExternalUnavailable(_))
        ));
    }
}
