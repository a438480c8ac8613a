//! Pluggable question providers.
//!
//! A provider wraps one LLM backend (openai, anthropic, google, ...) behind
//! a narrow generate contract. The engine never learns anything about a
//! provider beyond its name; availability and ordering live in the
//! [`ProviderRegistry`].

use async_trait::async_trait;
use quizcord_core::types::{Difficulty, QuestionType, QuizRequest, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Sentinel answer values backends emit when they could not extract an
/// answer from the model response. Questions carrying one of these go
/// through repair before play.
pub const UNPARSED_ANSWER_SENTINELS: [&str; 2] =
    ["Unable to parse from response", "Answer unavailable"];

/// Returns true when an answer value means "the backend could not parse one".
pub fn is_unparsed_sentinel(answer: &str) -> bool {
    UNPARSED_ANSWER_SENTINELS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(answer.trim()))
}

/// What the engine asks a provider for.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub topic: String,
    pub count: usize,
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    pub category: String,
    pub template: Option<String>,
    pub provider_hint: Option<String>,
}

impl GenerationRequest {
    pub fn from_quiz(request: &QuizRequest) -> Self {
        Self {
            topic: request.topic.clone(),
            count: request.count,
            question_type: request.question_type,
            difficulty: request.difficulty,
            category: request
                .category_hint
                .clone()
                .unwrap_or_else(|| "general".to_string()),
            template: request.template_hint.clone(),
            provider_hint: request.provider_hint.clone(),
        }
    }

    /// A copy of this request asking only for `count` more questions.
    pub fn remainder(&self, count: usize) -> Self {
        let mut request = self.clone();
        request.count = count;
        request
    }
}

/// A question as a provider produced it, before validation and repair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawQuestion {
    pub text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub category: String,
}

/// One LLM backend able to produce question batches.
///
/// `generate` failures surface as [`QuizError::GenerationUnavailable`] when
/// the backend cannot be reached and [`QuizError::GenerationInvalid`] when
/// its response could not be parsed.
///
/// [`QuizError::GenerationUnavailable`]: quizcord_core::types::QuizError::GenerationUnavailable
/// [`QuizError::GenerationInvalid`]: quizcord_core::types::QuizError::GenerationInvalid
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap reachability check: credentials present, endpoint configured.
    async fn is_available(&self) -> bool {
        true
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<RawQuestion>>;
}

/// Ordered set of providers. Order is priority order; rotation walks the
/// ring when a provider fails mid-fetch.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn QuestionProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider at the end of the priority order.
    pub fn register(&mut self, provider: Arc<dyn QuestionProvider>) {
        debug!(provider = provider.name(), "registered question provider");
        self.providers.push(provider);
    }

    /// Build a registry whose priority follows `order`; providers not named
    /// in `order` keep their registration order after the named ones.
    pub fn with_order(mut providers: Vec<Arc<dyn QuestionProvider>>, order: &[String]) -> Self {
        providers.sort_by_key(|p| {
            order
                .iter()
                .position(|name| name == p.name())
                .unwrap_or(usize::MAX)
        });
        Self { providers }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn QuestionProvider>> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(Arc::clone)
    }

    /// Names of providers that currently report themselves reachable.
    pub async fn available(&self) -> Vec<String> {
        let mut names = Vec::new();
        for provider in &self.providers {
            if provider.is_available().await {
                names.push(provider.name().to_string());
            }
        }
        names
    }

    /// Highest-priority reachable provider.
    pub async fn first_available(&self) -> Option<Arc<dyn QuestionProvider>> {
        for provider in &self.providers {
            if provider.is_available().await {
                return Some(Arc::clone(provider));
            }
        }
        None
    }

    /// The provider after `name` in the ring, for rotation between attempts.
    /// Returns `None` when fewer than two providers are registered.
    pub fn after(&self, name: &str) -> Option<Arc<dyn QuestionProvider>> {
        if self.providers.len() < 2 {
            return None;
        }
        let index = self.providers.iter().position(|p| p.name() == name)?;
        let next = (index + 1) % self.providers.len();
        self.providers.get(next).map(Arc::clone)
    }

    pub fn names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizcord_core::types::QuizError;

    struct Named(&'static str, bool);

    #[async_trait]
    impl QuestionProvider for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn is_available(&self) -> bool {
            self.1
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<Vec<RawQuestion>> {
            Err(QuizError::GenerationUnavailable("stub".to_string()))
        }
    }

    #[tokio::test]
    async fn order_controls_priority() {
        let registry = ProviderRegistry::with_order(
            vec![
                Arc::new(Named("google", true)) as Arc<dyn QuestionProvider>,
                Arc::new(Named("openai", true)),
            ],
            &["openai".to_string(), "anthropic".to_string(), "google".to_string()],
        );
        assert_eq!(registry.names(), vec!["openai", "google"]);
        let first = registry.first_available().await.unwrap();
        assert_eq!(first.name(), "openai");
    }

    #[tokio::test]
    async fn unavailable_providers_are_skipped() {
        let registry = ProviderRegistry::with_order(
            vec![
                Arc::new(Named("openai", false)) as Arc<dyn QuestionProvider>,
                Arc::new(Named("anthropic", true)),
            ],
            &["openai".to_string(), "anthropic".to_string()],
        );
        assert_eq!(registry.available().await, vec!["anthropic"]);
        assert_eq!(registry.first_available().await.unwrap().name(), "anthropic");
    }

    #[test]
    fn rotation_wraps_around() {
        let registry = ProviderRegistry::with_order(
            vec![
                Arc::new(Named("openai", true)) as Arc<dyn QuestionProvider>,
                Arc::new(Named("anthropic", true)),
            ],
            &[],
        );
        assert_eq!(registry.after("openai").unwrap().name(), "anthropic");
        assert_eq!(registry.after("anthropic").unwrap().name(), "openai");
        assert!(registry.after("unknown").is_none());
    }

    #[test]
    fn single_provider_has_no_rotation() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(Named("openai", true)));
        assert!(registry.after("openai").is_none());
    }

    #[test]
    fn sentinel_detection_is_case_insensitive() {
        assert!(is_unparsed_sentinel("Unable to parse from response"));
        assert!(is_unparsed_sentinel("  answer unavailable "));
        assert!(!is_unparsed_sentinel("Paris"));
    }
}
