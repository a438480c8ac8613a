//! Question fetching with retries, partial top-up, and provider rotation.
//!
//! Generation is the flakiest part of the pipeline, so the source makes up
//! to three attempts. A partial batch that clears the 60% floor earns one
//! top-up call for the remainder; a failed attempt rotates to the next
//! provider in the ring when more than one is registered.

use indexmap::IndexMap;
use quizcord_core::types::{DegradedPolicy, Question, QuizError, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::provider::{GenerationRequest, ProviderRegistry, QuestionProvider};
use crate::validation::QuestionValidator;

const MAX_ATTEMPTS: usize = 3;
const MIN_SUCCESS_RATIO: f64 = 0.6;

/// Metadata attached to a session about where its questions came from.
pub type ProviderInfo = IndexMap<String, String>;

/// The engine's one entry point into question generation.
pub struct QuestionSource {
    registry: ProviderRegistry,
    validator: QuestionValidator,
}

impl QuestionSource {
    pub fn new(registry: ProviderRegistry, policy: DegradedPolicy) -> Result<Self> {
        Ok(Self {
            registry,
            validator: QuestionValidator::new(policy)?,
        })
    }

    /// Fetch a validated question batch.
    ///
    /// Fails with `GenerationUnavailable` when no provider is reachable and
    /// `GenerationInvalid` when attempts ran out without a single usable
    /// question.
    pub async fn fetch(
        &self,
        request: &GenerationRequest,
    ) -> Result<(Vec<Question>, ProviderInfo)> {
        let mut provider = self.starting_provider(request).await?;
        let floor = minimum_viable(request.count);
        let mut collected: Vec<Question> = Vec::new();
        let mut last_error: Option<QuizError> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            debug!(
                attempt,
                provider = provider.name(),
                topic = %request.topic,
                "generating questions"
            );
            match provider.generate(request).await {
                Ok(raw) => {
                    collected.extend(self.validator.validate_batch(raw));
                    if collected.len() >= request.count {
                        break;
                    }
                    if collected.len() >= floor {
                        // Close enough: one top-up call for the remainder,
                        // then take whatever we have.
                        let remainder = request.count - collected.len();
                        debug!(remainder, "topping up partial batch");
                        match provider.generate(&request.remainder(remainder)).await {
                            Ok(more) => collected.extend(self.validator.validate_batch(more)),
                            Err(e) => warn!(error = %e, "top-up call failed"),
                        }
                        break;
                    }
                }
                Err(e) => {
                    warn!(
                        attempt,
                        provider = provider.name(),
                        error = %e,
                        "generation attempt failed"
                    );
                    last_error = Some(e);
                }
            }

            if attempt < MAX_ATTEMPTS {
                if let Some(next) = self.registry.after(provider.name()) {
                    debug!(from = provider.name(), to = next.name(), "rotating provider");
                    provider = next;
                }
            }
        }

        collected.truncate(request.count);
        if collected.is_empty() {
            return Err(match last_error {
                Some(QuizError::GenerationUnavailable(message)) => {
                    QuizError::GenerationUnavailable(message)
                }
                _ => QuizError::GenerationInvalid(format!(
                    "no usable questions about '{}' after {MAX_ATTEMPTS} attempts",
                    request.topic
                )),
            });
        }

        // Re-assign IDs across everything collected so ordinality holds for
        // multi-call batches too.
        for (index, question) in collected.iter_mut().enumerate() {
            question.id = index;
        }

        info!(
            provider = provider.name(),
            requested = request.count,
            produced = collected.len(),
            topic = %request.topic,
            "question batch ready"
        );
        let mut provider_info = ProviderInfo::new();
        provider_info.insert("provider_name".to_string(), provider.name().to_string());
        Ok((collected, provider_info))
    }

    /// The hinted provider when it exists, otherwise the highest-priority
    /// reachable one.
    async fn starting_provider(
        &self,
        request: &GenerationRequest,
    ) -> Result<Arc<dyn QuestionProvider>> {
        if let Some(hint) = &request.provider_hint {
            if let Some(provider) = self.registry.get(hint) {
                return Ok(provider);
            }
            warn!(hint = %hint, "unknown provider hint, falling back to default order");
        }
        self.registry.first_available().await.ok_or_else(|| {
            QuizError::GenerationUnavailable("no question provider is reachable".to_string())
        })
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.registry.names()
    }
}

/// Smallest partial batch worth topping up instead of retrying from scratch.
fn minimum_viable(count: usize) -> usize {
    ((count as f64) * MIN_SUCCESS_RATIO).ceil() as usize
}
