//! Quota-gated generation request handling.
//!
//! One request walks `Idle → Authenticating → ProfileLoading → QuotaChecking →
//! Generating → Persisting → Completed`, dropping to `Errored` from any
//! non-terminal stage. Usage is only incremented after the generator returns a
//! draft. The one earlier write is the rollover reset, which is kept even if the
//! generation that follows it fails.
//!
//! If the increment cannot be stored, the draft is still returned: the user has
//! their campaign, the failure is logged at error level and the increment is
//! handed to the [`UsageReconciler`]. Availability wins over strict accounting.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::Instrument;

use crate::auth::{AuthError, IdentityResolver};
use crate::draft::CampaignDraft;
use crate::generation::{CampaignGenerator, GenerationError};
use crate::models::{Plan, PlanLimits};
use crate::quota::{self, Clock, SystemClock};
use crate::reconcile::UsageReconciler;
use crate::storage::{ProfileError, ProfileStore, UsageChange};

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Authenticating,
    ProfileLoading,
    QuotaChecking,
    Generating,
    Persisting,
    Completed,
    Errored,
}

/// Error taxonomy shared with the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingPrompt,
    Unauthenticated,
    ProfileUnavailable,
    QuotaExceeded,
    GenerationFailed,
    /// Never returned to callers; reported through logs and the reconciler.
    PersistenceFailed,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Describe your business before generating a campaign.")]
    MissingPrompt,
    #[error("Sign in to generate campaigns.")]
    Unauthenticated(#[source] AuthError),
    #[error("Your account could not be loaded. Please try again in a moment.")]
    ProfileUnavailable(#[source] ProfileError),
    #[error("You have used all {limit} generations in the {plan} plan this month. Upgrade your plan to keep generating.")]
    QuotaExceeded { plan: Plan, limit: u32 },
    #[error("The campaign could not be generated. Please try again.")]
    GenerationFailed(#[source] GenerationError),
}

impl GenerateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerateError::MissingPrompt => ErrorKind::MissingPrompt,
            GenerateError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            GenerateError::ProfileUnavailable(_) => ErrorKind::ProfileUnavailable,
            GenerateError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            GenerateError::GenerationFailed(_) => ErrorKind::GenerationFailed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Generated {
    pub draft: CampaignDraft,
    pub plan: Plan,
    /// Stored usage after this generation, or the expected value if the
    /// increment could not be stored.
    pub generations_used: u32,
    pub limit: Option<u32>,
    pub usage_recorded: bool,
}

/// Tracks the request's stage for logging.
struct Progress {
    stage: Stage,
}

impl Progress {
    fn start() -> Self {
        Self { stage: Stage::Idle }
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!(from = ?self.stage, to = ?next, "generation request");
        self.stage = next;
    }

    fn fail(&mut self, error: GenerateError) -> GenerateError {
        match error.kind() {
            ErrorKind::GenerationFailed | ErrorKind::ProfileUnavailable => {
                tracing::warn!(stage = ?self.stage, kind = ?error.kind(), error = ?error, "generation request failed");
            }
            _ => {
                tracing::info!(stage = ?self.stage, kind = ?error.kind(), "generation request rejected");
            }
        }
        self.stage = Stage::Errored;
        error
    }
}

pub struct Orchestrator {
    identities: Arc<dyn IdentityResolver>,
    profiles: Arc<dyn ProfileStore>,
    generator: Arc<dyn CampaignGenerator>,
    clock: Arc<dyn Clock>,
    limits: PlanLimits,
    generation_timeout: Duration,
    reconciler: Option<UsageReconciler>,
}

impl Orchestrator {
    pub fn new(
        identities: Arc<dyn IdentityResolver>,
        profiles: Arc<dyn ProfileStore>,
        generator: Arc<dyn CampaignGenerator>,
    ) -> Self {
        Self {
            identities,
            profiles,
            generator,
            clock: Arc::new(SystemClock),
            limits: PlanLimits::STANDARD,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            reconciler: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_limits(mut self, limits: PlanLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn with_reconciler(mut self, reconciler: UsageReconciler) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn limits(&self) -> &PlanLimits {
        &self.limits
    }

    /// Handles one generation request. `credential` is the caller's bearer token.
    pub async fn handle(
        &self,
        credential: Option<&str>,
        prompt: &str,
    ) -> Result<Generated, GenerateError> {
        let span = tracing::info_span!("generate", user_id = tracing::field::Empty);
        self.run(credential, prompt).instrument(span).await
    }

    async fn run(&self, credential: Option<&str>, prompt: &str) -> Result<Generated, GenerateError> {
        let mut progress = Progress::start();
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(progress.fail(GenerateError::MissingPrompt));
        }

        progress.advance(Stage::Authenticating);
        let identity = self
            .identities
            .resolve_identity(credential)
            .await
            .map_err(|e| progress.fail(GenerateError::Unauthenticated(e)))?;
        tracing::Span::current().record("user_id", identity.user_id.as_str());

        progress.advance(Stage::ProfileLoading);
        let profile = self
            .profiles
            .load_profile(&identity)
            .await
            .map_err(|e| progress.fail(GenerateError::ProfileUnavailable(e)))?;

        progress.advance(Stage::QuotaChecking);
        let now = self.clock.now();
        let decision = quota::evaluate(now, &profile, &self.limits);
        if decision.reset_occurred {
            self.profiles
                .persist_usage(&identity, UsageChange::ResetWindow { at: now })
                .await
                .map_err(|e| progress.fail(GenerateError::ProfileUnavailable(e)))?;
            tracing::info!(
                previous_usage = profile.generations_used,
                previous_reset = %profile.generation_reset_date,
                "quota window rolled over"
            );
        }
        if !decision.allowed {
            return Err(progress.fail(GenerateError::QuotaExceeded {
                plan: profile.plan,
                limit: decision.limit.unwrap_or_default(),
            }));
        }

        progress.advance(Stage::Generating);
        let draft = match tokio::time::timeout(self.generation_timeout, self.generator.generate(prompt)).await {
            Ok(Ok(draft)) => draft,
            Ok(Err(error)) => return Err(progress.fail(GenerateError::GenerationFailed(error))),
            Err(_) => {
                let error = GenerationError::TimedOut(self.generation_timeout);
                return Err(progress.fail(GenerateError::GenerationFailed(error)));
            }
        };

        progress.advance(Stage::Persisting);
        let (generations_used, usage_recorded) = match self
            .profiles
            .persist_usage(&identity, UsageChange::Increment)
            .await
        {
            Ok(stored) => (stored.generations_used, true),
            Err(error) => {
                let queued = self
                    .reconciler
                    .as_ref()
                    .map_or(false, |reconciler| reconciler.enqueue(identity.clone()));
                tracing::error!(
                    kind = ?ErrorKind::PersistenceFailed,
                    %error,
                    queued_for_retry = queued,
                    "campaign generated but usage increment was not stored; returning the draft"
                );
                (decision.usage.saturating_add(1), false)
            }
        };

        progress.advance(Stage::Completed);
        Ok(Generated {
            draft,
            plan: profile.plan,
            generations_used,
            limit: decision.limit,
            usage_recorded,
        })
    }
}
