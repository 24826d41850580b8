//! Business logic services.

#![allow(missing_docs)]

pub mod access;
pub mod api_key;
pub mod constitution;
pub mod eligibility;
pub mod event;
pub mod participant;
pub mod poll;
pub mod scoring;
pub mod tally;
pub mod webhook;

pub use access::{Manager, secrets_match};
pub use api_key::{ApiKeyService, CreatedApiKey, authorize_model};
pub use constitution::{ConstitutionService, render_constitution};
pub use event::{Actor, EventQuery, EventService, NewEvent};
pub use participant::{ParticipantIdentity, ParticipantService};
pub use poll::{CompletionStatus, CreatePollInput, PollService, PollView, StatementView};
pub use scoring::{
    BatchReport, RecalculationResponse, ScoreTrigger, ScoringClient, ScoringService,
};
pub use tally::{CounterDelta, TallyEngine, VoteOutcome, VoteResult};
pub use webhook::{ConsensusOutcome, WebhookService, WebhookVerifier};
