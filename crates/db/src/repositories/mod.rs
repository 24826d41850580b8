//! Database repositories.

mod api_key;
mod community_model;
mod constitution;
mod participant;
mod poll;
mod statement;
mod system_event;
mod vote;

pub use api_key::ApiKeyRepository;
pub use community_model::CommunityModelRepository;
pub use constitution::ConstitutionRepository;
pub use participant::ParticipantRepository;
pub use poll::PollRepository;
pub use statement::{ScoreUpdate, StatementRepository};
pub use system_event::{EventFilter, SystemEventRepository};
pub use vote::VoteRepository;
