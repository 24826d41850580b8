//! Database entities.

#![allow(missing_docs)]

pub mod api_key;
pub mod community_model;
pub mod constitution;
pub mod participant;
pub mod poll;
pub mod statement;
pub mod system_event;
pub mod vote;

pub use api_key::Entity as ApiKey;
pub use community_model::Entity as CommunityModel;
pub use constitution::Entity as Constitution;
pub use participant::Entity as Participant;
pub use poll::Entity as Poll;
pub use statement::Entity as Statement;
pub use system_event::Entity as SystemEvent;
pub use vote::Entity as Vote;
