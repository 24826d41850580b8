//! Core business logic for osccai.
//!
//! Services that sit between the HTTP layer and the ledger store: the vote
//! tally engine, the eligibility policy, participant resolution, poll and
//! statement rules, API keys, constitution generation, the score
//! recalculation trigger, webhook verification and the system event log.

pub mod services;

pub use services::*;
