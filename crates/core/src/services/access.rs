//! Who may manage a community model.

use hmac::{Hmac, Mac};
use osccai_common::{AppError, AppResult};
use osccai_db::entities::community_model;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compare a presented shared secret with the configured one in constant time.
///
/// Both sides are reduced to fixed-length tags first, so neither content nor
/// length leaks through timing.
#[must_use]
pub fn secrets_match(expected: &str, presented: &str) -> bool {
    let Ok(mac) = HmacSha256::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    let expected_tag = mac.clone().chain_update(expected.as_bytes()).finalize();
    mac.chain_update(presented.as_bytes())
        .verify_slice(&expected_tag.into_bytes())
        .is_ok()
}

/// A caller allowed to attempt management operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manager {
    /// Operator holding the admin token. May manage every model.
    Admin,
    /// Signed-in account. May manage the models it owns.
    Owner(String),
}

impl Manager {
    /// Fail with `Forbidden` unless this caller may manage `model`.
    pub fn authorize(&self, model: &community_model::Model) -> AppResult<()> {
        match self {
            Self::Admin => Ok(()),
            Self::Owner(user_id) if *user_id == model.owner_id => Ok(()),
            Self::Owner(_) => Err(AppError::Forbidden(
                "You do not own this community model".to_string(),
            )),
        }
    }
}
