use serde::{Deserialize, Serialize};

use crate::UserId;

/// Who is acting on a request.
///
/// Supplied by the caller's authentication layer on every operation; the
/// core never derives it on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// The acting user.
    pub actor_id: UserId,

    /// Whether the acting user holds the moderator role.
    pub is_moderator: bool,
}

impl AuthContext {
    /// Context for a regular (creator) user.
    pub fn creator(actor_id: UserId) -> Self {
        Self {
            actor_id,
            is_moderator: false,
        }
    }

    /// Context for a moderator.
    pub fn moderator(actor_id: UserId) -> Self {
        Self {
            actor_id,
            is_moderator: true,
        }
    }
}
