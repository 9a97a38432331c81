use serde::{Deserialize, Serialize};

use courtside_core::UserId;

/// Identity as handed over by the external identity provider, after
/// verification. Field names follow the provider's `{uid, email, name}` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: String,
    pub name: String,
}

/// Persisted user, mapped 1:1 to an external identity.
///
/// Created on first sight and updated on later sightings; never deleted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub external_id: String,
    pub email: String,
    pub display_name: String,
}

impl User {
    pub fn from_identity(id: UserId, identity: &VerifiedIdentity) -> Self {
        Self {
            id,
            external_id: identity.uid.clone(),
            email: identity.email.clone(),
            display_name: identity.name.clone(),
        }
    }
}
