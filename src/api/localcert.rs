use serde::{Deserialize, Serialize};

/// Response of the `localcertDomain` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedDomain {
    pub domain: String,
}

/// Payload for the `localcertChallenge` endpoint.
///
/// The authority serves `value` as the `_acme-challenge.<domain>` TXT record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    pub domain: String,
    pub value: String,
}
