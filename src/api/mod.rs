//! JSON payloads exchanged with the certificate authority.
//!
//! Mostly RFC 8555 objects, plus the two localcert extensions used to look up the assigned
//! domain and to publish DNS challenge records.

use std::fmt;

use serde::{
    ser::{SerializeMap as _, Serializer},
    Deserialize, Serialize,
};

mod account;
mod authorization;
mod directory;
mod localcert;
mod order;

pub use self::{
    account::Account,
    authorization::{Authorization, AuthorizationStatus, Challenge, ChallengeStatus},
    directory::{Directory, DirectoryMeta},
    localcert::{AssignedDomain, ChallengeRecord},
    order::{Finalize, Identifier, Order, OrderStatus},
};

/// Problem type sent when the account has to accept a new terms of service document.
pub(crate) const USER_ACTION_REQUIRED: &str = "urn:ietf:params:acme:error:userActionRequired";

/// Serializes to `""`, the payload of a POST-as-GET request.
pub struct EmptyString;

impl Serialize for EmptyString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("")
    }
}

/// Serializes to `{}`.
pub struct EmptyObject;

impl Serialize for EmptyObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_map(Some(0))?.end()
    }
}

/// Problem document ([RFC 7807]) returned by the authority on failed requests.
///
/// [RFC 7807]: https://datatracker.ietf.org/doc/html/rfc7807
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub _type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// For `userActionRequired` problems, the URL of the document the user has to act on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subproblems: Option<Vec<Subproblem>>,
}

impl Problem {
    pub(crate) fn new(_type: impl Into<String>, detail: Option<String>) -> Self {
        Problem {
            _type: _type.into(),
            detail,
            ..Default::default()
        }
    }

    /// Returns true if problem type is "badNonce".
    pub fn is_bad_nonce(&self) -> bool {
        self._type == "badNonce" || self._type == "urn:ietf:params:acme:error:badNonce"
    }

    /// Returns true if the account must agree to updated terms before continuing.
    pub fn is_user_action_required(&self) -> bool {
        self._type == USER_ACTION_REQUIRED
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self._type),
            _ => write!(f, "{}", self._type),
        }
    }
}

impl std::error::Error for Problem {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subproblem {
    #[serde(rename = "type")]
    pub _type: String,
    pub detail: Option<String>,
    pub identifier: Option<Identifier>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payloads() {
        assert_eq!(serde_json::to_string(&EmptyString).unwrap(), "\"\"");
        assert_eq!(serde_json::to_string(&EmptyObject).unwrap(), "{}");
    }

    #[test]
    fn user_action_required_problem() {
        let problem: Problem = serde_json::from_str(
            r#"{
                "type": "urn:ietf:params:acme:error:userActionRequired",
                "detail": "Terms of service have changed",
                "instance": "https://ca.example/tos/2"
            }"#,
        )
        .unwrap();

        assert!(problem.is_user_action_required());
        assert!(!problem.is_bad_nonce());
        assert_eq!(problem.instance.as_deref(), Some("https://ca.example/tos/2"));
        assert_eq!(
            problem.to_string(),
            "urn:ietf:params:acme:error:userActionRequired: Terms of service have changed",
        );
    }
}
