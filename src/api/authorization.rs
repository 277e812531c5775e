use serde::{Deserialize, Serialize};

use crate::api;

/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
}

/// Proof of control the authority requires for one identifier of an order.
///
/// See [RFC 8555 §7.1.4].
///
/// [RFC 8555 §7.1.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub identifier: api::Identifier,
    pub status: AuthorizationStatus,
    pub expires: Option<String>,
    pub challenges: Vec<Challenge>,
}

impl Authorization {
    /// Returns a `dns-01` challenge, if one is offered.
    ///
    /// The localcert authority controls the zone of every domain it hands out, so DNS is the
    /// only challenge type this client solves.
    pub fn dns_challenge(&self) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c._type == "dns-01")
    }

    /// First error reported on any of the challenges, for diagnostics.
    pub fn challenge_error(&self) -> Option<&api::Problem> {
        self.challenges.iter().find_map(|c| c.error.as_ref())
    }
}

/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
}

/// See [RFC 8555 §7.1.5].
///
/// [RFC 8555 §7.1.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.5
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(rename = "type")]
    pub _type: String,
    pub url: String,
    pub status: ChallengeStatus,
    pub validated: Option<String>,
    pub error: Option<api::Problem>,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_dns_challenge_and_error() {
        let auth: Authorization = serde_json::from_str(
            r#"{
                "identifier": { "type": "dns", "value": "abc123.example" },
                "status": "invalid",
                "challenges": [
                    {
                        "type": "http-01",
                        "status": "pending",
                        "url": "https://ca.example/chall/1",
                        "token": "aaa"
                    },
                    {
                        "type": "dns-01",
                        "status": "invalid",
                        "url": "https://ca.example/chall/2",
                        "token": "bbb",
                        "error": {
                            "type": "urn:ietf:params:acme:error:dns",
                            "detail": "NXDOMAIN looking up TXT for _acme-challenge.abc123.example"
                        }
                    }
                ]
            }"#,
        )
        .unwrap();

        let dns = auth.dns_challenge().unwrap();
        assert_eq!(dns.token, "bbb");
        assert_eq!(dns.status, ChallengeStatus::Invalid);
        assert_eq!(
            auth.challenge_error().unwrap()._type,
            "urn:ietf:params:acme:error:dns"
        );
    }
}
