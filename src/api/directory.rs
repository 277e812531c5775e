use serde::{Deserialize, Serialize};

/// Directory object the client configures itself from.
///
/// Besides the RFC 8555 endpoints, the localcert authority advertises where to look up the
/// domain assigned to an account and where to publish DNS challenge records for it.
///
/// # Example JSON
///
/// ```json
/// {
///   "newNonce": "https://ca.example/acme/new-nonce",
///   "newAccount": "https://ca.example/acme/new-acct",
///   "newOrder": "https://ca.example/acme/new-order",
///   "localcertDomain": "https://ca.example/localcert/domain",
///   "localcertChallenge": "https://ca.example/localcert/challenge",
///   "meta": {
///     "termsOfService": "https://ca.example/tos/2"
///   }
/// }
/// ```
///
/// See [RFC 8555 §7.1.1].
///
/// [RFC 8555 §7.1.1]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.1
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    pub new_nonce: String,
    pub new_account: String,
    pub new_order: String,

    /// Lookup of the domain assigned to the signing account.
    pub localcert_domain: String,

    /// Publication of `dns-01` TXT record values.
    pub localcert_challenge: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<DirectoryMeta>,
}

impl Directory {
    /// URL of the terms of service document currently in force, if the authority has one.
    pub fn terms_of_service(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|meta| meta.terms_of_service.as_deref())
            .filter(|tos| !tos.is_empty())
    }
}

/// <https://datatracker.ietf.org/doc/html/rfc8555#section-9.7.6>
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}
