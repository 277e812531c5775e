use serde::{Deserialize, Serialize};

/// Account resource, sent to and returned by the newAccount endpoint.
///
/// See [RFC 8555 §7.1.2].
///
/// [RFC 8555 §7.1.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.2
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_service_agreed: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders: Option<String>,
}

impl Account {
    /// Registration payload agreeing to the authority's current terms.
    pub(crate) fn agreeing_to_terms() -> Self {
        Account {
            terms_of_service_agreed: Some(true),
            ..Default::default()
        }
    }

    pub fn is_status_valid(&self) -> bool {
        self.status.as_deref() == Some("valid")
    }
}
