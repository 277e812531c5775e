use serde::{Deserialize, Serialize};

use crate::api;

/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

/// Request for a certificate, tracked from creation through to issuance.
///
/// See [RFC 8555 §7.1.3].
///
/// [RFC 8555 §7.1.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.3
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,

    pub identifiers: Vec<Identifier>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<api::Problem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizations: Option<Vec<String>>,

    #[serde(skip_serializing)]
    pub finalize: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

impl Order {
    /// newOrder payload for a single DNS name.
    pub(crate) fn for_domain(domain: &str) -> Self {
        Order {
            identifiers: vec![Identifier::dns(domain)],
            ..Default::default()
        }
    }

    pub fn is_status(&self, status: OrderStatus) -> bool {
        self.status == Some(status)
    }

    /// Returns all domains associated with this order.
    pub fn domains(&self) -> Vec<&str> {
        self.identifiers
            .iter()
            .map(|identifier| identifier.value.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub _type: String,
    pub value: String,
}

impl Identifier {
    pub(crate) fn dns(value: &str) -> Self {
        Identifier {
            _type: "dns".to_owned(),
            value: value.to_owned(),
        }
    }
}

/// Order finalization payload; `csr` is the base64url-encoded DER of the request.
///
/// See [RFC 8555 §7.4].
///
/// [RFC 8555 §7.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalize {
    pub csr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_order_payload_has_single_identifier() {
        let json = serde_json::to_value(Order::for_domain("abc123.example")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "identifiers": [{ "type": "dns", "value": "abc123.example" }]
            }),
        );
    }

    #[test]
    fn parses_processing_order() {
        let order: Order = serde_json::from_str(
            r#"{
                "status": "processing",
                "identifiers": [{ "type": "dns", "value": "abc123.example" }],
                "finalize": "https://ca.example/acme/finalize/1"
            }"#,
        )
        .unwrap();

        assert!(order.is_status(OrderStatus::Processing));
        assert_eq!(order.domains(), ["abc123.example"]);
        assert!(order.certificate.is_none());
    }
}
