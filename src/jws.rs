//! Flattened JWS request bodies, see [RFC 8555 §6.2].
//!
//! [RFC 8555 §6.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.2

use base64::prelude::*;
use eyre::eyre;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::acc::AcmeKey;

/// Protected header. Exactly one of `jwk` (newAccount only) or `kid` (everything else) is set.
#[derive(Debug, Serialize, Deserialize, Default)]
pub(crate) struct JwsProtectedHeader {
    alg: String,
    nonce: String,
    url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,

    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
}

impl JwsProtectedHeader {
    pub(crate) fn new_jwk(jwk: Jwk, url: &str, nonce: String) -> Self {
        JwsProtectedHeader {
            alg: "ES256".to_owned(),
            url: url.to_owned(),
            nonce,
            jwk: Some(jwk),
            ..Default::default()
        }
    }

    pub(crate) fn new_kid(kid: &str, url: &str, nonce: String) -> Self {
        JwsProtectedHeader {
            alg: "ES256".to_owned(),
            url: url.to_owned(),
            nonce,
            kid: Some(kid.to_owned()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct Jwk {
    alg: String,
    crv: String,
    kty: String,
    #[serde(rename = "use")]
    _use: String,
    x: String,
    y: String,
}

impl TryFrom<&AcmeKey> for Jwk {
    type Error = eyre::Error;

    fn try_from(key: &AcmeKey) -> eyre::Result<Self> {
        let point = key.signing_key().verifying_key().to_encoded_point(false);

        let (x, y) = point
            .x()
            .zip(point.y())
            .ok_or_else(|| eyre!("account public key is the identity point"))?;

        Ok(Jwk {
            alg: "ES256".to_owned(),
            kty: "EC".to_owned(),
            crv: "P-256".to_owned(),
            _use: "sig".to_owned(),
            x: BASE64_URL_SAFE_NO_PAD.encode(x),
            y: BASE64_URL_SAFE_NO_PAD.encode(y),
        })
    }
}

/// Thumbprint input ([RFC 7638]); fields must stay in lexical order.
///
/// [RFC 7638]: https://datatracker.ietf.org/doc/html/rfc7638
#[derive(Debug, Serialize)]
struct JwkThumb<'a> {
    crv: &'a str,
    kty: &'a str,
    x: &'a str,
    y: &'a str,
}

/// Key authorization for `token`, hashed for use as a `dns-01` TXT value.
///
/// See [RFC 8555 §8.4](https://datatracker.ietf.org/doc/html/rfc8555#section-8.4).
pub(crate) fn dns_proof(token: &str, key: &AcmeKey) -> eyre::Result<String> {
    let jwk = Jwk::try_from(key)?;
    let thumb = serde_json::to_string(&JwkThumb {
        crv: &jwk.crv,
        kty: &jwk.kty,
        x: &jwk.x,
        y: &jwk.y,
    })?;

    let thumbprint = BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(thumb));
    let key_auth = format!("{token}.{thumbprint}");

    Ok(BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(key_auth)))
}

/// <https://datatracker.ietf.org/doc/html/rfc7515#section-7.2.2>
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FlattenedJsonJws {
    protected: String,
    payload: String,
    signature: String,
}

/// Signs `payload` under `protected` and returns the serialized flattened JWS.
pub(crate) fn sign<T: Serialize + ?Sized>(
    protected: JwsProtectedHeader,
    key: &AcmeKey,
    payload: &T,
) -> eyre::Result<String> {
    let protected = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_string(&protected)?);

    let payload = match serde_json::to_value(payload)? {
        // POST-as-GET carries an empty payload, not an encoded empty string
        serde_json::Value::String(s) if s.is_empty() => String::new(),
        value => BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_string(&value)?),
    };

    let signing_input = format!("{protected}.{payload}");
    let signature: p256::ecdsa::Signature =
        ecdsa::signature::Signer::try_sign(key.signing_key(), signing_input.as_bytes())?;
    let signature = BASE64_URL_SAFE_NO_PAD.encode(signature.to_bytes());

    Ok(serde_json::to_string(&FlattenedJsonJws {
        protected,
        payload,
        signature,
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api;

    fn key() -> AcmeKey {
        let pem = crate::cert::signing_key_to_pem(&crate::create_p256_key()).unwrap();
        AcmeKey::from_pem(&pem).unwrap()
    }

    #[test]
    fn post_as_get_has_empty_payload() {
        let key = key();
        let protected = JwsProtectedHeader::new_kid("kid", "https://ca.example/x", "n".to_owned());
        let jws = sign(protected, &key, &api::EmptyString).unwrap();
        let jws: FlattenedJsonJws = serde_json::from_str(&jws).unwrap();

        assert!(jws.payload.is_empty());
        assert!(!jws.signature.is_empty());
    }

    #[test]
    fn dns_proof_is_stable_per_key() {
        let key = key();
        let first = dns_proof("token", &key).unwrap();

        assert_eq!(first, dns_proof("token", &key).unwrap());
        assert_ne!(first, dns_proof("other-token", &key).unwrap());
        // base64url of a SHA-256 digest
        assert_eq!(first.len(), 43);
    }
}
