use eyre::{eyre, WrapErr as _};
use pkcs8::DecodePrivateKey as _;

/// Account signing key plus the key ID (account URL) once the authority has assigned one.
#[derive(Clone, Debug)]
pub(crate) struct AcmeKey {
    signing_key: p256::ecdsa::SigningKey,
    key_id: Option<String>,
}

impl AcmeKey {
    pub(crate) fn from_pem(pem: &str) -> eyre::Result<AcmeKey> {
        let signing_key = p256::ecdsa::SigningKey::from_pkcs8_pem(pem)
            .context("Failed to read account key PEM")?;

        Ok(AcmeKey {
            signing_key,
            key_id: None,
        })
    }

    pub(crate) fn signing_key(&self) -> &p256::ecdsa::SigningKey {
        &self.signing_key
    }

    pub(crate) fn key_id(&self) -> eyre::Result<&str> {
        self.key_id
            .as_deref()
            .ok_or_else(|| eyre!("account key has no key ID; register the account first"))
    }

    /// Keeps a known key ID; empty strings are treated as unknown.
    pub(crate) fn set_key_id(&mut self, kid: impl Into<String>) {
        let kid = kid.into();
        self.key_id = (!kid.is_empty()).then_some(kid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_pkcs8_pem() {
        let signing_key = crate::create_p256_key();
        let pem = crate::cert::signing_key_to_pem(&signing_key).unwrap();

        let key = AcmeKey::from_pem(&pem).unwrap();
        assert_eq!(key.signing_key(), &signing_key);
        assert!(AcmeKey::from_pem("not a key").is_err());
    }

    #[test]
    fn key_id_required_before_use() {
        let pem = crate::cert::signing_key_to_pem(&crate::create_p256_key()).unwrap();
        let mut key = AcmeKey::from_pem(&pem).unwrap();
        assert!(key.key_id().is_err());

        key.set_key_id("");
        assert!(key.key_id().is_err());

        key.set_key_id("https://ca.example/acme/acct/1");
        assert_eq!(key.key_id().unwrap(), "https://ca.example/acme/acct/1");
    }
}
