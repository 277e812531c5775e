use std::path::Path;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::cert::CertificateInfo;

/// ACME account state kept between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    /// Account URL assigned at registration; empty until then.
    #[serde(default)]
    pub key_id: String,

    /// URL of the terms of service document the operator accepted; empty if none.
    #[serde(default)]
    pub accepted_terms: String,

    /// Account key, PKCS#8 PEM.
    pub private_key: Zeroizing<String>,
}

/// Persistent state of the provisioning flow.
pub trait Store {
    fn certificate_file(&self) -> &Path;

    fn key_file(&self) -> &Path;

    fn account_file(&self) -> &Path;

    fn account(&self) -> &AccountRecord;

    fn account_mut(&mut self) -> &mut AccountRecord;

    /// Leaf of the stored certificate chain, `None` when no certificate file exists.
    fn read_certificate(&self) -> eyre::Result<Option<CertificateInfo>>;

    /// Persists [`account`](Store::account) to the account file.
    fn write_account_file(&self) -> eyre::Result<()>;

    /// Certificate private key, generated and persisted first if there is none yet.
    fn read_or_generate_certificate_key(&self) -> eyre::Result<p256::ecdsa::SigningKey>;

    /// Replaces the certificate file with `contents` in a single write.
    fn write_certificate_file(&self, contents: &[u8]) -> eyre::Result<()>;

    /// Records the last known domain for other tooling.
    fn write_domain_file(&self, domain: &str) -> eyre::Result<()>;
}
