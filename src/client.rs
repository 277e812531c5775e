use std::time::Duration;

use eyre::eyre;

use crate::{
    acc::{AcmeKey, Account},
    dir::{Directory, RegisterError},
    error::RegistrationError,
    order::CsrOrder,
};

/// Account as registered with the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredAccount {
    /// Account URL, used as the key ID of later requests.
    pub key_id: String,
}

/// Certificate authority operations the provisioning flow depends on.
#[allow(async_fn_in_trait)]
pub trait Client {
    /// Authority-side certificate request, consumed by [`certificate`](Client::certificate).
    type Order;

    /// Registers the account, or confirms an existing registration.
    ///
    /// Fails with [`RegistrationError::TermsNotAccepted`] when the authority requires terms
    /// other than `accepted_terms`.
    async fn ensure_registration(
        &mut self,
        accepted_terms: &str,
        key_id: &str,
    ) -> Result<RegisteredAccount, RegistrationError>;

    /// Domain the authority currently assigns to the registered account.
    async fn domain(&mut self) -> eyre::Result<String>;

    /// Creates an order for `domain` and completes its authorization.
    async fn provision_domain(&mut self, domain: &str) -> eyre::Result<Self::Order>;

    /// Finalizes `order` with a CSR signed by `key` and returns the issued chain as DER,
    /// leaf first.
    async fn certificate(
        &mut self,
        order: Self::Order,
        key: &p256::ecdsa::SigningKey,
    ) -> eyre::Result<Vec<Vec<u8>>>;
}

/// [`Client`] talking to a localcert authority over ACME.
#[derive(Debug)]
pub struct AcmeClient {
    directory_url: String,
    acme_key: AcmeKey,
    poll_delay: Duration,
    directory: Option<Directory>,
    account: Option<Account>,
}

impl AcmeClient {
    /// Client for the directory at `directory_url`, signing with the PKCS#8 PEM account key.
    pub fn new(directory_url: impl Into<String>, account_key_pem: &str) -> eyre::Result<Self> {
        Ok(AcmeClient {
            directory_url: directory_url.into(),
            acme_key: AcmeKey::from_pem(account_key_pem)?,
            poll_delay: Duration::from_secs(5),
            directory: None,
            account: None,
        })
    }

    /// Wait between polls of authorization and order status.
    pub fn with_poll_delay(mut self, poll_delay: Duration) -> Self {
        self.poll_delay = poll_delay;
        self
    }

    async fn directory(&mut self) -> eyre::Result<&Directory> {
        if self.directory.is_none() {
            self.directory = Some(Directory::fetch(&self.directory_url).await?);
        }

        self.directory
            .as_ref()
            .ok_or_else(|| eyre!("directory unavailable"))
    }

    fn account(&self) -> eyre::Result<&Account> {
        self.account
            .as_ref()
            .ok_or_else(|| eyre!("account is not registered"))
    }
}

impl Client for AcmeClient {
    type Order = CsrOrder;

    async fn ensure_registration(
        &mut self,
        accepted_terms: &str,
        key_id: &str,
    ) -> Result<RegisteredAccount, RegistrationError> {
        let acme_key = self.acme_key.clone();
        let directory = self.directory().await?;

        let account = match directory.register(acme_key, accepted_terms, key_id).await {
            Ok(account) => account,
            Err(RegisterError::Terms(uri)) => {
                return Err(RegistrationError::TermsNotAccepted { uri })
            }
            Err(RegisterError::Other(err)) => return Err(RegistrationError::Other(err)),
        };

        let key_id = account.key_id()?.to_owned();
        self.account = Some(account);

        Ok(RegisteredAccount { key_id })
    }

    async fn domain(&mut self) -> eyre::Result<String> {
        self.account()?.assigned_domain().await
    }

    async fn provision_domain(&mut self, domain: &str) -> eyre::Result<CsrOrder> {
        let account = self.account()?;

        let order = account.new_order(domain).await?;
        order.authorize(account, self.poll_delay).await
    }

    async fn certificate(
        &mut self,
        order: CsrOrder,
        key: &p256::ecdsa::SigningKey,
    ) -> eyre::Result<Vec<Vec<u8>>> {
        let order = order.finalize(key, self.poll_delay).await?;
        order.download_chain().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cert::{signing_key_to_pem, CertificateInfo},
        create_p256_key,
        test::{with_directory_server, ServerOptions},
    };

    fn client(dir_url: &str) -> AcmeClient {
        let pem = signing_key_to_pem(&create_p256_key()).unwrap();
        AcmeClient::new(dir_url, &pem)
            .unwrap()
            .with_poll_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn full_issuance() {
        let server = with_directory_server(ServerOptions::default());
        let mut client = client(&server.dir_url);

        let account = client.ensure_registration("", "").await.unwrap();
        assert!(account.key_id.ends_with("/acme/acct/7728515"));

        let domain = client.domain().await.unwrap();
        assert_eq!(domain, "abc123.example");

        let order = client.provision_domain(&domain).await.unwrap();
        let chain = client.certificate(order, &create_p256_key()).await.unwrap();

        assert_eq!(chain, server.chain());
        let leaf = CertificateInfo::from_der(&chain[0]).unwrap();
        assert_eq!(leaf.common_name, "abc123.example");
    }

    #[tokio::test]
    async fn terms_mismatch_is_tagged() {
        let server = with_directory_server(ServerOptions::with_terms("https://ca.example/tos/2"));
        let mut client = client(&server.dir_url);

        match client.ensure_registration("", "").await {
            Err(RegistrationError::TermsNotAccepted { uri }) => {
                assert_eq!(uri, "https://ca.example/tos/2")
            }
            other => panic!("expected terms error, got {other:?}"),
        }

        client
            .ensure_registration("https://ca.example/tos/2", "")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn domain_requires_registration() {
        let server = with_directory_server(ServerOptions::default());
        let mut client = client(&server.dir_url);

        assert!(client.domain().await.is_err());
    }

    #[tokio::test]
    async fn unreachable_directory_is_other_error() {
        let mut client = client("http://127.0.0.1:9/directory");

        assert!(matches!(
            client.ensure_registration("", "").await,
            Err(RegistrationError::Other(_)),
        ));
    }
}
