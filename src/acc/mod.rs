use std::sync::Arc;

use eyre::{eyre, WrapErr as _};

use crate::{
    api,
    order::{NewOrder, Order},
    req::req_expect_header,
    trans::Transport,
};

mod acme_key;

pub(crate) use self::acme_key::AcmeKey;

#[derive(Debug)]
pub(crate) struct AccountInner {
    pub(crate) transport: Transport,
    pub(crate) api_account: api::Account,
    pub(crate) api_directory: api::Directory,
}

/// Registered account with the authority.
///
/// Created by [`Directory::register`](crate::dir::Directory::register); every request made
/// through it is signed with the account's key ID.
#[derive(Debug, Clone)]
pub(crate) struct Account {
    inner: Arc<AccountInner>,
}

impl Account {
    pub(crate) fn new(
        transport: Transport,
        api_account: api::Account,
        api_directory: api::Directory,
    ) -> Self {
        Account {
            inner: Arc::new(AccountInner {
                transport,
                api_account,
                api_directory,
            }),
        }
    }

    /// Account URL assigned by the authority.
    pub(crate) fn key_id(&self) -> eyre::Result<&str> {
        self.inner.transport.acme_key().key_id()
    }

    pub(crate) fn api_account(&self) -> &api::Account {
        &self.inner.api_account
    }

    /// Asks the authority which domain it currently assigns to this account.
    pub(crate) async fn assigned_domain(&self) -> eyre::Result<String> {
        let url = &self.inner.api_directory.localcert_domain;

        let res = self.inner.transport.call_kid(url, &api::EmptyString).await?;
        let assigned = res
            .json::<api::AssignedDomain>()
            .await
            .context("malformed domain lookup response")?;

        if assigned.domain.is_empty() {
            return Err(eyre!("authority did not assign a domain to this account"));
        }

        Ok(assigned.domain)
    }

    /// Has the authority serve `value` as the `dns-01` TXT record of `domain`.
    pub(crate) async fn publish_dns_record(&self, domain: &str, value: String) -> eyre::Result<()> {
        let url = &self.inner.api_directory.localcert_challenge;
        let record = api::ChallengeRecord {
            domain: domain.to_owned(),
            value,
        };

        log::debug!("Publishing challenge record for {domain}");
        self.inner.transport.call_kid(url, &record).await?;

        Ok(())
    }

    /// Creates a new order for a certificate covering only `domain`.
    ///
    /// Every call creates a fresh order with the authority.
    pub(crate) async fn new_order(&self, domain: &str) -> eyre::Result<NewOrder> {
        let order = api::Order::for_domain(domain);
        let new_order_url = self.inner.api_directory.new_order.as_str();

        let res = self.inner.transport.call_kid(new_order_url, &order).await?;
        let order_url = req_expect_header(&res, "location")?;
        let api_order = res.json::<api::Order>().await?;

        if api_order.domains() != [domain] {
            return Err(eyre!(
                "Order domain(s) mismatch: requested {domain:?} and got {:?}",
                api_order.domains(),
            ));
        }

        Ok(NewOrder {
            order: Order::new(&self.inner, api_order, order_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        dir::Directory,
        test::{account_key, with_directory_server, ServerOptions},
    };

    #[tokio::test]
    async fn looks_up_assigned_domain() {
        let server = with_directory_server(ServerOptions::default());
        let dir = Directory::fetch(&server.dir_url).await.unwrap();
        let acc = dir.register(account_key(), "", "").await.unwrap();

        assert_eq!(acc.assigned_domain().await.unwrap(), "abc123.example");
    }

    #[tokio::test]
    async fn creates_order_for_domain() {
        let server = with_directory_server(ServerOptions::default());
        let dir = Directory::fetch(&server.dir_url).await.unwrap();
        let acc = dir.register(account_key(), "", "").await.unwrap();

        let ord = acc.new_order("abc123.example").await.unwrap();
        assert_eq!(ord.api_order().domains(), ["abc123.example"]);
    }

    #[tokio::test]
    async fn rejects_order_for_other_domain() {
        let server = with_directory_server(ServerOptions::default());
        let dir = Directory::fetch(&server.dir_url).await.unwrap();
        let acc = dir.register(account_key(), "", "").await.unwrap();

        let err = acc.new_order("other.example").await.unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }
}
