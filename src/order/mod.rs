//! Order life cycle.
//!
//! Each stage of an order is its own façade over the [`api::Order`], so only the actions valid
//! for that stage are available:
//!
//! [`NewOrder`] -> (DNS authorization) -> [`CsrOrder`] -> [`CertOrder`] -> certificate chain

use std::{sync::Arc, time::Duration};

use base64::prelude::*;
use der::Encode as _;
use eyre::eyre;

use crate::{
    acc::{Account, AccountInner},
    api::{self, OrderStatus},
    cert,
};

mod auth;

use self::auth::Auth;

/// Upper bound on status polls of a single authorization or order.
pub(crate) const MAX_POLLS: usize = 120;

#[derive(Debug)]
pub(crate) struct Order {
    inner: Arc<AccountInner>,
    api_order: api::Order,
    url: String,
}

impl Order {
    pub(crate) fn new(inner: &Arc<AccountInner>, api_order: api::Order, url: String) -> Self {
        Order {
            inner: Arc::clone(inner),
            api_order,
            url,
        }
    }

    /// POST-as-GET of the order URL.
    async fn refresh(&mut self) -> eyre::Result<()> {
        let res = self
            .inner
            .transport
            .call_kid(&self.url, &api::EmptyString)
            .await?;

        self.api_order = res.json::<api::Order>().await?;
        Ok(())
    }

    /// Refreshes until the order is out of `status`, returning the final status.
    async fn wait_while(
        &mut self,
        status: OrderStatus,
        delay: Duration,
    ) -> eyre::Result<Option<OrderStatus>> {
        for _ in 0..MAX_POLLS {
            self.refresh().await?;

            if !self.api_order.is_status(status) {
                return Ok(self.api_order.status);
            }

            tokio::time::sleep(delay).await;
        }

        Err(eyre!("order stayed in status {status:?}"))
    }

    fn unexpected_status(&self) -> eyre::Report {
        match &self.api_order.error {
            Some(problem) => eyre!(
                "Order is in status {:?}: {problem}",
                self.api_order.status,
            ),
            None => eyre!("Order is in status {:?}", self.api_order.status),
        }
    }
}

/// Freshly created order whose domain may still need authorizing.
#[derive(Debug)]
pub struct NewOrder {
    pub(crate) order: Order,
}

impl NewOrder {
    #[cfg(test)]
    pub(crate) fn api_order(&self) -> &api::Order {
        &self.order.api_order
    }

    /// Proves control of the order's domain and waits for the order to become ready.
    pub(crate) async fn authorize(
        mut self,
        account: &Account,
        delay: Duration,
    ) -> eyre::Result<CsrOrder> {
        let auth_urls = self
            .order
            .api_order
            .authorizations
            .clone()
            .unwrap_or_default();

        for auth_url in &auth_urls {
            let auth = Auth::fetch(&self.order.inner, auth_url).await?;

            if auth.need_challenge() {
                auth.solve_dns(account, delay).await?;
            } else {
                log::debug!("{} is already authorized", auth.domain_name());
            }
        }

        match self.order.wait_while(OrderStatus::Pending, delay).await? {
            Some(OrderStatus::Ready) => Ok(CsrOrder { order: self.order }),
            _ => Err(self.order.unexpected_status()),
        }
    }
}

/// Order ready for its CSR.
#[derive(Debug)]
pub struct CsrOrder {
    pub(crate) order: Order,
}

impl CsrOrder {
    /// Submits a CSR for the order's domain signed by `signing_key`, then waits for issuance.
    pub(crate) async fn finalize(
        mut self,
        signing_key: &p256::ecdsa::SigningKey,
        delay: Duration,
    ) -> eyre::Result<CertOrder> {
        let domains = self.order.api_order.domains();
        let csr = cert::create_csr(signing_key, &domains)?;

        // base64url of the DER, not PEM
        let finalize = api::Finalize {
            csr: BASE64_URL_SAFE_NO_PAD.encode(csr.to_der()?),
        };

        self.order
            .inner
            .transport
            .call_kid(&self.order.api_order.finalize, &finalize)
            .await?;

        match self.order.wait_while(OrderStatus::Processing, delay).await? {
            Some(OrderStatus::Valid) => Ok(CertOrder { order: self.order }),
            _ => Err(self.order.unexpected_status()),
        }
    }
}

/// Order with an issued certificate ready to download.
#[derive(Debug)]
pub struct CertOrder {
    order: Order,
}

impl CertOrder {
    /// Downloads the issued chain, leaf first, as DER entries.
    pub(crate) async fn download_chain(self) -> eyre::Result<Vec<Vec<u8>>> {
        let url = self
            .order
            .api_order
            .certificate
            .as_deref()
            .ok_or_else(|| eyre!("valid order has no certificate URL"))?;

        let res = self
            .order
            .inner
            .transport
            .call_kid(url, &api::EmptyString)
            .await?;

        let pem_chain = res.text().await?;
        let chain = cert::decode_pem_chain(pem_chain.as_bytes())?;

        if chain.is_empty() {
            return Err(eyre!("authority returned an empty certificate chain"));
        }

        Ok(chain)
    }
}
