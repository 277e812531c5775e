use std::{sync::Arc, time::Duration};

use eyre::eyre;

use crate::{
    acc::{Account, AccountInner},
    api, jws,
    order::MAX_POLLS,
};

/// Authorization for the domain of an order, solved through the authority's DNS.
#[derive(Debug)]
pub(crate) struct Auth {
    inner: Arc<AccountInner>,
    api_auth: api::Authorization,
    auth_url: String,
}

impl Auth {
    pub(crate) async fn fetch(inner: &Arc<AccountInner>, auth_url: &str) -> eyre::Result<Self> {
        let api_auth = inner
            .transport
            .call_kid(auth_url, &api::EmptyString)
            .await?
            .json::<api::Authorization>()
            .await?;

        Ok(Auth {
            inner: Arc::clone(inner),
            api_auth,
            auth_url: auth_url.to_owned(),
        })
    }

    pub(crate) fn domain_name(&self) -> &str {
        &self.api_auth.identifier.value
    }

    /// The authority may remember a recent proof for this account, in which case the
    /// authorization is already valid.
    pub(crate) fn need_challenge(&self) -> bool {
        !matches!(self.api_auth.status, api::AuthorizationStatus::Valid)
    }

    /// Publishes the `dns-01` proof through the authority and waits for it to be checked.
    pub(crate) async fn solve_dns(&self, account: &Account, delay: Duration) -> eyre::Result<()> {
        let challenge = self
            .api_auth
            .dns_challenge()
            .ok_or_else(|| eyre!("no dns-01 challenge offered for {}", self.domain_name()))?;

        let proof = jws::dns_proof(&challenge.token, self.inner.transport.acme_key())?;
        account
            .publish_dns_record(self.domain_name(), proof)
            .await?;

        if matches!(challenge.status, api::ChallengeStatus::Pending) {
            self.inner
                .transport
                .call_kid(&challenge.url, &api::EmptyObject)
                .await?;
        }

        let auth = self.poll_result(delay).await?;

        if !matches!(auth.status, api::AuthorizationStatus::Valid) {
            let reason = match auth.challenge_error() {
                Some(error) => format!("{error} (subproblems: {:?})", error.subproblems),
                None => "Validation failed and no error found".to_owned(),
            };

            return Err(eyre!("Validation of {} failed: {reason}", self.domain_name()));
        }

        Ok(())
    }

    /// Polls the authorization until it leaves the pending state.
    async fn poll_result(&self, delay: Duration) -> eyre::Result<api::Authorization> {
        for _ in 0..MAX_POLLS {
            let auth = self
                .inner
                .transport
                .call_kid(&self.auth_url, &api::EmptyString)
                .await?
                .json::<api::Authorization>()
                .await?;

            if !matches!(auth.status, api::AuthorizationStatus::Pending) {
                return Ok(auth);
            }

            tokio::time::sleep(delay).await;
        }

        Err(eyre!("authorization for {} stayed pending", self.domain_name()))
    }
}
