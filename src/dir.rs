use std::sync::Arc;

use crate::{
    acc::{AcmeKey, Account},
    api,
    req::{req_expect_header, req_get, req_handle_error},
    trans::{NoncePool, Transport},
};

/// Why a newAccount request did not produce an account.
#[derive(Debug)]
pub(crate) enum RegisterError {
    /// The authority wants the terms document at this URL agreed to first.
    Terms(String),
    Other(eyre::Report),
}

impl From<api::Problem> for RegisterError {
    fn from(problem: api::Problem) -> Self {
        match problem.instance.as_deref() {
            Some(uri) if problem.is_user_action_required() => RegisterError::Terms(uri.to_owned()),
            _ => RegisterError::Other(problem.into()),
        }
    }
}

impl From<eyre::Report> for RegisterError {
    fn from(err: eyre::Report) -> Self {
        RegisterError::Other(err)
    }
}

/// Entry point for talking to the authority.
#[derive(Clone, Debug)]
pub(crate) struct Directory {
    nonce_pool: Arc<NoncePool>,
    api_directory: api::Directory,
}

impl Directory {
    pub(crate) async fn fetch(url: &str) -> eyre::Result<Directory> {
        log::debug!("Fetching directory {url}");
        let res = req_handle_error(req_get(url).await?).await?;
        let api_directory = res.json::<api::Directory>().await?;
        let nonce_pool = Arc::new(NoncePool::new(&api_directory.new_nonce));

        Ok(Directory {
            nonce_pool,
            api_directory,
        })
    }

    /// Registers `acme_key`, or looks up its existing account, agreeing to the current terms.
    ///
    /// Terms advertised by the directory that differ from `accepted_terms` are reported
    /// without contacting newAccount. A key that already has an account gets the same
    /// `Location` back, so this is safe to repeat.
    pub(crate) async fn register(
        &self,
        mut acme_key: AcmeKey,
        accepted_terms: &str,
        key_id: &str,
    ) -> Result<Account, RegisterError> {
        if let Some(tos) = self.api_directory.terms_of_service() {
            if tos != accepted_terms {
                log::debug!("Terms {tos:?} not yet accepted (have {accepted_terms:?})");
                return Err(RegisterError::Terms(tos.to_owned()));
            }
        }

        acme_key.set_key_id(key_id);

        let mut transport = Transport::new(Arc::clone(&self.nonce_pool), acme_key);
        let res = transport
            .call_jwk(&self.api_directory.new_account, &api::Account::agreeing_to_terms())
            .await?;

        let kid = req_expect_header(&res, "location")?;
        log::debug!("Key ID is: {kid}");

        if !key_id.is_empty() && key_id != kid {
            log::warn!("Authority returned key ID {kid} instead of the recorded {key_id}");
        }

        let api_account = res
            .json::<api::Account>()
            .await
            .map_err(eyre::Report::from)?;

        if api_account.status.is_some() && !api_account.is_status_valid() {
            return Err(eyre::eyre!("account {kid} has status {:?}", api_account.status).into());
        }

        transport.set_key_id(kid);

        Ok(Account::new(
            transport,
            api_account,
            self.api_directory.clone(),
        ))
    }
}
