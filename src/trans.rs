use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use serde::Serialize;

use crate::{
    acc::AcmeKey,
    jws::{self, Jwk, JwsProtectedHeader},
    req::{req_expect_header, req_handle_error, req_head, req_post, ReqResult},
};

/// Upper bound on consecutive `badNonce` rejections before a request is given up on.
const MAX_NONCE_RETRIES: usize = 5;

/// Signs request bodies and keeps the nonce pool topped up.
///
/// The first request (newAccount) is signed with the full public key via [`call_jwk`]; its
/// `Location` header becomes the key ID used by [`call_kid`] for every later request.
///
/// [`call_jwk`]: Transport::call_jwk
/// [`call_kid`]: Transport::call_kid
#[derive(Clone, Debug)]
pub(crate) struct Transport {
    acme_key: AcmeKey,
    nonce_pool: Arc<NoncePool>,
}

impl Transport {
    pub(crate) fn new(nonce_pool: Arc<NoncePool>, acme_key: AcmeKey) -> Self {
        Transport {
            acme_key,
            nonce_pool,
        }
    }

    pub(crate) fn set_key_id(&mut self, kid: String) {
        self.acme_key.set_key_id(kid);
    }

    pub(crate) fn acme_key(&self) -> &AcmeKey {
        &self.acme_key
    }

    pub(crate) async fn call_jwk<T>(&self, url: &str, body: &T) -> ReqResult<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        self.do_call(url, body, |nonce, key| {
            let jwk = Jwk::try_from(key)?;
            Ok(JwsProtectedHeader::new_jwk(jwk, url, nonce))
        })
        .await
    }

    pub(crate) async fn call_kid<T>(&self, url: &str, body: &T) -> ReqResult<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        self.do_call(url, body, |nonce, key| {
            Ok(JwsProtectedHeader::new_kid(key.key_id()?, url, nonce))
        })
        .await
    }

    async fn do_call<T, F>(&self, url: &str, body: &T, header: F) -> ReqResult<reqwest::Response>
    where
        T: Serialize + ?Sized,
        F: Fn(String, &AcmeKey) -> eyre::Result<JwsProtectedHeader>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let nonce = self.nonce_pool.get_nonce().await?;

            let signed = header(nonce, &self.acme_key)
                .and_then(|protected| jws::sign(protected, &self.acme_key, body))
                .map_err(|err| crate::api::Problem::new("jwsSigningError", Some(err.to_string())))?;

            log::debug!("Call endpoint: {url}");

            let res = req_post(url, signed).await?;

            // errors carry fresh nonces too
            self.nonce_pool.extract_nonce(&res);

            match req_handle_error(res).await {
                Err(problem) if problem.is_bad_nonce() && attempt < MAX_NONCE_RETRIES => {
                    log::debug!("Retrying on bad nonce");
                }
                result => return result,
            }
        }
    }
}

/// Nonces handed out by the authority, reused across requests.
#[derive(Default, Debug)]
pub(crate) struct NoncePool {
    nonce_url: String,
    pool: Mutex<VecDeque<String>>,
}

impl NoncePool {
    pub(crate) fn new(nonce_url: &str) -> Self {
        NoncePool {
            nonce_url: nonce_url.to_owned(),
            ..Default::default()
        }
    }

    fn extract_nonce(&self, res: &reqwest::Response) {
        let Some(nonce) = res
            .headers()
            .get("replay-nonce")
            .and_then(|nonce| nonce.to_str().ok())
        else {
            return;
        };

        log::trace!("Extracting new nonce");

        let mut pool = self.pool.lock();
        pool.push_back(nonce.to_owned());

        if pool.len() > 10 {
            pool.pop_front();
        }
    }

    async fn get_nonce(&self) -> ReqResult<String> {
        if let Some(nonce) = self.pool.lock().pop_front() {
            log::trace!("Use previous nonce");
            return Ok(nonce);
        }

        log::debug!("Request new nonce");
        let res = req_head(&self.nonce_url).await?;
        req_expect_header(&res, "replay-nonce")
    }
}
