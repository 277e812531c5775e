use std::{sync::OnceLock, time::Duration};

use crate::api::Problem;

pub(crate) type ReqResult<T> = std::result::Result<T, Problem>;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Shared client; a builder failure is reported on every request rather than replaced by a
/// client without timeouts.
fn http_client() -> ReqResult<&'static reqwest::Client> {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    if let Some(client) = CLIENT.get() {
        return Ok(client);
    }

    let client = reqwest::Client::builder()
        .connect_timeout(TIMEOUT)
        .timeout(TIMEOUT)
        .user_agent(concat!("localcert/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| Problem::new("httpClientError", Some(err.to_string())))?;

    Ok(CLIENT.get_or_init(|| client))
}

/// Transport failures are folded into problems so callers handle a single error shape.
fn transport_problem(err: reqwest::Error) -> Problem {
    Problem::new("httpReqError", Some(err.to_string()))
}

pub(crate) async fn req_get(url: &str) -> ReqResult<reqwest::Response> {
    log::trace!("GET {url}");
    http_client()?.get(url).send().await.map_err(transport_problem)
}

pub(crate) async fn req_head(url: &str) -> ReqResult<reqwest::Response> {
    log::trace!("HEAD {url}");
    http_client()?.head(url).send().await.map_err(transport_problem)
}

pub(crate) async fn req_post(url: &str, body: String) -> ReqResult<reqwest::Response> {
    log::trace!("POST {url} {body}");
    http_client()?
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/jose+json")
        .body(body)
        .send()
        .await
        .map_err(transport_problem)
}

/// Passes 2xx responses through and turns everything else into a [`Problem`].
pub(crate) async fn req_handle_error(res: reqwest::Response) -> ReqResult<reqwest::Response> {
    if res.status().is_success() {
        return Ok(res);
    }

    let is_problem_json = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/problem+json"));

    let status = res.status();
    let body = req_safe_read_body(res).await;

    let problem = if is_problem_json {
        serde_json::from_str(&body).unwrap_or_else(|err| {
            Problem::new(
                "problemJsonFail",
                Some(format!(
                    "Failed to deserialize application/problem+json ({err}) body: {body}"
                )),
            )
        })
    } else {
        Problem::new("httpReqError", Some(format!("{status} body: {body}")))
    };

    Err(problem)
}

pub(crate) fn req_expect_header(res: &reqwest::Response, name: &str) -> ReqResult<String> {
    res.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
        .ok_or_else(|| Problem::new(format!("Missing header: {name}"), None))
}

pub(crate) async fn req_safe_read_body(res: reqwest::Response) -> String {
    // the body may be cut short by an abrupt TLS close even though we got all of it
    res.text().await.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_client_is_built_once() {
        let first = http_client().unwrap();
        let second = http_client().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_problem() {
        let problem = req_get("http://127.0.0.1:9/directory").await.unwrap_err();
        assert_eq!(problem._type, "httpReqError");
        assert!(problem.detail.is_some());
    }
}
