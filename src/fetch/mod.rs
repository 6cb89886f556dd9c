mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use crate::error::Error;
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;

/// Longest slice of an error body copied into an error message.
const BODY_SNIPPET_LEN: usize = 200;

/// POSTs to `url` and decodes the reply as JSON.
///
/// When `form` is given it is sent as an `application/x-www-form-urlencoded`
/// body, pairs in order; repeated names are kept as repeated fields.
///
/// # Errors
///
/// [`Error::UpstreamUnavailable`] for transport failures and non-2xx statuses,
/// [`Error::MalformedResponse`] when the body is not JSON.
pub async fn post_json<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    form: Option<&[(String, String)]>,
) -> Result<Value, Error> {
    let parsed = url
        .parse()
        .map_err(|e| Error::UpstreamUnavailable(format!("invalid url '{url}': {e}")))?;
    let mut req = reqwest::Request::new(Method::POST, parsed);
    req.headers_mut()
        .insert(ACCEPT, HeaderValue::from_static("application/json"));

    if let Some(pairs) = form {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        req.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        *req.body_mut() = Some(body.into());
    }

    let resp = client
        .execute(req)
        .await
        .map_err(|e| Error::UpstreamUnavailable(format!("request to {url} failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
        let snippet: String = body.chars().take(BODY_SNIPPET_LEN).collect();
        return Err(Error::UpstreamUnavailable(format!(
            "{url} returned status {status}: {snippet}"
        )));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| Error::UpstreamUnavailable(format!("reading body from {url} failed: {e}")))?;
    debug!(url, bytes = bytes.len(), "Upstream body received");

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedResponse(format!("{url} returned invalid JSON: {e}")))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::HttpClient;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A request as seen by [`CannedClient`].
    #[derive(Debug, Clone)]
    pub struct SeenRequest {
        pub method: String,
        pub url: String,
        pub content_type: Option<String>,
        pub body: Option<String>,
    }

    /// Answers requests in order from a queue of `(status, body)` pairs.
    #[derive(Default)]
    pub struct CannedClient {
        replies: Mutex<VecDeque<(u16, String)>>,
        pub seen: Mutex<Vec<SeenRequest>>,
    }

    impl CannedClient {
        pub fn new(replies: &[(u16, &str)]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|(s, b)| (*s, b.to_string())).collect()),
                seen: Mutex::default(),
            }
        }

        pub fn requests(&self) -> Vec<SeenRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for CannedClient {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.seen.lock().unwrap().push(SeenRequest {
                method: req.method().to_string(),
                url: req.url().to_string(),
                content_type: req
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                body: req
                    .body()
                    .and_then(|b| b.as_bytes())
                    .map(|b| String::from_utf8_lossy(b).into_owned()),
            });

            let (status, body) = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((404, String::new()));
            let resp = http::Response::builder().status(status).body(body).unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CannedClient;
    use super::*;
    use async_trait::async_trait;

    /// Replies with a status whose body fails partway through reading.
    struct BrokenBodyClient(u16);

    #[async_trait]
    impl HttpClient for BrokenBodyClient {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let chunks = vec![Err::<Vec<u8>, std::io::Error>(std::io::Error::other(
                "connection reset",
            ))];
            let body = reqwest::Body::wrap_stream(futures::stream::iter(chunks));
            let resp = http::Response::builder().status(self.0).body(body).unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    #[tokio::test]
    async fn test_post_json_decodes_body() {
        let client = CannedClient::new(&[(200, r#"{"routes": []}"#)]);
        let value = post_json(&client, "http://upstream/base", None).await.unwrap();
        assert_eq!(value["routes"], serde_json::json!([]));

        let seen = client.requests();
        assert_eq!(seen[0].method, "POST");
        assert!(seen[0].body.is_none());
    }

    #[tokio::test]
    async fn test_form_pairs_are_repeated_in_order() {
        let client = CannedClient::new(&[(200, "[]")]);
        let form = vec![
            ("routeKeys[]".to_string(), "R1".to_string()),
            ("routeKeys[]".to_string(), "R2".to_string()),
        ];
        post_json(&client, "http://upstream/paths", Some(form.as_slice()))
            .await
            .unwrap();

        let seen = client.requests();
        assert_eq!(
            seen[0].content_type.as_deref(),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(
            seen[0].body.as_deref(),
            Some("routeKeys%5B%5D=R1&routeKeys%5B%5D=R2")
        );
    }

    #[tokio::test]
    async fn test_server_error_is_upstream_unavailable() {
        let client = CannedClient::new(&[(500, "boom")]);
        let err = post_json(&client, "http://upstream/base", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "upstream_unavailable");
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_unreadable_error_body_is_reported() {
        let err = post_json(&BrokenBodyClient(502), "http://upstream/base", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "upstream_unavailable");
        let message = err.to_string();
        assert!(message.contains("502"));
        assert!(message.contains("<unreadable body:"));
    }

    #[tokio::test]
    async fn test_non_json_is_malformed_response() {
        let client = CannedClient::new(&[(200, "<html>maintenance</html>")]);
        let err = post_json(&client, "http://upstream/base", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "malformed_response");
    }

    #[tokio::test]
    async fn test_bad_url_never_reaches_the_client() {
        let client = CannedClient::new(&[]);
        let err = post_json(&client, "not a url", None).await.unwrap_err();
        assert_eq!(err.code(), "upstream_unavailable");
        assert!(client.requests().is_empty());
    }
}
