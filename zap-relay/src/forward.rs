//! Outbound HTTP legs for relayed requests.

use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Response from a relay destination, normalized for recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardReply {
    /// Terminal HTTP status, or 500 when the call failed outright.
    pub code: u16,
    /// Response body, or the transport error text.
    pub body: String,
}

/// HTTP client for the relay legs.
///
/// Destinations can sit behind redirecting front-ends (Apps Script
/// answers a webhook POST with a 302 to the result document), so the
/// client follows redirects and reports the terminal response. Every
/// failure is folded into a [`ForwardReply`]; [`ForwardClient::post`]
/// itself never errors. One attempt per call: retrying is the
/// station's job, driven by the status code it gets back.
#[derive(Debug, Clone)]
pub struct ForwardClient {
    client: reqwest::Client,
}

impl ForwardClient {
    /// Build a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// POST a form-encoded body to `url` and normalize the outcome.
    ///
    /// Transport failures (DNS, refused connection, timeout, TLS) come
    /// back as a synthetic 500 carrying the error description. A 200
    /// whose body mentions "error" is downgraded to 500 with the body
    /// kept: a misconfigured Apps Script destination reports failures
    /// inside a 200 HTML page, and stations only retry on non-200.
    pub async fn post(&self, url: &str, body: String) -> ForwardReply {
        let result = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await;

        let mut reply = match result {
            Ok(response) => {
                let code = response.status().as_u16();
                match response.text().await {
                    Ok(body) => ForwardReply { code, body },
                    Err(e) => ForwardReply {
                        code: 500,
                        body: e.to_string(),
                    },
                }
            }
            Err(e) => ForwardReply {
                code: 500,
                body: e.to_string(),
            },
        };

        if reply.code == 200 && reply.body.contains("error") {
            reply.code = 500;
        }

        reply
    }
}
