//! Network actions: `fetch_web`, `call_api`, `call_mcp`. All three resolve credentials
//! by name through `ActionContext::resolve_secret` rather than taking raw secrets as
//! action params — the Validator never sees a credential value.

use conclave_core::Error;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;

fn client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("reqwest client builds with static config")
}

/// Fetches a URL and returns its body as text (markdown conversion is left to the
/// caller's answer_engine / model layer — this is the opaque fetch primitive).
pub async fn fetch_web(url: &str, method: Option<&str>) -> conclave_core::Result<String> {
    let method = method.unwrap_or("GET");
    let request = client()
        .request(
            method.parse().map_err(|_| Error::InvalidEnum { param: "method".into(), value: method.into() })?,
            url,
        )
        .build()
        .map_err(|e| Error::RequestFailed(e.to_string()))?;

    let response = client().execute(request).await.map_err(classify)?;
    response.text().await.map_err(|e| Error::RequestFailed(e.to_string()))
}

/// Calls an HTTP API, resolving an optional bearer credential the caller already
/// looked up by name via `ActionContext::resolve_secret`.
pub async fn call_api(
    url: &str,
    method: Option<&str>,
    headers: &BTreeMap<String, String>,
    body: Option<&str>,
    bearer: Option<&str>,
) -> conclave_core::Result<String> {
    let method = method.unwrap_or("GET");
    let mut builder = client().request(
        method.parse().map_err(|_| Error::InvalidEnum { param: "method".into(), value: method.into() })?,
        url,
    );
    for (k, v) in headers {
        builder = builder.header(k, v);
    }
    if let Some(token) = bearer {
        builder = builder.bearer_auth(token);
    }
    if let Some(b) = body {
        builder = builder.body(b.to_string());
    }

    let response = builder.send().await.map_err(classify)?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(Error::RequestFailed(format!("{status}: {text}")));
    }
    Ok(text)
}

/// Placeholder MCP call surface: the concrete transport (stdio/http connection) is an
/// out-of-scope collaborator (spec §1); this resolves to a stable error until one is
/// wired in, keeping the action's shape stable for the Router/Validator.
pub async fn call_mcp(tool: &str, _args: &BTreeMap<String, String>) -> conclave_core::Result<String> {
    Err(Error::ServiceUnavailable(format!("no MCP transport configured for tool '{tool}'")))
}

fn classify(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::RequestTimeout
    } else if e.is_connect() {
        Error::ConnectionRefused
    } else {
        Error::RequestFailed(e.to_string())
    }
}

