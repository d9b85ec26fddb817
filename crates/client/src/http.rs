//! Response helpers shared by the HTTP clients.

use reqwest::StatusCode;

use crate::error::ClientError;

/// Map a non-success status and its body to an error.
pub(crate) fn status_error(status: StatusCode, body: String) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Permissions {
            status: status.as_u16(),
        },
        _ => ClientError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

/// Return the response unchanged on success, or the classified error
/// carrying the status and body text.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(status_error(status, body));
    }
    Ok(response)
}

/// Parse a successful JSON response body into the expected type.
pub(crate) async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

/// Attach a bearer token when one is configured.
pub(crate) fn authorized(
    builder: reqwest::RequestBuilder,
    token: Option<&str>,
) -> reqwest::RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}
