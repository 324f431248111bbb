//! Shared utility functions for provider adapters.

use sa_domain::error::Error;

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Convert a non-2xx HTTP response into the domain [`Error`] type.
///
/// `401`/`403` map to [`Error::Authentication`] so the gateway's retry loop
/// treats them as fatal; everything else maps to [`Error::Provider`] and is
/// retried per its `is_retryable` classification.
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode, body: String) -> Error {
    if status.as_u16() == 401 || status.as_u16() == 403 {
        Error::Authentication(format!("{provider}: HTTP {} - {body}", status.as_u16()))
    } else {
        Error::Provider {
            provider: provider.to_string(),
            message: format!("HTTP {} - {body}", status.as_u16()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_reqwest_maps_non_timeout_to_http() {
        // reqwest::Error has no public constructor for non-timeout variants
        // outside of an actual request, so this exercises the happy path via
        // a real client against an invalid URL, which yields a builder/
        // connect error rather than a timeout.
        let err = reqwest::Client::new()
            .get("http://256.256.256.256/")
            .build()
            .unwrap_err();
        match from_reqwest(err) {
            Error::Http(_) => {}
            other => panic!("expected Error::Http, got {other:?}"),
        }
    }
}
