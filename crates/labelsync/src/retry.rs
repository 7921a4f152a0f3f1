// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Transport-level retry policy with URL-based classification.
//!
//! Requests fall into two scopes:
//!
//! - **Api**: calls to the configured server under `/api`. Client errors
//!   (4xx) are never retried so that authentication failures and dataset
//!   conflicts (HTTP 422) reach the caller on the first attempt. 408, 429,
//!   5xx and transport failures are retried.
//! - **FileIO**: image transfers to presigned storage URLs. These also retry
//!   409 Conflict and 423 Locked, which object stores return transiently.
//!
//! The retry count comes from [`Settings::max_retries`] (default 3).
//!
//! [`Settings::max_retries`]: crate::Settings

use url::Url;

/// Retry scope classification for URL-based retry policies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryScope {
    /// JSON API calls to the configured server.
    Api,
    /// Uploads to presigned storage URLs or any other host.
    FileIO,
}

/// Classifies `url` against the API host of `server`.
///
/// Only the host and port are compared, so a path that merely contains the
/// server name is not mistaken for an API call.
///
/// ```rust
/// use labelsync::{RetryScope, classify_url};
///
/// let server = "https://darwin.v7labs.com";
/// assert_eq!(classify_url(server, "https://darwin.v7labs.com/api/datasets"), RetryScope::Api);
/// assert_eq!(classify_url(server, "https://bucket.s3.amazonaws.com/cat.jpg"), RetryScope::FileIO);
/// ```
pub fn classify_url(server: &str, url: &str) -> RetryScope {
    let (Ok(server), Ok(parsed)) = (Url::parse(server), Url::parse(url)) else {
        return RetryScope::FileIO;
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return RetryScope::FileIO;
    }

    let host_matches = parsed.host_str().is_some()
        && parsed.host_str() == server.host_str()
        && parsed.port_or_known_default() == server.port_or_known_default();

    let path = parsed.path();
    let path_is_api = path == "/api" || path.starts_with("/api/");

    if host_matches && path_is_api {
        RetryScope::Api
    } else {
        RetryScope::FileIO
    }
}

/// Creates the reqwest retry policy for a client talking to `server`.
pub fn create_retry_policy(server: &str, max_retries: u32) -> reqwest::retry::Builder {
    let server = server.to_owned();

    reqwest::retry::for_host("*")
        .max_retries_per_request(max_retries)
        .classify_fn(move |req_rep| {
            let url = req_rep.uri().to_string();

            match classify_url(&server, &url) {
                RetryScope::Api => match req_rep.status() {
                    Some(status) => match status.as_u16() {
                        429 | 408 | 500..=599 => req_rep.retryable(),
                        _ => req_rep.success(),
                    },
                    None if req_rep.error().is_some() => req_rep.retryable(),
                    None => req_rep.success(),
                },
                RetryScope::FileIO => match req_rep.status() {
                    Some(status) => match status.as_u16() {
                        429 | 408 | 500..=599 | 409 | 423 => req_rep.retryable(),
                        _ => req_rep.success(),
                    },
                    None if req_rep.error().is_some() => req_rep.retryable(),
                    None => req_rep.success(),
                },
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER: &str = "https://darwin.v7labs.com";

    #[test]
    fn test_classify_url_api() {
        assert_eq!(
            classify_url(SERVER, "https://darwin.v7labs.com/api"),
            RetryScope::Api
        );
        assert_eq!(
            classify_url(SERVER, "https://darwin.v7labs.com/api/datasets"),
            RetryScope::Api
        );
        assert_eq!(
            classify_url(SERVER, "https://darwin.v7labs.com:443/api/users/token_info"),
            RetryScope::Api
        );
        assert_eq!(
            classify_url("http://localhost:8080", "http://localhost:8080/api/datasets?x=1"),
            RetryScope::Api
        );
    }

    #[test]
    fn test_classify_url_file_io() {
        assert_eq!(
            classify_url(SERVER, "https://bucket.s3.amazonaws.com/cat.jpg"),
            RetryScope::FileIO
        );
        assert_eq!(
            classify_url(SERVER, "https://darwin.v7labs.com/apis"),
            RetryScope::FileIO
        );
        assert_eq!(
            classify_url(SERVER, "https://evil.com/darwin.v7labs.com/api"),
            RetryScope::FileIO
        );
        assert_eq!(
            classify_url("http://localhost:8080", "http://localhost:9090/api"),
            RetryScope::FileIO
        );
        assert_eq!(classify_url(SERVER, "not a url"), RetryScope::FileIO);
    }
}
