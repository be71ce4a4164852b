//! CORS policy from `server.cors`.

use crate::config::CorsConfig;
use axum::http::{HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::warn;

/// How long browsers may cache a preflight answer.
const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

fn has_wildcard(items: &[String]) -> bool {
    items.iter().any(|item| item == "*")
}

/// Build the CORS layer.
///
/// Empty lists grant nothing. `*` grants anything; combined with
/// `allow_credentials` the request's own origin, method or headers are
/// echoed back instead, since browsers reject a literal `*` on credentialed
/// requests. Entries that are not valid header values are skipped with a
/// warning.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let credentials = config.allow_credentials;
    let mut layer = CorsLayer::new()
        .allow_credentials(credentials)
        .max_age(PREFLIGHT_MAX_AGE);

    if has_wildcard(&config.allow_origins) {
        layer = layer.allow_origin(if credentials {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::any()
        });
    } else {
        let origins: Vec<HeaderValue> = config
            .allow_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Skipping invalid CORS origin");
                    None
                }
            })
            .collect();
        if !origins.is_empty() {
            layer = layer.allow_origin(AllowOrigin::list(origins));
        }
    }

    if has_wildcard(&config.allow_methods) {
        layer = layer.allow_methods(if credentials {
            AllowMethods::mirror_request()
        } else {
            AllowMethods::any()
        });
    } else {
        let methods: Vec<Method> = config
            .allow_methods
            .iter()
            .filter_map(|method| {
                match Method::from_bytes(method.to_ascii_uppercase().as_bytes()) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(method = %method, "Skipping invalid CORS method");
                        None
                    }
                }
            })
            .collect();
        if !methods.is_empty() {
            layer = layer.allow_methods(AllowMethods::list(methods));
        }
    }

    if has_wildcard(&config.allow_headers) {
        layer = layer.allow_headers(if credentials {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::any()
        });
    } else {
        let headers: Vec<HeaderName> = config
            .allow_headers
            .iter()
            .filter_map(|header| match HeaderName::from_bytes(header.as_bytes()) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(header = %header, "Skipping invalid CORS header");
                    None
                }
            })
            .collect();
        if !headers.is_empty() {
            layer = layer.allow_headers(AllowHeaders::list(headers));
        }
    }

    layer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_detection() {
        assert!(has_wildcard(&["https://a.example".into(), "*".into()]));
        assert!(!has_wildcard(&["https://a.example".into()]));
        assert!(!has_wildcard(&[]));
    }

    #[test]
    fn test_invalid_entries_do_not_panic() {
        let config = CorsConfig {
            allow_origins: vec!["bad\norigin".into(), "https://ok.example".into()],
            allow_methods: vec!["GET".into(), "NOT A METHOD".into()],
            allow_headers: vec!["X-Ok".into(), "bad header".into()],
            allow_credentials: false,
        };
        let _ = cors_layer(&config);
    }
}
