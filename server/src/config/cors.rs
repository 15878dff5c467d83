use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::DEFAULT_ALLOWED_ORIGINS;
use crate::handlers::auth::USER_ID_HEADER;

const PREFLIGHT_MAX_AGE_SECS: u64 = 86400;

pub fn create_cors_layer(allowed_origins: &str) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(resolve_origins(allowed_origins)))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([
            header::CONTENT_LENGTH,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(PREFLIGHT_MAX_AGE_SECS))
}

/// Credentials are allowed, so a wildcard origin is never an option; an
/// unusable list falls back to the local development origins.
fn resolve_origins(configured: &str) -> Vec<HeaderValue> {
    let origins = parse_origins(configured);
    if !origins.is_empty() {
        tracing::info!("CORS: Configured with {} allowed origin(s)", origins.len());
        return origins;
    }

    tracing::warn!("CORS: No valid origins configured, falling back to development defaults");
    parse_origins(DEFAULT_ALLOWED_ORIGINS)
}

fn parse_origins(origins: &str) -> Vec<HeaderValue> {
    origins
        .split(',')
        .filter_map(|origin| {
            let trimmed = origin.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(value) => {
                    tracing::debug!("CORS: Allowing origin: {}", trimmed);
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_cors_layer() {
        // Must not panic with credentials enabled
        let _layer = create_cors_layer("");
        let _layer = create_cors_layer("https://tickets.example.com");
    }

    #[test]
    fn test_empty_list_falls_back_to_defaults() {
        let origins = resolve_origins(" , ");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "http://localhost:3000");
    }

    #[test]
    fn test_invalid_origins_are_skipped() {
        let origins = parse_origins("https://a.example.com, bad\norigin ,https://b.example.com");
        assert_eq!(origins.len(), 2);
    }
}
