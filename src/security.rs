//! Security schemes and per-route security requirements.

use crate::config::Settings;
use crate::document::{OAuthFlow, SecurityScheme};
use log::debug;
use std::collections::BTreeMap;

/// One security requirement: scheme name to scopes
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// Build `components.securitySchemes` from the configured authentication flows.
///
/// Flows are expected to be validated already (see [`Settings::validate`]).
pub fn security_schemes(settings: &Settings) -> BTreeMap<String, SecurityScheme> {
    settings
        .authentication_flow
        .iter()
        .filter_map(|(definition, flow)| {
            let scheme = match definition.as_str() {
                "OAuth2" => oauth2_scheme(settings, flow),
                "bearerAuth" => SecurityScheme {
                    scheme_type: flow.clone(),
                    scheme: Some("bearer".to_string()),
                    bearer_format: Some("JWT".to_string()),
                    flows: None,
                },
                _ => return None,
            };
            Some((definition.clone(), scheme))
        })
        .collect()
}

fn oauth2_scheme(settings: &Settings, flow: &str) -> SecurityScheme {
    let mut oauth_flow = OAuthFlow {
        scopes: settings.oauth_scopes.clone(),
        ..Default::default()
    };
    if matches!(flow, "implicit" | "authorizationCode") {
        oauth_flow.authorization_url = Some(endpoint(&settings.host, "/oauth/authorize"));
    }
    if matches!(flow, "password" | "application" | "authorizationCode") {
        oauth_flow.token_url = Some(endpoint(&settings.host, "/oauth/token"));
    }

    SecurityScheme {
        scheme_type: "oauth2".to_string(),
        scheme: None,
        bearer_format: None,
        flows: Some(BTreeMap::from([(flow.to_string(), oauth_flow)])),
    }
}

/// Absolute URL on the configured host; `http://` is assumed when the host
/// carries no scheme.
fn endpoint(host: &str, path: &str) -> String {
    let host = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };
    format!("{}{}", host.trim_end_matches('/'), path)
}

/// Security requirements for a route's middlewares.
///
/// Returns `None` unless one of the middlewares is a configured security
/// middleware. The requirement lists every configured authentication flow;
/// `OAuth2` carries the middleware parameters (`auth:api,admin` gives
/// `[api, admin]`) as scopes.
pub fn route_security(settings: &Settings, middlewares: &[String]) -> Option<Vec<SecurityRequirement>> {
    let middleware = middlewares
        .iter()
        .rev()
        .find(|m| settings.security_middlewares.iter().any(|s| s == *m))?;

    let parameters: Vec<String> = middleware
        .split_once(':')
        .map(|(_, params)| {
            params
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let requirement: SecurityRequirement = settings
        .authentication_flow
        .keys()
        .map(|definition| {
            let scopes = if definition == "OAuth2" {
                parameters.clone()
            } else {
                Vec::new()
            };
            (definition.clone(), scopes)
        })
        .collect();

    debug!("Route secured by middleware {}", middleware);
    Some(vec![requirement])
}
