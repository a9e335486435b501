//! Request classification.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::http::{Request, RequestMode};

/// Which policy handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    /// Page navigation: served from the cached root document.
    NavigationDocument,
    /// Build assets and CDN files: cache first, write-through on miss.
    StaticAsset,
    /// Backend calls: network first, cache only when offline.
    ApiCall,
    /// Everything else: cache first, no write-through.
    Other,
}

/// URL rules that map a request to its class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    pub static_path_prefixes: Vec<String>,
    /// Lowercase host names.
    pub static_hosts: Vec<String>,
    pub api_path_prefix: String,
}

impl RoutePolicy {
    /// Classify a request. Navigation wins over every URL rule, static rules
    /// win over the API prefix.
    pub fn classify(&self, request: &Request) -> RequestClass {
        if request.mode() == RequestMode::Navigate {
            return RequestClass::NavigationDocument;
        }

        let url = request.url();
        let path = url.path();
        let static_path = self.static_path_prefixes.iter().any(|p| path.starts_with(p.as_str()));
        let static_host = url
            .host_str()
            .is_some_and(|host| self.static_hosts.iter().any(|h| h == host));

        if static_path || static_host {
            RequestClass::StaticAsset
        } else if path.starts_with(self.api_path_prefix.as_str()) {
            RequestClass::ApiCall
        } else {
            RequestClass::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppConfig;
    use crate::testing::{get, navigate};

    fn policy() -> RoutePolicy {
        AppConfig::default().route_policy()
    }

    #[test]
    fn test_navigation_beats_url_rules() {
        assert_eq!(policy().classify(&navigate("/")), RequestClass::NavigationDocument);
        assert_eq!(policy().classify(&navigate("/static/page.html")), RequestClass::NavigationDocument);
        assert_eq!(policy().classify(&navigate("/api/status")), RequestClass::NavigationDocument);
    }

    #[test]
    fn test_static_prefixes() {
        assert_eq!(policy().classify(&get("/static/js/main.js")), RequestClass::StaticAsset);
        assert_eq!(policy().classify(&get("/assets/images/team.webp")), RequestClass::StaticAsset);
    }

    #[test]
    fn test_cdn_host_is_static() {
        let req = get("https://cdnjs.cloudflare.com/ajax/libs/gsap/3.12.2/gsap.min.js");
        assert_eq!(policy().classify(&req), RequestClass::StaticAsset);
    }

    #[test]
    fn test_cdn_host_match_is_exact() {
        let req = get("https://evil-cdnjs.cloudflare.com/lib.js");
        assert_eq!(policy().classify(&req), RequestClass::Other);
    }

    #[test]
    fn test_api_prefix() {
        assert_eq!(policy().classify(&get("/api/contact")), RequestClass::ApiCall);
        assert_eq!(policy().classify(&get("/apis")), RequestClass::Other);
    }

    #[test]
    fn test_other() {
        assert_eq!(policy().classify(&get("/manifest.json")), RequestClass::Other);
        assert_eq!(policy().classify(&get("/favicon.ico")), RequestClass::Other);
        assert_eq!(policy().classify(&get("https://fonts.googleapis.com/css2")), RequestClass::Other);
    }

    #[test]
    fn test_prefix_must_match_at_start() {
        assert_eq!(policy().classify(&get("/blog/static/x.png")), RequestClass::Other);
    }
}
