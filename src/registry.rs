use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::domain::Version;
use crate::error::PgapError;

pub trait RegistryClient: Send + Sync {
    /// Published versions of `repo`, latest first.
    fn remote_versions(&self, repo: &str) -> Result<Vec<Version>, PgapError>;
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

#[derive(Clone)]
pub struct HttpRegistryClient {
    client: Client,
    base_url: String,
}

impl HttpRegistryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PgapError> {
        let client = Client::builder()
            .default_headers(user_agent_headers()?)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| PgapError::Network(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn tags_url(&self, repo: &str) -> String {
        format!("{}/{repo}/tags", self.base_url.trim_end_matches('/'))
    }
}

impl RegistryClient for HttpRegistryClient {
    fn remote_versions(&self, repo: &str) -> Result<Vec<Version>, PgapError> {
        let url = self.tags_url(repo);
        debug!(%url, "querying registry tags");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| PgapError::Network(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "registry request failed".to_string());
            return Err(PgapError::RegistryStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| PgapError::Network(err.to_string()))?;
        parse_tag_list(&body)
    }
}

/// Parses a registry tag listing. The registry lists oldest first, so the
/// result is reversed to put the latest version at index 0.
pub fn parse_tag_list(body: &str) -> Result<Vec<Version>, PgapError> {
    let tags: Vec<Tag> =
        serde_json::from_str(body).map_err(|err| PgapError::Parse(err.to_string()))?;
    tags.into_iter()
        .rev()
        .map(|tag| {
            tag.name
                .parse()
                .map_err(|_| PgapError::Parse(format!("invalid tag name {:?}", tag.name)))
        })
        .collect()
}

pub(crate) fn user_agent_headers() -> Result<HeaderMap, PgapError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("pgap-launcher/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| PgapError::Config(err.to_string()))?,
    );
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_list_is_reversed() {
        let versions = parse_tag_list(r#"[{"name":"v1"},{"name":"v2"},{"name":"v3"}]"#).unwrap();
        let names: Vec<_> = versions.iter().map(|v| v.as_str()).collect();
        assert_eq!(names, vec!["v3", "v2", "v1"]);
    }

    #[test]
    fn tag_list_shape_errors() {
        assert!(matches!(parse_tag_list("not json"), Err(PgapError::Parse(_))));
        assert!(matches!(
            parse_tag_list(r#"{"name":"v1"}"#),
            Err(PgapError::Parse(_))
        ));
        assert!(matches!(
            parse_tag_list(r#"[{"layer":""}]"#),
            Err(PgapError::Parse(_))
        ));
    }

    #[test]
    fn tags_url_joins_repo() {
        let client = HttpRegistryClient::new("http://localhost/v1/repositories/ncbi/").unwrap();
        assert_eq!(
            client.tags_url("pgap-dev"),
            "http://localhost/v1/repositories/ncbi/pgap-dev/tags"
        );
    }
}
