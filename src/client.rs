//! HTTP client for the entity search and note save endpoints.

use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::models::{EntityKind, SaveBody, SearchItem};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin wrapper around `reqwest::Client` rooted at the host's base URL.
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /{project}/api/{samples|datasets}?q=<query>`
    pub fn search_url(&self, project_id: &str, kind: EntityKind, query: &str) -> ClientResult<Url> {
        let path = format!(
            "/{}/api/{}",
            urlencoding::encode(project_id),
            kind.api_collection()
        );
        let mut url = self.base_url.join(&path)?;
        url.query_pairs_mut().append_pair("q", query);
        Ok(url)
    }

    /// Looks up entities of `kind` matching `query`. Result order is the
    /// endpoint's order.
    pub async fn search_entities(
        &self,
        project_id: &str,
        kind: EntityKind,
        query: &str,
    ) -> ClientResult<Vec<SearchItem>> {
        let url = self.search_url(project_id, kind, query)?;
        debug!(%url, "searching entities");

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(response.json::<Vec<SearchItem>>().await?)
    }

    /// `POST <save_url>` with `{content}`. Any non-2xx status is a failure.
    pub async fn save_content(&self, save_url: &str, content: &str) -> ClientResult<()> {
        let url = self.base_url.join(save_url)?;
        let body = SaveBody {
            content: content.to_string(),
        };

        let response = self.http.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(())
    }
}
