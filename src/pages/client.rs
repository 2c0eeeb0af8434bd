use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;
use url::Url;

use crate::config::Config;

use super::api_types::{ApiSearchRequest, ApiSearchResponse};
use super::types::{FetchRequest, ResponsePage};
use super::PageFetcher;

/// HTTP client for the saved-pages search endpoint
#[derive(Clone)]
pub struct HttpPageFetcher {
  client: reqwest::Client,
  endpoint: Url,
  token: Option<String>,
}

impl HttpPageFetcher {
  pub fn new(config: &Config) -> Result<Self> {
    let endpoint = search_endpoint(&config.api.url)?;

    let client = reqwest::Client::builder()
      .user_agent(concat!("pageshelf/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      endpoint,
      token: Config::get_api_token(),
    })
  }

  /// Search saved pages with the given filter and page anchor
  pub async fn search(&self, request: &FetchRequest) -> Result<ResponsePage> {
    debug!(endpoint = %self.endpoint, anchor = ?request.anchor, "fetching saved pages");

    let mut builder = self
      .client
      .post(self.endpoint.clone())
      .json(&ApiSearchRequest::from(request));
    if let Some(token) = &self.token {
      builder = builder.bearer_auth(token);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch saved pages: {}", e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(eyre!("Saved pages request failed with status {}", status));
    }

    let body: ApiSearchResponse = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse saved pages response: {}", e))?;

    Ok(body.into_page(request))
  }
}

impl PageFetcher for HttpPageFetcher {
  fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, Result<ResponsePage>> {
    async move { self.search(&request).await }.boxed()
  }
}

/// Resolve `<base>/pages/search`, tolerating a trailing slash on the base URL.
fn search_endpoint(base: &str) -> Result<Url> {
  let mut base = Url::parse(base).map_err(|e| eyre!("Invalid API url '{}': {}", base, e))?;
  if !base.path().ends_with('/') {
    let path = format!("{}/", base.path());
    base.set_path(&path);
  }
  base
    .join("pages/search")
    .map_err(|e| eyre!("Invalid API url '{}': {}", base, e))
}
