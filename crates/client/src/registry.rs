//! HTTP client for the registry's video listing endpoints.

use async_trait::async_trait;
use val_core::candidate::RegistryVideo;

use crate::error::ClientError;
use crate::http::{authorized, parse_response};
use crate::source::CandidateSource;

/// Path of the video collection, relative to the API base URL.
pub const VIDEOS_PATH: &str = "/api/val/v0/videos/";

/// HTTP client for a registry instance.
pub struct RegistryApi {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl RegistryApi {
    /// Create a client for a registry.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8000`.
    /// * `token` - Bearer token sent with every request, if any.
    pub fn new(api_url: String, token: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, token)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String, token: Option<String>) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Every registered video.
    pub async fn all_videos(&self) -> Result<Vec<RegistryVideo>, ClientError> {
        let request = self.listing_request(None)?;
        let response = self.client.execute(request).await?;
        parse_response(response).await
    }

    /// Build the listing request, filtered to one course when given.
    pub fn listing_request(&self, course_id: Option<&str>) -> Result<reqwest::Request, ClientError> {
        let mut builder = self.client.get(format!("{}{}", self.api_url, VIDEOS_PATH));
        if let Some(course_id) = course_id {
            builder = builder.query(&[("course", course_id)]);
        }
        Ok(authorized(builder, self.token.as_deref()).build()?)
    }
}

#[async_trait]
impl CandidateSource for RegistryApi {
    async fn videos_for_course(&self, course_id: &str) -> Result<Vec<RegistryVideo>, ClientError> {
        let request = self.listing_request(Some(course_id))?;
        let response = self.client.execute(request).await?;
        let videos: Vec<RegistryVideo> = parse_response(response).await?;
        tracing::debug!(course_id, count = videos.len(), "Fetched course videos");
        Ok(videos)
    }
}
