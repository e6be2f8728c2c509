use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use super::models::{MovieCredits, MovieDetail, MovieId, MoviePage};
use super::strategy::{DiscoverCriteria, MovieList, PageSource, SearchQuery};
use crate::util::env as env_util;

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

/// A catalog call that produced no usable data. Callers branch on it; nothing here panics.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{operation}: request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation}: unexpected status {status}: {body}")]
    Status {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("{operation}: undecodable response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl CatalogError {
    pub fn operation(&self) -> &'static str {
        match self {
            CatalogError::Transport { operation, .. }
            | CatalogError::Status { operation, .. }
            | CatalogError::Decode { operation, .. } => operation,
        }
    }
}

/// Read side of the remote catalog. One call is one round trip; no retries at this layer.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn discover(&self, criteria: &DiscoverCriteria, page: u32)
        -> Result<MoviePage, CatalogError>;

    async fn search(&self, query: &SearchQuery, page: u32) -> Result<MoviePage, CatalogError>;

    async fn list(&self, list: MovieList, page: u32) -> Result<MoviePage, CatalogError>;

    async fn movie_detail(&self, id: MovieId) -> Result<MovieDetail, CatalogError>;

    async fn movie_credits(&self, id: MovieId) -> Result<MovieCredits, CatalogError>;

    /// Fetch one page of whichever endpoint a strategy pages through.
    async fn page(&self, source: &PageSource, page: u32) -> Result<MoviePage, CatalogError> {
        match source {
            PageSource::Discover(criteria) => self.discover(criteria, page).await,
            PageSource::Search(query) => self.search(query, page).await,
            PageSource::List(list) => self.list(*list, page).await,
        }
    }
}

/// TMDB v3 client authenticated with a bearer token.
///
/// Endpoints:
/// - GET /discover/movie
/// - GET /search/movie
/// - GET /movie/{popular|top_rated|now_playing|upcoming}
/// - GET /movie/{id}
/// - GET /movie/{id}/credits
#[derive(Debug, Clone)]
pub struct TmdbClient {
    base_url: String,
    http: Client,
    token: String,
}

impl TmdbClient {
    /// `timeout_secs = None` keeps the transport default (no request timeout).
    pub fn new(token: &str, base_url: Option<&str>, timeout_secs: Option<u64>) -> Result<Self> {
        let base_url = base_url
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let mut builder = Client::builder().user_agent("cine-harvest/0.1");
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            base_url,
            http: builder.build()?,
            token: token.to_string(),
        })
    }

    /// Build from `TMDB_BEARER_TOKEN`, `TMDB_BASE_URL` and `TMDB_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let token = env_util::tmdb_token()?;
        let base_url = env_util::env_opt("TMDB_BASE_URL");
        let timeout = env_util::env_parse_opt::<u64>("TMDB_TIMEOUT_SECS");
        Self::new(&token, base_url.as_deref(), timeout)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header("accept", "application/json")
            .query(query)
            .send()
            .await
            .map_err(|source| CatalogError::Transport { operation, source })?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 500);
            return Err(CatalogError::Status {
                operation,
                status,
                body,
            });
        }
        let raw = resp
            .text()
            .await
            .map_err(|source| CatalogError::Transport { operation, source })?;
        debug!(operation, path, bytes = raw.len(), "tmdb response");
        serde_json::from_str(&raw).map_err(|source| CatalogError::Decode { operation, source })
    }
}

#[async_trait]
impl CatalogSource for TmdbClient {
    #[instrument(skip(self, criteria), fields(sort_by = %criteria.sort_by))]
    async fn discover(
        &self,
        criteria: &DiscoverCriteria,
        page: u32,
    ) -> Result<MoviePage, CatalogError> {
        let mut query = vec![
            ("page", page.to_string()),
            ("sort_by", criteria.sort_by.clone()),
            ("vote_count.gte", criteria.min_vote_count.to_string()),
            ("include_adult", "false".to_string()),
        ];
        if let Some(country) = &criteria.origin_country {
            query.push(("with_origin_country", country.clone()));
        }
        if let Some(language) = &criteria.language {
            query.push(("language", language.clone()));
        }
        self.get_json("discover", "/discover/movie", &query).await
    }

    #[instrument(skip(self, q), fields(term = %q.term))]
    async fn search(&self, q: &SearchQuery, page: u32) -> Result<MoviePage, CatalogError> {
        let mut query = vec![
            ("query", q.term.clone()),
            ("page", page.to_string()),
            ("include_adult", "false".to_string()),
        ];
        if let Some(language) = &q.language {
            query.push(("language", language.clone()));
        }
        if let Some(region) = &q.region {
            query.push(("region", region.clone()));
        }
        self.get_json("search", "/search/movie", &query).await
    }

    #[instrument(skip(self))]
    async fn list(&self, list: MovieList, page: u32) -> Result<MoviePage, CatalogError> {
        let path = format!("/movie/{}", list.path());
        self.get_json("list", &path, &[("page", page.to_string())])
            .await
    }

    #[instrument(skip(self))]
    async fn movie_detail(&self, id: MovieId) -> Result<MovieDetail, CatalogError> {
        self.get_json("detail", &format!("/movie/{id}"), &[]).await
    }

    #[instrument(skip(self))]
    async fn movie_credits(&self, id: MovieId) -> Result<MovieCredits, CatalogError> {
        self.get_json("credits", &format!("/movie/{id}/credits"), &[])
            .await
    }
}
