//! Pure Baserow REST API client.
//!
//! Covers the row endpoints a table-backed workflow needs: list with filters,
//! get, patch, create, plus user-file upload by URL. Authentication uses the
//! JWT `token-auth` flow; the token is cached and every request is retried
//! once with a fresh token when Baserow answers 401.
//!
//! # Example
//!
//! ```rust,ignore
//! use baserow::{BaserowClient, Filter};
//!
//! let client = BaserowClient::new(url, email, password);
//!
//! let rows = client
//!     .list_rows(748, &[Filter::single_select_equal("Status", 3055)], 100)
//!     .await?;
//! ```

pub mod error;
pub mod types;

pub use error::{BaserowError, Result};
pub use types::{Filter, Row, RowPage, UploadedFile};

use chrono::{DateTime, Duration, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use tokio::sync::RwLock;

use types::{TokenAuthRequest, TokenAuthResponse};

/// Baserow JWTs live 60 minutes; refresh a little early.
const TOKEN_TTL_MINUTES: i64 = 55;

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

pub struct BaserowClient {
    client: reqwest::Client,
    base_url: String,
    email: String,
    password: String,
    token: RwLock<Option<CachedToken>>,
}

impl BaserowClient {
    pub fn new(base_url: impl Into<String>, email: String, password: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            email,
            password,
            token: RwLock::new(None),
        }
    }

    /// Return a cached JWT, logging in again when it is missing or stale.
    async fn token(&self) -> Result<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if Utc::now() < token.expires_at {
                    return Ok(token.value.clone());
                }
            }
        }

        let url = format!("{}/api/user/token-auth/", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&TokenAuthRequest {
                email: &self.email,
                password: &self.password,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BaserowError::Login {
                status: status.as_u16(),
                message: body,
            });
        }

        let auth: TokenAuthResponse = resp.json().await?;
        let value = auth.into_token().ok_or(BaserowError::MissingToken)?;

        *self.token.write().await = Some(CachedToken {
            value: value.clone(),
            expires_at: Utc::now() + Duration::minutes(TOKEN_TTL_MINUTES),
        });
        tracing::debug!("Baserow session token refreshed");

        Ok(value)
    }

    /// Drop the cached token so the next request logs in again.
    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    /// Send an authorized request, retrying once with a fresh token on 401.
    async fn send(&self, build: impl Fn(&str) -> RequestBuilder) -> Result<Response> {
        for attempt in 0..2 {
            let token = self.token().await?;
            let resp = build(&format!("JWT {}", token)).send().await?;

            if resp.status() == StatusCode::UNAUTHORIZED {
                if attempt == 0 {
                    tracing::warn!("Baserow token rejected, refreshing");
                    self.clear_token().await;
                    continue;
                }
                return Err(BaserowError::Unauthorized);
            }

            return ensure_success(resp).await;
        }

        Err(BaserowError::Unauthorized)
    }

    /// List every row of a table matching all filters, one page of `size` at a time.
    pub async fn list_rows(&self, table_id: u64, filters: &[Filter], size: u32) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut page_number = 1;

        loop {
            let page = self.list_rows_page(table_id, filters, size, page_number).await?;
            let has_more = page.has_more(rows.len());
            rows.extend(page.results);
            if !has_more {
                break;
            }
            page_number += 1;
        }

        Ok(rows)
    }

    /// Fetch one page of matching rows. Pages start at 1.
    pub async fn list_rows_page(
        &self,
        table_id: u64,
        filters: &[Filter],
        size: u32,
        page: u32,
    ) -> Result<RowPage> {
        let url = format!("{}/api/database/rows/table/{}/", self.base_url, table_id);
        let mut params: Vec<(String, String)> = vec![
            ("user_field_names".to_string(), "true".to_string()),
            ("size".to_string(), size.to_string()),
            ("page".to_string(), page.to_string()),
        ];
        params.extend(filters.iter().map(Filter::query_param));

        let resp = self
            .send(|auth| {
                self.client
                    .get(&url)
                    .header("Authorization", auth)
                    .query(&params)
            })
            .await?;

        Ok(resp.json().await?)
    }

    /// Fetch a single row.
    pub async fn get_row(&self, table_id: u64, row_id: u64) -> Result<Row> {
        let url = self.row_url(table_id, row_id);
        let resp = self
            .send(|auth| {
                self.client
                    .get(&url)
                    .header("Authorization", auth)
                    .query(&[("user_field_names", "true")])
            })
            .await?;

        Ok(resp.json().await?)
    }

    /// Patch fields of a row, returning the updated row.
    pub async fn patch_row(&self, table_id: u64, row_id: u64, fields: &serde_json::Value) -> Result<Row> {
        let url = self.row_url(table_id, row_id);
        let resp = self
            .send(|auth| {
                self.client
                    .patch(&url)
                    .header("Authorization", auth)
                    .query(&[("user_field_names", "true")])
                    .json(fields)
            })
            .await?;

        Ok(resp.json().await?)
    }

    /// Create a row, returning it with its assigned id.
    pub async fn create_row(&self, table_id: u64, fields: &serde_json::Value) -> Result<Row> {
        let url = format!("{}/api/database/rows/table/{}/", self.base_url, table_id);
        let resp = self
            .send(|auth| {
                self.client
                    .post(&url)
                    .header("Authorization", auth)
                    .query(&[("user_field_names", "true")])
                    .json(fields)
            })
            .await?;

        Ok(resp.json().await?)
    }

    /// Have Baserow download a file from `url` into user files.
    pub async fn upload_file_via_url(&self, file_url: &str) -> Result<UploadedFile> {
        let url = format!("{}/api/user-files/upload-via-url/", self.base_url);
        let body = serde_json::json!({ "url": file_url });
        let resp = self
            .send(|auth| {
                self.client
                    .post(&url)
                    .header("Authorization", auth)
                    .json(&body)
            })
            .await?;

        let file: UploadedFile = resp.json().await?;
        tracing::info!(name = %file.name, "Uploaded file to Baserow");
        Ok(file)
    }

    fn row_url(&self, table_id: u64, row_id: u64) -> String {
        format!(
            "{}/api/database/rows/table/{}/{}/",
            self.base_url, table_id, row_id
        )
    }
}

async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(BaserowError::Api {
        status: status.as_u16(),
        message: body,
    })
}
