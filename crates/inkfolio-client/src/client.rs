//! Endpoint bindings — one typed method per backend operation.
//!
//! Each binding is a pure mapping from typed arguments to a single
//! [`Transport`] call with a fixed path and method. No binding retries, polls,
//! or orchestrates multiple calls; that is the workflow's job.
//!
//! The bindings sit behind the [`BackendApi`] trait so the workflow can be
//! driven against an in-memory fake in tests.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::ApiError;
use crate::models::{
    AuthUser, CreateGenerationRequest, FilePayload, Generation, GenerationPage, IdempotencyKey,
    PublicPortfolio, Theme, ThemeList, UploadReceipt,
};
use crate::transport::{ApiRequest, Transport};
use crate::Config;

/// The backend surface the workflow depends on.
///
/// Token semantics follow the backend: `None` is an anonymous call, tracked by
/// the session cookie. `cancel` aborts the in-flight request only.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// GET /v1/auth/me — bearer required.
    async fn whoami(
        &self,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<AuthUser, ApiError>;

    /// GET /v1/portfolio/themes.
    async fn list_themes(&self, cancel: Option<&CancellationToken>)
        -> Result<Vec<Theme>, ApiError>;

    /// POST /v1/resume/upload — multipart file.
    async fn upload_resume(
        &self,
        file: &FilePayload,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<UploadReceipt, ApiError>;

    /// POST /v1/generate — returns a partial Generation.
    async fn create_generation(
        &self,
        request: &CreateGenerationRequest,
        idempotency_key: &IdempotencyKey,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Generation, ApiError>;

    /// GET /v1/generations/:id/status — cheap status snapshot for polling.
    async fn generation_status(
        &self,
        generation_id: &str,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Generation, ApiError>;

    /// GET /v1/generations/:id — full Generation detail.
    async fn generation_detail(
        &self,
        generation_id: &str,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Generation, ApiError>;

    /// POST /v1/generations/:id/retry — returns a fresh partial Generation
    /// with the same id.
    async fn retry_generation(
        &self,
        generation_id: &str,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Generation, ApiError>;

    /// GET /v1/generations?limit&cursor — bearer required.
    async fn list_generations(
        &self,
        token: &str,
        limit: u32,
        cursor: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<GenerationPage, ApiError>;

    /// GET /v1/public/portfolio/:slug.
    async fn resolve_public_portfolio(
        &self,
        slug: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<PublicPortfolio, ApiError>;

    /// GET /health.
    async fn health(&self, cancel: Option<&CancellationToken>) -> Result<(), ApiError>;

    /// Fetches a rendered artifact by absolute URL (outside the backend base).
    async fn fetch_resume_html(
        &self,
        url: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, ApiError>;
}

/// HTTP implementation of [`BackendApi`].
#[derive(Clone)]
pub struct ApiClient {
    transport: Transport,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        ApiClient {
            transport: Transport::new(config),
        }
    }
}

#[async_trait]
impl BackendApi for ApiClient {
    async fn whoami(
        &self,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<AuthUser, ApiError> {
        self.transport
            .send(ApiRequest::get("/v1/auth/me").token(Some(token)).cancel(cancel))
            .await?
            .parse()
    }

    async fn list_themes(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Theme>, ApiError> {
        let response = self
            .transport
            .send(ApiRequest::get("/v1/portfolio/themes").cancel(cancel))
            .await?;
        let list: ThemeList = response.parse()?;
        Ok(list.themes)
    }

    async fn upload_resume(
        &self,
        file: &FilePayload,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<UploadReceipt, ApiError> {
        self.transport
            .send(
                ApiRequest::post("/v1/resume/upload")
                    .file(file.clone())
                    .token(token)
                    .cancel(cancel),
            )
            .await?
            .parse()
    }

    async fn create_generation(
        &self,
        request: &CreateGenerationRequest,
        idempotency_key: &IdempotencyKey,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Generation, ApiError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::network(format!("Malformed request body: {e}")))?;
        self.transport
            .send(
                ApiRequest::post("/v1/generate")
                    .json(body)
                    .idempotency_key(idempotency_key.as_str())
                    .token(token)
                    .cancel(cancel),
            )
            .await?
            .parse()
    }

    async fn generation_status(
        &self,
        generation_id: &str,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Generation, ApiError> {
        let path = format!("/v1/generations/{generation_id}/status");
        self.transport
            .send(ApiRequest::get(&path).token(token).cancel(cancel))
            .await?
            .parse()
    }

    async fn generation_detail(
        &self,
        generation_id: &str,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Generation, ApiError> {
        let path = format!("/v1/generations/{generation_id}");
        self.transport
            .send(ApiRequest::get(&path).token(token).cancel(cancel))
            .await?
            .parse()
    }

    async fn retry_generation(
        &self,
        generation_id: &str,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Generation, ApiError> {
        let path = format!("/v1/generations/{generation_id}/retry");
        self.transport
            .send(ApiRequest::post(&path).token(token).cancel(cancel))
            .await?
            .parse()
    }

    async fn list_generations(
        &self,
        token: &str,
        limit: u32,
        cursor: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<GenerationPage, ApiError> {
        // Cursors are opaque URL-safe tokens issued by the backend.
        let path = match cursor {
            Some(cursor) => format!("/v1/generations?limit={limit}&cursor={cursor}"),
            None => format!("/v1/generations?limit={limit}"),
        };
        self.transport
            .send(ApiRequest::get(&path).token(Some(token)).cancel(cancel))
            .await?
            .parse()
    }

    async fn resolve_public_portfolio(
        &self,
        slug: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<PublicPortfolio, ApiError> {
        let path = format!("/v1/public/portfolio/{slug}");
        self.transport
            .send(ApiRequest::get(&path).cancel(cancel))
            .await?
            .parse()
    }

    async fn health(&self, cancel: Option<&CancellationToken>) -> Result<(), ApiError> {
        self.transport
            .send(ApiRequest::get("/health").cancel(cancel))
            .await
            .map(|_| ())
    }

    async fn fetch_resume_html(
        &self,
        url: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, ApiError> {
        self.transport.fetch_text(url, cancel).await
    }
}
