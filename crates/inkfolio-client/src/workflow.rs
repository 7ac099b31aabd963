//! Generation workflow — orchestrates the full lifecycle.
//!
//! Flow: validate file → upload → create generation → poll until terminal →
//!       hydrate detail → fetch rendered artifact → settle.
//!
//! States are strictly sequential; each step depends on the previous step's
//! output (`resumeUploadId` → `generationId` → final payload). The workflow
//! owns timing and cancellation; the endpoint bindings below it never retry.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::BackendApi;
use crate::config::{Config, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
use crate::errors::{ApiError, ErrorCode};
use crate::models::{
    CreateGenerationRequest, FilePayload, Generation, GenerationOptions, GenerationStatus,
};
use crate::session::SessionCarrier;

/// Fixed upload ceiling. Enforced locally, before any network call.
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// MIME allow-list for uploads. A file passes if either its MIME type or its
/// extension is accepted — browsers are unreliable about both.
pub const ACCEPTED_MIME_TYPES: [&str; 3] = [
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["pdf", "docx", "txt"];

/// Final outcome of a workflow run. Distinct from error returns:
/// all unexpected failures surface as `Err(ApiError)` instead.
#[derive(Debug)]
pub enum WorkflowOutcome {
    /// The generation reached a terminal status (`DONE` or `FAILED`).
    Completed(SettledGeneration),
    /// Soft timeout: polling gave up while the job was still `PENDING`. The
    /// job continues server-side; reopen it later by `generationId`.
    StillPending(SettledGeneration),
    /// Cancelled mid-flight. Completed steps are not rolled back; the ids
    /// already obtained are carried so the caller can resume.
    Cancelled(WorkflowProgress),
}

/// The generation exposed to the caller once the workflow settles.
#[derive(Debug)]
pub struct SettledGeneration {
    /// Possibly still partial if the hydration fetch failed.
    pub generation: Generation,
    /// Rendered resume HTML; empty when no artifact exists yet or its fetch
    /// failed (both non-fatal).
    pub resume_html: String,
}

/// Ids obtained before a cancellation took effect.
#[derive(Debug, Default)]
pub struct WorkflowProgress {
    pub resume_upload_id: Option<String>,
    pub generation_id: Option<String>,
}

/// Client-side pre-validation. The only checks performed locally; everything
/// else is backend-authoritative.
pub fn validate_file(file: &FilePayload) -> Result<(), ApiError> {
    if file.bytes.len() as u64 > MAX_FILE_SIZE_BYTES {
        return Err(ApiError::local(
            ErrorCode::FileTooLarge,
            "File size exceeds 10MB.",
        ));
    }

    let mime_ok = ACCEPTED_MIME_TYPES.contains(&file.mime_type.as_str());
    let extension_ok = file
        .extension()
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    if !mime_ok && !extension_ok {
        return Err(ApiError::local(
            ErrorCode::UnsupportedFileType,
            "Only PDF, DOCX, or TXT files are supported.",
        ));
    }

    Ok(())
}

/// Drives one generation from file to settled result.
///
/// Holds no mutable state; concurrent workflows are isolated by their own
/// `resumeUploadId`/`generationId` pair and idempotency key.
pub struct GenerationWorkflow<'a> {
    api: &'a dyn BackendApi,
    session: &'a dyn SessionCarrier,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl<'a> GenerationWorkflow<'a> {
    pub fn new(api: &'a dyn BackendApi, session: &'a dyn SessionCarrier) -> Self {
        GenerationWorkflow {
            api,
            session,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn with_config(mut self, config: &Config) -> Self {
        self.poll_interval = config.poll_interval;
        self.poll_timeout = config.poll_timeout;
        self
    }

    /// Full run: upload `file` and generate with `options`.
    pub async fn run(
        &self,
        file: &FilePayload,
        options: GenerationOptions,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutcome, ApiError> {
        let mut progress = WorkflowProgress::default();
        let result = self.run_inner(file, options, cancel, &mut progress).await;
        absorb_cancel(result, progress)
    }

    /// Retry-as-new-attempt on an existing (typically `FAILED`) generation.
    /// Re-enters the pipeline with a fresh partial payload, same id.
    pub async fn retry(
        &self,
        generation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutcome, ApiError> {
        let progress = WorkflowProgress {
            resume_upload_id: None,
            generation_id: Some(generation_id.to_string()),
        };
        let token = self.session.current_token();
        let result = async {
            info!("retrying generation {generation_id}");
            let partial = self
                .api
                .retry_generation(generation_id, token.as_deref(), Some(cancel))
                .await?;
            self.settle(partial, token.as_deref(), cancel).await
        }
        .await;
        absorb_cancel(result, progress)
    }

    /// Reopens a previously started generation (e.g. from history, or after a
    /// soft timeout) and runs the same poll/hydrate pipeline on it.
    pub async fn reopen(
        &self,
        generation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutcome, ApiError> {
        let progress = WorkflowProgress {
            resume_upload_id: None,
            generation_id: Some(generation_id.to_string()),
        };
        let token = self.session.current_token();
        let result = async {
            let current = self
                .api
                .generation_detail(generation_id, token.as_deref(), Some(cancel))
                .await?;
            self.settle(current, token.as_deref(), cancel).await
        }
        .await;
        absorb_cancel(result, progress)
    }

    async fn run_inner(
        &self,
        file: &FilePayload,
        options: GenerationOptions,
        cancel: &CancellationToken,
        progress: &mut WorkflowProgress,
    ) -> Result<WorkflowOutcome, ApiError> {
        validate_file(file)?;

        let token = self.session.current_token();

        info!(
            "uploading resume '{}' ({} bytes)",
            file.file_name,
            file.bytes.len()
        );
        let receipt = self
            .api
            .upload_resume(file, token.as_deref(), Some(cancel))
            .await?;
        progress.resume_upload_id = Some(receipt.resume_upload_id.clone());

        let idempotency_key = options.idempotency_key.unwrap_or_default();
        let request = CreateGenerationRequest {
            resume_upload_id: receipt.resume_upload_id,
            theme: options.theme,
            color: options.color,
        };
        let partial = self
            .api
            .create_generation(&request, &idempotency_key, token.as_deref(), Some(cancel))
            .await?;
        progress.generation_id = Some(partial.generation_id.clone());
        info!("generation {} created", partial.generation_id);

        self.settle(partial, token.as_deref(), cancel).await
    }

    /// Shared tail of every entry point: poll while pending, hydrate, fetch
    /// the rendered artifact, classify the outcome.
    async fn settle(
        &self,
        partial: Generation,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutcome, ApiError> {
        let mut generation = partial;
        let mut timed_out = false;

        if generation.status == GenerationStatus::Pending && !generation.generation_id.is_empty() {
            let (latest, reached_terminal) = self
                .poll_until_terminal(&generation.generation_id, token, cancel)
                .await?;
            if let Some(latest) = latest {
                generation = latest;
            }
            timed_out = !reached_terminal;
        }

        let generation = self.hydrate(generation, token, cancel).await?;
        let resume_html = self.fetch_resume_content(&generation, cancel).await?;
        let settled = SettledGeneration {
            generation,
            resume_html,
        };

        if timed_out && settled.generation.status == GenerationStatus::Pending {
            Ok(WorkflowOutcome::StillPending(settled))
        } else {
            Ok(WorkflowOutcome::Completed(settled))
        }
    }

    /// Polls the status endpoint until the generation leaves `PENDING` or the
    /// elapsed ceiling is hit. Returns the last-seen payload and whether a
    /// terminal status was reached.
    async fn poll_until_terminal(
        &self,
        generation_id: &str,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(Option<Generation>, bool), ApiError> {
        let started = Instant::now();
        let mut latest = None;

        while started.elapsed() < self.poll_timeout {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::cancelled()),
                _ = sleep(self.poll_interval) => {}
            }

            let snapshot = self
                .api
                .generation_status(generation_id, token, Some(cancel))
                .await?;
            debug!("generation {generation_id} status: {:?}", snapshot.status);
            let terminal = snapshot.status.is_terminal();
            latest = Some(snapshot);
            if terminal {
                return Ok((latest, true));
            }
        }

        warn!(
            "generation {generation_id} still pending after {:?}; giving up softly",
            self.poll_timeout
        );
        Ok((latest, false))
    }

    /// Completes a partial payload via the detail endpoint. Non-fatal: on
    /// failure the partial payload is kept. Cancellation still propagates.
    async fn hydrate(
        &self,
        generation: Generation,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Generation, ApiError> {
        if generation.is_complete() || generation.generation_id.is_empty() {
            return Ok(generation);
        }

        match self
            .api
            .generation_detail(&generation.generation_id, token, Some(cancel))
            .await
        {
            Ok(detail) => Ok(generation.merged_with(detail)),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(
                    "detail fetch for {} failed ({}); keeping partial payload",
                    generation.generation_id, e.code
                );
                Ok(generation)
            }
        }
    }

    /// Fetches the rendered resume HTML when an artifact URL is present.
    /// Non-fatal: failure yields empty content. Cancellation still propagates.
    async fn fetch_resume_content(
        &self,
        generation: &Generation,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        let Some(url) = generation.resume_html_url() else {
            return Ok(String::new());
        };

        match self.api.fetch_resume_html(url, Some(cancel)).await {
            Ok(html) => Ok(html),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!("resume artifact fetch failed ({}); showing empty content", e.code);
                Ok(String::new())
            }
        }
    }
}

/// Converts a cancellation error into the distinct `Cancelled` outcome,
/// carrying whatever ids were obtained before the abort.
fn absorb_cancel(
    result: Result<WorkflowOutcome, ApiError>,
    progress: WorkflowProgress,
) -> Result<WorkflowOutcome, ApiError> {
    match result {
        Err(e) if e.is_cancelled() => Ok(WorkflowOutcome::Cancelled(progress)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::models::{
        AuthUser, GenerationPage, IdempotencyKey, PortfolioRef, PublicPortfolio, ResumeArtifact,
        Theme, UploadReceipt,
    };
    use crate::session::Anonymous;

    const GEN_ID: &str = "gen-1";
    const HTML_URL: &str = "https://cdn.inkfolio.app/resume/gen-1.html";

    fn pending(id: &str) -> Generation {
        Generation {
            generation_id: id.to_string(),
            status: GenerationStatus::Pending,
            created_at: None,
            resume: None,
            portfolio: None,
        }
    }

    fn snapshot(id: &str, status: GenerationStatus) -> Generation {
        Generation {
            status,
            ..pending(id)
        }
    }

    fn complete_detail(id: &str, status: GenerationStatus) -> Generation {
        Generation {
            generation_id: id.to_string(),
            status,
            created_at: Some(Utc::now()),
            resume: Some(ResumeArtifact {
                html_url: Some(HTML_URL.to_string()),
            }),
            portfolio: Some(PortfolioRef {
                slug: Some("jane-doe".to_string()),
            }),
        }
    }

    fn server_error() -> ApiError {
        ApiError {
            code: ErrorCode::HttpError,
            message: "Request failed with status 500".to_string(),
            request_id: None,
            http_status: Some(500),
        }
    }

    /// In-memory backend double. Status responses are scripted; once the
    /// script runs dry every further poll sees `PENDING`.
    #[derive(Default)]
    struct FakeBackend {
        statuses: Mutex<VecDeque<GenerationStatus>>,
        upload_calls: AtomicUsize,
        status_calls: AtomicUsize,
        detail_calls: AtomicUsize,
        create_keys: Mutex<Vec<String>>,
        jobs_by_key: Mutex<HashMap<String, String>>,
        fail_create: Option<ApiError>,
        fail_detail: bool,
        fail_html: bool,
        /// Status the detail endpoint reports; `None` means `DONE`.
        detail_status: Option<GenerationStatus>,
        /// Cancels the token during the Nth status call, simulating a caller
        /// aborting mid-poll.
        cancel_on_status_call: Option<(usize, CancellationToken)>,
    }

    impl FakeBackend {
        fn scripted(statuses: &[GenerationStatus]) -> Self {
            FakeBackend {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                ..FakeBackend::default()
            }
        }
    }

    #[async_trait]
    impl BackendApi for FakeBackend {
        async fn whoami(
            &self,
            _token: &str,
            _cancel: Option<&CancellationToken>,
        ) -> Result<AuthUser, ApiError> {
            Ok(AuthUser {
                id: Some("user-1".to_string()),
                email: None,
            })
        }

        async fn list_themes(
            &self,
            _cancel: Option<&CancellationToken>,
        ) -> Result<Vec<Theme>, ApiError> {
            Ok(vec![])
        }

        async fn upload_resume(
            &self,
            _file: &FilePayload,
            _token: Option<&str>,
            _cancel: Option<&CancellationToken>,
        ) -> Result<UploadReceipt, ApiError> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            Ok(UploadReceipt {
                resume_upload_id: "upload-1".to_string(),
            })
        }

        async fn create_generation(
            &self,
            _request: &CreateGenerationRequest,
            idempotency_key: &IdempotencyKey,
            _token: Option<&str>,
            _cancel: Option<&CancellationToken>,
        ) -> Result<Generation, ApiError> {
            if let Some(error) = &self.fail_create {
                return Err(error.clone());
            }
            let key = idempotency_key.as_str().to_string();
            self.create_keys.lock().unwrap().push(key.clone());

            // Duplicate submissions with the same key map to the same job.
            let mut jobs = self.jobs_by_key.lock().unwrap();
            let next_id = format!("gen-{}", jobs.len() + 1);
            let id = jobs.entry(key).or_insert(next_id).clone();
            Ok(pending(&id))
        }

        async fn generation_status(
            &self,
            generation_id: &str,
            _token: Option<&str>,
            _cancel: Option<&CancellationToken>,
        ) -> Result<Generation, ApiError> {
            let calls = self.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((at_call, token)) = &self.cancel_on_status_call {
                if calls == *at_call {
                    token.cancel();
                }
            }
            let status = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(GenerationStatus::Pending);
            Ok(snapshot(generation_id, status))
        }

        async fn generation_detail(
            &self,
            generation_id: &str,
            _token: Option<&str>,
            _cancel: Option<&CancellationToken>,
        ) -> Result<Generation, ApiError> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_detail {
                return Err(server_error());
            }
            let status = self.detail_status.unwrap_or(GenerationStatus::Done);
            Ok(complete_detail(generation_id, status))
        }

        async fn retry_generation(
            &self,
            generation_id: &str,
            _token: Option<&str>,
            _cancel: Option<&CancellationToken>,
        ) -> Result<Generation, ApiError> {
            Ok(pending(generation_id))
        }

        async fn list_generations(
            &self,
            _token: &str,
            _limit: u32,
            _cursor: Option<&str>,
            _cancel: Option<&CancellationToken>,
        ) -> Result<GenerationPage, ApiError> {
            Ok(GenerationPage {
                items: vec![],
                next_cursor: None,
            })
        }

        async fn resolve_public_portfolio(
            &self,
            _slug: &str,
            _cancel: Option<&CancellationToken>,
        ) -> Result<PublicPortfolio, ApiError> {
            Ok(PublicPortfolio {
                hosted_url: None,
                cloudinary_url: None,
                url: None,
            })
        }

        async fn health(&self, _cancel: Option<&CancellationToken>) -> Result<(), ApiError> {
            Ok(())
        }

        async fn fetch_resume_html(
            &self,
            _url: &str,
            _cancel: Option<&CancellationToken>,
        ) -> Result<String, ApiError> {
            if self.fail_html {
                return Err(server_error());
            }
            Ok("<html>rendered</html>".to_string())
        }
    }

    fn pdf_file() -> FilePayload {
        FilePayload::new("resume.pdf", "application/pdf", vec![1u8; 128])
    }

    fn options() -> GenerationOptions {
        GenerationOptions::new("minimal-clean")
    }

    #[tokio::test]
    async fn test_oversized_file_rejected_before_any_network_call() {
        let fake = FakeBackend::default();
        let workflow = GenerationWorkflow::new(&fake, &Anonymous);
        let file = FilePayload::new(
            "resume.pdf",
            "application/pdf",
            vec![0u8; (MAX_FILE_SIZE_BYTES + 1) as usize],
        );

        let error = workflow
            .run(&file, options(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(error.code, ErrorCode::FileTooLarge);
        assert_eq!(fake.upload_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_type_rejected_before_any_network_call() {
        let fake = FakeBackend::default();
        let workflow = GenerationWorkflow::new(&fake, &Anonymous);
        let file = FilePayload::new("resume.zip", "application/zip", vec![1u8; 16]);

        let error = workflow
            .run(&file, options(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(error.code, ErrorCode::UnsupportedFileType);
        assert_eq!(fake.upload_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_validation_accepts_mime_or_extension() {
        // Known MIME with an unexpected name.
        let by_mime = FilePayload::new("weird.bin", "application/pdf", vec![1u8]);
        assert!(validate_file(&by_mime).is_ok());
        // Known extension with a generic MIME.
        let by_extension = FilePayload::new("resume.txt", "application/octet-stream", vec![1u8]);
        assert!(validate_file(&by_extension).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_polls_until_done_then_hydrates() {
        let fake = FakeBackend::scripted(&[
            GenerationStatus::Pending,
            GenerationStatus::Pending,
            GenerationStatus::Done,
        ]);
        let workflow = GenerationWorkflow::new(&fake, &Anonymous);

        let outcome = workflow
            .run(&pdf_file(), options(), &CancellationToken::new())
            .await
            .unwrap();

        let WorkflowOutcome::Completed(settled) = outcome else {
            panic!("expected Completed outcome");
        };
        assert_eq!(settled.generation.generation_id, GEN_ID);
        assert_eq!(settled.generation.status, GenerationStatus::Done);
        assert!(settled.generation.is_complete());
        assert_eq!(settled.resume_html, "<html>rendered</html>");
        assert_eq!(fake.status_calls.load(Ordering::SeqCst), 3);
        assert_eq!(fake.detail_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_timeout_returns_still_pending() {
        // Script never leaves PENDING; with a 2.5s interval under a 75s
        // ceiling the loop gets exactly 30 polls.
        let fake = FakeBackend {
            detail_status: Some(GenerationStatus::Pending),
            ..FakeBackend::default()
        };
        let workflow = GenerationWorkflow::new(&fake, &Anonymous);

        let outcome = workflow
            .run(&pdf_file(), options(), &CancellationToken::new())
            .await
            .unwrap();

        let WorkflowOutcome::StillPending(settled) = outcome else {
            panic!("expected StillPending outcome");
        };
        assert_eq!(settled.generation.status, GenerationStatus::Pending);
        assert_eq!(fake.status_calls.load(Ordering::SeqCst), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hydration_issues_exactly_one_detail_fetch() {
        let fake = FakeBackend::scripted(&[GenerationStatus::Done]);
        let workflow = GenerationWorkflow::new(&fake, &Anonymous);

        let outcome = workflow
            .run(&pdf_file(), options(), &CancellationToken::new())
            .await
            .unwrap();

        let WorkflowOutcome::Completed(settled) = outcome else {
            panic!("expected Completed outcome");
        };
        assert_eq!(fake.detail_calls.load(Ordering::SeqCst), 1);
        assert!(settled.generation.is_complete());
        assert_eq!(settled.generation.portfolio_slug(), Some("jane-doe"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hydration_failure_keeps_partial_payload() {
        let fake = FakeBackend {
            fail_detail: true,
            ..FakeBackend::scripted(&[GenerationStatus::Done])
        };
        let workflow = GenerationWorkflow::new(&fake, &Anonymous);

        let outcome = workflow
            .run(&pdf_file(), options(), &CancellationToken::new())
            .await
            .unwrap();

        let WorkflowOutcome::Completed(settled) = outcome else {
            panic!("expected Completed outcome despite failed hydration");
        };
        assert_eq!(settled.generation.status, GenerationStatus::Done);
        assert!(!settled.generation.is_complete());
        assert_eq!(settled.resume_html, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_content_failure_yields_empty_html() {
        let fake = FakeBackend {
            fail_html: true,
            ..FakeBackend::scripted(&[GenerationStatus::Done])
        };
        let workflow = GenerationWorkflow::new(&fake, &Anonymous);

        let outcome = workflow
            .run(&pdf_file(), options(), &CancellationToken::new())
            .await
            .unwrap();

        let WorkflowOutcome::Completed(settled) = outcome else {
            panic!("expected Completed outcome despite failed artifact fetch");
        };
        assert!(settled.generation.resume_html_url().is_some());
        assert_eq!(settled.resume_html, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_round_trip_keeps_generation_id() {
        let fake = FakeBackend::scripted(&[
            GenerationStatus::Pending,
            GenerationStatus::Pending,
            GenerationStatus::Done,
        ]);
        let workflow = GenerationWorkflow::new(&fake, &Anonymous);

        let outcome = workflow
            .retry(GEN_ID, &CancellationToken::new())
            .await
            .unwrap();

        let WorkflowOutcome::Completed(settled) = outcome else {
            panic!("expected Completed outcome");
        };
        assert_eq!(settled.generation.generation_id, GEN_ID);
        assert_eq!(settled.generation.status, GenerationStatus::Done);
        assert_eq!(fake.status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_complete_generation_skips_polling() {
        let fake = FakeBackend::default();
        let workflow = GenerationWorkflow::new(&fake, &Anonymous);

        let outcome = workflow
            .reopen(GEN_ID, &CancellationToken::new())
            .await
            .unwrap();

        let WorkflowOutcome::Completed(settled) = outcome else {
            panic!("expected Completed outcome");
        };
        assert!(settled.generation.is_complete());
        assert_eq!(fake.status_calls.load(Ordering::SeqCst), 0);
        // One detail call to reopen; already complete, so no hydration fetch.
        assert_eq!(fake.detail_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_mid_poll_stops_further_status_calls() {
        let token = CancellationToken::new();
        let fake = FakeBackend {
            cancel_on_status_call: Some((2, token.clone())),
            ..FakeBackend::default()
        };
        let workflow = GenerationWorkflow::new(&fake, &Anonymous);

        let outcome = workflow.run(&pdf_file(), options(), &token).await.unwrap();

        let WorkflowOutcome::Cancelled(progress) = outcome else {
            panic!("expected Cancelled outcome");
        };
        assert_eq!(fake.status_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fake.detail_calls.load(Ordering::SeqCst), 0);
        // Completed steps are not rolled back; ids survive for resumption.
        assert_eq!(progress.resume_upload_id.as_deref(), Some("upload-1"));
        assert_eq!(progress.generation_id.as_deref(), Some(GEN_ID));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_run_mints_a_distinct_idempotency_key() {
        let fake = FakeBackend::scripted(&[GenerationStatus::Done, GenerationStatus::Done]);
        let workflow = GenerationWorkflow::new(&fake, &Anonymous);
        let cancel = CancellationToken::new();

        workflow.run(&pdf_file(), options(), &cancel).await.unwrap();
        workflow.run(&pdf_file(), options(), &cancel).await.unwrap();

        let keys = fake.create_keys.lock().unwrap().clone();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);
        assert!(keys.iter().all(|k| k.starts_with("gen-")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_supplied_idempotency_key_is_forwarded() {
        let fake = FakeBackend::scripted(&[GenerationStatus::Done]);
        let workflow = GenerationWorkflow::new(&fake, &Anonymous);
        let mut opts = options();
        opts.idempotency_key = Some(IdempotencyKey::from("gen-caller-key"));

        workflow
            .run(&pdf_file(), opts, &CancellationToken::new())
            .await
            .unwrap();

        let keys = fake.create_keys.lock().unwrap().clone();
        assert_eq!(keys, vec!["gen-caller-key".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_key_maps_to_one_job() {
        let fake = FakeBackend::default();
        let key = IdempotencyKey::new();
        let request = CreateGenerationRequest {
            resume_upload_id: "upload-1".to_string(),
            theme: "minimal-clean".to_string(),
            color: None,
        };

        let first = fake
            .create_generation(&request, &key, None, None)
            .await
            .unwrap();
        let second = fake
            .create_generation(&request, &key, None, None)
            .await
            .unwrap();
        assert_eq!(first.generation_id, second.generation_id);

        let third = fake
            .create_generation(&request, &IdempotencyKey::new(), None, None)
            .await
            .unwrap();
        assert_ne!(first.generation_id, third.generation_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_error_during_create_aborts_with_classified_error() {
        let fake = FakeBackend {
            fail_create: Some(ApiError {
                code: ErrorCode::GenerateCooldown,
                message: "cooldown".to_string(),
                request_id: Some("r2".to_string()),
                http_status: Some(429),
            }),
            ..FakeBackend::default()
        };
        let workflow = GenerationWorkflow::new(&fake, &Anonymous);

        let error = workflow
            .run(&pdf_file(), options(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(error.code, ErrorCode::GenerateCooldown);
        assert_eq!(error.request_id.as_deref(), Some("r2"));
        assert!(error
            .friendly_message("fallback")
            .contains("Please wait 5 seconds"));
    }
}
