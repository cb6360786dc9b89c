//! Background import worker
//!
//! Drains the durable queue with a concurrency of exactly one: imports
//! across all users are fully serialized within a process, which bounds
//! load against the catalog's rate limits. Rows are processed strictly
//! in file order and the job's counters are flushed after every row, so
//! progress is observable mid-job and a stopped process leaves behind a
//! consistent prefix.

use crate::catalog::{CatalogCache, CatalogLookup};
use crate::db::import_jobs::{self, RowCounters};
use crate::db::{import_issues, library, queue};
use crate::importer::hydrator::MetadataHydrator;
use crate::importer::identity_resolver::{
    resolve, IsbnLookup, LookupReason, LookupStrategy, Resolution, TitleAuthorLookup,
};
use crate::importer::row_planner::{self, PlanWarning, RawRow, RowPlan, TargetBucket};
use crate::models::import_job::codes;
use crate::models::{ImportIssue, ImportJob, ImportOptions, ImportStatus, IssueSeverity};
use crate::models::{ReadingEntry, ToReadEntry};
use chrono::Utc;
use shelfmark_common::config::ImportConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct ImportWorker {
    db: SqlitePool,
    catalog: Arc<dyn CatalogLookup>,
    hydrator: MetadataHydrator,
    config: ImportConfig,
    shutdown: CancellationToken,
}

impl ImportWorker {
    pub fn new(
        db: SqlitePool,
        catalog: Arc<dyn CatalogLookup>,
        cache: Arc<CatalogCache>,
        config: ImportConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let hydrator = MetadataHydrator::new(Arc::clone(&catalog), cache);
        Self {
            db,
            catalog,
            hydrator,
            config,
            shutdown,
        }
    }

    /// Worker loop: claim and process one job at a time until shutdown
    pub async fn run(self) {
        tracing::info!("Import worker started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.run_once().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.queue_poll_interval()) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Queue poll failed");
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.queue_poll_interval()) => {}
                    }
                }
            }
        }

        tracing::info!("Import worker stopped");
    }

    /// Claim and process at most one job; returns whether one was claimed
    pub async fn run_once(&self) -> shelfmark_common::Result<bool> {
        let Some(claim) = queue::claim_next(&self.db).await? else {
            return Ok(false);
        };

        let job_id = claim.job_id;
        match self.process_job(job_id).await {
            Ok(()) => {
                queue::complete(&self.db, job_id).await?;
            }
            Err(_) if self.shutdown.is_cancelled() => {
                // Shutdown interrupted the job; hand it back for redelivery
                tracing::info!(job_id = %job_id, "Releasing in-flight job for redelivery on shutdown");
                queue::release_for_retry(&self.db, job_id, 0).await?;
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job_id,
                    attempt = claim.attempts,
                    error = %e,
                    "Import job delivery failed"
                );

                if claim.attempts >= self.config.max_attempts {
                    queue::abandon(&self.db, job_id).await?;
                    import_jobs::mark_failed(
                        &self.db,
                        job_id,
                        &format!("Abandoned after {} delivery attempts: {}", claim.attempts, e),
                    )
                    .await?;
                } else {
                    // Exponential backoff: base, 2x base, 4x base, ...
                    let delay = self.config.retry_base_delay_secs << (claim.attempts - 1).min(16);
                    queue::release_for_retry(&self.db, job_id, delay).await?;
                }
            }
        }

        Ok(true)
    }

    /// Execute one import job end to end
    ///
    /// Envelope failures (unparseable options or CSV) transition the job
    /// to `failed` and return Ok: they are deterministic, so redelivery
    /// would be wasted. Err is reserved for infrastructure failures the
    /// queue should retry.
    async fn process_job(&self, job_id: Uuid) -> anyhow::Result<()> {
        let Some(job) = import_jobs::load(&self.db, job_id).await? else {
            tracing::warn!(job_id = %job_id, "Queued job no longer exists");
            return Ok(());
        };
        if job.is_terminal() {
            tracing::info!(job_id = %job_id, status = ?job.status, "Skipping already-terminal job");
            return Ok(());
        }

        tracing::info!(
            job_id = %job_id,
            filename = %job.filename,
            "Starting import job"
        );
        let run_started = std::time::Instant::now();

        // At-least-once redelivery: counters and issues from an
        // interrupted run are discarded before rows are re-attempted
        import_jobs::begin_processing(&self.db, job_id).await?;
        import_issues::clear_for_job(&self.db, job_id).await?;

        let Some((payload, options_json)) = import_jobs::load_payload(&self.db, job_id).await?
        else {
            anyhow::bail!("job {} vanished while processing", job_id);
        };

        let options: ImportOptions = match serde_json::from_str(&options_json) {
            Ok(options) => options,
            Err(e) => {
                return self
                    .envelope_failure(job_id, &format!("Options are not valid JSON: {}", e))
                    .await;
            }
        };

        let rows = match parse_rows(&payload) {
            Ok(rows) => rows,
            Err(e) => {
                return self
                    .envelope_failure(job_id, &format!("CSV could not be parsed: {}", e))
                    .await;
            }
        };

        import_jobs::set_total_rows(&self.db, job_id, rows.len() as i64).await?;

        for (idx, row) in rows.iter().enumerate() {
            // No mid-row cancellation; between rows a shutdown hands the
            // job back to the queue
            if self.shutdown.is_cancelled() {
                anyhow::bail!("shutdown requested while processing job {}", job_id);
            }
            self.process_row(&job, (idx + 1) as i64, row, &options).await?;
        }

        let job = import_jobs::load(&self.db, job_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("job {} vanished while processing", job_id))?;

        let status = if job.failed_rows > 0 {
            ImportStatus::CompletedWithErrors
        } else {
            ImportStatus::Completed
        };
        let summary = serde_json::json!({
            "total_rows": job.total_rows,
            "imported_rows": job.imported_rows,
            "failed_rows": job.failed_rows,
            "warning_rows": job.warning_rows,
            "duration_ms": run_started.elapsed().as_millis() as u64,
        });
        import_jobs::finish(&self.db, job_id, status, summary).await?;

        tracing::info!(
            job_id = %job_id,
            status = status.as_str(),
            total_rows = job.total_rows,
            imported_rows = job.imported_rows,
            failed_rows = job.failed_rows,
            warning_rows = job.warning_rows,
            "Import job finished"
        );

        Ok(())
    }

    async fn envelope_failure(&self, job_id: Uuid, message: &str) -> anyhow::Result<()> {
        tracing::warn!(job_id = %job_id, message = %message, "Import job failed before any rows");
        import_jobs::mark_failed(&self.db, job_id, message).await?;
        Ok(())
    }

    /// Run one row through plan → resolve → write → hydrate, then flush
    /// its counter deltas and issue
    async fn process_row(
        &self,
        job: &ImportJob,
        row_number: i64,
        row: &RawRow,
        options: &ImportOptions,
    ) -> anyhow::Result<()> {
        let plan = row_planner::plan(row, options);
        let mut notes = plan.warnings.clone();
        let mut counters = RowCounters {
            processed: 1,
            ..RowCounters::default()
        };

        if plan.target == TargetBucket::Skip {
            if notes.iter().any(|n| n.severity == IssueSeverity::Error) {
                counters.failed = 1;
            }
            self.record_issue(job, row_number, row, &notes).await?;
            import_jobs::apply_row_counters(&self.db, job.id, counters).await?;
            return Ok(());
        }

        let resolution = self.resolve_identity(&plan, row).await;
        for outcome in &resolution.outcomes {
            match outcome.reason {
                LookupReason::UpstreamError => notes.push(PlanWarning {
                    severity: IssueSeverity::Warning,
                    code: codes::LOOKUP_UPSTREAM_ERROR,
                    message: format!("{} lookup failed upstream", outcome.strategy),
                    inference: None,
                }),
                LookupReason::RateLimited => notes.push(PlanWarning {
                    severity: IssueSeverity::Warning,
                    code: codes::LOOKUP_RATE_LIMITED,
                    message: format!("{} lookup was rate limited", outcome.strategy),
                    inference: None,
                }),
                LookupReason::Matched | LookupReason::NotFound => {}
            }
        }

        let title = row.title.trim();
        let author = row.author.trim();

        let book_key = match &resolution.book_key {
            Some(key) => key.clone(),
            None => {
                notes.push(PlanWarning {
                    severity: IssueSeverity::Warning,
                    code: codes::NO_MATCH_FOUND,
                    message: "No catalog match; imported under a local key".to_string(),
                    inference: Some(outcome_trail(&resolution)),
                });
                synthesize_book_key(title, author)
            }
        };

        let now = Utc::now();
        match plan.target {
            TargetBucket::Reading => {
                library::upsert_reading(
                    &self.db,
                    &ReadingEntry {
                        id: Uuid::new_v4(),
                        user_id: job.user_id,
                        book_key: book_key.clone(),
                        title: title.to_string(),
                        author: author.to_string(),
                        started_at: plan.started_at,
                        finished_at: plan.finished_at,
                        progress_percent: plan.progress_percent,
                        judgment: plan.judgment,
                        created_at: now,
                        updated_at: now,
                    },
                )
                .await?;
            }
            TargetBucket::ToRead => {
                library::upsert_to_read(
                    &self.db,
                    &ToReadEntry {
                        id: Uuid::new_v4(),
                        user_id: job.user_id,
                        book_key: book_key.clone(),
                        title: title.to_string(),
                        author: author.to_string(),
                        created_at: now,
                    },
                )
                .await?;
            }
            TargetBucket::Skip => unreachable!("skip rows return before entry write"),
        }

        // Best-effort hydration; a synthesized key is unknown to the
        // catalog, so it seeds the fallback record directly
        if resolution.book_key.is_some() {
            let outcome = self.hydrator.hydrate(&book_key, title, author).await;
            tracing::debug!(
                job_id = %job.id,
                row_number = row_number,
                book_key = %book_key,
                outcome = ?outcome,
                "Row hydrated"
            );
        } else {
            self.hydrator.seed_fallback(&book_key, title, author).await;
        }

        counters.imported = 1;
        if notes.iter().any(|n| n.severity == IssueSeverity::Error) {
            counters.failed = 1;
        }
        if notes.iter().any(|n| n.severity == IssueSeverity::Warning) {
            counters.warnings = 1;
        }

        self.record_issue(job, row_number, row, &notes).await?;
        import_jobs::apply_row_counters(&self.db, job.id, counters).await?;

        Ok(())
    }

    /// Build and run the ordered lookup chain for one planned row
    async fn resolve_identity(&self, plan: &RowPlan, row: &RawRow) -> Resolution {
        let mut strategies: Vec<Box<dyn LookupStrategy>> = Vec::new();

        if let Some(isbn13) = &plan.isbn13 {
            strategies.push(Box::new(IsbnLookup::isbn13(
                Arc::clone(&self.catalog),
                isbn13.clone(),
            )));
        }
        if let Some(isbn10) = &plan.isbn10 {
            strategies.push(Box::new(IsbnLookup::isbn10(
                Arc::clone(&self.catalog),
                isbn10.clone(),
            )));
        }
        strategies.push(Box::new(TitleAuthorLookup::new(
            Arc::clone(&self.catalog),
            row.title.trim().to_string(),
            row.author.trim().to_string(),
        )));

        resolve(&strategies).await
    }

    /// Collapse a row's notes into its single issue record, if any
    async fn record_issue(
        &self,
        job: &ImportJob,
        row_number: i64,
        row: &RawRow,
        notes: &[PlanWarning],
    ) -> anyhow::Result<()> {
        if notes.is_empty() {
            return Ok(());
        }

        let severity = if notes.iter().any(|n| n.severity == IssueSeverity::Error) {
            IssueSeverity::Error
        } else {
            IssueSeverity::Warning
        };
        let code = notes
            .iter()
            .find(|n| n.severity == severity)
            .map(|n| n.code)
            .unwrap_or(notes[0].code);
        let message = notes
            .iter()
            .map(|n| n.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let inference = {
            let parts: Vec<&str> = notes
                .iter()
                .filter_map(|n| n.inference.as_deref())
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        };

        import_issues::insert(
            &self.db,
            &ImportIssue {
                job_id: job.id,
                row_number,
                title: row.title.trim().to_string(),
                author: row.author.trim().to_string(),
                severity,
                code: code.to_string(),
                message,
                inference,
                raw_row: serde_json::to_value(row).ok(),
            },
        )
        .await?;

        Ok(())
    }
}

/// Parse the CSV envelope into raw rows; any reader error is fatal for
/// the job
fn parse_rows(payload: &[u8]) -> Result<Vec<RawRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(payload);

    reader.deserialize().collect()
}

/// Stable placeholder key for rows the catalog could not identify, so
/// the same title+author always lands on the same local key
fn synthesize_book_key(title: &str, author: &str) -> String {
    let seed = format!("{}|{}", title.to_lowercase(), author.to_lowercase());
    format!(
        "local:{}",
        Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes())
    )
}

fn outcome_trail(resolution: &Resolution) -> String {
    resolution
        .outcomes
        .iter()
        .map(|o| {
            format!(
                "{}: {}",
                o.strategy,
                match o.reason {
                    LookupReason::Matched => "matched",
                    LookupReason::NotFound => "not_found",
                    LookupReason::UpstreamError => "upstream_error",
                    LookupReason::RateLimited => "rate_limited",
                }
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}
