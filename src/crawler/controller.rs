//! Crawl controller - the full-register crawl loop
//!
//! This module walks every enumeration bucket in order, pages through each
//! bucket's search results, fetches and persists every entity not already on
//! disk, and writes checkpoints so an interrupted or failed run can resume
//! where it stopped.
//!
//! Everything runs sequentially on one task: a checkpoint always describes a
//! fully processed prefix of the enumeration order.

use crate::api::{fetch_entity, ApiError, CompanySummary, Gateway};
use crate::config::{Config, CrawlConfig};
use crate::crawler::buckets::PageCursor;
use crate::crawler::checkpoint::{Checkpoint, CheckpointStatus, CheckpointStore};
use crate::crawler::control::{CrawlControl, PauseEnd};
use crate::crawler::progress::{format_duration, ProgressTracker};
use crate::crawler::resume::{ResumePointer, ResumeThreshold};
use crate::crawler::CrawlError;
use crate::monitor::ResourceMonitor;
use crate::state::CrawlState;
use crate::storage::{save_record, Repository};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How a run that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Every bucket was exhausted
    Completed,
    /// The configured entity cap was reached
    LimitReached,
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlOutcome {
    pub status: OutcomeStatus,
    /// Cumulative count, including entities counted by earlier runs
    pub total_processed: u64,
    pub processed_this_run: u64,
    pub skipped_existing: u64,
    pub not_found: u64,
    pub skipped_invalid: u64,
    pub elapsed: Duration,
}

/// What happened to one search hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemResult {
    Processed,
    SkippedExisting,
    NotFound,
    SkippedInvalid,
}

/// Whether the crawl continues after an entity
enum Flow {
    Continue,
    LimitReached,
}

#[derive(Debug, Default)]
struct Counters {
    total_processed: u64,
    skipped_existing: u64,
    not_found: u64,
    skipped_invalid: u64,
}

/// Drives a full crawl of the register
pub struct CrawlController<R: Repository, M: ResourceMonitor> {
    gateway: Gateway,
    repository: R,
    monitor: M,
    checkpoints: CheckpointStore,
    control: Arc<CrawlControl>,
    settings: CrawlConfig,
    data_dir: PathBuf,
    state: CrawlState,
    counters: Counters,
}

impl<R: Repository, M: ResourceMonitor> CrawlController<R, M> {
    /// Creates a controller in the `Idle` state
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `gateway` - The registry gateway
    /// * `repository` - Where entities are persisted
    /// * `monitor` - Source of disk usage reports
    /// * `control` - Interrupt and resume signals
    pub fn new(
        config: &Config,
        gateway: Gateway,
        repository: R,
        monitor: M,
        control: Arc<CrawlControl>,
    ) -> Self {
        Self {
            gateway,
            repository,
            monitor,
            checkpoints: CheckpointStore::new(config.output.checkpoint_path()),
            control,
            settings: config.crawl.clone(),
            data_dir: config.output.data_dir.clone(),
            state: CrawlState::Idle,
            counters: Counters::default(),
        }
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Runs the crawl from `resume` until completion, the entity cap, an
    /// interrupt or a fatal error
    ///
    /// A controller runs once; calling `run` again after it returned fails
    /// with `CrawlError::InvalidTransition`.
    pub async fn run(&mut self, resume: ResumePointer) -> Result<CrawlOutcome, CrawlError> {
        let mut tracker = ProgressTracker::start(self.settings.estimated_total);
        self.counters.total_processed = resume.total_processed;

        if resume.is_fresh() {
            tracing::info!("Starting comprehensive crawl of the register");
        } else {
            tracing::info!(
                "Resuming from bucket '{}' index {}, company {:?}",
                self.bucket_name(resume.bucket_index),
                resume.offset,
                resume.threshold.as_ref().map(ResumeThreshold::title)
            );
        }

        self.log_resources().await;

        let mut threshold = resume.threshold.clone();

        for bucket_index in resume.bucket_index..self.settings.buckets.len() {
            let start_position = if bucket_index == resume.bucket_index {
                resume.offset
            } else {
                threshold = None;
                0
            };

            self.transition(CrawlState::EnumeratingBucket { bucket_index })?;
            tracing::info!(
                "Processing companies starting with '{}'",
                self.bucket_name(bucket_index)
            );

            let flow = self
                .crawl_bucket(bucket_index, start_position, &mut threshold, &mut tracker)
                .await?;

            if let Flow::LimitReached = flow {
                self.transition(CrawlState::Completed)?;
                return Ok(self.outcome(OutcomeStatus::LimitReached, &tracker));
            }
        }

        self.finish(&tracker).await?;
        Ok(self.outcome(OutcomeStatus::Completed, &tracker))
    }

    /// Pages through one bucket starting at absolute position `start_position`
    async fn crawl_bucket(
        &mut self,
        bucket_index: usize,
        start_position: u64,
        threshold: &mut Option<ResumeThreshold>,
        tracker: &mut ProgressTracker,
    ) -> Result<Flow, CrawlError> {
        let bucket = self.bucket_name(bucket_index).to_string();
        let page_size = self.settings.page_size;
        let mut cursor = PageCursor::containing(bucket_index, start_position, page_size);
        let mut next_index = start_position;
        let mut last_title: Option<String> = threshold.as_ref().map(|t| t.title().to_string());

        loop {
            if self.control.is_interrupted() {
                return Err(self.interrupted(&bucket, next_index, last_title));
            }

            self.transition(CrawlState::FetchingPage {
                bucket_index,
                offset: cursor.offset,
            })?;

            let page = match self
                .gateway
                .search_companies(&bucket, page_size, cursor.offset)
                .await
            {
                Ok(page) => page,
                Err(source) if source.is_interrupted() => {
                    return Err(self.interrupted(&bucket, next_index, last_title));
                }
                Err(source) => {
                    tracing::error!("HTTP error during pagination: {}", source);
                    let checkpoint = Checkpoint::at(
                        &bucket,
                        next_index,
                        None,
                        self.counters.total_processed,
                        None,
                    );
                    return Err(self.failed(checkpoint, &bucket, next_index, source.into()));
                }
            };

            if page.items.is_empty() {
                tracing::info!("No more companies starting with '{}'", bucket);
                return Ok(Flow::Continue);
            }

            tracker.log(self.counters.total_processed);

            for (n, item) in page.items.iter().enumerate() {
                let index = cursor.position_of(n);
                if index < next_index {
                    continue;
                }

                if self.control.is_interrupted() {
                    return Err(self.interrupted(&bucket, next_index, last_title));
                }

                self.transition(CrawlState::ProcessingEntity {
                    bucket_index,
                    index,
                })?;

                let title = item.title();
                if let Some(active) = threshold.as_ref() {
                    if !active.is_reached_by(title) {
                        tracing::debug!(
                            "Skipping {}: {}",
                            item.company_number().unwrap_or("-"),
                            title
                        );
                        next_index = index + 1;
                        continue;
                    }
                    tracing::info!("Reached resume point at '{}'", title);
                    *threshold = None;
                }

                match self.process_item(item).await {
                    Ok(ItemResult::Processed) => {
                        self.counters.total_processed += 1;
                        tracker.record();
                        next_index = index + 1;
                        last_title = Some(title.to_string());

                        let flow = self
                            .after_entity(bucket_index, &bucket, next_index, title, tracker)
                            .await?;
                        if let Flow::LimitReached = flow {
                            return Ok(Flow::LimitReached);
                        }
                    }
                    Ok(_) => next_index = index + 1,
                    Err(source) if source.api_error().is_some_and(ApiError::is_interrupted) => {
                        // The entity was not saved; resuming retries it
                        return Err(self.interrupted(&bucket, index, last_title));
                    }
                    Err(source) => {
                        tracing::error!(
                            "Error processing company {}: {}",
                            item.company_number().unwrap_or("-"),
                            source
                        );
                        let checkpoint = Checkpoint::at(
                            &bucket,
                            index,
                            Some(title.to_string()),
                            self.counters.total_processed,
                            None,
                        );
                        return Err(self.failed(checkpoint, &bucket, index, source));
                    }
                }
            }

            cursor.advance();
            if cursor.is_past(page.total_results) {
                tracing::info!("Completed processing companies starting with '{}'", bucket);
                return Ok(Flow::Continue);
            }
        }
    }

    /// Fetches and persists one search hit unless it is already on disk
    async fn process_item(&mut self, item: &CompanySummary) -> Result<ItemResult, CrawlError> {
        let Some(company_number) = item.company_number() else {
            tracing::warn!("Skipping company without company number: {:?}", item.title);
            self.counters.skipped_invalid += 1;
            return Ok(ItemResult::SkippedInvalid);
        };

        if self.repository.is_complete(company_number) {
            tracing::debug!("Company {} already scraped, skipping", company_number);
            self.counters.skipped_existing += 1;
            return Ok(ItemResult::SkippedExisting);
        }

        tracing::info!(
            "Processing company {}: {} - {}",
            self.counters.total_processed + 1,
            company_number,
            item.title()
        );

        let record = match fetch_entity(&self.gateway, company_number, self.settings.page_size)
            .await
        {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                tracing::warn!("Company {} not found", company_number);
                self.counters.not_found += 1;
                return Ok(ItemResult::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        match save_record(&mut self.repository, &record) {
            Ok(saved_as) => {
                tracing::debug!("Successfully saved data for company {}", saved_as);
                Ok(ItemResult::Processed)
            }
            Err(e) if e.is_invalid_input() => {
                tracing::warn!("No company number found for {}, cannot save data", company_number);
                self.counters.skipped_invalid += 1;
                Ok(ItemResult::SkippedInvalid)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resource check, entity cap and periodic checkpoint, in that order
    async fn after_entity(
        &mut self,
        bucket_index: usize,
        bucket: &str,
        next_index: u64,
        title: &str,
        tracker: &ProgressTracker,
    ) -> Result<Flow, CrawlError> {
        let total = self.counters.total_processed;

        if is_multiple(total, self.settings.resource_check_interval)
            && self.disk_is_critical().await
        {
            self.pause_for_disk(bucket_index, bucket, next_index, title)
                .await?;
        }

        if let Some(max) = self.settings.max_entities {
            if total >= max {
                tracing::info!("Reached maximum number of companies: {}", max);
                return Ok(Flow::LimitReached);
            }
        }

        if is_multiple(total, self.settings.save_interval) {
            let checkpoint =
                Checkpoint::at(bucket, next_index, Some(title.to_string()), total, None)
                    .with_eta(tracker.eta(total));
            self.checkpoints.save(&checkpoint)?;
            tracing::info!("Progress saved: {} companies processed", total);
        }

        Ok(Flow::Continue)
    }

    /// Queries the monitor; a monitor failure never stops the crawl
    async fn disk_is_critical(&self) -> bool {
        match self.monitor.report(&self.data_dir).await {
            Ok(report) => {
                tracing::info!(
                    disk_free_gb = report.disk.free_gb,
                    memory_percent = report.memory.percent,
                    cpu_percent = report.cpu_percent,
                    "Resource check"
                );
                if report.is_disk_below(self.settings.min_free_disk_gb) {
                    tracing::error!(
                        "CRITICALLY LOW DISK SPACE: {:.2} GB remaining",
                        report.disk.free_gb
                    );
                    return true;
                }
                false
            }
            Err(e) => {
                tracing::warn!("Resource check failed: {}", e);
                false
            }
        }
    }

    /// Writes a `paused_low_disk` checkpoint and blocks until resumed
    async fn pause_for_disk(
        &mut self,
        bucket_index: usize,
        bucket: &str,
        next_index: u64,
        title: &str,
    ) -> Result<(), CrawlError> {
        let total = self.counters.total_processed;

        self.control.clear_resume();
        self.transition(CrawlState::PausedLowDisk)?;
        self.checkpoints.save(&Checkpoint::at(
            bucket,
            next_index,
            Some(title.to_string()),
            total,
            Some(CheckpointStatus::PausedLowDisk),
        ))?;

        tracing::error!("Crawl paused. Free up disk space, then send a resume signal.");
        tracing::error!(
            "Current progress: {} companies processed. Last company: {}",
            total,
            title
        );

        match self.control.wait_for_resume().await {
            PauseEnd::Resumed => {
                tracing::info!("Resuming crawl");
                self.transition(CrawlState::ProcessingEntity {
                    bucket_index,
                    index: next_index.saturating_sub(1),
                })
            }
            PauseEnd::Interrupted => Err(self.interrupted(
                bucket,
                next_index,
                Some(title.to_string()),
            )),
        }
    }

    /// Writes the `interrupted` checkpoint and builds the error to return
    fn interrupted(
        &mut self,
        bucket: &str,
        next_index: u64,
        last_title: Option<String>,
    ) -> CrawlError {
        let total = self.counters.total_processed;
        tracing::warn!("Process interrupted by user");

        if let Err(e) = self.transition(CrawlState::Interrupted) {
            return e;
        }
        let checkpoint = Checkpoint::at(
            bucket,
            next_index,
            last_title,
            total,
            Some(CheckpointStatus::Interrupted),
        );
        if let Err(e) = self.checkpoints.save(&checkpoint) {
            return e.into();
        }

        tracing::info!("Progress saved: {} companies processed", total);
        CrawlError::Interrupted {
            total_processed: total,
        }
    }

    /// Writes the failure checkpoint and wraps the error with its position
    fn failed(
        &mut self,
        checkpoint: Checkpoint,
        bucket: &str,
        index: u64,
        source: CrawlError,
    ) -> CrawlError {
        self.state = CrawlState::Failed;
        if let Err(e) = self.checkpoints.save(&checkpoint) {
            tracing::error!("Failed to save checkpoint after error: {}", e);
        }
        CrawlError::Failed {
            bucket: bucket.to_string(),
            index,
            source: Box::new(source),
        }
    }

    /// Writes the `completed` checkpoint that resets the resume position
    async fn finish(&mut self, tracker: &ProgressTracker) -> Result<(), CrawlError> {
        self.transition(CrawlState::Completed)?;
        self.log_resources().await;

        let time_taken = format_duration(tracker.elapsed());
        tracing::info!(
            "Completed scraping all companies. Total processed: {}",
            self.counters.total_processed
        );
        tracing::info!("Total time taken: {}", time_taken);

        self.checkpoints.save(&Checkpoint::completed(
            self.counters.total_processed,
            time_taken,
        ))?;
        Ok(())
    }

    fn transition(&mut self, next: CrawlState) -> Result<(), CrawlError> {
        if !self.state.can_transition_to(&next) {
            return Err(CrawlError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::trace!("State {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    async fn log_resources(&self) {
        match self.monitor.report(&self.data_dir).await {
            Ok(report) => tracing::info!(
                "Resources: {:.2} GB disk free of {:.2} GB, memory {:.1}% used, CPU {:.1}%",
                report.disk.free_gb,
                report.disk.total_gb,
                report.memory.percent,
                report.cpu_percent
            ),
            Err(e) => tracing::warn!("Resource report unavailable: {}", e),
        }
    }

    fn bucket_name(&self, bucket_index: usize) -> &str {
        self.settings
            .buckets
            .get(bucket_index)
            .map(String::as_str)
            .unwrap_or("")
    }

    fn outcome(&self, status: OutcomeStatus, tracker: &ProgressTracker) -> CrawlOutcome {
        CrawlOutcome {
            status,
            total_processed: self.counters.total_processed,
            processed_this_run: tracker.processed_this_run(),
            skipped_existing: self.counters.skipped_existing,
            not_found: self.counters.not_found,
            skipped_invalid: self.counters.skipped_invalid,
            elapsed: tracker.elapsed(),
        }
    }
}

fn is_multiple(count: u64, interval: u64) -> bool {
    interval > 0 && count % interval == 0
}
