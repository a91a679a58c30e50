//! Batch coordinator - runs the pipeline over a deduplicated set of URLs
//!
//! URLs are grouped by session key (host plus explicit port). Each group is
//! one worker task that holds its host's session for its whole lifetime, so
//! attempts against one host run strictly in order while different hosts
//! proceed in parallel up to `max-workers`.

use super::{BatchProgress, BatchReport};
use crate::config::{BatchConfig, Config};
use crate::fetch::PageRenderer;
use crate::pipeline::{AdvisoryPipeline, UrlOutcome};
use crate::session::SessionPool;
use crate::url::AdvisoryUrl;
use crate::PatchwiseError;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// Drives one or more batches through a shared [`AdvisoryPipeline`]
#[derive(Debug)]
pub struct BatchCoordinator {
    pipeline: Arc<AdvisoryPipeline>,
    max_workers: usize,
    timeout: Duration,
}

/// A batch running in the background
///
/// Progress events arrive on [`next_progress`](Self::next_progress) until the
/// batch finishes; [`wait`](Self::wait) yields the report.
#[derive(Debug)]
pub struct BatchHandle {
    progress: UnboundedReceiver<BatchProgress>,
    cancel: CancellationToken,
    join: JoinHandle<BatchReport>,
}

impl BatchHandle {
    pub async fn next_progress(&mut self) -> Option<BatchProgress> {
        self.progress.recv().await
    }

    /// Stops the batch; URLs not yet finished are marked failed
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> Result<BatchReport, PatchwiseError> {
        self.join
            .await
            .map_err(|e| PatchwiseError::Runtime(e.to_string()))
    }
}

/// Unique URLs grouped for execution
#[derive(Debug, Default)]
struct BatchPlan {
    order: Vec<String>,
    aliases: HashMap<String, String>,
    hosts: HashMap<String, String>,
    groups: Vec<(String, Vec<AdvisoryUrl>)>,
    rejected: Vec<UrlOutcome>,
}

impl BatchPlan {
    fn build(urls: &[String]) -> Self {
        let mut plan = Self::default();
        let mut group_index: HashMap<String, usize> = HashMap::new();

        for raw in urls {
            let trimmed = raw.trim();
            if plan.aliases.contains_key(trimmed) {
                continue;
            }

            match AdvisoryUrl::parse(trimmed) {
                Ok(url) => {
                    let key = url.as_str().to_string();
                    plan.aliases.insert(trimmed.to_string(), key.clone());
                    if plan.hosts.contains_key(&key) {
                        continue;
                    }
                    plan.hosts.insert(key.clone(), url.host().to_string());
                    plan.order.push(key);

                    let session_key = url.session_key().to_string();
                    let index = *group_index.entry(session_key.clone()).or_insert_with(|| {
                        plan.groups.push((session_key, Vec::new()));
                        plan.groups.len() - 1
                    });
                    plan.groups[index].1.push(url);
                }
                Err(e) => {
                    tracing::warn!("Skipping malformed URL {:?}: {}", trimmed, e);
                    plan.aliases.insert(trimmed.to_string(), trimmed.to_string());
                    plan.order.push(trimmed.to_string());
                    plan.rejected.push(UrlOutcome::fatal_input(trimmed, e));
                }
            }
        }

        plan
    }
}

fn emit(
    progress: &Option<UnboundedSender<BatchProgress>>,
    completed: usize,
    total: usize,
    outcome: &UrlOutcome,
) {
    if let Some(tx) = progress {
        // A dropped receiver just means nobody is listening
        let _ = tx.send(BatchProgress {
            completed,
            total,
            url: outcome.url.clone(),
            status: outcome.status,
        });
    }
}

impl BatchCoordinator {
    pub fn new(pipeline: AdvisoryPipeline, config: &BatchConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            max_workers: config.max_workers.max(1) as usize,
            timeout: Duration::from_secs(config.batch_timeout_secs),
        }
    }

    /// Builds the coordinator and its standard pipeline from configuration
    pub fn from_config(
        config: &Config,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Result<Self, PatchwiseError> {
        let pipeline = AdvisoryPipeline::from_config(config, renderer)?;
        Ok(Self::new(pipeline, &config.batch))
    }

    pub fn pipeline(&self) -> &AdvisoryPipeline {
        &self.pipeline
    }

    /// Processes a batch with no progress listener and no external cancellation
    pub async fn process_batch(&self, urls: &[String]) -> BatchReport {
        self.run(urls, None, CancellationToken::new()).await
    }

    /// Processes a batch
    ///
    /// # Arguments
    ///
    /// * `urls` - Raw reference URLs from every row, duplicates included
    /// * `progress` - Receives one event per unique URL as it finishes
    /// * `cancel` - Stops the batch early when cancelled
    ///
    /// # Returns
    ///
    /// A report with exactly one outcome per unique URL. URLs still pending
    /// at the deadline or on cancellation are reported as failed.
    pub async fn run(
        &self,
        urls: &[String],
        progress: Option<UnboundedSender<BatchProgress>>,
        cancel: CancellationToken,
    ) -> BatchReport {
        let started_at = Utc::now();
        let plan = BatchPlan::build(urls);
        let total = plan.order.len();
        let host_count = plan.groups.len();
        tracing::info!(
            "Starting batch: {} reference URLs, {} unique across {} hosts",
            urls.len(),
            total,
            host_count
        );

        let mut outcomes: HashMap<String, UrlOutcome> = HashMap::with_capacity(total);
        let mut finished = 0;
        for outcome in plan.rejected {
            finished += 1;
            emit(&progress, finished, total, &outcome);
            outcomes.insert(outcome.url.clone(), outcome);
        }

        let completed = Arc::new(AtomicUsize::new(finished));
        let runs = Arc::new(AtomicUsize::new(0));
        let sessions = Arc::new(SessionPool::new());
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<UrlOutcome>();

        let mut workers = JoinSet::new();
        for (key, group) in plan.groups {
            let pipeline = Arc::clone(&self.pipeline);
            let sessions = Arc::clone(&sessions);
            let semaphore = Arc::clone(&semaphore);
            let completed = Arc::clone(&completed);
            let runs = Arc::clone(&runs);
            let progress = progress.clone();
            let result_tx = result_tx.clone();

            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let shared = sessions.session_for(&key);
                let mut session = shared.lock().await;
                tracing::debug!("Worker for {} started with {} URLs", key, group.len());

                for url in group {
                    runs.fetch_add(1, Ordering::SeqCst);
                    let outcome = pipeline.run(&url, &mut session).await;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    emit(&progress, done, total, &outcome);
                    if result_tx.send(outcome).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);
        let stopped = loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(e)) => tracing::error!("Batch worker failed: {}", e),
                    None => break None,
                },
                _ = &mut deadline => {
                    break Some(format!("batch timed out after {}s", self.timeout.as_secs()));
                }
                _ = cancel.cancelled() => break Some("batch cancelled".to_string()),
            }
        };

        if let Some(reason) = &stopped {
            tracing::warn!(
                "{}; abandoning {} unfinished URLs",
                reason,
                total.saturating_sub(completed.load(Ordering::SeqCst))
            );
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }

        while let Some(outcome) = result_rx.recv().await {
            outcomes.insert(outcome.url.clone(), outcome);
        }

        let reason = stopped
            .as_deref()
            .unwrap_or("worker ended before this URL was processed");
        for key in &plan.order {
            if outcomes.contains_key(key) {
                continue;
            }
            let outcome =
                UrlOutcome::interrupted(key.clone(), plan.hosts.get(key).cloned(), reason);
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            emit(&progress, done, total, &outcome);
            outcomes.insert(key.clone(), outcome);
        }

        let report = BatchReport {
            order: plan.order,
            outcomes,
            aliases: plan.aliases,
            pipeline_runs: runs.load(Ordering::SeqCst),
            hosts: host_count,
            interrupted: stopped.is_some(),
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            "Batch finished in {:.1}s: {} done, {} failed, {} blocked ({} pipeline runs)",
            report.duration_secs(),
            report.count(crate::pipeline::UrlStatus::Done),
            report.count(crate::pipeline::UrlStatus::Failed),
            report.count(crate::pipeline::UrlStatus::Blocked),
            report.pipeline_runs
        );
        report
    }

    /// Runs a batch as a background task
    pub fn spawn(self: Arc<Self>, urls: Vec<String>) -> BatchHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move { self.run(&urls, Some(tx), token).await });
        BatchHandle {
            progress: rx,
            cancel,
            join,
        }
    }

    /// Runs a batch to completion on a private runtime, calling `on_progress`
    /// for every finished URL
    ///
    /// Must not be called from inside a Tokio runtime.
    pub fn process_batch_blocking<F>(
        &self,
        urls: &[String],
        mut on_progress: F,
    ) -> Result<BatchReport, PatchwiseError>
    where
        F: FnMut(&BatchProgress),
    {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let report = runtime.block_on(async {
            let batch = self.run(urls, Some(tx), CancellationToken::new());
            let forward = async {
                while let Some(event) = rx.recv().await {
                    on_progress(&event);
                }
            };
            let (report, ()) = tokio::join!(batch, forward);
            report
        });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchAttemptResult, FetchStrategy, FetchedContent, Fetcher, Fetchers};
    use crate::pipeline::{FailureKind, UrlStatus};
    use crate::quality::QualityScorer;
    use crate::session::DomainSession;
    use crate::vendor::{VendorProfile, VendorRegistry};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Sleeps, then returns a small advisory page; tracks concurrency per host
    #[derive(Default)]
    struct SlowFetcher {
        delay: Duration,
        calls: AtomicUsize,
        active: Mutex<HashMap<String, usize>>,
        max_per_host: AtomicUsize,
        active_total: AtomicUsize,
        max_total: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for SlowFetcher {
        fn strategy(&self) -> FetchStrategy {
            FetchStrategy::DirectHttp
        }

        async fn fetch(
            &self,
            url: &AdvisoryUrl,
            _profile: &VendorProfile,
            session: &mut DomainSession,
        ) -> FetchAttemptResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            {
                let mut active = self.active.lock().unwrap();
                let count = active.entry(url.session_key().to_string()).or_insert(0);
                *count += 1;
                self.max_per_host.fetch_max(*count, Ordering::SeqCst);
            }
            let total = self.active_total.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_total.fetch_max(total, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            self.active_total.fetch_sub(1, Ordering::SeqCst);
            *self
                .active
                .lock()
                .unwrap()
                .get_mut(url.session_key())
                .unwrap() -= 1;
            session.record_success(std::time::Instant::now());

            FetchAttemptResult::success(
                FetchStrategy::DirectHttp,
                Some(200),
                FetchedContent::html(
                    "<html><body><p>Install KB5034441 to fix this.</p></body></html>".to_string(),
                    url.as_str(),
                ),
                1,
                self.delay,
            )
        }
    }

    fn coordinator(
        fetcher: Arc<SlowFetcher>,
        max_workers: u32,
        timeout_secs: u64,
    ) -> BatchCoordinator {
        let pipeline = AdvisoryPipeline::new(
            VendorRegistry::builtin(),
            Fetchers::new().with(fetcher),
            QualityScorer::default(),
        );
        BatchCoordinator::new(
            pipeline,
            &BatchConfig {
                max_workers,
                batch_timeout_secs: timeout_secs,
            },
        )
    }

    fn urls(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plan_dedups_and_groups() {
        let plan = BatchPlan::build(&urls(&[
            "https://A.example/x#frag",
            "https://a.example/x",
            "  https://a.example/x  ",
            "not a url",
            "not a url",
            "https://a.example:8443/y",
            "https://b.example/z?utm_source=feed",
            "https://b.example/z",
        ]));
        assert_eq!(
            plan.order,
            vec![
                "https://a.example/x",
                "not a url",
                "https://a.example:8443/y",
                "https://b.example/z"
            ]
        );
        assert_eq!(plan.groups.len(), 3);
        assert_eq!(plan.rejected.len(), 1);
        assert_eq!(
            plan.aliases.get("https://A.example/x#frag").map(String::as_str),
            Some("https://a.example/x")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_unique_url_runs_once() {
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_millis(100),
            ..Default::default()
        });
        let coordinator = coordinator(fetcher.clone(), 4, 600);
        let input = urls(&[
            "https://a.example/1",
            "https://a.example/1",
            "https://b.example/1",
            "https://a.example/2",
            "https://b.example/1#x",
            "::bad::",
        ]);

        let report = coordinator.process_batch(&input).await;

        assert_eq!(report.len(), 4);
        assert_eq!(report.pipeline_runs, 3);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.count(UrlStatus::Done), 3);
        assert_eq!(
            report.outcome_for("::bad::").and_then(|o| o.failure),
            Some(FailureKind::FatalInput)
        );
        assert!(!report.interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_host_is_serialized_across_hosts_parallel() {
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_secs(1),
            ..Default::default()
        });
        let coordinator = coordinator(fetcher.clone(), 4, 600);
        let input = urls(&[
            "https://a.example/1",
            "https://a.example/2",
            "https://a.example/3",
            "https://b.example/1",
            "https://b.example/2",
            "https://c.example/1",
        ]);

        let report = coordinator.process_batch(&input).await;

        assert_eq!(report.count(UrlStatus::Done), 6);
        assert_eq!(fetcher.max_per_host.load(Ordering::SeqCst), 1);
        assert!(fetcher.max_total.load(Ordering::SeqCst) > 1);
        assert_eq!(report.hosts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_limit_bounds_parallel_hosts() {
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_secs(1),
            ..Default::default()
        });
        let coordinator = coordinator(fetcher.clone(), 2, 600);
        let input = urls(&[
            "https://a.example/1",
            "https://b.example/1",
            "https://c.example/1",
            "https://d.example/1",
        ]);

        coordinator.process_batch(&input).await;
        assert_eq!(fetcher.max_total.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fails_pending_urls() {
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_secs(60),
            ..Default::default()
        });
        let coordinator = coordinator(fetcher, 4, 90);
        let input = urls(&["https://a.example/1", "https://a.example/2", "https://b.example/1"]);

        let report = coordinator.process_batch(&input).await;

        assert!(report.interrupted);
        // The first URL on each host finishes at 60s; a.example/2 is cut off at 90s
        assert_eq!(report.count(UrlStatus::Done), 2);
        let pending = report.outcome_for("https://a.example/2").unwrap();
        assert_eq!(pending.status, UrlStatus::Failed);
        assert_eq!(pending.failure, Some(FailureKind::Timeout));
        assert_eq!(pending.diagnostic, "batch timed out after 90s");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_from_handle() {
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_secs(60),
            ..Default::default()
        });
        let coordinator = Arc::new(coordinator(fetcher, 4, 600));
        let handle = coordinator.spawn(urls(&["https://a.example/1", "https://b.example/1"]));

        handle.cancel();
        let report = handle.wait().await.unwrap();

        assert!(report.interrupted);
        assert_eq!(report.count(UrlStatus::Failed), 2);
        assert!(report.iter().all(|o| o.diagnostic == "batch cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_events_cover_every_url() {
        let fetcher = Arc::new(SlowFetcher {
            delay: Duration::from_millis(10),
            ..Default::default()
        });
        let coordinator = Arc::new(coordinator(fetcher, 4, 600));
        let mut handle = coordinator.spawn(urls(&[
            "https://a.example/1",
            "https://b.example/1",
            "bad input",
        ]));

        let mut events = Vec::new();
        while let Some(event) = handle.next_progress().await {
            events.push(event);
        }
        let report = handle.wait().await.unwrap();

        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.total == 3));
        let mut completed: Vec<_> = events.iter().map(|e| e.completed).collect();
        completed.sort_unstable();
        assert_eq!(completed, vec![1, 2, 3]);
        assert_eq!(report.len(), 3);
    }

    #[test]
    fn test_blocking_entry_point() {
        let fetcher = Arc::new(SlowFetcher::default());
        let coordinator = coordinator(fetcher, 2, 600);
        let mut seen = 0;
        let report = coordinator
            .process_batch_blocking(&urls(&["https://a.example/1", "https://b.example/2"]), |_| {
                seen += 1
            })
            .unwrap();
        assert_eq!(seen, 2);
        assert_eq!(report.count(UrlStatus::Done), 2);
    }
}
