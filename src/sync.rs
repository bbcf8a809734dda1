//! Sync Engine - Orchestrates repository synchronization
//!
//! Fetches descriptors from a [`RepoSource`], classifies them into category
//! buckets, and walks the categories in order. Within a category, repositories
//! are synced concurrently up to `max_parallel`; a category is finished before
//! the next one starts.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::category::{partition, Category, CategoryBuckets};
use crate::config::RunConfig;
use crate::discovery::{RepoDescriptor, RepoSource};
use crate::error::{GhSyncError, EXIT_PARTIAL_FAILURE};
use crate::git::{plan, upstream_for, GitClient, SyncAction, SyncResult};
use crate::layout::Layout;

/// Result for one repository, with where it was filed
#[derive(Debug, Clone)]
pub struct RepoOutcome {
    pub category: Category,
    pub name: String,
    pub result: SyncResult,
}

/// A category that could not be processed at all
#[derive(Debug, Clone)]
pub struct CategoryFailure {
    pub category: Category,
    pub error: String,
}

/// Results from a complete sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub cloned: usize,
    pub pulled: usize,
    pub up_to_date: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration: Duration,
    pub results: Vec<RepoOutcome>,
    pub category_failures: Vec<CategoryFailure>,
}

impl SyncSummary {
    fn from_outcomes(
        results: Vec<RepoOutcome>,
        category_failures: Vec<CategoryFailure>,
        duration: Duration,
    ) -> Self {
        let mut summary = SyncSummary {
            total_repositories: results.len(),
            duration,
            category_failures,
            ..Default::default()
        };

        for outcome in &results {
            match outcome.result {
                SyncResult::Cloned { .. } => summary.cloned += 1,
                SyncResult::Pulled { .. } => summary.pulled += 1,
                SyncResult::UpToDate { .. } => summary.up_to_date += 1,
                SyncResult::Skipped { .. } => summary.skipped += 1,
                SyncResult::Failed { .. } => summary.failed += 1,
            }
        }

        summary.results = results;
        summary
    }

    pub fn successful_operations(&self) -> usize {
        self.cloned + self.pulled + self.up_to_date
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || !self.category_failures.is_empty()
    }

    /// Process exit status for this run
    pub fn exit_code(&self) -> u8 {
        if self.has_failures() {
            EXIT_PARTIAL_FAILURE
        } else {
            0
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &RepoOutcome> {
        self.results.iter().filter(|o| o.result.is_failure())
    }
}

/// The main sync engine that orchestrates repository synchronization
#[derive(Clone)]
pub struct SyncEngine {
    run: Arc<RunConfig>,
    source: Arc<dyn RepoSource>,
    layout: Layout,
    git_client: GitClient,
}

impl SyncEngine {
    pub fn new(run: RunConfig, source: Arc<dyn RepoSource>) -> Self {
        let layout = Layout::new(&run.root);
        let git_client = GitClient::new(run.timeout, run.fast_forward_only);

        Self {
            run: Arc::new(run),
            source,
            layout,
            git_client,
        }
    }

    /// Run a complete sync operation: discover repositories and sync them.
    ///
    /// Only a failure to list repositories aborts the run; directory and
    /// repository failures are collected in the summary.
    pub async fn run_sync(&self) -> Result<SyncSummary, GhSyncError> {
        let start_time = Instant::now();

        info!("Starting repository synchronization");

        let buckets = self.discover().await?;

        let mut results = Vec::new();
        let mut category_failures = Vec::new();

        results.extend(
            collision_outcomes(&buckets, &self.layout)
                .into_iter()
                .filter(|outcome| self.run.includes(outcome.category)),
        );

        for (&category, repos) in &buckets.buckets {
            if !self.run.includes(category) {
                info!("Skipping category {} ({} repositories)", category, repos.len());
                continue;
            }

            if let Err(e) = self.layout.ensure_category_dir(category).await {
                error!("{}", e);
                category_failures.push(CategoryFailure {
                    category,
                    error: e.to_string(),
                });
                continue;
            }

            let repos = self.with_parents(category, repos).await;
            results.extend(self.sync_category(category, repos).await);
        }

        let summary = SyncSummary::from_outcomes(results, category_failures, start_time.elapsed());

        info!(
            "Sync completed in {:.2}s: {} successful, {} failed, {} skipped",
            summary.duration.as_secs_f64(),
            summary.successful_operations(),
            summary.failed,
            summary.skipped
        );

        Ok(summary)
    }

    /// Preview the action for every repository without touching anything
    pub async fn dry_run(&self) -> Result<Vec<RepoOutcome>, GhSyncError> {
        info!("Running dry-run sync analysis");

        let buckets = self.discover().await?;
        let mut outcomes = Vec::new();

        for (&category, repos) in &buckets.buckets {
            if !self.run.includes(category) {
                continue;
            }

            for repo in repos {
                let reason = match plan(repo, category, &self.layout) {
                    SyncAction::Update => "would update".to_string(),
                    SyncAction::Clone { url } => format!("would clone {}", url),
                };
                outcomes.push(RepoOutcome {
                    category,
                    name: repo.name.clone(),
                    result: SyncResult::Skipped {
                        path: self.layout.repo_dir(category, &repo.name),
                        reason,
                    },
                });
            }
        }

        Ok(outcomes)
    }

    /// Fetch both listings and group them by category
    pub async fn discover(&self) -> Result<CategoryBuckets, GhSyncError> {
        debug!("Discovering repositories from {}", self.source.provider_name());

        let owned = self
            .source
            .list_repositories(self.run.scope.as_deref())
            .await?;

        let watched = if self.run.includes_watched() {
            self.source.list_watched().await?
        } else {
            Vec::new()
        };

        info!(
            "Discovered {} repositories and {} watched",
            owned.len(),
            watched.len()
        );

        let buckets = partition(owned, watched);
        for (category, repos) in &buckets.buckets {
            debug!("{}: {} repositories", category, repos.len());
        }

        Ok(buckets)
    }

    /// Fill in fork parents the listing left out, when upstream wiring is on
    async fn with_parents(&self, category: Category, repos: &[RepoDescriptor]) -> Vec<RepoDescriptor> {
        if category != Category::Forks || !self.run.upstream {
            return repos.to_vec();
        }

        let mut resolved = Vec::with_capacity(repos.len());
        for repo in repos {
            let mut repo = repo.clone();
            if repo.parent.is_none() {
                match self.source.resolve_parent(&repo).await {
                    Ok(parent) => repo.parent = parent,
                    Err(e) => warn!("Could not look up parent of {}: {}", repo.full_name(), e),
                }
            }
            resolved.push(repo);
        }
        resolved
    }

    /// Sync every repository of one category with bounded concurrency
    async fn sync_category(&self, category: Category, repos: Vec<RepoDescriptor>) -> Vec<RepoOutcome> {
        let parallel = self.run.max_parallel.max(1);

        info!(
            "Syncing {} repositories in {} with concurrency {}",
            repos.len(),
            category,
            parallel
        );

        stream::iter(repos)
            .map(|repo| {
                let git_client = &self.git_client;
                let layout = &self.layout;
                let upstream_enabled = self.run.upstream;

                async move {
                    let upstream = upstream_for(&repo, category, upstream_enabled);
                    let result = git_client.sync(&repo, category, layout, upstream).await;

                    if let SyncResult::Failed { error, .. } = &result {
                        error!("Sync failed for {} in {}: {}", repo.full_name(), category, error);
                    }

                    RepoOutcome {
                        category,
                        name: repo.name.clone(),
                        result,
                    }
                }
            })
            .buffer_unordered(parallel)
            .collect()
            .await
    }

    /// Get configuration for external inspection
    pub fn config(&self) -> &RunConfig {
        &self.run
    }
}

/// Skipped outcomes for repositories whose directory name was already taken
fn collision_outcomes(buckets: &CategoryBuckets, layout: &Layout) -> Vec<RepoOutcome> {
    buckets
        .collisions
        .iter()
        .map(|(category, repo)| {
            warn!(
                "Skipping {}: another repository already uses {}/{}",
                repo.full_name(),
                category,
                repo.name
            );
            RepoOutcome {
                category: *category,
                name: repo.name.clone(),
                result: SyncResult::Skipped {
                    path: layout.repo_dir(*category, &repo.name),
                    reason: format!(
                        "{} has the same name as another {} repository",
                        repo.full_name(),
                        category
                    ),
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::discovery::{ParentRef, Visibility};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeSource {
        owned: Vec<RepoDescriptor>,
        watched: Vec<RepoDescriptor>,
        watched_calls: AtomicUsize,
        fail_listing: bool,
    }

    #[async_trait]
    impl RepoSource for FakeSource {
        async fn list_repositories(&self, _scope: Option<&str>) -> Result<Vec<RepoDescriptor>, GhSyncError> {
            if self.fail_listing {
                return Err(GhSyncError::Api {
                    action: "listing".to_string(),
                    detail: "Bad credentials (HTTP 401 Unauthorized)".to_string(),
                });
            }
            Ok(self.owned.clone())
        }

        async fn list_watched(&self) -> Result<Vec<RepoDescriptor>, GhSyncError> {
            self.watched_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.watched.clone())
        }

        async fn resolve_parent(&self, _repo: &RepoDescriptor) -> Result<Option<ParentRef>, GhSyncError> {
            Ok(None)
        }

        fn provider_name(&self) -> &'static str {
            "fake"
        }
    }

    fn run_config(root: PathBuf) -> RunConfig {
        RunConfig::from_config(&Config::default(), root)
    }

    fn outcome(result: SyncResult) -> RepoOutcome {
        RepoOutcome {
            category: Category::Public,
            name: "repo".to_string(),
            result,
        }
    }

    #[test]
    fn test_sync_summary_calculation() {
        let results = vec![
            outcome(SyncResult::Cloned {
                path: "/tmp/repo1".into(),
            }),
            outcome(SyncResult::Pulled {
                path: "/tmp/repo2".into(),
            }),
            outcome(SyncResult::Failed {
                path: "/tmp/repo3".into(),
                error: "Network error".to_string(),
            }),
            outcome(SyncResult::Skipped {
                path: "/tmp/repo4".into(),
                reason: "name collision".to_string(),
            }),
            outcome(SyncResult::UpToDate {
                path: "/tmp/repo5".into(),
            }),
        ];

        let duration = Duration::from_secs(60);
        let summary = SyncSummary::from_outcomes(results, Vec::new(), duration);

        assert_eq!(summary.total_repositories, 5);
        assert_eq!(summary.successful_operations(), 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.duration, duration);
        assert_eq!(summary.failures().count(), 1);
        assert_eq!(summary.exit_code(), EXIT_PARTIAL_FAILURE);
    }

    #[test]
    fn test_category_failure_sets_exit_code() {
        let failures = vec![CategoryFailure {
            category: Category::Forks,
            error: "permission denied".to_string(),
        }];
        let summary = SyncSummary::from_outcomes(Vec::new(), failures, Duration::ZERO);
        assert!(summary.has_failures());
        assert_eq!(summary.exit_code(), EXIT_PARTIAL_FAILURE);

        let clean = SyncSummary::from_outcomes(Vec::new(), Vec::new(), Duration::ZERO);
        assert_eq!(clean.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_scoped_run_does_not_fetch_watched() {
        let temp = TempDir::new().unwrap();
        let source = Arc::new(FakeSource {
            watched: vec![RepoDescriptor::new("bob", "bar")],
            ..Default::default()
        });

        let mut run = run_config(temp.path().to_path_buf());
        run.scope = Some("psf".to_string());
        let engine = SyncEngine::new(run, source.clone());

        let buckets = engine.discover().await.unwrap();
        assert!(buckets.is_empty());
        assert_eq!(source.watched_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_before_touching_disk() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let source = Arc::new(FakeSource {
            fail_listing: true,
            ..Default::default()
        });

        let engine = SyncEngine::new(run_config(root.clone()), source);
        let err = engine.run_sync().await.unwrap_err();

        assert!(matches!(err, GhSyncError::Api { .. }));
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_dry_run_plans_without_creating_directories() {
        let temp = TempDir::new().unwrap();
        let mut private = RepoDescriptor::new("alice", "secret");
        private.visibility = Visibility::Private;

        let source = Arc::new(FakeSource {
            owned: vec![private],
            watched: vec![RepoDescriptor::new("bob", "bar")],
            ..Default::default()
        });

        let engine = SyncEngine::new(run_config(temp.path().to_path_buf()), source);
        let outcomes = engine.dry_run().await.unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(!temp.path().join("private").exists());
        assert!(!temp.path().join("watched").exists());

        let watched = outcomes
            .iter()
            .find(|o| o.category == Category::Watched)
            .unwrap();
        match &watched.result {
            SyncResult::Skipped { reason, .. } => {
                assert_eq!(reason, "would clone https://github.com/bob/bar.git")
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_filtered_categories_are_never_entered() {
        let temp = TempDir::new().unwrap();
        let mut mirror = RepoDescriptor::new("alice", "mirrored");
        mirror.description = Some("mirror of svn".to_string());

        let source = Arc::new(FakeSource {
            owned: vec![RepoDescriptor::new("alice", "foo"), mirror],
            watched: vec![RepoDescriptor::new("bob", "bar")],
            ..Default::default()
        });

        let mut run = run_config(temp.path().to_path_buf());
        run.only = Some(vec![Category::Private, Category::Forks]);
        let engine = SyncEngine::new(run, source.clone());

        let summary = engine.run_sync().await.unwrap();

        assert_eq!(summary.total_repositories, 0);
        for category in [Category::Mirrors, Category::Public, Category::Watched] {
            assert!(!temp.path().join(category.as_str()).exists());
        }
        assert_eq!(source.watched_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_directory_failure_skips_only_that_category() {
        let temp = TempDir::new().unwrap();
        // a regular file where the public directory should go
        std::fs::write(temp.path().join("public"), "in the way").unwrap();

        let source = Arc::new(FakeSource {
            owned: vec![RepoDescriptor::new("alice", "foo")],
            ..Default::default()
        });

        let engine = SyncEngine::new(run_config(temp.path().to_path_buf()), source);
        let summary = engine.run_sync().await.unwrap();

        assert_eq!(summary.category_failures.len(), 1);
        assert_eq!(summary.category_failures[0].category, Category::Public);
        assert_eq!(summary.total_repositories, 0);
        assert_eq!(summary.exit_code(), EXIT_PARTIAL_FAILURE);
    }
}
