use colored::Colorize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::category::Category;
use crate::discovery::{ParentRef, RepoDescriptor};
use crate::layout::{Layout, LocalState};

/// Git operations handler for the pull-or-clone step
#[derive(Debug, Clone)]
pub struct GitClient {
    timeout: Duration,
    fast_forward_only: bool,
}

/// What a sync will do for a repository, decided from the local tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// A working copy exists; bring it up to date
    Update,
    /// No working copy yet; clone from `url`
    Clone { url: String },
}

/// Result of a sync operation
#[derive(Debug, Clone)]
pub enum SyncResult {
    /// Repository was successfully cloned
    Cloned { path: PathBuf },
    /// Repository was successfully pulled and received new commits
    Pulled { path: PathBuf },
    /// Pull succeeded with nothing to fetch
    UpToDate { path: PathBuf },
    /// Repository was not touched
    Skipped { path: PathBuf, reason: String },
    /// Operation failed with error
    Failed { path: PathBuf, error: String },
}

impl SyncResult {
    pub fn path(&self) -> &Path {
        match self {
            SyncResult::Cloned { path }
            | SyncResult::Pulled { path }
            | SyncResult::UpToDate { path }
            | SyncResult::Skipped { path, .. }
            | SyncResult::Failed { path, .. } => path,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SyncResult::Failed { .. })
    }
}

/// Outcome of wiring the `upstream` remote on a fork
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamOutcome {
    Added,
    AlreadyConfigured,
    Failed(String),
}

/// Clone URL for a repository in a category: authenticated for owned
/// repositories, anonymous for watched ones whatever their visibility.
pub fn clone_url_for<'a>(repo: &'a RepoDescriptor, category: Category) -> &'a str {
    if category.is_owned() {
        &repo.ssh_url
    } else {
        &repo.clone_url
    }
}

/// Decide between update and clone for a repository
pub fn plan(repo: &RepoDescriptor, category: Category, layout: &Layout) -> SyncAction {
    match layout.local_state(category, &repo.name) {
        LocalState::Present => SyncAction::Update,
        LocalState::Absent => SyncAction::Clone {
            url: clone_url_for(repo, category).to_string(),
        },
    }
}

/// The parent to add as `upstream`, only for forks with wiring enabled
pub fn upstream_for(repo: &RepoDescriptor, category: Category, enabled: bool) -> Option<&ParentRef> {
    if category == Category::Forks && enabled {
        repo.parent.as_ref()
    } else {
        None
    }
}

/// Failure to run a git subprocess to completion
#[derive(Debug)]
enum GitFailure {
    Spawn(std::io::Error),
    TimedOut(Duration),
    Exit { code: Option<i32>, stderr: String },
}

impl std::fmt::Display for GitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitFailure::Spawn(e) => write!(f, "failed to run git: {}", e),
            GitFailure::TimedOut(after) => write!(f, "timed out after {}s", after.as_secs()),
            GitFailure::Exit { code, stderr } => match code {
                Some(code) => write!(f, "exit status {}: {}", code, stderr),
                None => write!(f, "terminated by signal: {}", stderr),
            },
        }
    }
}

impl GitClient {
    pub fn new(timeout: Duration, fast_forward_only: bool) -> Self {
        Self {
            timeout,
            fast_forward_only,
        }
    }

    /// Bring one repository up to date in its category directory.
    ///
    /// The category directory must already exist.
    pub async fn sync(
        &self,
        repo: &RepoDescriptor,
        category: Category,
        layout: &Layout,
        upstream: Option<&ParentRef>,
    ) -> SyncResult {
        let target = layout.repo_dir(category, &repo.name);

        // An existing working copy gets the upstream remote even when the
        // pull fails; a failed clone leaves nothing to configure
        let (result, has_working_copy) = match plan(repo, category, layout) {
            SyncAction::Update => {
                println!("{}", format!("Updating repo: {}", repo.name).cyan());
                (self.pull(&target).await, true)
            }
            SyncAction::Clone { url } => {
                let label = if category.is_owned() {
                    format!("Cloning private repo: {}", repo.name)
                } else {
                    format!("Cloning repo: {}", repo.name)
                };
                println!("{}", label.green());
                let result = self
                    .clone_repository(&url, &layout.category_dir(category), &target)
                    .await;
                let cloned = !result.is_failure();
                (result, cloned)
            }
        };

        if let (true, Some(parent)) = (has_working_copy, upstream) {
            println!("{}", format!("Adding upstream: {}", parent.full_name()).yellow());
            match self.add_upstream(&target, &parent.clone_url).await {
                UpstreamOutcome::Added => info!("Added upstream {} to {}", parent.full_name(), repo.name),
                UpstreamOutcome::AlreadyConfigured => {
                    debug!("Upstream already configured for {}", repo.name)
                }
                UpstreamOutcome::Failed(e) => {
                    warn!("Failed to add upstream for {}: {}", repo.name, e)
                }
            }
        }

        result
    }

    /// Clone `url` into `target`, running git from the category directory
    pub async fn clone_repository(&self, url: &str, category_dir: &Path, target: &Path) -> SyncResult {
        debug!("Using clone URL: {}", url);

        let args = [OsStr::new("clone"), OsStr::new(url), target.as_os_str()];
        let preexisting = target.exists();

        match self.run_git(&args, category_dir).await {
            Ok(_) => {
                info!("Successfully cloned: {}", target.display());
                SyncResult::Cloned {
                    path: target.to_path_buf(),
                }
            }
            Err(failure) => {
                // Leave nothing behind that the next run would mistake for a
                // working copy, but never remove a directory this clone did
                // not create
                if !preexisting && target.exists() {
                    if let Err(e) = tokio::fs::remove_dir_all(target).await {
                        warn!("Failed to clean up {}: {}", target.display(), e);
                    }
                }
                SyncResult::Failed {
                    path: target.to_path_buf(),
                    error: format!("Git clone failed: {}", failure),
                }
            }
        }
    }

    /// Pull the current branch of an existing working copy
    pub async fn pull(&self, path: &Path) -> SyncResult {
        let mut args = vec!["pull"];

        if self.fast_forward_only {
            args.push("--ff-only");
        }

        match self.run_git(&args, path).await {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if is_up_to_date(&stdout) {
                    debug!("Repository is up to date: {}", path.display());
                    SyncResult::UpToDate {
                        path: path.to_path_buf(),
                    }
                } else {
                    info!("Successfully pulled {}", path.display());
                    SyncResult::Pulled {
                        path: path.to_path_buf(),
                    }
                }
            }
            Err(failure) => SyncResult::Failed {
                path: path.to_path_buf(),
                error: format!("Git pull failed: {}", failure),
            },
        }
    }

    /// Add a remote named `upstream` pointing at `url`
    pub async fn add_upstream(&self, path: &Path, url: &str) -> UpstreamOutcome {
        match self.run_git(&["remote", "add", "upstream", url], path).await {
            Ok(_) => UpstreamOutcome::Added,
            Err(GitFailure::Exit { stderr, .. }) if stderr.contains("already exists") => {
                UpstreamOutcome::AlreadyConfigured
            }
            Err(failure) => UpstreamOutcome::Failed(failure.to_string()),
        }
    }

    /// Run git in `cwd`, bounded by the configured timeout. The child is
    /// killed if the timeout fires.
    async fn run_git<S: AsRef<OsStr>>(&self, args: &[S], cwd: &Path) -> Result<Output, GitFailure> {
        let mut command = AsyncCommand::new("git");
        command
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .kill_on_drop(true);

        let output = match timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(GitFailure::Spawn)?,
            Err(_) => return Err(GitFailure::TimedOut(self.timeout)),
        };

        if !output.status.success() {
            return Err(GitFailure::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

fn is_up_to_date(pull_output: &str) -> bool {
    // git has printed both spellings over the years
    pull_output.contains("Already up to date") || pull_output.contains("Already up-to-date")
}
