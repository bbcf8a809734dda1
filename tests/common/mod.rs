/// Common test utilities and helpers for ghsync tests

use async_trait::async_trait;
use ghsync::config::Config;
use ghsync::{GhSyncError, ParentRef, RepoDescriptor, RepoSource, RunConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Run git with a fixed identity so commits work on bare CI machines
pub fn git(args: &[&str], cwd: &Path) -> Output {
    let output = Command::new("git")
        .args(["-c", "user.name=ghsync", "-c", "user.email=ghsync@example.com"])
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("Failed to run git");

    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

/// Create a repository with one commit to clone from
pub fn create_origin(base: &Path, name: &str) -> PathBuf {
    let path = base.join("origins").join(name);
    std::fs::create_dir_all(&path).expect("Failed to create origin dir");
    git(&["init", "-q"], &path);
    git(&["commit", "--allow-empty", "-q", "-m", "initial"], &path);
    path
}

pub fn add_commit(origin: &Path, message: &str) {
    git(&["commit", "--allow-empty", "-q", "-m", message], origin);
}

/// Descriptor whose both transports point at a local origin
pub fn local_descriptor(owner: &str, name: &str, origin: &Path) -> RepoDescriptor {
    let url = origin.display().to_string();
    RepoDescriptor {
        ssh_url: url.clone(),
        clone_url: url,
        ..RepoDescriptor::new(owner, name)
    }
}

pub fn local_parent(owner: &str, name: &str, origin: &Path) -> ParentRef {
    ParentRef {
        owner: owner.to_string(),
        name: name.to_string(),
        clone_url: origin.display().to_string(),
    }
}

/// Remote URL configured in a working copy, if any
pub fn remote_url(repo: &Path, remote: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["remote", "get-url", remote])
        .current_dir(repo)
        .output()
        .expect("Failed to run git");

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}

pub fn run_config(root: &Path) -> RunConfig {
    RunConfig::from_config(&Config::default(), root.to_path_buf())
}

/// Sorted list of `<category>/<repo>` directories under a root
pub fn synced_dirs(root: &Path) -> Vec<String> {
    let mut dirs = Vec::new();
    for category in std::fs::read_dir(root).expect("Failed to read root") {
        let category = category.unwrap().path();
        if !category.is_dir() {
            continue;
        }
        for repo in std::fs::read_dir(&category).unwrap() {
            let repo = repo.unwrap().path();
            dirs.push(format!(
                "{}/{}",
                category.file_name().unwrap().to_string_lossy(),
                repo.file_name().unwrap().to_string_lossy()
            ));
        }
    }
    dirs.sort();
    dirs
}

/// In-memory repository source
#[derive(Default)]
pub struct FakeSource {
    pub owned: Vec<RepoDescriptor>,
    pub watched: Vec<RepoDescriptor>,
    /// Parents returned by `resolve_parent`, keyed by full name
    pub parents: HashMap<String, ParentRef>,
    pub resolve_calls: AtomicUsize,
}

impl FakeSource {
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepoSource for FakeSource {
    async fn list_repositories(&self, _scope: Option<&str>) -> Result<Vec<RepoDescriptor>, GhSyncError> {
        Ok(self.owned.clone())
    }

    async fn list_watched(&self) -> Result<Vec<RepoDescriptor>, GhSyncError> {
        Ok(self.watched.clone())
    }

    async fn resolve_parent(&self, repo: &RepoDescriptor) -> Result<Option<ParentRef>, GhSyncError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.parents.get(&repo.full_name()).cloned())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
