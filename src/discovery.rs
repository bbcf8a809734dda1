//! Repository discovery abstraction layer
//!
//! This module provides a provider-agnostic description of remote repositories
//! and the [`RepoSource`] trait the sync engine pulls them from. The GitHub
//! implementation converts octocrab models into [`RepoDescriptor`]s.

use async_trait::async_trait;
use octocrab::models::Repository;

use crate::error::GhSyncError;
use crate::github::GitHubClient;

/// Repository visibility as reported by the hosting service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Reference to another repository (fork parent or network source)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub owner: String,
    pub name: String,
    /// Anonymous clone URL of the referenced repository
    pub clone_url: String,
}

impl ParentRef {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Snapshot of a remote repository, fetched once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDescriptor {
    /// Repository name, also the local directory name
    pub name: String,

    /// Owner or organization login
    pub owner: String,

    pub visibility: Visibility,

    pub is_fork: bool,

    pub description: Option<String>,

    /// Repository this one was forked from, when known
    pub parent: Option<ParentRef>,

    /// Root of the fork network, or the mirrored source
    pub source: Option<ParentRef>,

    /// Authenticated transport URL (git@github.com:owner/name.git)
    pub ssh_url: String,

    /// Anonymous transport URL (https://github.com/owner/name.git)
    pub clone_url: String,
}

impl RepoDescriptor {
    /// Public, non-fork descriptor with GitHub-style clone URLs
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            owner: owner.to_string(),
            visibility: Visibility::Public,
            is_fork: false,
            description: None,
            parent: None,
            source: None,
            ssh_url: github_ssh_url(owner, name),
            clone_url: github_https_url(owner, name),
        }
    }

    /// Get display name (owner/name format)
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }
}

pub(crate) fn github_ssh_url(owner: &str, name: &str) -> String {
    format!("git@github.com:{}/{}.git", owner, name)
}

pub(crate) fn github_https_url(owner: &str, name: &str) -> String {
    format!("https://github.com/{}/{}.git", owner, name)
}

/// Trait for repository discovery from a hosting provider
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// Repositories of an organization or user, or of the authenticated
    /// account when `scope` is `None`
    async fn list_repositories(&self, scope: Option<&str>) -> Result<Vec<RepoDescriptor>, GhSyncError>;

    /// Repositories the authenticated account watches
    async fn list_watched(&self) -> Result<Vec<RepoDescriptor>, GhSyncError>;

    /// Look up the fork parent of a repository, refreshing it from the
    /// provider when the listing did not include one
    async fn resolve_parent(&self, repo: &RepoDescriptor) -> Result<Option<ParentRef>, GhSyncError>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

// =============================================================================
// GitHub Discovery Implementation
// =============================================================================

/// GitHub repository discovery implementation
pub struct GitHubSource {
    client: GitHubClient,
}

impl GitHubSource {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }

    /// Convert octocrab Repository to our RepoDescriptor
    pub fn to_descriptor(repo: &Repository) -> RepoDescriptor {
        let owner = owner_login(repo);

        let ssh_url = repo
            .ssh_url
            .clone()
            .unwrap_or_else(|| github_ssh_url(&owner, &repo.name));

        RepoDescriptor {
            name: repo.name.clone(),
            visibility: if repo.private.unwrap_or(false) {
                Visibility::Private
            } else {
                Visibility::Public
            },
            is_fork: repo.fork.unwrap_or(false),
            description: repo.description.clone().filter(|d| !d.is_empty()),
            parent: repo.parent.as_deref().map(to_parent_ref),
            source: repo.source.as_deref().map(to_parent_ref),
            ssh_url,
            clone_url: https_clone_url(repo, &owner),
            owner,
        }
    }
}

fn owner_login(repo: &Repository) -> String {
    repo.owner
        .as_ref()
        .map(|o| o.login.clone())
        .or_else(|| {
            repo.full_name
                .as_deref()
                .and_then(|full| full.split_once('/'))
                .map(|(owner, _)| owner.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn https_clone_url(repo: &Repository, owner: &str) -> String {
    repo.clone_url
        .as_ref()
        .map(|u| u.to_string())
        .unwrap_or_else(|| github_https_url(owner, &repo.name))
}

fn to_parent_ref(repo: &Repository) -> ParentRef {
    let owner = owner_login(repo);
    ParentRef {
        name: repo.name.clone(),
        clone_url: https_clone_url(repo, &owner),
        owner,
    }
}

#[async_trait]
impl RepoSource for GitHubSource {
    async fn list_repositories(&self, scope: Option<&str>) -> Result<Vec<RepoDescriptor>, GhSyncError> {
        let repositories = match scope {
            Some(owner) => self.client.list_owner_repositories(owner).await?,
            None => self.client.list_user_repositories().await?,
        };

        Ok(repositories.iter().map(Self::to_descriptor).collect())
    }

    async fn list_watched(&self) -> Result<Vec<RepoDescriptor>, GhSyncError> {
        let repositories = self.client.list_watched_repositories().await?;
        Ok(repositories.iter().map(Self::to_descriptor).collect())
    }

    async fn resolve_parent(&self, repo: &RepoDescriptor) -> Result<Option<ParentRef>, GhSyncError> {
        if repo.parent.is_some() {
            return Ok(repo.parent.clone());
        }

        let full = self.client.get_repository(&repo.owner, &repo.name).await?;
        Ok(full.parent.as_deref().map(to_parent_ref))
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}
