use octocrab::models::Repository;
use octocrab::{Octocrab, Page};
use serde::Serialize;
use std::env;
use std::fmt;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::GhSyncError;

/// Username + token pair used against the GitHub API
#[derive(Clone)]
pub struct Credentials {
    /// Login to act as; looked up from the API when not configured
    pub username: Option<String>,
    pub token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// GitHub authentication strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// `git config github.user` / `git config github.token`
    GitConfig,
    /// Use GitHub CLI authentication
    GitHubCLI,
    /// Use environment variable token
    EnvironmentToken,
}

/// Resolve credentials according to the configured auth method
pub fn detect_authentication(config: &Config) -> Result<(AuthStrategy, Credentials), GhSyncError> {
    let (strategy, token) = match config.github.auth_method.as_str() {
        "auto" => {
            // git config first, then the GitHub CLI, then the environment
            if let Some(token) = git_config_value("github.token") {
                (AuthStrategy::GitConfig, token)
            } else if let Ok(token) = try_github_cli() {
                (AuthStrategy::GitHubCLI, token)
            } else if let Ok(token) = try_environment_token() {
                (AuthStrategy::EnvironmentToken, token)
            } else {
                return Err(GhSyncError::MissingCredentials(
                    "set one of:\n\
                     1. git config --global github.token <token>\n\
                     2. gh auth login\n\
                     3. GITHUB_TOKEN environment variable"
                        .to_string(),
                ));
            }
        }
        "git_config" => {
            let token = git_config_value("github.token").ok_or_else(|| {
                GhSyncError::MissingCredentials(
                    "git config github.token is not set".to_string(),
                )
            })?;
            (AuthStrategy::GitConfig, token)
        }
        "gh_cli" => {
            let token = try_github_cli().map_err(|e| {
                GhSyncError::MissingCredentials(format!("{}. Run: gh auth login", e))
            })?;
            (AuthStrategy::GitHubCLI, token)
        }
        "token" => {
            let token = try_environment_token().map_err(GhSyncError::MissingCredentials)?;
            (AuthStrategy::EnvironmentToken, token)
        }
        other => {
            return Err(GhSyncError::Config(format!("Unknown auth method: {}", other)));
        }
    };

    let username = config
        .github
        .username
        .clone()
        .or_else(|| git_config_value("github.user"));

    Ok((strategy, Credentials { username, token }))
}

/// Read a single value from the user's git configuration
fn git_config_value(key: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["config", "--get", key])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Try to get token from GitHub CLI
fn try_github_cli() -> Result<String, String> {
    debug!("Attempting GitHub CLI authentication");

    let token_output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .map_err(|_| "GitHub CLI (gh) is not installed".to_string())?;

    if !token_output.status.success() {
        return Err(format!(
            "Failed to retrieve token from GitHub CLI: {}",
            String::from_utf8_lossy(&token_output.stderr).trim()
        ));
    }

    let token = String::from_utf8_lossy(&token_output.stdout).trim().to_string();

    if token.is_empty() {
        return Err("GitHub CLI returned empty token".to_string());
    }

    debug!("Successfully obtained token from GitHub CLI");
    Ok(token)
}

/// Try to get token from environment variable
fn try_environment_token() -> Result<String, String> {
    debug!("Attempting environment variable authentication");

    let token = env::var("GITHUB_TOKEN")
        .map_err(|_| "GITHUB_TOKEN environment variable not set".to_string())?;

    if token.is_empty() {
        return Err("GITHUB_TOKEN is empty".to_string());
    }

    Ok(token)
}

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
}

/// GitHub client wrapper with authentication management
pub struct GitHubClient {
    client: Octocrab,
    username: String,
}

impl GitHubClient {
    /// Create a client, looking up the login from the API when the
    /// credentials carry none
    pub async fn new(config: &Config, credentials: Credentials) -> Result<Self, GhSyncError> {
        let mut builder = Octocrab::builder().personal_token(credentials.token);

        if let Some(api_url) = &config.github.api_url {
            builder = builder
                .base_uri(api_url.as_str())
                .map_err(|e| GhSyncError::Config(format!("Invalid api_url {}: {}", api_url, e)))?;
        }

        let client = builder
            .build()
            .map_err(|e| GhSyncError::api("creating the GitHub client", e))?;

        let username = match credentials.username {
            Some(username) => username,
            None => {
                let user = client
                    .current()
                    .user()
                    .await
                    .map_err(|e| GhSyncError::api("reading the authenticated user", e))?;
                user.login
            }
        };

        info!("Authenticated as GitHub user: {}", username);

        Ok(Self { client, username })
    }

    /// List all repositories for the authenticated user
    pub async fn list_user_repositories(&self) -> Result<Vec<Repository>, GhSyncError> {
        debug!("Fetching user repositories for: {}", self.username);

        let mut repositories = Vec::new();
        let mut page = 1u8;

        loop {
            let page_repos = self
                .client
                .current()
                .list_repos_for_authenticated_user()
                .per_page(100)
                .page(page)
                .send()
                .await
                .map_err(|e| GhSyncError::api(format!("fetching repositories page {}", page), e))?;

            let items = page_repos.items;
            if items.is_empty() {
                break;
            }

            repositories.extend(items);

            // GitHub API pagination limit for u8
            if page >= 255 {
                warn!("Reached maximum pagination limit (255 pages)");
                break;
            }
            page += 1;
        }

        info!("Found {} user repositories", repositories.len());
        Ok(repositories)
    }

    /// List repositories of an owner: an organization, or a user account
    /// when no organization has that login
    pub async fn list_owner_repositories(&self, owner: &str) -> Result<Vec<Repository>, GhSyncError> {
        debug!("Fetching repositories for owner: {}", owner);

        let mut repositories = Vec::new();
        let mut page = 1u8;

        loop {
            let page_repos = match self
                .client
                .orgs(owner)
                .list_repos()
                .per_page(100)
                .page(page)
                .send()
                .await
            {
                Ok(page_repos) => page_repos,
                Err(e) if page == 1 && is_not_found(&e) => {
                    debug!("{} is not an organization, listing it as a user", owner);
                    return self.list_account_repositories(owner).await;
                }
                Err(e) => {
                    return Err(GhSyncError::api(
                        format!("fetching repositories for organization {} page {}", owner, page),
                        e,
                    ))
                }
            };

            let items = page_repos.items;
            if items.is_empty() {
                break;
            }

            repositories.extend(items);

            if page >= 255 {
                warn!("Reached maximum pagination limit (255 pages) for org: {}", owner);
                break;
            }
            page += 1;
        }

        info!(
            "Found {} repositories for organization: {}",
            repositories.len(),
            owner
        );
        Ok(repositories)
    }

    /// List the public repositories of a user account
    async fn list_account_repositories(&self, login: &str) -> Result<Vec<Repository>, GhSyncError> {
        let first = self
            .client
            .users(login)
            .repos()
            .per_page(100)
            .send()
            .await
            .map_err(|e| GhSyncError::api(format!("fetching repositories for user {}", login), e))?;

        let repositories = self
            .client
            .all_pages(first)
            .await
            .map_err(|e| GhSyncError::api(format!("paginating repositories for user {}", login), e))?;

        info!("Found {} repositories for user: {}", repositories.len(), login);
        Ok(repositories)
    }

    /// List repositories the authenticated user watches
    pub async fn list_watched_repositories(&self) -> Result<Vec<Repository>, GhSyncError> {
        debug!("Fetching watched repositories for: {}", self.username);

        let first: Page<Repository> = self
            .client
            .get("/user/subscriptions", Some(&PageParams { per_page: 100 }))
            .await
            .map_err(|e| GhSyncError::api("fetching watched repositories", e))?;

        let repositories = self
            .client
            .all_pages(first)
            .await
            .map_err(|e| GhSyncError::api("paginating watched repositories", e))?;

        info!("Found {} watched repositories", repositories.len());
        Ok(repositories)
    }

    /// Fetch a single repository; unlike listings this includes the fork parent
    pub async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, GhSyncError> {
        debug!("Refreshing repository {}/{}", owner, name);

        self.client
            .repos(owner, name)
            .get()
            .await
            .map_err(|e| GhSyncError::api(format!("fetching repository {}/{}", owner, name), e))
    }
}

fn is_not_found(err: &octocrab::Error) -> bool {
    matches!(err, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404)
}
