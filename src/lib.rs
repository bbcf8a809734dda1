//! ghsync - GitHub Repository Syncer
//!
//! Lists every repository of a GitHub account (or organization), files each
//! one under a category directory, and clones or pulls it.
//!
//! ## Layout
//!
//! - `forks/`: public forks
//! - `mirrors/`: public mirrors
//! - `private/`: private repositories
//! - `public/`: everything else the account owns
//! - `watched/`: repositories the account watches
//!
//! ## Modules
//!
//! - [`category`]: Classification and grouping
//! - [`config`]: Configuration file and run settings
//! - [`discovery`]: Repository descriptors and the provider trait
//! - [`github`]: GitHub API integration and authentication
//! - [`git`]: Clone/pull execution
//! - [`layout`]: On-disk paths
//! - [`sync`]: Orchestration

pub mod category;
pub mod config;
pub mod discovery;
pub mod error;
pub mod git;
pub mod github;
pub mod health;
pub mod layout;
pub mod sync;

pub use category::{classify, partition, Category};
pub use config::{Config, RunConfig};
pub use discovery::{GitHubSource, ParentRef, RepoDescriptor, RepoSource, Visibility};
pub use error::GhSyncError;
pub use git::{GitClient, SyncAction, SyncResult};
pub use github::{Credentials, GitHubClient};
pub use health::HealthCheck;
pub use layout::Layout;
pub use sync::{SyncEngine, SyncSummary};
