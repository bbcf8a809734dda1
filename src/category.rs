//! Repository classification
//!
//! Every repository lands in exactly one of five category directories. The
//! rules are ordered; the first one that matches wins.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::discovery::RepoDescriptor;

/// Category directory a repository is synced into
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Forks,
    Mirrors,
    Private,
    Public,
    Watched,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Forks,
        Category::Mirrors,
        Category::Private,
        Category::Public,
        Category::Watched,
    ];

    /// Directory name under the root
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Forks => "forks",
            Category::Mirrors => "mirrors",
            Category::Private => "private",
            Category::Public => "public",
            Category::Watched => "watched",
        }
    }

    /// Owned repositories are cloned over the authenticated transport.
    /// Watched ones are only observed, so they always use the anonymous one.
    pub fn is_owned(&self) -> bool {
        !matches!(self, Category::Watched)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assign a repository to its category.
///
/// `watched_query` is true when the descriptor came from the account's
/// watch list rather than from an owner or organization listing.
pub fn classify(repo: &RepoDescriptor, watched_query: bool) -> Category {
    if watched_query {
        Category::Watched
    } else if repo.is_private() {
        Category::Private
    } else if repo.is_fork {
        Category::Forks
    } else if looks_like_mirror(repo) {
        Category::Mirrors
    } else {
        Category::Public
    }
}

fn looks_like_mirror(repo: &RepoDescriptor) -> bool {
    let described = repo
        .description
        .as_deref()
        .map(|d| d.to_lowercase().contains("mirror"))
        .unwrap_or(false);

    described || repo.source.is_some()
}

/// Descriptors grouped by category, with no repository in two buckets and no
/// two repositories sharing a target directory
#[derive(Debug, Default)]
pub struct CategoryBuckets {
    pub buckets: BTreeMap<Category, Vec<RepoDescriptor>>,
    /// Repositories dropped because another repository in the same category
    /// already claimed the directory name
    pub collisions: Vec<(Category, RepoDescriptor)>,
}

impl CategoryBuckets {
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, category: Category) -> &[RepoDescriptor] {
        self.buckets
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Classify and group the owned and watched listings.
///
/// Owned listings are placed first, so a repository the account both owns
/// and watches is synced once, under its owned category. Exact duplicates are
/// dropped silently. Directory names are compared case-insensitively so two
/// repositories never share a working copy on case-folding filesystems.
pub fn partition(owned: Vec<RepoDescriptor>, watched: Vec<RepoDescriptor>) -> CategoryBuckets {
    let mut result = CategoryBuckets::default();
    let mut seen_repos: HashSet<String> = HashSet::new();
    let mut seen_dirs: HashSet<(Category, String)> = HashSet::new();

    let tagged = owned
        .into_iter()
        .map(|repo| (repo, false))
        .chain(watched.into_iter().map(|repo| (repo, true)));

    for (repo, watched_query) in tagged {
        if !seen_repos.insert(repo.full_name().to_lowercase()) {
            continue;
        }

        let category = classify(&repo, watched_query);

        if !seen_dirs.insert((category, repo.name.to_lowercase())) {
            result.collisions.push((category, repo));
            continue;
        }

        result.buckets.entry(category).or_default().push(repo);
    }

    result
}
