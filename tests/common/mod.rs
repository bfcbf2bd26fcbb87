//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::cell::Cell;
use std::path::Path;

use git2::{Oid, Repository, Signature, Time};

/// Origin of the synthetic commit clock. Arbitrary but fixed so
/// chronological assertions never depend on the wall clock.
pub const BASE_EPOCH: i64 = 1_700_000_000;

/// Create a temporary directory for test output.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Abbreviated SHA, as used for standalone-commit unit ids.
pub fn short(oid: Oid) -> String {
    oid.to_string()[..7].to_string()
}

/// A test git repository builder for integration tests.
///
/// Commits are authored on a synthetic clock that advances one minute
/// per commit, so merge chronology is strictly increasing even when
/// many commits are created in the same instant.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
    clock: Cell<i64>,
}

impl TestRepo {
    /// Create a new empty git repository in a temp directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");
        Self {
            dir,
            repo,
            clock: Cell::new(BASE_EPOCH),
        }
    }

    fn signature_at(&self, epoch_secs: i64) -> Signature<'static> {
        Signature::new("Test User", "test@example.com", &Time::new(epoch_secs, 0))
            .expect("Failed to create signature")
    }

    fn tick(&self) -> i64 {
        let t = self.clock.get() + 60;
        self.clock.set(t);
        t
    }

    /// Write `files` into the worktree and build a tree that is exactly
    /// the parent's tree plus those changes.
    fn build_tree(&self, parent: Option<&git2::Commit>, files: &[(&str, &str)]) -> Oid {
        let mut index = self.repo.index().expect("Failed to get index");
        match parent {
            Some(commit) => index
                .read_tree(&commit.tree().expect("Failed to read parent tree"))
                .expect("Failed to reset index"),
            None => index.clear().expect("Failed to clear index"),
        }
        for (path, content) in files {
            let file_path = self.dir.path().join(path);
            if let Some(dir) = file_path.parent() {
                std::fs::create_dir_all(dir).expect("Failed to create parent dirs");
            }
            std::fs::write(&file_path, content).expect("Failed to write test file");
            index.add_path(Path::new(path)).expect("Failed to add file");
        }
        index.write().expect("Failed to write index");
        index.write_tree().expect("Failed to write tree")
    }

    fn commit_inner(&self, message: &str, files: &[(&str, &str)], epoch_secs: i64) -> Oid {
        let sig = self.signature_at(epoch_secs);
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let tree_id = self.build_tree(parent.as_ref(), files);
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Create a commit on HEAD with the given message. Returns the
    /// commit OID.
    pub fn commit(&self, message: &str) -> Oid {
        let t = self.tick();
        self.commit_inner(message, &[("test.txt", &format!("{message}\n{t}"))], t)
    }

    /// Create a commit on HEAD with an explicit author/committer time.
    pub fn commit_at(&self, message: &str, epoch_secs: i64) -> Oid {
        if epoch_secs > self.clock.get() {
            self.clock.set(epoch_secs);
        }
        self.commit_inner(
            message,
            &[("test.txt", &format!("{message}\n{epoch_secs}"))],
            epoch_secs,
        )
    }

    /// Create a commit on HEAD that touches a specific file.
    pub fn commit_file(&self, message: &str, path: &str, content: &str) -> Oid {
        let t = self.tick();
        self.commit_inner(message, &[(path, content)], t)
    }

    /// Create a commit on HEAD that touches several files at once.
    pub fn commit_files(&self, message: &str, files: &[(&str, &str)]) -> Oid {
        let t = self.tick();
        self.commit_inner(message, files, t)
    }

    /// Create a commit on top of `parent` without moving HEAD. Pairs
    /// with [`TestRepo::merge_commit`] to simulate a feature branch.
    pub fn branch_commit(&self, message: &str, parent: Oid, path: &str, content: &str) -> Oid {
        let t = self.tick();
        let sig = self.signature_at(t);
        let parent_commit = self.repo.find_commit(parent).expect("Failed to find parent");
        let tree_id = self.build_tree(Some(&parent_commit), &[(path, content)]);
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        self.repo
            .commit(None, &sig, &sig, message, &tree, &[&parent_commit])
            .expect("Failed to create branch commit")
    }

    /// Merge `second` into `first`. `first` must be the current HEAD
    /// tip, matching how a PR merge lands on the main line.
    pub fn merge_commit(&self, message: &str, first: Oid, second: Oid) -> Oid {
        let t = self.tick();
        let sig = self.signature_at(t);
        let first_commit = self
            .repo
            .find_commit(first)
            .expect("Failed to find first parent");
        let second_commit = self
            .repo
            .find_commit(second)
            .expect("Failed to find second parent");

        let mut merged = self
            .repo
            .merge_commits(&first_commit, &second_commit, None)
            .expect("Failed to merge trees");
        let tree_id = merged
            .write_tree_to(&self.repo)
            .expect("Failed to write merge tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        self.repo
            .commit(
                Some("HEAD"),
                &sig,
                &sig,
                message,
                &tree,
                &[&first_commit, &second_commit],
            )
            .expect("Failed to create merge commit")
    }

    /// Create a lightweight tag pointing to the given OID.
    pub fn tag_lightweight(&self, name: &str, oid: Oid) {
        let obj = self.repo.find_object(oid, None).expect("Failed to find object");
        self.repo
            .tag_lightweight(name, &obj, false)
            .expect("Failed to create lightweight tag");
    }

    /// Create an annotated tag pointing to the given OID.
    pub fn tag_annotated(&self, name: &str, oid: Oid, message: &str) {
        let sig = self.signature_at(self.clock.get());
        let obj = self.repo.find_object(oid, None).expect("Failed to find object");
        self.repo
            .tag(name, &obj, &sig, message, false)
            .expect("Failed to create annotated tag");
    }

    /// Create a branch pointing to the given OID.
    pub fn branch(&self, name: &str, oid: Oid) {
        let commit = self.repo.find_commit(oid).expect("Failed to find commit");
        self.repo
            .branch(name, &commit, false)
            .expect("Failed to create branch");
    }

    /// Point `origin` at a URL for remote detection.
    pub fn set_origin(&self, url: &str) {
        self.repo
            .remote("origin", url)
            .expect("Failed to add origin remote");
    }

    /// Author/committer timestamp of a commit, in epoch seconds.
    pub fn time_of(&self, oid: Oid) -> i64 {
        self.repo
            .find_commit(oid)
            .expect("Failed to find commit")
            .time()
            .seconds()
    }
}
