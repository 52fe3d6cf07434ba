//! The concurrent graph walk.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use cairn_queue::WorkQueue;
use cairn_store::{ObjectStore, ReadMode};
use cairn_types::ObjectId;
use chrono::Local;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::budget::{ErrorBudget, Failure, FailureKind};
use crate::config::VerifyConfig;
use crate::error::{VerifyError, VerifyResult};
use crate::progress::estimate;
use crate::task::VerifyTask;
use crate::tracker::DedupTracker;

/// Outcome of a walk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VerifySummary {
    /// Distinct objects scheduled, directories included.
    pub unique_objects: u64,
    pub directories_listed: u64,
    /// Objects passed to shallow verification.
    pub objects_verified: u64,
    /// Objects whose full content was re-read.
    pub objects_sampled: u64,
    /// Total recorded length of objects that passed shallow verification.
    pub bytes_verified: u64,
    pub failures: Vec<Failure>,
    pub elapsed: Duration,
}

impl VerifySummary {
    /// `Ok` when nothing failed, otherwise the aggregate error.
    pub fn into_result(self) -> VerifyResult<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(VerifyError::Failed {
                count: self.failures.len(),
                failures: self.failures,
            })
        }
    }
}

/// Verifies object graphs in one object store.
///
/// Each call to [`Verifier::run`] owns its own bookkeeping, so a verifier
/// can be shared and runs may overlap.
pub struct Verifier<'a> {
    objects: &'a dyn ObjectStore,
    config: VerifyConfig,
}

impl<'a> Verifier<'a> {
    pub fn new(objects: &'a dyn ObjectStore, config: VerifyConfig) -> VerifyResult<Self> {
        config.validate()?;
        Ok(Self { objects, config })
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    /// Walk everything reachable from `roots` and fail with
    /// [`VerifyError::Failed`] if any failure was recorded.
    pub fn run(&self, roots: Vec<VerifyTask>) -> VerifyResult<VerifySummary> {
        self.walk(roots).into_result()
    }

    /// Walk everything reachable from `roots`, collecting failures into the
    /// summary instead of failing.
    pub fn walk(&self, roots: Vec<VerifyTask>) -> VerifySummary {
        let started = Instant::now();
        let started_at = Local::now();
        let queue = WorkQueue::new().with_progress(
            Duration::from_millis(self.config.progress_interval_ms),
            move |progress| info!("{}", estimate(progress, started_at, started.elapsed())),
        );

        let walk = Walk {
            queue: &queue,
            objects: self.objects,
            files_percent: self.config.files_percent,
            tracker: DedupTracker::new(),
            budget: ErrorBudget::new(self.config.max_errors),
            directories_listed: AtomicU64::new(0),
            objects_verified: AtomicU64::new(0),
            objects_sampled: AtomicU64::new(0),
            bytes_verified: AtomicU64::new(0),
        };

        info!(
            roots = roots.len(),
            parallelism = self.config.parallelism,
            "starting verification"
        );
        for task in roots {
            walk.enqueue(task);
        }
        queue.process(self.config.parallelism, |task| walk.execute(task));

        let summary = VerifySummary {
            unique_objects: walk.tracker.seen_count() as u64,
            directories_listed: walk.directories_listed.into_inner(),
            objects_verified: walk.objects_verified.into_inner(),
            objects_sampled: walk.objects_sampled.into_inner(),
            bytes_verified: walk.bytes_verified.into_inner(),
            failures: walk.budget.into_failures(),
            elapsed: started.elapsed(),
        };
        info!(
            objects = summary.objects_verified,
            directories = summary.directories_listed,
            failures = summary.failures.len(),
            "verification finished in {:?}",
            summary.elapsed
        );
        summary
    }
}

/// Bookkeeping for one run, shared by reference with every worker.
struct Walk<'a> {
    queue: &'a WorkQueue<VerifyTask>,
    objects: &'a dyn ObjectStore,
    files_percent: u8,
    tracker: DedupTracker,
    budget: ErrorBudget,
    directories_listed: AtomicU64,
    objects_verified: AtomicU64,
    objects_sampled: AtomicU64,
    bytes_verified: AtomicU64,
}

impl Walk<'_> {
    /// Schedule a task unless its object was already scheduled. Directories
    /// go to the front so the graph shape is discovered early, everything
    /// else to the back.
    fn enqueue(&self, task: VerifyTask) {
        if !self.tracker.should_enqueue(task.id()) {
            return;
        }
        if task.is_directory() {
            self.queue.enqueue_front(task);
        } else {
            self.queue.enqueue_back(task);
        }
    }

    fn execute(&self, task: VerifyTask) {
        match task {
            VerifyTask::Directory { id, path } => self.verify_directory(id, &path),
            VerifyTask::Object {
                id,
                path,
                expected_len,
            } => self.verify_object(id, &path, expected_len),
        }
    }

    fn verify_directory(&self, id: ObjectId, path: &str) {
        debug!(path, %id, "verifying directory");
        let entries = match self.objects.list_directory(&id) {
            Ok(entries) => entries,
            Err(e) => {
                self.report(path, id, FailureKind::Listing(e.to_string()));
                return;
            }
        };
        self.directories_listed.fetch_add(1, Ordering::Relaxed);

        for entry in &entries {
            if self.budget.too_many_errors() {
                debug!(path, "error budget exhausted, not expanding further");
                break;
            }
            self.enqueue(VerifyTask::child(path, entry));
        }
    }

    fn verify_object(&self, id: ObjectId, path: &str, expected_len: Option<u64>) {
        match expected_len {
            Some(len) => debug!(path, %id, len, "verifying object"),
            None => debug!(path, %id, "verifying object of unknown length"),
        }

        self.objects_verified.fetch_add(1, Ordering::Relaxed);
        let actual = match self.objects.verify_object(&id) {
            Ok(len) => {
                self.bytes_verified.fetch_add(len, Ordering::Relaxed);
                len
            }
            Err(e) => {
                self.report(path, id, FailureKind::Verification(e.to_string()));
                0
            }
        };

        if let Some(expected) = expected_len {
            if actual != expected {
                self.report(path, id, FailureKind::LengthMismatch { actual, expected });
            }
        }

        if self.should_sample() {
            self.objects_sampled.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = self.read_entire_object(&id, path) {
                self.report(path, id, FailureKind::DeepRead(e.to_string()));
            }
        }
    }

    fn should_sample(&self) -> bool {
        self.files_percent > 0 && rand::thread_rng().gen_range(0..100u8) < self.files_percent
    }

    /// Stream the whole object from durable storage, bypassing caches.
    fn read_entire_object(&self, id: &ObjectId, path: &str) -> io::Result<u64> {
        debug!(path, %id, "reading object");
        let mut reader = self
            .objects
            .open(id, ReadMode::Uncached)
            .map_err(io::Error::other)?;
        io::copy(&mut reader, &mut io::sink())
    }

    fn report(&self, path: &str, id: ObjectId, kind: FailureKind) {
        self.budget.report(Failure::new(path, id, kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_store::{
        Blob, InMemoryObjectStore, ObjectKind, StoreResult, StoredObject, Tree, TreeEntry,
    };
    use std::collections::HashMap;
    use std::io::Read;
    use std::sync::Mutex;

    // -----------------------------------------------------------------------
    // Test stores
    // -----------------------------------------------------------------------

    /// Records every call the walk makes, in order.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryObjectStore,
        verified: Mutex<Vec<ObjectId>>,
        listed: Mutex<Vec<ObjectId>>,
        opened: Mutex<Vec<(ObjectId, ReadMode)>>,
    }

    impl CountingStore {
        fn verified(&self) -> Vec<ObjectId> {
            self.verified.lock().unwrap().clone()
        }

        fn listed(&self) -> Vec<ObjectId> {
            self.listed.lock().unwrap().clone()
        }

        fn verify_counts(&self) -> HashMap<ObjectId, usize> {
            let mut counts = HashMap::new();
            for id in self.verified() {
                *counts.entry(id).or_default() += 1;
            }
            counts
        }
    }

    impl ObjectStore for CountingStore {
        fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
            self.inner.read(id)
        }

        fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
            self.inner.write(object)
        }

        fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
            self.inner.exists(id)
        }

        fn verify_object(&self, id: &ObjectId) -> StoreResult<u64> {
            self.verified.lock().unwrap().push(*id);
            self.inner.verify_object(id)
        }

        fn open(&self, id: &ObjectId, mode: ReadMode) -> StoreResult<Box<dyn Read + Send + '_>> {
            self.opened.lock().unwrap().push((*id, mode));
            self.inner.open(id, mode)
        }

        fn list_directory(&self, id: &ObjectId) -> StoreResult<Vec<TreeEntry>> {
            self.listed.lock().unwrap().push(*id);
            self.inner.list_directory(id)
        }
    }

    /// Reports every object one byte longer than it is.
    struct OverstatingStore(InMemoryObjectStore);

    impl ObjectStore for OverstatingStore {
        fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
            self.0.read(id)
        }

        fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
            self.0.write(object)
        }

        fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
            self.0.exists(id)
        }

        fn verify_object(&self, id: &ObjectId) -> StoreResult<u64> {
            self.0.verify_object(id).map(|len| len + 1)
        }

        fn open(&self, id: &ObjectId, mode: ReadMode) -> StoreResult<Box<dyn Read + Send + '_>> {
            self.0.open(id, mode)
        }
    }

    fn blob(store: &dyn ObjectStore, content: &[u8]) -> TreeEntry {
        let id = store.write(&Blob::new(content.to_vec()).to_stored_object()).unwrap();
        TreeEntry::file("", content.len() as u64, id)
    }

    fn file(store: &dyn ObjectStore, name: &str, content: &[u8]) -> TreeEntry {
        TreeEntry {
            name: name.into(),
            ..blob(store, content)
        }
    }

    fn dir(store: &dyn ObjectStore, name: &str, entries: Vec<TreeEntry>) -> TreeEntry {
        let id = store
            .write(&Tree::new(entries).to_stored_object().unwrap())
            .unwrap();
        TreeEntry::directory(name, id)
    }

    fn missing(seed: u8) -> ObjectId {
        ObjectId::from_hash([seed; 32])
    }

    fn config(max_errors: usize, files_percent: u8, parallelism: usize) -> VerifyConfig {
        VerifyConfig {
            max_errors,
            files_percent,
            parallelism,
            progress_interval_ms: 1000,
        }
    }

    fn kinds(failures: &[Failure]) -> Vec<&FailureKind> {
        failures.iter().map(|f| &f.kind).collect()
    }

    // -----------------------------------------------------------------------
    // Happy path
    // -----------------------------------------------------------------------

    #[test]
    fn healthy_tree_verifies_cleanly() {
        let store = CountingStore::default();
        let sub = dir(&store, "sub", vec![file(&store, "c.txt", b"charlie")]);
        let root = dir(
            &store,
            "",
            vec![file(&store, "a.txt", b"alpha"), file(&store, "b.txt", b"bravo"), sub],
        );

        let verifier = Verifier::new(&store, config(0, 0, 4)).unwrap();
        let summary = verifier
            .run(vec![VerifyTask::directory(root.object_id, "snap")])
            .unwrap();

        assert_eq!(summary.directories_listed, 2);
        assert_eq!(summary.objects_verified, 3);
        assert_eq!(summary.objects_sampled, 0);
        assert_eq!(summary.bytes_verified, 5 + 5 + 7);
        assert!(summary.failures.is_empty());
    }

    #[test]
    fn no_roots_is_a_clean_run() {
        let store = InMemoryObjectStore::new();
        let summary = Verifier::new(&store, VerifyConfig::default())
            .unwrap()
            .run(Vec::new())
            .unwrap();
        assert_eq!(summary.objects_verified, 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let store = InMemoryObjectStore::new();
        assert!(matches!(
            Verifier::new(&store, config(0, 101, 1)),
            Err(VerifyError::InvalidConfig(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Deduplication
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_content_is_verified_once() {
        let store = CountingStore::default();
        let one = file(&store, "one.txt", b"same bytes");
        let two = file(&store, "two.txt", b"same bytes");
        assert_eq!(one.object_id, two.object_id);
        let root = dir(&store, "", vec![one.clone(), two]);

        Verifier::new(&store, config(0, 0, 4))
            .unwrap()
            .run(vec![VerifyTask::directory(root.object_id, "snap")])
            .unwrap();
        assert_eq!(store.verify_counts()[&one.object_id], 1);
    }

    #[test]
    fn shared_subtrees_across_roots_are_walked_once() {
        let store = CountingStore::default();
        let mut shared_files = Vec::new();
        for i in 0..20u8 {
            shared_files.push(file(&store, &format!("f{i:02}"), &[i; 16]));
        }
        let shared = dir(&store, "shared", shared_files);
        let mut roots = Vec::new();
        for i in 0..10u8 {
            let root = dir(
                &store,
                "",
                vec![
                    TreeEntry {
                        name: format!("copy{i}"),
                        ..shared.clone()
                    },
                    file(&store, "own", &[100 + i; 4]),
                ],
            );
            roots.push(VerifyTask::directory(root.object_id, format!("snap{i}")));
        }
        // The same root twice is also deduplicated.
        roots.push(roots[0].clone());

        let summary = Verifier::new(&store, config(0, 0, 8)).unwrap().run(roots).unwrap();
        assert!(store.verify_counts().values().all(|&n| n == 1));
        assert_eq!(summary.objects_verified, 20 + 10);
        assert_eq!(summary.directories_listed, 10 + 1);
        assert_eq!(summary.unique_objects, 30 + 11);
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn directories_are_expanded_before_files_are_verified() {
        let store = CountingStore::default();
        let f1 = file(&store, "a_file1", b"one");
        let f2 = file(&store, "c_file2", b"two");
        let f3 = file(&store, "d_file3", b"three");
        let sub = dir(&store, "b_subdir", vec![f3.clone()]);
        let root = dir(&store, "", vec![f1.clone(), sub.clone(), f2.clone()]);

        Verifier::new(&store, config(0, 0, 1))
            .unwrap()
            .run(vec![VerifyTask::directory(root.object_id, "snap")])
            .unwrap();

        assert_eq!(store.listed(), vec![root.object_id, sub.object_id]);
        assert_eq!(
            store.verified(),
            vec![f1.object_id, f2.object_id, f3.object_id]
        );
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[test]
    fn threshold_one_fails_the_run() {
        let store = InMemoryObjectStore::new();
        let root = dir(
            &store,
            "",
            vec![
                TreeEntry::file("gone", 10, missing(1)),
                file(&store, "fine", b"fine"),
            ],
        );

        let err = Verifier::new(&store, config(1, 0, 4))
            .unwrap()
            .run(vec![VerifyTask::directory(root.object_id, "snap")])
            .unwrap_err();
        match err {
            VerifyError::Failed { count, failures } => {
                assert!(count >= 1);
                assert_eq!(count, failures.len());
                assert!(failures.iter().all(|f| f.path == "snap/gone"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn exhausted_budget_stops_expanding_directories() {
        let store = CountingStore::default();
        let good = dir(&store, "a_good", vec![file(&store, "inner", b"inner")]);
        let root = dir(
            &store,
            "",
            vec![good.clone(), TreeEntry::directory("z_missing", missing(2))],
        );

        let err = Verifier::new(&store, config(1, 0, 1))
            .unwrap()
            .run(vec![VerifyTask::directory(root.object_id, "snap")])
            .unwrap_err();

        // z_missing was pushed to the front last, so it fails first; a_good
        // is still listed but its child is never scheduled.
        assert_eq!(err.failures().len(), 1);
        assert!(matches!(err.failures()[0].kind, FailureKind::Listing(_)));
        assert_eq!(err.to_string(), "encountered 1 errors");
        assert!(store.listed().contains(&good.object_id));
        assert!(store.verified().is_empty());
    }

    #[test]
    fn unlimited_budget_reports_every_failure() {
        let store = InMemoryObjectStore::new();
        let mut roots = Vec::new();
        for i in 0..5u8 {
            let subtree = dir(
                &store,
                "",
                vec![
                    file(&store, "ok", &[i; 8]),
                    TreeEntry::file("lost", 0, missing(10 + i)),
                ],
            );
            roots.push(VerifyTask::directory(subtree.object_id, format!("tree{i}")));
        }

        let err = Verifier::new(&store, config(0, 0, 4))
            .unwrap()
            .run(roots)
            .unwrap_err();
        assert!(matches!(err, VerifyError::Failed { count: 5, .. }));
        assert!(err
            .failures()
            .iter()
            .all(|f| matches!(f.kind, FailureKind::Verification(_))));
    }

    #[test]
    fn missing_object_with_known_length_reports_both_checks() {
        let store = InMemoryObjectStore::new();
        let root = dir(&store, "", vec![TreeEntry::file("gone", 12, missing(3))]);

        let summary = Verifier::new(&store, config(0, 0, 1))
            .unwrap()
            .walk(vec![VerifyTask::directory(root.object_id, "snap")]);
        let kinds = kinds(&summary.failures);
        assert_eq!(kinds.len(), 2);
        assert!(matches!(kinds[0], FailureKind::Verification(_)));
        assert_eq!(
            kinds[1],
            &FailureKind::LengthMismatch {
                actual: 0,
                expected: 12
            }
        );
    }

    #[test]
    fn stored_length_disagreeing_with_listing_is_a_mismatch() {
        let store = OverstatingStore(InMemoryObjectStore::new());
        let f = file(&store, "f", b"12345");
        let root = dir(&store, "", vec![f]);

        let summary = Verifier::new(&store, config(0, 0, 1))
            .unwrap()
            .walk(vec![VerifyTask::directory(root.object_id, "snap")]);
        assert_eq!(
            kinds(&summary.failures),
            vec![&FailureKind::LengthMismatch {
                actual: 6,
                expected: 5
            }]
        );
        assert_eq!(summary.failures[0].path, "snap/f");
    }

    #[test]
    fn explicit_file_roots_skip_the_length_check() {
        let store = OverstatingStore(InMemoryObjectStore::new());
        let f = blob(&store, b"odd length");

        let summary = Verifier::new(&store, config(0, 0, 1))
            .unwrap()
            .run(vec![VerifyTask::object(f.object_id, f.object_id.to_hex(), None)])
            .unwrap();
        assert_eq!(summary.objects_verified, 1);
    }

    // -----------------------------------------------------------------------
    // Sampling
    // -----------------------------------------------------------------------

    #[test]
    fn sampled_read_catches_bitrot_behind_correct_length() {
        let store = CountingStore::default();
        let original = b"original content".to_vec();
        let id = ObjectKind::Blob.hasher().hash(&original);
        let mut rotten = original.clone();
        rotten[0] ^= 0xff;
        store
            .inner
            .insert_unchecked(id, StoredObject::new(ObjectKind::Blob, rotten))
            .unwrap();
        let root = dir(
            &store,
            "",
            vec![TreeEntry::file("doc", original.len() as u64, id)],
        );

        let summary = Verifier::new(&store, config(0, 100, 2))
            .unwrap()
            .walk(vec![VerifyTask::directory(root.object_id, "snap")]);

        assert_eq!(summary.failures.len(), 1);
        assert!(matches!(summary.failures[0].kind, FailureKind::DeepRead(_)));
        assert_eq!(summary.objects_sampled, 1);
        assert_eq!(
            *store.opened.lock().unwrap(),
            vec![(id, ReadMode::Uncached)]
        );
    }

    #[test]
    fn deep_read_and_shallow_failures_are_reported_independently() {
        let store = InMemoryObjectStore::new();
        let id = missing(4);

        let summary = Verifier::new(&store, config(0, 100, 1))
            .unwrap()
            .walk(vec![VerifyTask::object(id, "explicit", None)]);
        let kinds = kinds(&summary.failures);
        assert_eq!(kinds.len(), 2);
        assert!(matches!(kinds[0], FailureKind::Verification(_)));
        assert!(matches!(kinds[1], FailureKind::DeepRead(_)));
    }

    #[test]
    fn zero_percent_never_opens_objects() {
        let store = CountingStore::default();
        let root = dir(&store, "", vec![file(&store, "a", b"a"), file(&store, "b", b"b")]);
        let summary = Verifier::new(&store, config(0, 0, 2))
            .unwrap()
            .run(vec![VerifyTask::directory(root.object_id, "snap")])
            .unwrap();
        assert_eq!(summary.objects_sampled, 0);
        assert!(store.opened.lock().unwrap().is_empty());
    }
}
