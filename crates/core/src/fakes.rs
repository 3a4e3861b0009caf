//! In-memory fakes for the storage and comparator capabilities (testing only)
//!
//! [`MemoryStorage`] serves screens from maps, can be scripted to fail any
//! call, and records every call it receives. [`ScriptedComparator`] returns a
//! fixed kind of verdict and records the options it was given.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::comparator::Comparator;
use crate::error::{KoboldError, Result};
use crate::storage::StorageAdapter;
use crate::types::{
    ArtifactKind, Comparison, ComparisonOptions, Image, ScreenConfigOverride, ScreenName,
};

/// A call received by [`MemoryStorage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    ListBuild,
    ListApproved,
    LoadApproved(ScreenName),
    LoadBuild(ScreenName),
    LoadConfig(ScreenName),
    Archive(ArtifactKind, ScreenName),
}

#[derive(Default)]
struct Screens {
    build: Vec<(ScreenName, Image)>,
    approved: Vec<(ScreenName, Image)>,
    configs: HashMap<ScreenName, ScreenConfigOverride>,
}

#[derive(Default)]
struct Failures {
    build_listing: bool,
    approved_listing: bool,
    approved_loads: HashSet<ScreenName>,
    build_loads: HashSet<ScreenName>,
    config_loads: HashSet<ScreenName>,
    archives: HashSet<ArtifactKind>,
    build_load_delays: HashMap<ScreenName, Duration>,
}

/// In-memory [`StorageAdapter`]
#[derive(Default)]
pub struct MemoryStorage {
    screens: Mutex<Screens>,
    failures: Mutex<Failures>,
    calls: Mutex<Vec<StorageCall>>,
    finished_loads: Mutex<Vec<ScreenName>>,
    archived: Mutex<Vec<(ArtifactKind, ScreenName, Image)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_build_screen(&self, name: &str, image: Image) {
        self.screens.lock().build.push((name.to_string(), image));
    }

    pub fn add_approved_screen(&self, name: &str, image: Image) {
        self.screens.lock().approved.push((name.to_string(), image));
    }

    pub fn add_screen_config(&self, name: &str, config: ScreenConfigOverride) {
        self.screens.lock().configs.insert(name.to_string(), config);
    }

    pub fn fail_build_listing(&self) {
        self.failures.lock().build_listing = true;
    }

    pub fn fail_approved_listing(&self) {
        self.failures.lock().approved_listing = true;
    }

    pub fn fail_approved_load(&self, name: &str) {
        self.failures.lock().approved_loads.insert(name.to_string());
    }

    pub fn fail_build_load(&self, name: &str) {
        self.failures.lock().build_loads.insert(name.to_string());
    }

    pub fn fail_config_load(&self, name: &str) {
        self.failures.lock().config_loads.insert(name.to_string());
    }

    pub fn fail_archive(&self, kind: ArtifactKind) {
        self.failures.lock().archives.insert(kind);
    }

    /// Hold the build-image load of `name` for `delay`
    pub fn delay_build_load(&self, name: &str, delay: Duration) {
        self.failures.lock().build_load_delays.insert(name.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.calls.lock().clone()
    }

    /// Artifact kinds archived for `name`, in completion order
    pub fn archived(&self, name: &str) -> Vec<ArtifactKind> {
        self.archived
            .lock()
            .iter()
            .filter(|(_, n, _)| n == name)
            .map(|(kind, _, _)| *kind)
            .collect()
    }

    /// Screens whose build-image load finished, in completion order
    pub fn finished_build_loads(&self) -> Vec<ScreenName> {
        self.finished_loads.lock().clone()
    }

    pub fn archive_count(&self) -> usize {
        self.archived.lock().len()
    }

    /// Highest number of simultaneous build-image loads seen
    pub fn max_concurrent_loads(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: StorageCall) {
        self.calls.lock().push(call);
    }

    fn find(list: &[(ScreenName, Image)], kind: &str, name: &str) -> Result<Image> {
        list.iter()
            .find(|(n, _)| n == name)
            .map(|(_, image)| image.clone())
            .ok_or_else(|| KoboldError::ScreenNotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            })
    }

    fn store(&self, kind: ArtifactKind, name: &str, image: &Image) -> Result<()> {
        self.record(StorageCall::Archive(kind, name.to_string()));
        if self.failures.lock().archives.contains(&kind) {
            return Err(KoboldError::Storage(format!("cannot archive {} screen {}", kind, name)));
        }
        self.archived.lock().push((kind, name.to_string(), image.clone()));
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn list_build_screen_names(&self) -> Result<Vec<ScreenName>> {
        self.record(StorageCall::ListBuild);
        if self.failures.lock().build_listing {
            return Err(KoboldError::Storage("build listing unavailable".to_string()));
        }
        Ok(self.screens.lock().build.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn list_approved_screen_names(&self) -> Result<Vec<ScreenName>> {
        self.record(StorageCall::ListApproved);
        if self.failures.lock().approved_listing {
            return Err(KoboldError::Storage("approved listing unavailable".to_string()));
        }
        Ok(self.screens.lock().approved.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn load_approved_screen(&self, name: &str) -> Result<Image> {
        self.record(StorageCall::LoadApproved(name.to_string()));
        if self.failures.lock().approved_loads.contains(name) {
            return Err(KoboldError::Storage(format!("cannot read approved screen {}", name)));
        }
        Self::find(&self.screens.lock().approved, "approved", name)
    }

    async fn load_build_screen(&self, name: &str) -> Result<Image> {
        self.record(StorageCall::LoadBuild(name.to_string()));

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let delay = self.failures.lock().build_load_delays.get(name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished_loads.lock().push(name.to_string());

        if self.failures.lock().build_loads.contains(name) {
            return Err(KoboldError::Storage(format!("cannot read build screen {}", name)));
        }
        Self::find(&self.screens.lock().build, "build", name)
    }

    async fn load_screen_config(&self, name: &str) -> Result<ScreenConfigOverride> {
        self.record(StorageCall::LoadConfig(name.to_string()));
        if self.failures.lock().config_loads.contains(name) {
            return Err(KoboldError::Storage(format!("cannot read config of {}", name)));
        }
        Ok(self.screens.lock().configs.get(name).cloned().unwrap_or_default())
    }

    async fn archive_approved_screen(&self, name: &str, image: &Image) -> Result<()> {
        self.store(ArtifactKind::Approved, name, image)
    }

    async fn archive_build_screen(&self, name: &str, image: &Image) -> Result<()> {
        self.store(ArtifactKind::Build, name, image)
    }

    async fn archive_highlight_screen(&self, name: &str, image: &Image) -> Result<()> {
        self.store(ArtifactKind::Highlight, name, image)
    }
}

/// Verdict code [`ScriptedComparator`] treats as passing
pub const SCRIPTED_PASS: i32 = 0;
/// Verdict code [`ScriptedComparator`] treats as failing
pub const SCRIPTED_DIFFERENT: i32 = 1;

/// What [`ScriptedComparator`] answers
#[derive(Debug, Clone)]
pub enum Script {
    Pass,
    Differ,
    /// Pass when the pixel buffers are equal
    ByEquality,
    /// Return an error from `compare`
    Error(String),
}

/// [`Comparator`] answering from a [`Script`]. Every non-error answer carries
/// a highlight image.
pub struct ScriptedComparator {
    script: Script,
    seen_options: Mutex<Vec<ComparisonOptions>>,
}

impl ScriptedComparator {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            seen_options: Mutex::new(Vec::new()),
        }
    }

    /// Options of every `compare` call, in call order
    pub fn seen_options(&self) -> Vec<ComparisonOptions> {
        self.seen_options.lock().clone()
    }
}

#[async_trait]
impl Comparator for ScriptedComparator {
    async fn compare(
        &self,
        approved: &Image,
        build: &Image,
        options: &ComparisonOptions,
    ) -> Result<Comparison> {
        self.seen_options.lock().push(options.clone());

        let verdict_code = match &self.script {
            Script::Pass => SCRIPTED_PASS,
            Script::Differ => SCRIPTED_DIFFERENT,
            Script::ByEquality if approved == build => SCRIPTED_PASS,
            Script::ByEquality => SCRIPTED_DIFFERENT,
            Script::Error(msg) => return Err(KoboldError::Comparison(msg.clone())),
        };

        Ok(Comparison {
            verdict_code,
            highlight: Some(Image::new(build.width(), build.height())),
        })
    }

    fn passed(&self, verdict_code: i32) -> bool {
        verdict_code == SCRIPTED_PASS
    }
}
