//! Shared fixtures for integration tests

#![allow(dead_code)]

use bgcompose::{
    services::test_utils::{
        candidate, cutout_png, solid_png, MockFetcher, RecordingAssetStore, ScriptedSearchIndex,
    },
    BackgroundCatalog, BackgroundSearch, Candidate, CompositionOrchestrator, CreditPolicy,
    ImageRecord, InMemoryImageRepository, InMemoryLedger, SearchConfig,
};
use std::sync::Arc;
use uuid::Uuid;

pub const SUBJECT_URL: &str = "https://assets.test/removed/subject.png";
pub const SEARCH_HIT_URL: &str = "https://images.test/7/landscape.jpg";

/// In-memory collaborators plus the orchestrator wired to them
pub struct TestEnv {
    pub orchestrator: CompositionOrchestrator,
    pub repository: Arc<InMemoryImageRepository>,
    pub ledger: Arc<InMemoryLedger>,
    pub store: Arc<RecordingAssetStore>,
    pub index: Arc<ScriptedSearchIndex>,
    pub fetcher: Arc<MockFetcher>,
    pub image: ImageRecord,
}

pub struct TestEnvBuilder {
    policy: CreditPolicy,
    credits: u32,
    removed_bg: bool,
    store: RecordingAssetStore,
    candidates: Vec<Candidate>,
    fetcher: MockFetcher,
}

pub fn studio_soft_url() -> String {
    BackgroundCatalog::builtin()
        .by_id("studio-soft")
        .map(|preset| preset.image_url.clone())
        .unwrap()
}

impl Default for TestEnvBuilder {
    fn default() -> Self {
        Self {
            policy: CreditPolicy::ChargeOnSuccess,
            credits: 0,
            removed_bg: true,
            store: RecordingAssetStore::new(),
            // Candidate 7 is larger and wins
            candidates: vec![candidate(3, 640, 480), candidate(7, 1280, 720)],
            fetcher: MockFetcher::new()
                .with_bytes(SUBJECT_URL, cutout_png(60, 90))
                .with_bytes(&studio_soft_url(), solid_png(200, 150, [235, 235, 240, 255]))
                .with_bytes(SEARCH_HIT_URL, solid_png(256, 144, [40, 90, 160, 255])),
        }
    }
}

impl TestEnvBuilder {
    pub fn policy(mut self, policy: CreditPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn credits(mut self, credits: u32) -> Self {
        self.credits = credits;
        self
    }

    pub fn without_removed_bg(mut self) -> Self {
        self.removed_bg = false;
        self
    }

    pub fn failing_store(mut self) -> Self {
        self.store = RecordingAssetStore::new_failing();
        self
    }

    pub fn candidates(mut self, candidates: Vec<Candidate>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn fetcher(mut self, f: impl FnOnce(MockFetcher) -> MockFetcher) -> Self {
        self.fetcher = f(self.fetcher);
        self
    }

    pub fn build(self) -> TestEnv {
        let owner = Uuid::new_v4();
        let mut image = ImageRecord::new(Uuid::new_v4(), owner, "https://assets.test/original.jpg");
        if self.removed_bg {
            image = image.with_removed_bg(SUBJECT_URL);
        }

        let repository = Arc::new(InMemoryImageRepository::new());
        repository.insert(image.clone());
        let ledger = Arc::new(InMemoryLedger::with_balance(owner, self.credits));
        let store = Arc::new(self.store);
        let index = Arc::new(ScriptedSearchIndex::with_candidates(self.candidates));
        let fetcher = Arc::new(self.fetcher);

        let orchestrator = CompositionOrchestrator::builder()
            .repository(repository.clone())
            .ledger(ledger.clone())
            .store(store.clone())
            .fetcher(fetcher.clone())
            .search(BackgroundSearch::new(index.clone(), &SearchConfig::default()))
            .credit_policy(self.policy)
            .build()
            .unwrap();

        TestEnv {
            orchestrator,
            repository,
            ledger,
            store,
            index,
            fetcher,
            image,
        }
    }
}

pub fn env() -> TestEnvBuilder {
    TestEnvBuilder::default()
}

impl TestEnv {
    pub fn preset(&self, background_id: &str) -> bgcompose::ApplyBackgroundRequest {
        bgcompose::ApplyBackgroundRequest::preset(
            self.image.id.to_string(),
            self.image.user_id.to_string(),
            background_id,
        )
    }

    pub fn generate(&self, prompt: &str) -> bgcompose::ApplyBackgroundRequest {
        bgcompose::ApplyBackgroundRequest::generate(
            self.image.id.to_string(),
            self.image.user_id.to_string(),
            prompt,
        )
    }

    pub async fn balance(&self) -> u32 {
        use bgcompose::CreditLedger;
        self.ledger.balance(self.image.user_id).await.unwrap()
    }
}
