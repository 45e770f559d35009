//! Ingestion orchestration
//!
//! Classifies capture candidates, fetches portal pages, and drives each
//! document through the store: the raw capture is written first, then the
//! extracted record, and only then is the raw capture removed. A failure at
//! any step leaves the raw capture in place for [`Ingestor::process_pending`].

use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use crate::extract::Extractor;
use crate::fetch::ContentFetcher;
use crate::models::{CapturedDocument, LegalRecord};
use crate::store::{sanitize_name, Store};
use chrono::Utc;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Locator scheme for pasted content
pub const PASTED_SCHEME: &str = "colagem://";

/// What a capture candidate looks like
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// A portal address to fetch
    Url(String),
    /// Pasted decision text or markup
    RawContent(String),
    Unrecognized,
}

impl Candidate {
    pub fn classify(text: &str, config: &CaptureConfig) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Candidate::Unrecognized;
        }

        if config
            .portal_prefixes
            .iter()
            .any(|prefix| trimmed.starts_with(prefix.as_str()))
        {
            return Candidate::Url(trimmed.to_string());
        }

        let lower = trimmed.to_lowercase();
        let has_marker = config
            .marker_keywords
            .iter()
            .any(|keyword| lower.contains(&keyword.to_lowercase()));
        if has_marker && trimmed.chars().count() >= config.min_content_chars {
            return Candidate::RawContent(trimmed.to_string());
        }

        Candidate::Unrecognized
    }
}

/// Result of handling one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaptureOutcome {
    /// Another run holds the session
    Busy,
    /// Same as the last processed candidate
    Duplicate,
    /// Neither a portal address nor a decision
    Ignored,
    Stored { record: LegalRecord },
    /// Raw capture kept; extraction or record save failed
    Deferred { raw_name: String, error: String },
    /// Nothing could be persisted
    Failed { error: String },
    /// Every fetch strategy failed; the page must be pasted by hand
    ManualCaptureRequired { url: String },
}

/// Counters for a batch or pending run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub manual: usize,
    pub skipped: usize,
}

impl BatchReport {
    /// Count one outcome
    pub fn record(&mut self, outcome: &CaptureOutcome) {
        match outcome {
            CaptureOutcome::Stored { .. } => self.succeeded += 1,
            CaptureOutcome::Deferred { .. } | CaptureOutcome::Failed { .. } => self.failed += 1,
            CaptureOutcome::ManualCaptureRequired { .. } => self.manual += 1,
            CaptureOutcome::Busy | CaptureOutcome::Duplicate | CaptureOutcome::Ignored => {
                self.skipped += 1
            }
        }
    }
}

/// Content-addressed locator for pasted text
pub fn pasted_locator(content: &str) -> String {
    let hash = blake3::hash(content.as_bytes()).to_hex();
    format!("{}{}", PASTED_SCHEME, &hash[..16])
}

/// Raw capture name for a locator, with a timestamped fallback
pub fn raw_capture_name(locator: &str) -> String {
    let name = sanitize_name(locator);
    if name.is_empty() {
        format!("captura_{}", Utc::now().format("%Y%m%d%H%M%S%3f"))
    } else {
        name
    }
}

/// Court database of a portal address (`/jstj.nsf/...` files under `jstj`)
pub fn court_subfolder(locator: &str) -> Option<String> {
    let url = url::Url::parse(locator).ok()?;
    let segment = url.path_segments()?.next()?;
    let court = segment.strip_suffix(".nsf").unwrap_or(segment);
    let court = sanitize_name(court);
    (!court.is_empty()).then_some(court)
}

/// Held while a run is in flight; released on drop
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One capture session: store, extractor and fetcher plus the session state
pub struct Ingestor<F: ContentFetcher> {
    store: Store,
    extractor: Extractor,
    fetcher: F,
    config: CaptureConfig,
    last_candidate: Mutex<Option<String>>,
    in_flight: AtomicBool,
}

impl<F: ContentFetcher> Ingestor<F> {
    pub fn new(store: Store, extractor: Extractor, fetcher: F, config: CaptureConfig) -> Self {
        Self {
            store,
            extractor,
            fetcher,
            config,
            last_candidate: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Handle one candidate from a capture source
    pub async fn handle_candidate(&self, text: &str) -> CaptureOutcome {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            debug!("Ingestion in flight, candidate dropped");
            return CaptureOutcome::Busy;
        };
        self.process_candidate(text).await
    }

    async fn process_candidate(&self, text: &str) -> CaptureOutcome {
        let candidate = text.trim();
        if self.last_candidate.lock().await.as_deref() == Some(candidate) {
            debug!("Candidate matches the last one processed");
            return CaptureOutcome::Duplicate;
        }

        let outcome = match Candidate::classify(candidate, &self.config) {
            Candidate::Unrecognized => CaptureOutcome::Ignored,
            Candidate::Url(url) => match self.fetcher.fetch(&url).await {
                Ok(content) => {
                    let subfolder = court_subfolder(&url);
                    self.ingest_content(&content, &url, subfolder.as_deref()).await
                }
                Err(e) => {
                    warn!("{}", e);
                    CaptureOutcome::ManualCaptureRequired { url }
                }
            },
            Candidate::RawContent(content) => {
                let locator = pasted_locator(&content);
                self.ingest_content(&content, &locator, None).await
            }
        };

        if matches!(
            outcome,
            CaptureOutcome::Stored { .. } | CaptureOutcome::Deferred { .. }
        ) {
            *self.last_candidate.lock().await = Some(candidate.to_string());
        }
        outcome
    }

    /// Persist raw content, extract it, save the record and drop the raw capture
    pub async fn ingest_content(
        &self,
        content: &str,
        locator: &str,
        subfolder: Option<&str>,
    ) -> CaptureOutcome {
        let raw_name = match self
            .store
            .save_raw_capture(&raw_capture_name(locator), content, subfolder, Some(locator))
            .await
        {
            Ok(name) => name,
            Err(e) => {
                warn!("Could not save raw capture for {}: {}", locator, e);
                return CaptureOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        match self.convert(&raw_name, content, locator).await {
            Ok(record) => CaptureOutcome::Stored { record },
            Err(error) => {
                warn!(raw_name = %raw_name, "Capture deferred: {}", error);
                CaptureOutcome::Deferred { raw_name, error }
            }
        }
    }

    /// Raw capture to record; the raw capture stays unless the record was saved
    async fn convert(
        &self,
        raw_name: &str,
        content: &str,
        locator: &str,
    ) -> std::result::Result<LegalRecord, String> {
        let document = CapturedDocument::new(content, locator);
        let record = self
            .extractor
            .extract_document(&document)
            .map_err(|e| e.to_string())?;

        let unresolved = record.unresolved_fields();
        if !unresolved.is_empty() {
            debug!(id = %record.id, ?unresolved, "Record has unresolved fields");
        }

        self.store
            .save_legal_record(&record)
            .await
            .map_err(|e| e.to_string())?;

        if let Err(e) = self.store.delete_raw_capture(raw_name).await {
            warn!(raw_name = %raw_name, "Record saved but raw capture remains: {}", e);
        }

        info!(id = %record.id, "Stored decision {}", record.processo);
        Ok(record)
    }

    /// Process candidates one after another, paced by the batch delay
    pub async fn process_batch(
        &self,
        candidates: &[String],
        progress: Option<&ProgressBar>,
    ) -> Result<BatchReport> {
        let _guard = InFlight::acquire(&self.in_flight).ok_or(Error::Busy)?;

        let pacer: Option<DefaultDirectRateLimiter> =
            Quota::with_period(Duration::from_millis(self.config.batch_delay_ms))
                .map(RateLimiter::direct);
        let mut report = BatchReport::default();

        for candidate in candidates {
            if let Some(pacer) = &pacer {
                pacer.until_ready().await;
            }

            let outcome = self.process_candidate(candidate).await;
            debug!(?outcome, "Batch item processed");
            report.record(&outcome);

            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        info!(
            "Batch finished: {} stored, {} failed, {} manual, {} skipped",
            report.succeeded, report.failed, report.manual, report.skipped
        );
        Ok(report)
    }

    /// Retry extraction for every raw capture left standing
    pub async fn process_pending(&self) -> Result<BatchReport> {
        let _guard = InFlight::acquire(&self.in_flight).ok_or(Error::Busy)?;

        let pending = self.store.list_raw_captures().await?;
        let mut report = BatchReport::default();

        for capture in pending {
            // Captures saved without a locator are identified by their name
            let locator = capture.source.as_deref().unwrap_or(&capture.name);
            match self.convert(&capture.name, &capture.content, locator).await {
                Ok(_) => report.succeeded += 1,
                Err(error) => {
                    warn!(raw_name = %capture.name, "Still pending: {}", error);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::UNKNOWN;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;
    use tempfile::TempDir;

    const PORTAL_URL: &str = "http://www.dgsi.pt/jstj.nsf/954f0ce6/abc123?OpenDocument";

    fn decision_text() -> String {
        format!(
            "Acórdão do Tribunal da Relação do Porto\n\
             Processo: 1234/19.2T8PRT\n\
             Relator: João Silva\n\
             Descritores: Arrendamento; Resolução\n\
             {}\n\
             III - Decisão\n\
             Julga-se a ação procedente.\n\
             João Silva\n\
             Ana Costa\n",
            "A autora pediu a resolução do contrato. ".repeat(6)
        )
    }

    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ContentFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| Error::FetchExhausted(url.to_string()))
        }
    }

    async fn ingestor(tmp: &TempDir, fetcher: FakeFetcher) -> Ingestor<FakeFetcher> {
        ingestor_in(tmp, fetcher, None).await
    }

    async fn ingestor_in(
        tmp: &TempDir,
        fetcher: FakeFetcher,
        directory: Option<PathBuf>,
    ) -> Ingestor<FakeFetcher> {
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.store.directory = directory;
        config.capture.batch_delay_ms = 5;

        let mut store = Store::new(&config);
        assert!(store.select_backend().await.success);
        let extractor = Extractor::new(&config.extract).unwrap();
        Ingestor::new(store, extractor, fetcher, config.capture)
    }

    #[test]
    fn test_classify() {
        let config = CaptureConfig::default();
        assert_eq!(
            Candidate::classify(&format!("  {PORTAL_URL}\n"), &config),
            Candidate::Url(PORTAL_URL.to_string())
        );
        assert!(matches!(
            Candidate::classify(&decision_text(), &config),
            Candidate::RawContent(_)
        ));
        assert_eq!(
            Candidate::classify("Relator: curto", &config),
            Candidate::Unrecognized
        );
        assert_eq!(
            Candidate::classify(&"lista de compras ".repeat(20), &config),
            Candidate::Unrecognized
        );
    }

    #[test]
    fn test_locators_and_names() {
        let locator = pasted_locator("texto");
        assert_eq!(locator, pasted_locator("texto"));
        assert_ne!(locator, pasted_locator("outro texto"));
        assert!(raw_capture_name(&locator).starts_with("colagem___"));
        assert!(raw_capture_name("").starts_with("captura_"));
        assert_eq!(court_subfolder(PORTAL_URL).as_deref(), Some("jstj"));
        assert_eq!(court_subfolder("colagem://abc"), None);
    }

    #[tokio::test]
    async fn test_pasted_text_is_stored_and_raw_removed() {
        let tmp = TempDir::new().unwrap();
        let ingestor = ingestor(&tmp, FakeFetcher::default()).await;

        let outcome = ingestor.handle_candidate(&decision_text()).await;
        let CaptureOutcome::Stored { record } = outcome else {
            panic!("expected a stored record, got {:?}", outcome);
        };
        assert_eq!(record.relator, "João Silva");
        assert_eq!(record.adjuntos, vec!["Ana Costa"]);
        assert!(record.url.starts_with(PASTED_SCHEME));

        assert_eq!(ingestor.store().list_legal_records().await.unwrap().len(), 1);
        assert!(ingestor.store().list_raw_captures().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_candidate_twice_extracts_once() {
        let tmp = TempDir::new().unwrap();
        let mut fetcher = FakeFetcher::default();
        fetcher
            .pages
            .insert(PORTAL_URL.to_string(), format!("<html><body><p>{}</p></body></html>", decision_text()));
        let ingestor = ingestor(&tmp, fetcher).await;

        assert!(matches!(
            ingestor.handle_candidate(PORTAL_URL).await,
            CaptureOutcome::Stored { .. }
        ));
        assert_eq!(
            ingestor.handle_candidate(PORTAL_URL).await,
            CaptureOutcome::Duplicate
        );
        assert_eq!(ingestor.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ingestor.store().list_legal_records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_busy_session_drops_candidate() {
        let tmp = TempDir::new().unwrap();
        let ingestor = ingestor(&tmp, FakeFetcher::default()).await;

        let guard = InFlight::acquire(&ingestor.in_flight).unwrap();
        assert_eq!(
            ingestor.handle_candidate(&decision_text()).await,
            CaptureOutcome::Busy
        );
        assert!(matches!(
            ingestor.process_batch(&[], None).await,
            Err(Error::Busy)
        ));
        drop(guard);

        assert!(matches!(
            ingestor.handle_candidate(&decision_text()).await,
            CaptureOutcome::Stored { .. }
        ));
    }

    #[tokio::test]
    async fn test_exhausted_fetch_requires_manual_capture() {
        let tmp = TempDir::new().unwrap();
        let ingestor = ingestor(&tmp, FakeFetcher::default()).await;

        assert_eq!(
            ingestor.handle_candidate(PORTAL_URL).await,
            CaptureOutcome::ManualCaptureRequired {
                url: PORTAL_URL.to_string()
            }
        );
        assert!(ingestor.store().list_raw_captures().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_extraction_keeps_raw_capture() {
        let tmp = TempDir::new().unwrap();
        let ingestor = ingestor(&tmp, FakeFetcher::default()).await;

        let broken = format!("{}\0", decision_text());
        let CaptureOutcome::Deferred { raw_name, error } = ingestor.handle_candidate(&broken).await
        else {
            panic!("expected deferral");
        };
        assert!(error.starts_with("parse-failure"));

        let pending = ingestor.store().list_raw_captures().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name, raw_name);

        let report = ingestor.process_pending().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(ingestor.store().list_raw_captures().await.unwrap().len(), 1);
        assert!(ingestor.store().list_legal_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_pending_converts_raw_captures() {
        let tmp = TempDir::new().unwrap();
        let ingestor = ingestor(&tmp, FakeFetcher::default()).await;

        ingestor
            .store()
            .save_raw_capture("captura_antiga", &decision_text(), None, None)
            .await
            .unwrap();

        let report = ingestor.process_pending().await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert!(ingestor.store().list_raw_captures().await.unwrap().is_empty());

        let records = ingestor.store().list_legal_records().await.unwrap();
        assert_eq!(records[0].processo, "1234/19.2T8PRT");
        assert_eq!(records[0].ecli, UNKNOWN);
        assert_eq!(records[0].url, "captura_antiga");
    }

    #[tokio::test]
    async fn test_deferred_url_capture_keeps_url_when_processed_later() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("acordaos");
        let mut fetcher = FakeFetcher::default();
        fetcher
            .pages
            .insert(PORTAL_URL.to_string(), format!("<html><body><p>{}</p></body></html>", decision_text()));
        let ingestor = ingestor_in(&tmp, fetcher, Some(root.clone())).await;

        // Records cannot be written while `records` is a plain file
        let records_dir = root.join("records");
        std::fs::remove_dir_all(&records_dir).unwrap();
        std::fs::write(&records_dir, "bloqueado").unwrap();

        let outcome = ingestor.handle_candidate(PORTAL_URL).await;
        assert!(
            matches!(outcome, CaptureOutcome::Deferred { .. }),
            "expected deferral, got {:?}",
            outcome
        );

        std::fs::remove_file(&records_dir).unwrap();
        std::fs::create_dir(&records_dir).unwrap();

        let report = ingestor.process_pending().await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert!(ingestor.store().list_raw_captures().await.unwrap().is_empty());

        let records = ingestor.store().list_legal_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, PORTAL_URL);
    }

    #[tokio::test]
    async fn test_pending_pasted_capture_keeps_pasted_locator() {
        let tmp = TempDir::new().unwrap();
        let ingestor = ingestor(&tmp, FakeFetcher::default()).await;

        let text = decision_text();
        let locator = pasted_locator(&text);
        ingestor
            .store()
            .save_raw_capture(&raw_capture_name(&locator), &text, None, Some(locator.as_str()))
            .await
            .unwrap();

        let report = ingestor.process_pending().await.unwrap();
        assert_eq!(report.succeeded, 1);
        let records = ingestor.store().list_legal_records().await.unwrap();
        assert_eq!(records[0].url, locator);
    }

    #[tokio::test]
    async fn test_batch_counts_outcomes() {
        let tmp = TempDir::new().unwrap();
        let mut fetcher = FakeFetcher::default();
        fetcher
            .pages
            .insert(PORTAL_URL.to_string(), format!("<html><body><p>{}</p></body></html>", decision_text()));
        let ingestor = ingestor(&tmp, fetcher).await;

        let candidates = vec![
            PORTAL_URL.to_string(),
            "http://www.dgsi.pt/jtrp.nsf/0/indisponivel".to_string(),
            "nada de relevante".to_string(),
            decision_text(),
        ];
        let report = ingestor.process_batch(&candidates, None).await.unwrap();
        assert_eq!(
            report,
            BatchReport {
                succeeded: 2,
                failed: 0,
                manual: 1,
                skipped: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_batch_items_are_spaced_by_delay() {
        let tmp = TempDir::new().unwrap();
        let mut ingestor = ingestor(&tmp, FakeFetcher::default()).await;
        ingestor.config.batch_delay_ms = 100;

        let candidates = vec!["um".to_string(), "dois".to_string(), "três".to_string()];
        let started = Instant::now();
        let report = ingestor.process_batch(&candidates, None).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.skipped, 3);
        // Three items leave two gaps of one delay each
        assert!(
            elapsed >= Duration::from_millis(190),
            "batch finished after {:?}",
            elapsed
        );
    }
}
