//! Capture commands: single candidate, URL batches, watched file and pending captures

use crate::error::Result;
use crate::fetch::ContentFetcher;
use crate::ingest::{BatchReport, CaptureOutcome, Ingestor};
use crate::progress::batch_progress_bar;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Handle one candidate read from stdin or a file
pub async fn cmd_capture<F: ContentFetcher>(
    ingestor: &Ingestor<F>,
    text: &str,
) -> CaptureOutcome {
    ingestor.handle_candidate(text).await
}

/// Candidates listed one per line; blank lines and `#` comments are skipped
pub fn read_candidates(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Process every candidate listed in `path`
pub async fn cmd_batch<F: ContentFetcher>(
    ingestor: &Ingestor<F>,
    path: &Path,
) -> Result<BatchReport> {
    let contents = tokio::fs::read_to_string(path).await?;
    let candidates = read_candidates(&contents);
    info!("Processing {} candidates from {:?}", candidates.len(), path);

    let pb = batch_progress_bar(candidates.len() as u64);
    let report = ingestor.process_batch(&candidates, Some(&pb)).await;
    pb.finish_and_clear();
    report
}

/// Extract raw captures left pending by earlier runs
pub async fn cmd_process<F: ContentFetcher>(ingestor: &Ingestor<F>) -> Result<BatchReport> {
    ingestor.process_pending().await
}

/// Poll a file standing in for the clipboard until interrupted
pub async fn cmd_watch<F: ContentFetcher>(
    ingestor: &Ingestor<F>,
    path: &Path,
    interval: Duration,
) -> Result<BatchReport> {
    info!("Watching {:?} every {:?} (Ctrl-C to stop)", path, interval);

    let mut report = BatchReport::default();
    let mut last_seen: Option<String> = None;
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!("Watched file unreadable: {}", e);
                continue;
            }
        };
        if last_seen.as_deref() == Some(contents.as_str()) {
            continue;
        }

        let outcome = ingestor.handle_candidate(&contents).await;
        print_outcome(&outcome);
        if outcome == CaptureOutcome::Busy {
            continue;
        }
        report.record(&outcome);
        last_seen = Some(contents);
    }

    Ok(report)
}

/// Print a capture outcome
pub fn print_outcome(outcome: &CaptureOutcome) {
    match outcome {
        CaptureOutcome::Stored { record } => {
            println!("✓ Decision stored: {}", record.id);
            println!("  Processo: {}", record.processo);
            println!("  Relator:  {}", record.relator);
            println!("  Data:     {}", record.data);
            if !record.adjuntos.is_empty() {
                println!("  Adjuntos: {}", record.adjuntos.join(", "));
            }
            let unresolved = record.unresolved_fields();
            if !unresolved.is_empty() {
                println!("  Unresolved: {}", unresolved.join(", "));
            }
        }
        CaptureOutcome::Deferred { raw_name, error } => {
            println!("⚠ Capture kept as '{}' for later processing", raw_name);
            println!("  Reason: {}", error);
        }
        CaptureOutcome::Failed { error } => println!("✗ Capture failed: {}", error),
        CaptureOutcome::ManualCaptureRequired { url } => {
            println!("✗ Could not fetch {}", url);
            println!("  Open the page, copy its content and run 'juris capture'.");
        }
        CaptureOutcome::Duplicate => println!("Already processed, skipping."),
        CaptureOutcome::Ignored => println!("Not a portal address or a court decision."),
        CaptureOutcome::Busy => println!("Another capture is in progress."),
    }
}

/// Print batch counters
pub fn print_batch_report(report: &BatchReport) {
    println!("\n✓ Batch complete");
    println!("  Stored: {}", report.succeeded);
    println!("  Failed: {}", report.failed);
    println!("  Manual capture required: {}", report.manual);
    println!("  Skipped: {}", report.skipped);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_candidates() {
        let contents = "# acórdãos do STJ\n\nhttp://www.dgsi.pt/jstj.nsf/0/a\n  http://www.dgsi.pt/jstj.nsf/0/b  \n";
        assert_eq!(
            read_candidates(contents),
            vec!["http://www.dgsi.pt/jstj.nsf/0/a", "http://www.dgsi.pt/jstj.nsf/0/b"]
        );
    }
}
