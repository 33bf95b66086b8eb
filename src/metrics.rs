use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity since startup.
#[derive(Default)]
pub struct PortalMetrics {
    documents_ingested: AtomicU64,
    chunks_indexed: AtomicU64,
    questions_answered: AtomicU64,
    documents_analyzed: AtomicU64,
    comparisons_run: AtomicU64,
    last_chunk_size: AtomicU64,
}

impl PortalMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one ingestion of `documents` files producing `chunks` chunks with the given
    /// size limit.
    pub fn record_ingestion(&self, documents: u64, chunks: u64, chunk_size: u64) {
        self.documents_ingested.fetch_add(documents, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunks, Ordering::Relaxed);
        self.last_chunk_size.store(chunk_size, Ordering::Relaxed);
    }

    /// Record an answered chat question.
    pub fn record_question(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed document analysis.
    pub fn record_analysis(&self) {
        self.documents_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed comparison.
    pub fn record_comparison(&self) {
        self.comparisons_run.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let last_chunk_size = self.last_chunk_size.load(Ordering::Relaxed);
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            documents_analyzed: self.documents_analyzed.load(Ordering::Relaxed),
            comparisons_run: self.comparisons_run.load(Ordering::Relaxed),
            last_chunk_size: (last_chunk_size > 0).then_some(last_chunk_size),
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Files ingested into chat indexes.
    pub documents_ingested: u64,
    /// Chunks written to chat indexes.
    pub chunks_indexed: u64,
    /// Chat questions answered.
    pub questions_answered: u64,
    /// Documents analyzed.
    pub documents_analyzed: u64,
    /// Comparisons completed.
    pub comparisons_run: u64,
    /// Chunk size limit used by the most recent ingestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_chunk_size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_ingestions_and_questions() {
        let metrics = PortalMetrics::new();
        metrics.record_ingestion(2, 7, 1000);
        metrics.record_ingestion(1, 3, 500);
        metrics.record_question();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_ingested, 3);
        assert_eq!(snapshot.chunks_indexed, 10);
        assert_eq!(snapshot.questions_answered, 1);
        assert_eq!(snapshot.last_chunk_size, Some(500));
    }

    #[test]
    fn fresh_snapshot_omits_chunk_size() {
        let snapshot = PortalMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
        let json = serde_json::to_value(snapshot).unwrap();
        assert!(json.get("last_chunk_size").is_none());
    }
}
