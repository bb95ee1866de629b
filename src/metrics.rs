use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing summarization and Q&A activity.
#[derive(Default)]
pub struct ServiceMetrics {
    documents_summarized: AtomicU64,
    questions_answered: AtomicU64,
    chunks_indexed: AtomicU64,
}

impl ServiceMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed summarization and the number of chunks indexed for it.
    pub fn record_summary(&self, chunk_count: u64) {
        self.documents_summarized.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a completed question-answering request.
    pub fn record_question(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_summarized: self.documents_summarized.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of service counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents summarized since startup.
    pub documents_summarized: u64,
    /// Number of questions answered since startup.
    pub questions_answered: u64,
    /// Total chunk count indexed across all summarized documents.
    pub chunks_indexed: u64,
}
