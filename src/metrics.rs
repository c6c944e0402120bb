//! Request counters for `GET /metrics`, rendered in the Prometheus text
//! exposition format.

use std::sync::atomic::{AtomicU64, Ordering};

use storyforge_core::models::IndexReport;
use storyforge_core::PipelineError;

#[derive(Debug, Default)]
pub struct ServerMetrics {
    documents_indexed: AtomicU64,
    chunks_indexed: AtomicU64,
    searches: AtomicU64,
    story_requests: AtomicU64,
    stories_generated: AtomicU64,
    provider_errors: AtomicU64,
}

impl ServerMetrics {
    pub fn record_index(&self, report: &IndexReport) {
        self.documents_indexed.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed
            .fetch_add(report.chunks as u64, Ordering::Relaxed);
    }

    pub fn record_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stories(&self, count: usize) {
        self.story_requests.fetch_add(1, Ordering::Relaxed);
        self.stories_generated
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Only upstream provider failures are counted.
    pub fn record_failure(&self, err: &PipelineError) {
        if matches!(err, PipelineError::Provider(_)) {
            self.provider_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn render(&self) -> String {
        let counters = [
            (
                "storyforge_documents_indexed_total",
                "Documents indexed through the HTTP API",
                &self.documents_indexed,
            ),
            (
                "storyforge_chunks_indexed_total",
                "Chunks appended to project collections",
                &self.chunks_indexed,
            ),
            (
                "storyforge_searches_total",
                "Search requests served",
                &self.searches,
            ),
            (
                "storyforge_story_requests_total",
                "Successful story generation requests",
                &self.story_requests,
            ),
            (
                "storyforge_stories_generated_total",
                "User stories parsed from model output",
                &self.stories_generated,
            ),
            (
                "storyforge_provider_errors_total",
                "Failed embedding or language model calls",
                &self.provider_errors,
            ),
        ];

        let mut out = format!(
            "# HELP storyforge_build_info Build metadata\n# TYPE storyforge_build_info gauge\nstoryforge_build_info{{version=\"{}\"}} 1\n",
            env!("CARGO_PKG_VERSION")
        );
        for (name, help, value) in counters {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {}\n",
                value.load(Ordering::Relaxed)
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(chunks: usize) -> IndexReport {
        IndexReport {
            project_id: "hr".to_string(),
            document_id: "d1".to_string(),
            source: "leave.md".to_string(),
            collection: "project_hr".to_string(),
            chunks,
            content_hash: None,
        }
    }

    #[test]
    fn test_render_counts() {
        let metrics = ServerMetrics::default();
        metrics.record_index(&report(3));
        metrics.record_index(&report(2));
        metrics.record_search();
        metrics.record_stories(6);
        metrics.record_failure(&PipelineError::provider("429"));
        metrics.record_failure(&PipelineError::configuration("missing key"));

        let text = metrics.render();
        assert!(text.contains("storyforge_documents_indexed_total 2\n"));
        assert!(text.contains("storyforge_chunks_indexed_total 5\n"));
        assert!(text.contains("storyforge_searches_total 1\n"));
        assert!(text.contains("storyforge_story_requests_total 1\n"));
        assert!(text.contains("storyforge_stories_generated_total 6\n"));
        assert!(text.contains("storyforge_provider_errors_total 1\n"));
        assert!(text.contains("# TYPE storyforge_searches_total counter"));
    }
}
