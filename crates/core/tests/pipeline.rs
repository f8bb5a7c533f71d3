//! End-to-end pipeline test: a mock web server, a deterministic embedder,
//! the on-disk SQLite store, and a canned completer.

use async_trait::async_trait;
use grounded_qa_core::config::{FetchSettings, HtmlSettings};
use grounded_qa_core::{
    ChunkingConfig, EmbedError, Embedder, GroundedAnswerer, GuidePipeline, QueryError, Source,
    SourceFetcher, SourceStatus, SqliteVectorStore, Stage, TextCompleter, VectorStore,
};
use httpmock::prelude::*;
use tempfile::tempdir;
use url::Url;

/// Character-trigram hashing embedder: deterministic, and texts sharing
/// vocabulary land near each other under cosine distance.
struct TrigramEmbedder {
    dimensions: usize,
}

impl TrigramEmbedder {
    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(3) {
            let token: String = window.iter().collect();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            vector[(hash % self.dimensions as u64) as usize] += 1.0;
        }

        let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for TrigramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}

/// Echoes a sentence built from the supplied context, so the test can check
/// the answer is grounded in the retrieved text rather than the fallback.
struct EchoCompleter;

#[async_trait]
impl TextCompleter for EchoCompleter {
    async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String, QueryError> {
        let line = prompt
            .lines()
            .find(|line| line.contains("20 pages"))
            .unwrap_or("no supporting line found");
        Ok(format!("According to the guidance: {}", line.trim()))
    }
}

fn source(url: &str) -> Source {
    Source {
        url: Url::parse(url).expect("test url"),
        declared: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn html_sources_are_ingested_retrieved_and_answered() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/thesis");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body(
                    "<html><head><script>track();</script></head><body>\
                     <nav>Home | Thesis | Contact</nav>\
                     <p>Bachelor theses require a minimum of 20 pages.</p>\
                     </body></html>",
                );
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/broken");
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body("binary");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/cooking");
            then.status(200)
                .header("content-type", "text/html")
                .body(
                    "<html><body><p>Simmer the broth gently for two hours \
                     before adding the vegetables.</p></body></html>",
                );
        })
        .await;

    let dir = tempdir().expect("tempdir");
    let store = SqliteVectorStore::open(dir.path(), "guidance", 64)
        .await
        .expect("store should open");
    let fetcher = SourceFetcher::new(&FetchSettings {
        timeout_secs: 5,
        max_retries: 0,
        backoff_secs: 0,
    })
    .expect("client");

    let pipeline = GuidePipeline::new(
        fetcher,
        HtmlSettings::default(),
        ChunkingConfig::new(500, 50).expect("chunk config"),
        TrigramEmbedder { dimensions: 64 },
        store,
        2,
    );

    // Ingest three sources; the middle one has an unsupported content type.
    let report = pipeline
        .ingest_all(&[
            source(&server.url("/thesis")),
            source(&server.url("/broken")),
            source(&server.url("/cooking")),
        ])
        .await;

    assert_eq!(report.outcomes.len(), 3);
    assert!(matches!(
        report.outcomes[0].status,
        SourceStatus::Stored { .. }
    ));
    assert!(matches!(
        report.outcomes[1].status,
        SourceStatus::Failed {
            stage: Stage::Extracting,
            ..
        }
    ));
    assert!(matches!(
        report.outcomes[2].status,
        SourceStatus::Stored { .. }
    ));
    assert_eq!(pipeline.store().count().await.expect("count"), 2);

    // The thesis chunk must outrank the cooking chunk for a thesis question.
    let retrieval = pipeline
        .retrieve("How many pages for a bachelor thesis?")
        .await
        .expect("retrieve");

    assert!(!retrieval.collection_uninitialized);
    assert!(!retrieval.hits.is_empty());
    let top = &retrieval.hits[0];
    assert!(
        top.text.contains("minimum of 20 pages"),
        "unexpected top hit: {:?}",
        top.text
    );
    assert!(!top.text.contains("Home | Thesis | Contact"), "nav leaked");
    assert!(top.metadata.source.ends_with("/thesis"));

    // The composed answer references the retrieved fact, not the fallback.
    let answerer = GroundedAnswerer::new(
        EchoCompleter,
        "Documents: {content}\nQuestion: {question}",
        "I do not have enough information.",
        0.0,
    );
    let answer = answerer
        .compose_answer(&retrieval.hits, "How many pages for a bachelor thesis?")
        .await
        .expect("compose");

    assert!(!answer.used_fallback);
    assert!(answer.text.contains("20 pages"), "answer: {}", answer.text);
}

#[tokio::test(flavor = "multi_thread")]
async fn querying_before_any_ingest_reports_an_uninitialized_collection() {
    let dir = tempdir().expect("tempdir");
    let store = SqliteVectorStore::open(dir.path(), "guidance", 8)
        .await
        .expect("store should open");
    let fetcher = SourceFetcher::new(&FetchSettings {
        timeout_secs: 5,
        max_retries: 0,
        backoff_secs: 0,
    })
    .expect("client");

    let pipeline = GuidePipeline::new(
        fetcher,
        HtmlSettings::default(),
        ChunkingConfig::new(500, 50).expect("chunk config"),
        TrigramEmbedder { dimensions: 8 },
        store,
        2,
    );

    let retrieval = pipeline.retrieve("anything at all").await.expect("retrieve");
    assert!(retrieval.hits.is_empty());
    assert!(retrieval.collection_uninitialized);

    let answerer = GroundedAnswerer::new(
        EchoCompleter,
        "Documents: {content}\nQuestion: {question}",
        "I do not have enough information.",
        0.0,
    );
    let answer = answerer
        .compose_answer(&retrieval.hits, "anything at all")
        .await
        .expect("compose");
    assert!(answer.used_fallback);
    assert_eq!(answer.text, "I do not have enough information.");
}
