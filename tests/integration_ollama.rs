#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Retrieval against a mocked Ollama server speaking the /api/embed protocol

use rag_core::RagError;
use rag_core::config::OllamaConfig;
use rag_core::embeddings::{Embedder, OllamaEmbedder};
use rag_core::retrieval::{Document, OpenMode, RetrievalOptions, Retriever};
use serde::Deserialize;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const TEST_MODEL: &str = "nomic-embed-text";

#[derive(Deserialize)]
struct EmbedBody {
    input: Vec<String>,
}

/// Answers every input with a six-dimensional keyword vector. Only the
/// first four components survive truncation to the configured dimension.
struct KeywordEmbeddings;

impl Respond for KeywordEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = request.body_json::<EmbedBody>() else {
            return ResponseTemplate::new(400);
        };

        let embeddings: Vec<Vec<f32>> = body
            .input
            .iter()
            .map(|text| {
                let text = text.to_lowercase();
                let has = |word: &str| if text.contains(word) { 1.0 } else { 0.0 };
                vec![
                    has("regist"),
                    has("custod"),
                    has("market"),
                    0.05,
                    9.0,
                    9.0,
                ]
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": TEST_MODEL,
            "embeddings": embeddings
        }))
    }
}

async fn mock_ollama(models: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": "0.6.0"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": models
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(KeywordEmbeddings)
        .mount(&server)
        .await;

    server
}

fn config_for(server: &MockServer) -> OllamaConfig {
    OllamaConfig {
        host: server.address().ip().to_string(),
        port: server.address().port(),
        model: TEST_MODEL.to_string(),
        batch_size: 2,
        embedding_dimension: 4,
        ..OllamaConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn ollama_backed_retrieval() {
    let server = mock_ollama(serde_json::json!([
        {"name": "nomic-embed-text:latest", "size": 274_302_450}
    ]))
    .await;
    let config = config_for(&server);
    let dir = TempDir::new().expect("should create temp dir");
    let directory = dir.path().to_path_buf();

    let results = tokio::task::spawn_blocking(move || {
        let embedder = OllamaEmbedder::open(&config)?;
        assert_eq!(embedder.dimension(), 4);

        let options = RetrievalOptions {
            threshold: 0.0,
            ..RetrievalOptions::new(directory, "faiss_index")
        };
        let retriever = Retriever::open(options, embedder, None, OpenMode::CreateIfMissing)?;
        retriever.ingest(&[
            Document::new("Advisers must register with the SEC."),
            Document::new("Qualified custodians hold client assets."),
            Document::new("Marketing materials may not mislead."),
        ])?;
        retriever.search("custodian requirements", 3)
    })
    .await
    .expect("blocking task should complete")
    .expect("retrieval should succeed");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].chunk_id, 1);
    assert!(results[0].raw_similarity > 0.9);
    assert!(
        results
            .windows(2)
            .all(|w| w[0].combined_score >= w[1].combined_score)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_model_blocks_startup() {
    let server = mock_ollama(serde_json::json!([
        {"name": "all-minilm:latest", "size": 45_960_996}
    ]))
    .await;
    let config = config_for(&server);

    let result = tokio::task::spawn_blocking(move || OllamaEmbedder::open(&config))
        .await
        .expect("blocking task should complete");

    assert!(matches!(result, Err(RagError::ModelUnavailable(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_dimension_is_a_configuration_error() {
    let server = mock_ollama(serde_json::json!([
        {"name": "nomic-embed-text:latest", "size": 274_302_450}
    ]))
    .await;
    let config = OllamaConfig {
        embedding_dimension: 16,
        ..config_for(&server)
    };

    let result = tokio::task::spawn_blocking(move || OllamaEmbedder::open(&config))
        .await
        .expect("blocking task should complete");

    assert!(matches!(result, Err(RagError::Configuration(_))));
}
