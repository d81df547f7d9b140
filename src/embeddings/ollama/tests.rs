use super::*;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, dimension: u32) -> OllamaConfig {
    OllamaConfig {
        host: server.address().ip().to_string(),
        port: server.address().port(),
        model: "test-model".to_string(),
        batch_size: 2,
        embedding_dimension: dimension,
        ..OllamaConfig::default()
    }
}

async fn mount_healthy_server(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": "0.6.0"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{"name": "test-model:latest", "size": 1234}]
        })))
        .mount(server)
        .await;
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
        embedding_dimension: 384,
    };
    let client = OllamaEmbedder::new(&config).expect("Failed to create client");

    assert_eq!(client.model(), "test-model");
    assert_eq!(client.batch_size(), 128);
    assert_eq!(client.dimension(), 384);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
}

#[test]
fn invalid_config_is_rejected() {
    let config = OllamaConfig {
        batch_size: 0,
        ..OllamaConfig::default()
    };
    assert!(matches!(
        OllamaEmbedder::new(&config),
        Err(RagError::Configuration(_))
    ));
}

#[test]
fn untagged_model_matches_latest() {
    assert!(model_matches("nomic-embed-text:latest", "nomic-embed-text"));
    assert!(model_matches("nomic-embed-text:latest", "nomic-embed-text:latest"));
    assert!(!model_matches("nomic-embed-text:v1.5", "nomic-embed-text"));
    assert!(!model_matches("other:latest", "nomic-embed-text"));
}

#[tokio::test(flavor = "multi_thread")]
async fn open_probes_and_truncates_dimension() {
    let server = MockServer::start().await;
    mount_healthy_server(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(serde_json::json!({"model": "test-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [[3.0, 4.0, 0.0, 12.0]]
        })))
        .mount(&server)
        .await;

    let config = config_for(&server, 2);
    let vector = tokio::task::spawn_blocking(move || {
        let embedder = OllamaEmbedder::open(&config)?;
        embedder.embed_one("hello")
    })
    .await
    .expect("blocking task should complete")
    .expect("embedding should succeed");

    assert_eq!(vector.len(), 2);
    assert!((vector[0] - 0.6).abs() < 1e-6);
    assert!((vector[1] - 0.8).abs() < 1e-6);
}

#[tokio::test(flavor = "multi_thread")]
async fn open_fails_when_model_is_missing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{"name": "another-model:latest"}]
        })))
        .mount(&server)
        .await;

    let config = config_for(&server, 4);
    let result = tokio::task::spawn_blocking(move || OllamaEmbedder::open(&config))
        .await
        .expect("blocking task should complete");

    assert!(matches!(result, Err(RagError::ModelUnavailable(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn open_rejects_too_small_model() {
    let server = MockServer::start().await;
    mount_healthy_server(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [[0.1, 0.2]]
        })))
        .mount(&server)
        .await;

    let config = config_for(&server, 8);
    let result = tokio::task::spawn_blocking(move || OllamaEmbedder::open(&config))
        .await
        .expect("blocking task should complete");

    assert!(matches!(result, Err(RagError::Configuration(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_during_encode_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server, 4);
    let result = tokio::task::spawn_blocking(move || {
        OllamaEmbedder::new(&config)?.embed(&["text".to_string()])
    })
    .await
    .expect("blocking task should complete");

    assert!(matches!(result, Err(RagError::Embedding(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn list_models_reads_names_from_full_tags_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [
                {
                    "name": "nomic-embed-text:latest",
                    "size": 274_302_450,
                    "digest": "0a109f422b47",
                    "details": {"family": "nomic-bert", "parameter_size": "137M"}
                },
                {"name": "all-minilm:latest"}
            ]
        })))
        .mount(&server)
        .await;

    let config = config_for(&server, 4);
    let names = tokio::task::spawn_blocking(move || {
        let embedder = OllamaEmbedder::new(&config).expect("client should build");
        embedder
            .list_models()
            .map(|models| models.into_iter().map(|m| m.name).collect::<Vec<_>>())
    })
    .await
    .expect("blocking task should complete")
    .expect("listing should succeed");

    assert_eq!(names, vec!["nomic-embed-text:latest", "all-minilm:latest"]);
}
