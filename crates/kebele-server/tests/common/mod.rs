//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use kebele_ai::{
    CallContext, GuideService, InMemoryProcedureIndex, LlmClient, Procedure, SqliteChatHistory,
    StructuredTranslator,
};
use kebele_llm::{Embedder, LlmBackend, MockBackend, MockEmbedder, MockResponse};
use kebele_server::{AppState, LANG_HEADER, Server, ServerConfig, USER_ID_HEADER};

/// The query the seeded procedure answers.
pub const LICENSE_QUERY: &str = "How do I renew my business license?";

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// User id sent with every request.
    pub user: String,
    /// HTTP client configured for this server.
    pub client: Client,
    /// Scripted completion backend.
    pub backend: Arc<MockBackend>,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
    /// Temporary directory holding the history database.
    pub temp_dir: TempDir,
}

impl TestServer {
    /// Start a server with no scripted completions.
    pub async fn start() -> Result<Self> {
        Self::start_with_responses(Vec::new()).await
    }

    /// Start a server whose model replies with `responses` in order.
    ///
    /// One procedure is indexed under [`LICENSE_QUERY`]'s embedding, so that
    /// exact query is answered from it and anything else is not.
    pub async fn start_with_responses(responses: Vec<MockResponse>) -> Result<Self> {
        let temp_dir = TempDir::new()?;

        // Find an available port
        let addr = find_available_port().await?;

        let backend = Arc::new(MockBackend::new(responses));
        let shared: Arc<dyn LlmBackend> = backend.clone();
        let llm = Arc::new(LlmClient::new(shared));

        let embedder = Arc::new(MockEmbedder::default());
        let index = InMemoryProcedureIndex::new().with_min_score(0.9);
        let embedding = embedder.embed(&CallContext::new(), LICENSE_QUERY).await?;
        index.insert(license_procedure(), embedding);

        let history = SqliteChatHistory::open(temp_dir.path().join("history.db"))?;

        let guide = GuideService::new(
            llm.clone(),
            embedder,
            Arc::new(index),
            Arc::new(history),
        );
        let translator = StructuredTranslator::new(llm);
        let config = ServerConfig::new()
            .with_bind_address(addr)
            .with_rate_limiting(false)
            .with_request_logging(false);

        // Start server in background
        let server = Server::from_state(AppState::new(guide, translator, config));
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        // Wait for server to be ready
        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            user: "citizen-1".to_string(),
            client,
            backend,
            _handle: handle,
            temp_dir,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// GET as the test user.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .header(USER_ID_HEADER, &self.user)
    }

    /// POST as the test user.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .header(USER_ID_HEADER, &self.user)
    }

    /// DELETE as the test user.
    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(format!("{}{}", self.base_url(), path))
            .header(USER_ID_HEADER, &self.user)
    }

    /// Ask the guide a question, optionally in another language.
    pub async fn ask(&self, query: &str, lang: Option<&str>) -> Result<reqwest::Response> {
        let mut request = self
            .post("/ai/guide")
            .json(&serde_json::json!({ "query": query }));
        if let Some(lang) = lang {
            request = request.header(LANG_HEADER, lang);
        }
        Ok(request.send().await?)
    }

    /// Check if server is healthy.
    pub async fn health(&self) -> Result<bool> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url()))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }
}

/// The procedure indexed by every test server.
pub fn license_procedure() -> Procedure {
    Procedure::new("proc-license", "Business license renewal")
        .with_prerequisites(["Previous license"])
        .with_steps(["Pay the renewal fee", "Collect the new license"])
        .with_results(["Renewed license"])
        .with_fee(250.0, "ETB")
        .with_processing_time(1, 3)
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
