use crate::config::{PartitionStrategy, ProducerConfig};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

/// Body of the producer service's start request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceRequest {
    pub producer_count: u32,
    pub ms_between_messages: u64,
    pub partition_strategy: PartitionStrategy,
}

/// Remote control of the demo's message producer.
#[async_trait]
pub trait ProducerControl: Send + Sync {
    async fn start(&self, request: &ProduceRequest) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn change_key_strategy(&self, strategy: &str) -> Result<()>;
}

/// Talks to the producer service over its REST API.
#[derive(Clone)]
pub struct HttpProducer {
    base_url: String,
    http: reqwest::Client,
}

impl HttpProducer {
    pub fn new(config: &ProducerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl ProducerControl for HttpProducer {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn start(&self, request: &ProduceRequest) -> Result<()> {
        self.http
            .post(self.url("/api/produce-messages"))
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        debug!("Producer started");
        Ok(())
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn stop(&self) -> Result<()> {
        self.http
            .post(self.url("/api/stop-producing"))
            .send()
            .await?
            .error_for_status()?;
        debug!("Producer stopped");
        Ok(())
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn change_key_strategy(&self, strategy: &str) -> Result<()> {
        self.http
            .post(self.url(&format!("/change-key-strategy/{strategy}")))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl std::fmt::Debug for HttpProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProducer")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
