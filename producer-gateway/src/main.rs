use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::Parser;
use kafka_template::{
    merge_producer_properties, parse_properties_file, run_with_graceful_shutdown, KafkaTemplateError,
    PartitionInfo, ProducerSettings, RecordMetadata, ShutdownCoordinator, TemplateShutdown,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::{net::SocketAddr, path::PathBuf};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

mod service;

use service::{GatewayService, MetricEntry};

#[derive(Parser, Debug)]
#[command(name = "producer-gateway")]
#[command(about = "HTTP gateway that publishes records through a Kafka template")]
struct Args {
    /// Port to listen on
    #[arg(short = 'p', long = "port", default_value = "8080")]
    port: u16,

    /// Producer properties file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Extra producer properties merged over the config file
    #[arg(long = "producer-config")]
    producer_config: Option<PathBuf>,

    /// Topic used by the default-topic endpoint
    #[arg(short = 't', long = "default-topic")]
    default_topic: Option<String>,

    /// Additional client property, repeatable (e.g. --set linger.ms=5)
    #[arg(long = "set")]
    overrides: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendRequest {
    pub key: Option<String>,
    pub partition: Option<i32>,
    pub value: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageRequest {
    pub payload: Value,
    #[serde(default)]
    pub headers: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

fn respond<T>(operation: &str, result: kafka_template::Result<T>) -> ApiResult<T> {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))),
        Err(e) => {
            error!("Error during {}: {}", operation, e);
            let status = match e {
                KafkaTemplateError::UnknownTopic(_) => StatusCode::NOT_FOUND,
                KafkaTemplateError::NoDefaultTopic
                | KafkaTemplateError::InvalidArgument(_)
                | KafkaTemplateError::Json(_)
                | KafkaTemplateError::Serialization(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            };
            (status, Json(ApiResponse::error(e.to_string())))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    info!("Starting producer gateway on port {}", args.port);

    let settings = load_settings(&args)?;
    info!("Bootstrap servers: {}", settings.bootstrap_servers);

    let service = GatewayService::new(&settings)?;

    let coordinator = ShutdownCoordinator::default();
    coordinator
        .register_component(Box::new(TemplateShutdown::new(
            "producer-gateway",
            service.template().clone(),
        )))
        .await;

    let app = Router::new()
        .route("/topics/:topic", post(send_to_topic))
        .route("/topics/:topic/partitions", get(partitions_for))
        .route("/default", post(send_default))
        .route("/messages", post(send_message))
        .route("/metrics", get(client_metrics))
        .route("/metrics/prometheus", get(prometheus_metrics))
        .route("/flush", post(flush))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Producer gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    run_with_graceful_shutdown(
        "producer-gateway",
        || async move { axum::serve(listener, app).await.map_err(KafkaTemplateError::Io) },
        coordinator,
    )
    .await?;

    Ok(())
}

fn load_settings(args: &Args) -> kafka_template::Result<ProducerSettings> {
    let mut settings = match &args.config {
        Some(path) => {
            info!("Loading producer config from: {:?}", path);
            parse_properties_file(path)?
        }
        None => ProducerSettings::default(),
    };

    if let Some(path) = &args.producer_config {
        info!("Merging producer config from: {:?}", path);
        settings = merge_producer_properties(settings, path)?;
    }

    let mut settings = settings.with_env_overrides()?;
    settings
        .additional_properties
        .extend(service::parse_overrides(&args.overrides)?);

    if let Some(topic) = &args.default_topic {
        settings.default_topic = Some(topic.clone());
    }

    Ok(settings)
}

async fn send_to_topic(
    State(service): State<GatewayService>,
    Path(topic): Path<String>,
    Json(request): Json<SendRequest>,
) -> ApiResult<RecordMetadata> {
    respond("send", service.send(&topic, request).await)
}

async fn send_default(
    State(service): State<GatewayService>,
    Json(request): Json<SendRequest>,
) -> ApiResult<RecordMetadata> {
    respond("default send", service.send_default(request).await)
}

async fn send_message(
    State(service): State<GatewayService>,
    Json(request): Json<MessageRequest>,
) -> ApiResult<RecordMetadata> {
    respond("message send", service.send_message(request).await)
}

async fn partitions_for(
    State(service): State<GatewayService>,
    Path(topic): Path<String>,
) -> ApiResult<Vec<PartitionInfo>> {
    respond("partition lookup", service.partitions(&topic).await)
}

async fn client_metrics(State(service): State<GatewayService>) -> ApiResult<Vec<MetricEntry>> {
    respond("metrics read", service.client_metrics())
}

async fn prometheus_metrics(State(service): State<GatewayService>) -> (StatusCode, String) {
    match service.prometheus() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to export metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to export metrics".to_string())
        }
    }
}

async fn flush(State(service): State<GatewayService>) -> ApiResult<String> {
    respond("flush", service.flush().await.map(|()| "flushed".to_string()))
}

async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("OK".to_string()))
}
