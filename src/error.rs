use thiserror::Error;

#[derive(Error, Debug)]
pub enum KafkaTemplateError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("No default topic configured")]
    NoDefaultTopic,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Avro error: {0}")]
    Avro(#[from] apache_avro::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Shutdown did not finish within {0:?}")]
    ShutdownTimeout(std::time::Duration),

    #[error("Delivery canceled before the producer reported an outcome")]
    DeliveryCanceled,

    #[error("Producer error: {0}")]
    Producer(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, KafkaTemplateError>;
