pub mod error;
pub mod future;
pub mod kafka;
pub mod listener;
pub mod message;
pub mod metrics;
pub mod operations;
pub mod properties;
pub mod record;
pub mod serializer;
pub mod settings;
pub mod shutdown;
pub mod template;

pub use error::*;
pub use future::*;
pub use kafka::*;
pub use listener::*;
pub use message::*;
pub use metrics::*;
pub use operations::*;
pub use properties::*;
pub use record::*;
pub use serializer::*;
pub use settings::*;
pub use shutdown::*;
pub use template::*;
