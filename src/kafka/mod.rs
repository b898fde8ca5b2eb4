pub mod producer;
pub mod rdkafka_producer;
pub mod mock_producer;

pub use producer::*;
pub use rdkafka_producer::*;
pub use mock_producer::*;
