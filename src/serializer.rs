use crate::{KafkaTemplateError, Result};
use apache_avro::{to_avro_datum, to_value, Schema};
use serde::Serialize;
use std::marker::PhantomData;
use std::path::Path;

/// Turns keys or values into the bytes handed to the broker.
pub trait Serializer<T: ?Sized>: Send + Sync {
    fn serialize(&self, topic: &str, data: &T) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StringSerializer;

impl Serializer<String> for StringSerializer {
    fn serialize(&self, _topic: &str, data: &String) -> Result<Vec<u8>> {
        Ok(data.as_bytes().to_vec())
    }
}

impl Serializer<str> for StringSerializer {
    fn serialize(&self, _topic: &str, data: &str) -> Result<Vec<u8>> {
        Ok(data.as_bytes().to_vec())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BytesSerializer;

impl Serializer<Vec<u8>> for BytesSerializer {
    fn serialize(&self, _topic: &str, data: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(data.clone())
    }
}

/// JSON encoding through serde.
#[derive(Debug)]
pub struct JsonSerializer<T> {
    _marker: PhantomData<fn(&T)>,
}

impl<T> JsonSerializer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonSerializer<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: Serialize> Serializer<T> for JsonSerializer<T> {
    fn serialize(&self, topic: &str, data: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(data).map_err(|e| {
            KafkaTemplateError::Serialization(format!("JSON encoding for topic {}: {}", topic, e))
        })
    }
}

/// Avro datum encoding against a fixed schema.
///
/// With a schema id set, output is framed as `0x00 | id (big endian u32) | datum`,
/// the layout schema-registry aware consumers expect.
#[derive(Debug, Clone)]
pub struct AvroSerializer<T> {
    schema: Schema,
    schema_id: Option<u32>,
    _marker: PhantomData<fn(&T)>,
}

impl<T> AvroSerializer<T> {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            schema_id: None,
            _marker: PhantomData,
        }
    }

    pub fn from_schema_str(schema: &str) -> Result<Self> {
        Ok(Self::new(Schema::parse_str(schema)?))
    }

    pub fn from_schema_file<P: AsRef<Path>>(schema_path: P) -> Result<Self> {
        let schema_content = std::fs::read_to_string(schema_path)?;
        Self::from_schema_str(&schema_content)
    }

    pub fn with_schema_id(mut self, schema_id: u32) -> Self {
        self.schema_id = Some(schema_id);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl<T: Serialize> Serializer<T> for AvroSerializer<T> {
    fn serialize(&self, topic: &str, data: &T) -> Result<Vec<u8>> {
        let value = to_value(data)?.resolve(&self.schema).map_err(|e| {
            KafkaTemplateError::Serialization(format!("Avro value for topic {} does not match schema: {}", topic, e))
        })?;
        let datum = to_avro_datum(&self.schema, value)?;

        match self.schema_id {
            Some(id) => {
                let mut framed = Vec::with_capacity(datum.len() + 5);
                framed.push(0u8);
                framed.extend_from_slice(&id.to_be_bytes());
                framed.extend_from_slice(&datum);
                Ok(framed)
            }
            None => Ok(datum),
        }
    }
}
