//! Decoder registry keyed by runtime type name.
//!
//! Typed decoders for generated message types are registered explicitly at
//! startup. Types without a registered decoder get a dynamic decoder built
//! from their descriptor the first time they are needed.

use parking_lot::RwLock;
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor, ReflectMessage};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use super::naming::runtime_type_name;

/// Decodes wire bytes into a reflective message.
pub trait MessageDecoder: Send + Sync {
    /// Decodes `bytes`, yielding a message that knows its own descriptor.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicMessage, prost::DecodeError>;
}

/// Decodes through a generated message type.
pub struct TypedDecoder<M>(PhantomData<fn() -> M>);

impl<M> TypedDecoder<M> {
    /// Creates a decoder for `M`.
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<M> Default for TypedDecoder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> MessageDecoder for TypedDecoder<M>
where
    M: Message + ReflectMessage + Default,
{
    fn decode(&self, bytes: &[u8]) -> Result<DynamicMessage, prost::DecodeError> {
        Ok(M::decode(bytes)?.transcode_to_dynamic())
    }
}

/// Decodes against a descriptor known only at runtime.
#[derive(Debug, Clone)]
pub struct DynamicDecoder(MessageDescriptor);

impl DynamicDecoder {
    /// Creates a decoder for the given message type.
    pub fn new(descriptor: MessageDescriptor) -> Self {
        Self(descriptor)
    }
}

impl MessageDecoder for DynamicDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicMessage, prost::DecodeError> {
        DynamicMessage::decode(self.0.clone(), bytes)
    }
}

/// A thread-safe map from runtime type name to decoder.
///
/// # Example
///
/// ```rust
/// use schemaguard::protobuf::DecoderRegistry;
///
/// let registry = DecoderRegistry::new();
/// assert!(registry.get("com.acme.Outer$Order").is_none());
/// assert!(registry.is_empty());
/// ```
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: RwLock<HashMap<String, Arc<dyn MessageDecoder>>>,
}

impl DecoderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed decoder for `M` under its runtime type name.
    ///
    /// Returns the name used, or `None` if it cannot be derived.
    pub fn register<M>(&self) -> Option<String>
    where
        M: Message + ReflectMessage + Default + 'static,
    {
        let name = runtime_type_name(&M::default().descriptor())?;
        self.register_decoder(name.clone(), Arc::new(TypedDecoder::<M>::new()));
        Some(name)
    }

    /// Registers a decoder under an explicit name, replacing any previous one.
    pub fn register_decoder(&self, name: impl Into<String>, decoder: Arc<dyn MessageDecoder>) {
        let name = name.into();
        log::debug!("registering decoder for {}", name);
        self.decoders.write().insert(name, decoder);
    }

    /// Returns the decoder registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn MessageDecoder>> {
        self.decoders.read().get(name).cloned()
    }

    /// Returns the decoder for `name`, registering a dynamic one for
    /// `descriptor` if none exists yet.
    pub fn get_or_insert_dynamic(
        &self,
        name: &str,
        descriptor: &MessageDescriptor,
    ) -> Arc<dyn MessageDecoder> {
        if let Some(decoder) = self.get(name) {
            return decoder;
        }

        let mut decoders = self.decoders.write();
        Arc::clone(decoders.entry(name.to_string()).or_insert_with(|| {
            log::trace!("caching dynamic decoder for {}", name);
            Arc::new(DynamicDecoder::new(descriptor.clone()))
        }))
    }

    /// Returns the number of registered decoders.
    pub fn len(&self) -> usize {
        self.decoders.read().len()
    }

    /// Returns true if no decoder is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_reflect::{DescriptorPool, Value};

    fn descriptor() -> MessageDescriptor {
        let file = protox_parse::parse(
            "decoder.proto",
            r#"syntax = "proto3";
            package acme;
            option java_multiple_files = true;
            message Ping { string id = 1; }"#,
        )
        .unwrap();
        let mut pool = DescriptorPool::new();
        pool.add_file_descriptor_proto(file).unwrap();
        pool.get_message_by_name("acme.Ping").unwrap()
    }

    #[test]
    fn test_dynamic_decoder_round_trips_fields() {
        let descriptor = descriptor();
        let mut message = DynamicMessage::new(descriptor.clone());
        message.set_field_by_name("id", Value::String("p-1".into()));

        let decoded = DynamicDecoder::new(descriptor)
            .decode(&message.encode_to_vec())
            .unwrap();
        assert_eq!(
            decoded.get_field_by_name("id").unwrap().as_str(),
            Some("p-1")
        );
    }

    #[test]
    fn test_get_or_insert_dynamic_caches() {
        let registry = DecoderRegistry::new();
        let descriptor = descriptor();

        let first = registry.get_or_insert_dynamic("acme.Ping", &descriptor);
        let second = registry.get_or_insert_dynamic("acme.Ping", &descriptor);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_typed_well_known_type() {
        let registry = DecoderRegistry::new();
        // prost-types files carry java_multiple_files = true.
        let name = registry.register::<prost_types::Timestamp>();
        assert_eq!(name.as_deref(), Some("com.google.protobuf.Timestamp"));
        assert!(registry.get("com.google.protobuf.Timestamp").is_some());
    }

    #[test]
    fn test_malformed_bytes_fail() {
        let decoder = DynamicDecoder::new(descriptor());
        assert!(decoder.decode(&[0x0a, 0xff]).is_err());
    }
}
