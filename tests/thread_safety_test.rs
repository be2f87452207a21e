//! Tests for concurrent use of registries and validators.

use prost_reflect::{DescriptorPool, ReflectMessage};
use schemaguard::json::JsonValidator;
use schemaguard::protobuf::DecoderRegistry;
use schemaguard::{Artifact, ArtifactReference, ArtifactRegistry, ResolverConfig};
use serde_json::json;
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_validation() {
    let registry = ArtifactRegistry::new();
    registry
        .register(
            ArtifactReference::new("user"),
            Artifact::json(
                r#"{
                    "type": "object",
                    "properties": {"name": {"type": "string"}, "age": {"type": "integer", "minimum": 1}},
                    "required": ["name", "age"]
                }"#,
            ),
        )
        .unwrap();
    let validator = Arc::new(JsonValidator::from_config(
        ResolverConfig::new(),
        registry,
        Some(ArtifactReference::new("user")),
    ));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let validator = Arc::clone(&validator);
            thread::spawn(move || {
                let result = validator
                    .validate_by_artifact_reference(json!({
                        "name": format!("User{}", i),
                        "age": 20 + i
                    }))
                    .unwrap();
                assert!(result.is_success());
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_concurrent_registration() {
    let registry = ArtifactRegistry::new();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                registry
                    .register(ArtifactReference::new("shared"), Artifact::json("{}"))
                    .unwrap()
            })
        })
        .collect();

    let mut versions: Vec<u32> = handles
        .into_iter()
        .map(|h| h.join().unwrap().version.unwrap().parse().unwrap())
        .collect();
    versions.sort_unstable();

    assert_eq!(versions, (1..=10).collect::<Vec<_>>());
    assert_eq!(registry.len(), 10);
}

#[test]
fn test_concurrent_dynamic_decoder_insertion() {
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(
        protox_parse::parse(
            "shop/order.proto",
            r#"syntax = "proto3"; package shop; message Order { int64 id = 1; }"#,
        )
        .unwrap(),
    )
    .unwrap();
    let descriptor = pool.get_message_by_name("shop.Order").unwrap();
    let decoders = Arc::new(DecoderRegistry::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let decoders = Arc::clone(&decoders);
            let descriptor = descriptor.clone();
            thread::spawn(move || {
                let decoder = decoders.get_or_insert_dynamic("shop.Order", &descriptor);
                let message = decoder.decode(&[0x08, 0x2a]).unwrap();
                assert_eq!(message.descriptor().full_name(), "shop.Order");
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(decoders.len(), 1);
}
