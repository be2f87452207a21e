//! Tests for structural Protobuf validation.

use prost_reflect::{DescriptorPool, DynamicMessage, Value};
use schemaguard::protobuf::{ProtobufSchemaParser, ProtobufValidator};
use schemaguard::{
    Artifact, ArtifactReference, ArtifactRegistry, DefaultSchemaResolver, Metadata, Record,
    ResolveError, ResolverConfig, SchemaResolver, ValidateError,
};

const ORDER_PROTO: &str = r#"syntax = "proto3";
package shop;
option java_package = "com.acme.shop";
option java_outer_classname = "OrderProtos";

message Order {
    int64 id = 1;
    string note = 2;
}

message Refund {
    int64 order_id = 1;
}
"#;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn pool(files: &[(&str, &str)]) -> DescriptorPool {
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_protos(
        files
            .iter()
            .map(|(name, text)| protox_parse::parse(name, text).unwrap()),
    )
    .unwrap();
    pool
}

fn message(pool: &DescriptorPool, name: &str, id: i64) -> DynamicMessage {
    let descriptor = pool.get_message_by_name(name).unwrap();
    let field = descriptor.fields().next().unwrap();
    let mut message = DynamicMessage::new(descriptor);
    message.set_field(&field, Value::I64(id));
    message
}

fn validator_for(schema: &str) -> ProtobufValidator<DynamicMessage> {
    let registry = ArtifactRegistry::new();
    registry
        .register(ArtifactReference::new("order"), Artifact::protobuf(schema))
        .unwrap();
    ProtobufValidator::from_config(
        ResolverConfig::new(),
        registry,
        Some(ArtifactReference::new("order")),
    )
}

#[test]
fn test_matching_message_succeeds() {
    init_logging();
    let pool = pool(&[("shop/order.proto", ORDER_PROTO)]);
    let validator = validator_for(ORDER_PROTO);

    let result = validator
        .validate_by_artifact_reference(&message(&pool, "shop.Order", 7))
        .unwrap();
    assert!(result.is_success());
    assert_eq!(validator.decoders().len(), 1);
    assert!(validator.decoders().get("com.acme.shop.OrderProtos$Order").is_some());
}

#[test]
fn test_message_missing_from_schema() {
    let pool = pool(&[(
        "shop/other.proto",
        r#"syntax = "proto3"; package shop; message Invoice { int64 id = 1; }"#,
    )]);
    let validator = validator_for(ORDER_PROTO);

    let result = validator
        .validate_by_artifact_reference(&message(&pool, "shop.Invoice", 1))
        .unwrap();
    let errors = result.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].context, "shop.Invoice");
}

#[test]
fn test_payload_read_as_first_declared_type() {
    let pool = pool(&[("shop/order.proto", ORDER_PROTO)]);
    let validator = validator_for(ORDER_PROTO);

    let result = validator
        .validate_by_artifact_reference(&message(&pool, "shop.Refund", 7))
        .unwrap();
    let errors = result.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].description.contains("shop.Order"));
    assert_eq!(errors[0].context, "shop.Refund");
}

#[test]
fn test_unknown_runtime_type_is_reported() {
    let schema = r#"syntax = "proto3"; package shop; message Order { int64 id = 1; }"#;
    let pool = pool(&[("shop/order.proto", schema)]);
    let validator = validator_for(schema);

    let result = validator
        .validate_by_artifact_reference(&message(&pool, "shop.Order", 7))
        .unwrap();
    assert_eq!(result.errors().len(), 1);
    assert!(result.errors()[0].description.contains("cannot determine concrete type"));
}

#[test]
fn test_undecodable_bytes_are_fatal() {
    let pool = pool(&[(
        "shop/order.proto",
        r#"syntax = "proto3";
        package shop;
        option java_multiple_files = true;
        message Order { string id = 1; }"#,
    )]);
    let validator = validator_for(
        r#"syntax = "proto3";
        package shop;
        option java_multiple_files = true;
        message Order { int64 id = 1; }"#,
    );

    let descriptor = pool.get_message_by_name("shop.Order").unwrap();
    let mut payload = DynamicMessage::new(descriptor);
    payload.set_field_by_name("id", Value::String("x".to_string()));

    assert!(matches!(
        validator.validate_by_artifact_reference(&payload),
        Err(ValidateError::Decode { .. })
    ));
}

#[test]
fn test_dependencies_resolved_through_registry() {
    let money = r#"syntax = "proto3"; package common; message Money { int64 units = 1; }"#;
    let order = r#"syntax = "proto3";
        package shop;
        import "common/money.proto";
        option java_multiple_files = true;
        option java_package = "com.acme.shop";
        message Order { int64 id = 1; common.Money total = 2; }"#;

    let registry = ArtifactRegistry::new();
    registry
        .register(ArtifactReference::new("money"), Artifact::protobuf(money))
        .unwrap();
    registry
        .register(
            ArtifactReference::new("order"),
            Artifact::protobuf(order)
                .with_reference("common/money.proto", ArtifactReference::new("money")),
        )
        .unwrap();

    let resolver = DefaultSchemaResolver::new(registry, ProtobufSchemaParser::<DynamicMessage>::new());
    let schema = resolver
        .resolve_schema_by_artifact_reference(&ArtifactReference::new("order"))
        .unwrap();
    assert!(!schema.schema().is_degraded());
    assert_eq!(schema.references().len(), 1);

    let validator = ProtobufValidator::new(resolver, Some(ArtifactReference::new("order")));
    let pool = pool(&[("common/money.proto", money), ("shop/order.proto", order)]);
    let result = validator
        .validate_by_artifact_reference(&message(&pool, "shop.Order", 3))
        .unwrap();
    assert!(result.is_success());
    assert!(validator.decoders().get("com.acme.shop.Order").is_some());
}

#[test]
fn test_unlinkable_schema_still_validates() {
    init_logging();
    let schema = r#"syntax = "proto3";
        package shop;
        import "missing/thing.proto";
        option java_multiple_files = true;
        message Order { int64 id = 1; other.Thing thing = 2; }"#;
    let pool = pool(&[(
        "shop/order.proto",
        r#"syntax = "proto3"; package shop; message Order { int64 id = 1; }"#,
    )]);
    let validator = validator_for(schema);

    let result = validator
        .validate_by_artifact_reference(&message(&pool, "shop.Order", 9))
        .unwrap();
    assert!(result.is_success());
}

#[test]
fn test_record_without_reference_uses_payload_schema() {
    let pool = pool(&[("shop/order.proto", ORDER_PROTO)]);
    let validator = validator_for(ORDER_PROTO);

    let record = Record::without_metadata(message(&pool, "shop.Order", 1));
    assert!(validator.validate(&record).unwrap().is_success());
}

#[test]
fn test_resolution_failures_are_fatal() {
    let pool = pool(&[("shop/order.proto", ORDER_PROTO)]);
    let validator = validator_for(ORDER_PROTO);

    let record = Record::new(
        message(&pool, "shop.Order", 1),
        Metadata::new(ArtifactReference::new("unknown")),
    );
    assert!(matches!(
        validator.validate(&record),
        Err(ValidateError::Resolve(ResolveError::NotFound(_)))
    ));

    let unconfigured = ProtobufValidator::<DynamicMessage>::from_config(
        ResolverConfig::new(),
        ArtifactRegistry::new(),
        None,
    );
    assert!(matches!(
        unconfigured.validate_by_artifact_reference(&message(&pool, "shop.Order", 1)),
        Err(ValidateError::MissingArtifactReference)
    ));
}

#[test]
fn test_batch_validation() {
    let pool = pool(&[("shop/order.proto", ORDER_PROTO)]);
    let validator = validator_for(ORDER_PROTO);
    let metadata = Metadata::new(ArtifactReference::new("order"));

    let records: Vec<Record<DynamicMessage>> = (0..8)
        .map(|i| {
            let name = if i % 2 == 0 { "shop.Order" } else { "shop.Refund" };
            Record::new(message(&pool, name, i), metadata.clone())
        })
        .collect();

    let results = validator.validate_batch(&records);
    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap().is_success(), i % 2 == 0);
    }
}
