//! Tests for Protobuf schema-evolution validation.

use prost_reflect::{DescriptorPool, DynamicMessage};
use schemaguard::protobuf::{ProtobufCompatibilityValidator, ProtobufSchema};
use schemaguard::{
    Artifact, ArtifactReference, ArtifactRegistry, Metadata, ParsedSchema, ProblemDetails, Record,
    ResolveError, ResolverConfig, SchemaResolver, ValidateError,
};
use std::sync::Arc;

const V1: &str = r#"syntax = "proto3";
package shop;

message Order {
    reserved 4;
    int64 id = 1;
    string note = 2;
    repeated string tags = 3;
}

service Orders {
    rpc Get(Order) returns (Order);
}
"#;

fn payload(text: &str) -> DynamicMessage {
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(protox_parse::parse("shop/order.proto", text).unwrap())
        .unwrap();
    DynamicMessage::new(pool.get_message_by_name("shop.Order").unwrap())
}

fn validator() -> ProtobufCompatibilityValidator<DynamicMessage> {
    let registry = ArtifactRegistry::new();
    registry
        .register(ArtifactReference::new("order"), Artifact::protobuf(V1))
        .unwrap();
    ProtobufCompatibilityValidator::from_config(
        ResolverConfig::new(),
        registry,
        Some(ArtifactReference::new("order")),
    )
}

#[test]
fn test_unchanged_schema_is_compatible() {
    let result = validator()
        .validate_by_artifact_reference(&payload(V1))
        .unwrap();
    assert!(result.is_success());
}

#[test]
fn test_additive_change_is_compatible() {
    let v2 = V1.replace(
        "repeated string tags = 3;",
        "repeated string tags = 3;\n    int32 priority = 5;",
    );
    let result = validator()
        .validate_by_artifact_reference(&payload(&v2))
        .unwrap();
    assert!(result.is_success());
}

#[test]
fn test_breaking_changes_are_all_reported() {
    let v2 = r#"syntax = "proto3";
package shop;

message Order {
    int64 id = 1;
    repeated string tags = 3;
    string reused = 4;
}

service Orders {
    rpc Get(Order) returns (stream Order);
}
"#;
    let result = validator()
        .validate_by_artifact_reference(&payload(v2))
        .unwrap();

    let mut contexts: Vec<&str> = result.errors().iter().map(|e| e.context.as_str()).collect();
    contexts.sort_unstable();
    assert_eq!(
        contexts,
        vec![
            "shop.Order",
            "shop.Order.note",
            "shop.Order.reused",
            "shop.Orders.Get"
        ]
    );
}

const MONEY: &str = r#"syntax = "proto3"; package common; message Money { int64 units = 1; }"#;

const PRICED: &str = r#"syntax = "proto3";
package shop;
import "common/money.proto";

message Order {
    int64 id = 1;
    common.Money total = 2;
}
"#;

fn priced_payload(money: (&str, &str), order: &str) -> DynamicMessage {
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(protox_parse::parse(money.0, money.1).unwrap())
        .unwrap();
    pool.add_file_descriptor_proto(protox_parse::parse("shop/order.proto", order).unwrap())
        .unwrap();
    DynamicMessage::new(pool.get_message_by_name("shop.Order").unwrap())
}

// The import has no registered reference, so the schema is degraded.
fn degraded_validator() -> ProtobufCompatibilityValidator<DynamicMessage> {
    let registry = ArtifactRegistry::new();
    registry
        .register(ArtifactReference::new("priced"), Artifact::protobuf(PRICED))
        .unwrap();
    ProtobufCompatibilityValidator::from_config(
        ResolverConfig::new(),
        registry,
        Some(ArtifactReference::new("priced")),
    )
}

#[test]
fn test_degraded_schema_accepts_same_external_type() {
    let result = degraded_validator()
        .validate_by_artifact_reference(&priced_payload(("common/money.proto", MONEY), PRICED))
        .unwrap();
    assert!(result.is_success(), "{:?}", result.errors());
}

#[test]
fn test_degraded_schema_reports_changed_external_type() {
    let other = r#"syntax = "proto3"; package other; message Money { int64 cents = 1; }"#;
    let order = PRICED
        .replace("common/money.proto", "other/money.proto")
        .replace("common.Money", "other.Money");

    let result = degraded_validator()
        .validate_by_artifact_reference(&priced_payload(("other/money.proto", other), &order))
        .unwrap();
    let errors = result.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].description,
        "field 2 changed type from common.Money to other.Money"
    );
    assert_eq!(errors[0].context, "shop.Order.total");
}

#[test]
fn test_resolution_failure_becomes_validation_error() {
    let validator = ProtobufCompatibilityValidator::<DynamicMessage>::from_config(
        ResolverConfig::new(),
        ArtifactRegistry::new(),
        Some(ArtifactReference::new("missing")),
    );

    let result = validator
        .validate_by_artifact_reference(&payload(V1))
        .unwrap();
    let errors = result.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].description, "artifact default:missing not found");
    assert_eq!(errors[0].context, "default:missing");
}

struct FailingResolver;

impl SchemaResolver<ProtobufSchema, DynamicMessage> for FailingResolver {
    fn resolve_schema_by_artifact_reference(
        &self,
        _reference: &ArtifactReference,
    ) -> Result<Arc<ParsedSchema<ProtobufSchema>>, ResolveError> {
        Err(ResolveError::Registry(Box::new(ProblemDetails::new(
            "Not Found",
            "No artifact with ID 'order' in group 'default' was found.",
            404,
        ))))
    }

    fn resolve_schema(
        &self,
        record: &Record<DynamicMessage>,
    ) -> Result<Arc<ParsedSchema<ProtobufSchema>>, ResolveError> {
        let reference = record
            .artifact_reference()
            .cloned()
            .unwrap_or_else(|| ArtifactReference::new("order"));
        self.resolve_schema_by_artifact_reference(&reference)
    }
}

#[test]
fn test_problem_details_message_is_surfaced() {
    let validator = ProtobufCompatibilityValidator::new(FailingResolver, None);
    let record = Record::new(payload(V1), Metadata::new(ArtifactReference::new("order")));

    let result = validator.validate(&record);
    assert_eq!(result.errors().len(), 1);
    assert_eq!(
        result.errors()[0].description,
        "No artifact with ID 'order' in group 'default' was found."
    );
}

#[test]
fn test_missing_static_reference_is_fatal() {
    let validator = ProtobufCompatibilityValidator::new(FailingResolver, None);
    assert!(matches!(
        validator.validate_by_artifact_reference(&payload(V1)),
        Err(ValidateError::MissingArtifactReference)
    ));
}

#[test]
fn test_batch_compatibility() {
    let validator = validator();
    let metadata = Metadata::new(ArtifactReference::new("order"));
    let records = vec![
        Record::new(payload(V1), metadata.clone()),
        Record::new(payload(&V1.replace("string note = 2;", "")), metadata),
    ];

    let results = validator.validate_batch(&records);
    assert!(results[0].is_success());
    assert_eq!(results[1].errors().len(), 1);
}
