//! Schema-evolution compatibility checks.
//!
//! The compatibility validator treats validation as a question of schema
//! evolution: can data written with the schema the payload was generated from
//! be read with the registered schema, and vice versa? Every backwards
//! incompatible difference between the two files becomes a validation error.

use prost_reflect::ReflectMessage;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    descriptor_proto::ReservedRange, DescriptorProto, EnumDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MethodDescriptorProto,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::parser::{ProtobufSchema, ProtobufSchemaParser};
use crate::artifact::{ArtifactReference, Record};
use crate::config::ResolverConfig;
use crate::error::ValidationError;
use crate::registry::ArtifactRegistry;
use crate::resolver::{innermost_message, DefaultSchemaResolver, ResolveError, SchemaResolver};
use crate::validation::{ValidateError, ValidationResult};

/// Lists the incompatible differences between two versions of a file.
///
/// `existing` is the registered version and `proposed` the candidate. Each
/// error's context is the fully qualified element it concerns.
///
/// # Example
///
/// ```rust
/// use prost_types::{FileDescriptorProto, DescriptorProto};
/// use schemaguard::protobuf::check_compatibility;
///
/// let existing = FileDescriptorProto {
///     package: Some("shop".into()),
///     message_type: vec![DescriptorProto { name: Some("Order".into()), ..Default::default() }],
///     ..Default::default()
/// };
/// let proposed = FileDescriptorProto {
///     package: Some("shop".into()),
///     ..Default::default()
/// };
///
/// let errors = check_compatibility(&existing, &proposed);
/// assert_eq!(errors.len(), 1);
/// assert_eq!(errors[0].context, "shop.Order");
/// ```
pub fn check_compatibility(
    existing: &FileDescriptorProto,
    proposed: &FileDescriptorProto,
) -> Vec<ValidationError> {
    compare(existing, proposed, &HashMap::new())
}

/// Like [`check_compatibility`], for an existing file that was degraded to a
/// syntax-only build.
///
/// `original` is the file as parsed, before degrading. Fields whose external
/// type was rewritten are compared by the type name written in `original`,
/// so a proposed file that resolves that name is not reported as changed.
pub fn check_degraded_compatibility(
    original: &FileDescriptorProto,
    degraded: &FileDescriptorProto,
    proposed: &FileDescriptorProto,
) -> Vec<ValidationError> {
    compare(degraded, proposed, &rewritten_fields(original, degraded))
}

// Field context -> type name written in the original file.
type Rewritten = HashMap<String, String>;

fn compare(
    existing: &FileDescriptorProto,
    proposed: &FileDescriptorProto,
    rewritten: &Rewritten,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let package = existing.package();

    if syntax_of(existing) != syntax_of(proposed) {
        errors.push(ValidationError::new(
            format!(
                "syntax changed from {} to {}",
                syntax_of(existing),
                syntax_of(proposed)
            ),
            existing.name(),
        ));
    }
    if existing.package() != proposed.package() {
        errors.push(ValidationError::new(
            format!(
                "package changed from '{}' to '{}'",
                existing.package(),
                proposed.package()
            ),
            existing.name(),
        ));
    }

    let mut old_messages = BTreeMap::new();
    let mut new_messages = BTreeMap::new();
    let mut old_enums = BTreeMap::new();
    let mut new_enums = BTreeMap::new();
    index_file(existing, &mut old_messages, &mut old_enums);
    index_file(proposed, &mut new_messages, &mut new_enums);

    for (name, old) in &old_messages {
        match new_messages.get(name) {
            None => errors.push(ValidationError::new(
                format!("message {} was removed", name),
                name.as_str(),
            )),
            Some(new) => check_message(name, package, old, new, rewritten, &mut errors),
        }
    }

    for (name, old) in &old_enums {
        match new_enums.get(name) {
            None => errors.push(ValidationError::new(
                format!("enum {} was removed", name),
                name.as_str(),
            )),
            Some(new) => check_enum(name, old, new, &mut errors),
        }
    }

    for service in &existing.service {
        let name = qualify(package, service.name());
        let Some(candidate) = proposed.service.iter().find(|s| s.name() == service.name()) else {
            errors.push(ValidationError::new(
                format!("service {} was removed", name),
                name.as_str(),
            ));
            continue;
        };
        for method in &service.method {
            let context = format!("{}.{}", name, method.name());
            match candidate.method.iter().find(|m| m.name() == method.name()) {
                None => errors.push(ValidationError::new(
                    format!("rpc {} was removed", context),
                    context,
                )),
                Some(new) if signature(method, package) != signature(new, proposed.package()) => {
                    errors.push(ValidationError::new(
                        format!(
                            "rpc signature changed from {} to {}",
                            signature(method, package),
                            signature(new, proposed.package())
                        ),
                        context,
                    ))
                }
                Some(_) => {}
            }
        }
    }

    errors
}

fn syntax_of(file: &FileDescriptorProto) -> &str {
    if file.syntax().is_empty() {
        "proto2"
    } else {
        file.syntax()
    }
}

fn index_file<'a>(
    file: &'a FileDescriptorProto,
    messages: &mut BTreeMap<String, &'a DescriptorProto>,
    enums: &mut BTreeMap<String, &'a EnumDescriptorProto>,
) {
    for message in &file.message_type {
        index_message(file.package(), message, messages, enums);
    }
    for e in &file.enum_type {
        enums.insert(qualify(file.package(), e.name()), e);
    }
}

fn index_message<'a>(
    scope: &str,
    message: &'a DescriptorProto,
    messages: &mut BTreeMap<String, &'a DescriptorProto>,
    enums: &mut BTreeMap<String, &'a EnumDescriptorProto>,
) {
    if message.options.as_ref().map(|o| o.map_entry()).unwrap_or(false) {
        return;
    }
    let name = qualify(scope, message.name());
    for nested in &message.nested_type {
        index_message(&name, nested, messages, enums);
    }
    for e in &message.enum_type {
        enums.insert(qualify(&name, e.name()), e);
    }
    messages.insert(name, message);
}

fn check_message(
    name: &str,
    package: &str,
    old: &DescriptorProto,
    new: &DescriptorProto,
    rewritten: &Rewritten,
    errors: &mut Vec<ValidationError>,
) {
    let new_fields: HashMap<i32, &FieldDescriptorProto> =
        new.field.iter().map(|f| (f.number(), f)).collect();
    let old_fields: HashMap<i32, &FieldDescriptorProto> =
        old.field.iter().map(|f| (f.number(), f)).collect();

    for field in &old.field {
        let number = field.number();
        let context = format!("{}.{}", name, field.name());
        let Some(candidate) = new_fields.get(&number) else {
            if !in_ranges(number, &new.reserved_range) && !new.reserved_name.contains(&field.name().to_string()) {
                errors.push(ValidationError::new(
                    format!(
                        "field {} ({}) was removed without reserving its number",
                        number,
                        field.name()
                    ),
                    context,
                ));
            }
            continue;
        };

        let new_type = type_of(candidate, package);
        let (old_type, changed) = match rewritten.get(&context) {
            Some(written) => {
                let resolves = !candidate.type_name().is_empty()
                    && (new_type == *written || new_type.ends_with(&format!(".{}", written)));
                (written.clone(), !resolves)
            }
            None => {
                let old_type = type_of(field, package);
                let changed = old_type != new_type;
                (old_type, changed)
            }
        };
        if changed {
            errors.push(ValidationError::new(
                format!(
                    "field {} changed type from {} to {}",
                    number, old_type, new_type
                ),
                context.clone(),
            ));
        }
        if field.name() != candidate.name() {
            errors.push(ValidationError::new(
                format!(
                    "field {} was renamed from {} to {}",
                    number,
                    field.name(),
                    candidate.name()
                ),
                context.clone(),
            ));
        }
        let was_repeated = field.label() == Label::Repeated;
        let is_repeated = candidate.label() == Label::Repeated;
        if was_repeated != is_repeated {
            errors.push(ValidationError::new(
                format!(
                    "field {} changed cardinality from {} to {}",
                    number,
                    cardinality(was_repeated),
                    cardinality(is_repeated)
                ),
                context,
            ));
        }
    }

    for field in &new.field {
        let number = field.number();
        let context = format!("{}.{}", name, field.name());
        if in_ranges(number, &old.reserved_range) {
            errors.push(ValidationError::new(
                format!("reserved field number {} is reused by {}", number, field.name()),
                context,
            ));
        } else if field.label() == Label::Required && !old_fields.contains_key(&number) {
            errors.push(ValidationError::new(
                format!("required field {} ({}) was added", number, field.name()),
                context,
            ));
        }
    }

    for range in &old.reserved_range {
        if !range_covered(range, &new.reserved_range) {
            errors.push(ValidationError::new(
                format!(
                    "reserved range {} to {} was removed",
                    range.start(),
                    range.end() - 1
                ),
                name,
            ));
        }
    }
}

fn rewritten_fields(original: &FileDescriptorProto, degraded: &FileDescriptorProto) -> Rewritten {
    let mut original_messages = BTreeMap::new();
    let mut degraded_messages = BTreeMap::new();
    index_file(original, &mut original_messages, &mut BTreeMap::new());
    index_file(degraded, &mut degraded_messages, &mut BTreeMap::new());

    let mut rewritten = HashMap::new();
    for (name, message) in &original_messages {
        let Some(degraded_message) = degraded_messages.get(name) else {
            continue;
        };
        for field in message.field.iter().filter(|f| !f.type_name().is_empty()) {
            let lost_type = degraded_message
                .field
                .iter()
                .any(|d| d.number() == field.number() && d.type_name().is_empty());
            if lost_type {
                rewritten.insert(
                    format!("{}.{}", name, field.name()),
                    field.type_name().trim_start_matches('.').to_string(),
                );
            }
        }
    }
    rewritten
}

fn check_enum(
    name: &str,
    old: &EnumDescriptorProto,
    new: &EnumDescriptorProto,
    errors: &mut Vec<ValidationError>,
) {
    for value in &old.value {
        let kept = new.value.iter().any(|v| v.number() == value.number());
        // Enum reserved ranges are end-inclusive.
        let reserved = new
            .reserved_range
            .iter()
            .any(|r| r.start() <= value.number() && value.number() <= r.end());
        if !kept && !reserved {
            errors.push(ValidationError::new(
                format!(
                    "enum value {} ({}) was removed without reservation",
                    value.name(),
                    value.number()
                ),
                format!("{}.{}", name, value.name()),
            ));
        }
    }
}

// Message ranges are end-exclusive.
fn in_ranges(number: i32, ranges: &[ReservedRange]) -> bool {
    ranges.iter().any(|r| r.start() <= number && number < r.end())
}

fn range_covered(range: &ReservedRange, candidates: &[ReservedRange]) -> bool {
    let mut sorted: Vec<(i32, i32)> = candidates.iter().map(|r| (r.start(), r.end())).collect();
    sorted.sort_unstable();

    let mut next = range.start();
    for (start, end) in sorted {
        if start > next {
            break;
        }
        next = next.max(end);
        if next >= range.end() {
            return true;
        }
    }
    next >= range.end()
}

fn type_of(field: &FieldDescriptorProto, package: &str) -> String {
    match field.r#type() {
        Type::Message | Type::Enum | Type::Group => normalize(field.type_name(), package),
        _ if !field.type_name().is_empty() => normalize(field.type_name(), package),
        scalar => scalar.as_str_name().trim_start_matches("TYPE_").to_lowercase(),
    }
}

fn normalize(type_name: &str, package: &str) -> String {
    match type_name.strip_prefix('.') {
        Some(absolute) => absolute.to_string(),
        None => qualify(package, type_name),
    }
}

fn signature(method: &MethodDescriptorProto, package: &str) -> String {
    format!(
        "({}{}) returns ({}{})",
        if method.client_streaming() { "stream " } else { "" },
        normalize(method.input_type(), package),
        if method.server_streaming() { "stream " } else { "" },
        normalize(method.output_type(), package)
    )
}

fn cardinality(repeated: bool) -> &'static str {
    if repeated {
        "repeated"
    } else {
        "singular"
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

/// Validates Protobuf messages by checking schema compatibility.
///
/// The payload's own file descriptor is compared with the registered schema;
/// each incompatible difference is reported. Resolution failures do not abort
/// validation: they become a single error carrying the most specific message
/// found in the error chain.
pub struct ProtobufCompatibilityValidator<M> {
    resolver: Arc<dyn SchemaResolver<ProtobufSchema, M>>,
    artifact_reference: Option<ArtifactReference>,
}

impl<M> ProtobufCompatibilityValidator<M>
where
    M: ReflectMessage + 'static,
{
    /// Creates a validator over an existing resolver.
    pub fn new<R>(resolver: R, artifact_reference: Option<ArtifactReference>) -> Self
    where
        R: SchemaResolver<ProtobufSchema, M> + 'static,
    {
        Self {
            resolver: Arc::new(resolver),
            artifact_reference,
        }
    }

    /// Creates a validator backed by a [`DefaultSchemaResolver`].
    pub fn from_config(
        config: ResolverConfig,
        registry: ArtifactRegistry,
        artifact_reference: Option<ArtifactReference>,
    ) -> Self {
        let artifact_reference = artifact_reference.or_else(|| config.artifact_reference());
        let resolver =
            DefaultSchemaResolver::with_config(registry, ProtobufSchemaParser::<M>::new(), config);
        Self::new(resolver, artifact_reference)
    }

    /// Checks a message against the statically configured artifact.
    ///
    /// # Errors
    ///
    /// Only fails when no static reference is configured.
    pub fn validate_by_artifact_reference(&self, payload: &M) -> Result<ValidationResult, ValidateError> {
        let reference = self
            .artifact_reference
            .as_ref()
            .ok_or(ValidateError::MissingArtifactReference)?;

        match self.resolver.resolve_schema_by_artifact_reference(reference) {
            Ok(schema) => Ok(Self::validate_parsed(schema.schema(), payload)),
            Err(e) => Ok(resolution_failure(&e, &reference.to_string())),
        }
    }

    /// Checks a record against the artifact its metadata names.
    pub fn validate(&self, record: &Record<M>) -> ValidationResult {
        match self.resolver.resolve_schema(record) {
            Ok(schema) => Self::validate_parsed(schema.schema(), record.payload()),
            Err(e) => {
                let context = record
                    .artifact_reference()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                resolution_failure(&e, &context)
            }
        }
    }

    /// Checks records in parallel, returning outcomes in input order.
    pub fn validate_batch(&self, records: &[Record<M>]) -> Vec<ValidationResult> {
        records.par_iter().map(|record| self.validate(record)).collect()
    }

    /// Compares the payload's schema with an already resolved schema.
    pub fn validate_parsed(schema: &ProtobufSchema, payload: &M) -> ValidationResult {
        let descriptor = payload.descriptor();
        let proposed_file = descriptor.parent_file();
        let existing = schema.file_descriptor().file_descriptor_proto();
        let proposed = proposed_file.file_descriptor_proto();

        let errors = if schema.is_degraded() {
            check_degraded_compatibility(schema.proto_file(), existing, proposed)
        } else {
            check_compatibility(existing, proposed)
        };
        ValidationResult::from_errors(errors)
    }
}

fn resolution_failure(error: &ResolveError, context: &str) -> ValidationResult {
    log::debug!("schema resolution failed during compatibility check: {}", error);
    ValidationResult::single(ValidationError::new(innermost_message(error), context))
}
