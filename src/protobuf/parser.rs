//! Protobuf schema parsing.

use indexmap::IndexMap;
use prost_reflect::{FileDescriptor, MessageDescriptor, ReflectMessage};
use prost_types::FileDescriptorProto;
use std::marker::PhantomData;
use std::sync::Arc;

use super::descriptor::{self, LinkOutcome, ROOT_FILE_NAME};
use super::printer::print_file;
use crate::artifact::{ArtifactType, Record};
use crate::parser::{SchemaParseError, SchemaParser};
use crate::schema::{flatten_references, ParsedSchema};

/// A resolved Protobuf schema.
///
/// Holds the descriptor used for validation, the abstract file it was built
/// from and whether it was fully linked or degraded to a syntax-only build.
#[derive(Debug, Clone)]
pub struct ProtobufSchema {
    file: FileDescriptor,
    proto: FileDescriptorProto,
    outcome: LinkOutcome,
}

impl ProtobufSchema {
    /// Wraps a linked descriptor.
    pub fn from_file_descriptor(file: FileDescriptor) -> Self {
        let proto = file.file_descriptor_proto().clone();
        Self {
            file,
            proto,
            outcome: LinkOutcome::Linked,
        }
    }

    /// Returns the file descriptor.
    pub fn file_descriptor(&self) -> &FileDescriptor {
        &self.file
    }

    /// Returns the abstract file representation the descriptor was built from.
    pub fn proto_file(&self) -> &FileDescriptorProto {
        &self.proto
    }

    /// Returns how the descriptor was obtained.
    pub fn link_outcome(&self) -> LinkOutcome {
        self.outcome
    }

    /// Returns true if dependencies could not be linked.
    pub fn is_degraded(&self) -> bool {
        self.outcome == LinkOutcome::SyntaxOnly
    }

    /// Returns the first message type declared at the top of the file.
    pub fn first_message(&self) -> Option<MessageDescriptor> {
        self.file.messages().next()
    }

    /// Returns true if the file declares a message with this full name.
    pub fn declares_message(&self, full_name: &str) -> bool {
        descriptor::messages_in_file(&self.file)
            .iter()
            .any(|m| m.full_name() == full_name)
    }
}

/// Parses textual `.proto` schemas.
///
/// `M` is the payload message type of records handled by this parser; it is
/// only used to derive schemas from payloads.
pub struct ProtobufSchemaParser<M> {
    _payload: PhantomData<fn() -> M>,
}

impl<M> ProtobufSchemaParser<M> {
    /// Creates a parser.
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }
}

impl<M> Default for ProtobufSchemaParser<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for ProtobufSchemaParser<M> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<M> std::fmt::Debug for ProtobufSchemaParser<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProtobufSchemaParser")
    }
}

impl<M: ReflectMessage> SchemaParser for ProtobufSchemaParser<M> {
    type Schema = ProtobufSchema;
    type Payload = M;

    fn artifact_type(&self) -> ArtifactType {
        ArtifactType::Protobuf
    }

    fn parse_schema(
        &self,
        raw_schema: &[u8],
        resolved_references: &IndexMap<String, Arc<ParsedSchema<ProtobufSchema>>>,
    ) -> Result<ProtobufSchema, SchemaParseError> {
        let text = std::str::from_utf8(raw_schema)?;
        let proto = descriptor::parse_proto(ROOT_FILE_NAME, text)?;

        // Each dependency is known to importers by its reference name.
        let dependencies: Vec<FileDescriptorProto> = flatten_references(
            resolved_references,
            &|name, _: &ParsedSchema<ProtobufSchema>| name.to_string(),
            &|schema| schema.schema().proto_file().clone(),
        )
        .into_iter()
        .map(|(name, mut file)| {
            file.name = Some(name);
            file
        })
        .collect();

        let (file, outcome) = descriptor::build_file_descriptor(&proto, &dependencies)?;
        log::debug!(
            "built descriptor for {} with {} dependencies ({:?})",
            file.package_name(),
            dependencies.len(),
            outcome
        );

        Ok(ProtobufSchema {
            file,
            proto,
            outcome,
        })
    }

    fn schema_from_data(
        &self,
        record: &Record<M>,
    ) -> Result<ParsedSchema<ProtobufSchema>, SchemaParseError> {
        Ok(schema_from_file(record.payload().descriptor().parent_file()))
    }

    fn supports_extract_schema_from_data(&self) -> bool {
        true
    }
}

/// Derives a parsed schema from an in-memory file descriptor.
///
/// Every file is printed back to `.proto` text and its imports become child
/// schemas named by their file names.
pub fn schema_from_file(file: FileDescriptor) -> ParsedSchema<ProtobufSchema> {
    let text = print_file(file.file_descriptor_proto());
    let references: Vec<Arc<ParsedSchema<ProtobufSchema>>> = file
        .dependencies()
        .map(|dependency| Arc::new(schema_from_file(dependency)))
        .collect();
    let name = file.name().to_string();

    ParsedSchema::new(ProtobufSchema::from_file_descriptor(file), text.into_bytes())
        .with_reference_name(name)
        .with_references(references)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_reflect::{DescriptorPool, DynamicMessage};

    type Parser = ProtobufSchemaParser<DynamicMessage>;

    fn parsed(name: &str, text: &str, references: Vec<Arc<ParsedSchema<ProtobufSchema>>>) -> Arc<ParsedSchema<ProtobufSchema>> {
        let map: IndexMap<String, _> = references
            .into_iter()
            .map(|r| (r.reference_name().unwrap_or_default().to_string(), r))
            .collect();
        let schema = Parser::new().parse_schema(text.as_bytes(), &map).unwrap();
        Arc::new(
            ParsedSchema::new(schema, text.as_bytes().to_vec())
                .with_reference_name(name)
                .with_references(map.into_values().collect()),
        )
    }

    #[test]
    fn test_nested_references_are_flattened() {
        let money = parsed(
            "common/money.proto",
            r#"syntax = "proto3"; package common; message Money { int64 units = 1; }"#,
            vec![],
        );
        let price = parsed(
            "catalog/price.proto",
            r#"syntax = "proto3";
            package catalog;
            import "common/money.proto";
            message Price { common.Money amount = 1; }"#,
            vec![money],
        );
        let order = parsed(
            "order.proto",
            r#"syntax = "proto3";
            package shop;
            import "catalog/price.proto";
            import "common/money.proto";
            message Order { catalog.Price price = 1; common.Money tip = 2; }"#,
            vec![price],
        );

        assert_eq!(order.schema().link_outcome(), LinkOutcome::Linked);
        assert!(order.schema().declares_message("shop.Order"));
    }

    #[test]
    fn test_unlinkable_schema_degrades() {
        let schema = Parser::new()
            .parse_schema(
                br#"syntax = "proto3"; import "missing.proto"; message A { Missing m = 1; }"#,
                &IndexMap::new(),
            )
            .unwrap();
        assert!(schema.is_degraded());
        assert_eq!(schema.first_message().unwrap().name(), "A");
    }

    #[test]
    fn test_syntax_error_is_fatal() {
        let result = Parser::new().parse_schema(b"message {", &IndexMap::new());
        assert!(matches!(result, Err(SchemaParseError::ProtoSyntax { .. })));
    }

    #[test]
    fn test_schema_from_data_walks_dependencies() {
        let mut pool = DescriptorPool::new();
        pool.add_file_descriptor_protos(vec![
            protox_parse::parse(
                "common/money.proto",
                r#"syntax = "proto3"; package common; message Money { int64 units = 1; }"#,
            )
            .unwrap(),
            protox_parse::parse(
                "shop/order.proto",
                r#"syntax = "proto3";
                package shop;
                import "common/money.proto";
                message Order { common.Money total = 1; }"#,
            )
            .unwrap(),
        ])
        .unwrap();

        let payload = DynamicMessage::new(pool.get_message_by_name("shop.Order").unwrap());
        let parser = Parser::new();
        assert!(parser.supports_extract_schema_from_data());

        let parsed = parser
            .schema_from_data(&Record::without_metadata(payload))
            .unwrap();
        assert_eq!(parsed.reference_name(), Some("shop/order.proto"));
        assert_eq!(parsed.references().len(), 1);
        assert_eq!(parsed.references()[0].reference_name(), Some("common/money.proto"));
        assert!(parsed.raw_text().contains("import \"common/money.proto\";"));
        assert!(parsed.raw_text().contains("message Order {"));
    }
}
