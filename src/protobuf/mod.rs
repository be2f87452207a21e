//! Protobuf schema validation.
//!
//! Two validators share one parser and resolver:
//!
//! - [`ProtobufValidator`] checks that a message's bytes decode as the message
//!   type the registered schema declares.
//! - [`ProtobufCompatibilityValidator`] compares the file the message was
//!   generated from with the registered file and reports every change that
//!   breaks schema evolution.
//!
//! Schemas are parsed from `.proto` text with their references linked into a
//! single descriptor pool. When linking fails the schema is still usable in a
//! degraded, syntax-only form (see [`LinkOutcome`]).

mod compatibility;
mod decoder;
mod descriptor;
mod envelope;
mod naming;
mod parser;
mod printer;
mod validator;

pub use compatibility::{
    check_compatibility, check_degraded_compatibility, ProtobufCompatibilityValidator,
};
pub use decoder::{DecoderRegistry, DynamicDecoder, MessageDecoder, TypedDecoder};
pub use descriptor::{
    build_file_descriptor, degrade, messages_in_file, parse_proto, LinkError, LinkOutcome,
    ROOT_FILE_NAME,
};
pub use envelope::{find_message, select_message, EnvelopeOutcome, MessageSelection, TypeRef};
pub use naming::runtime_type_name;
pub use parser::{schema_from_file, ProtobufSchema, ProtobufSchemaParser};
pub use printer::print_file;
pub use validator::ProtobufValidator;
