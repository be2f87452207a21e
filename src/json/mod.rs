//! JSON Schema validation.
//!
//! - [`JsonSchemaParser`] compiles schema documents, wiring resolved
//!   references into the engine's `$ref` lookup.
//! - [`JsonValidator`] resolves schemas and validates [`JsonPayload`]s,
//!   reporting each violation with a JSON pointer context rooted at `#`.

mod parser;
mod payload;
mod references;
mod validator;

pub use parser::{JsonSchema, JsonSchemaParser};
pub use payload::{JsonPayload, PayloadError};
pub use references::{flatten_json_references, ReferenceRetriever, DEFAULT_BASE_URI};
pub use validator::{JsonRecord, JsonValidator};
