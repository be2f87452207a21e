//! File descriptor assembly.
//!
//! A textual `.proto` schema is parsed into a `FileDescriptorProto` and
//! linked together with its dependencies into a [`FileDescriptor`]. Linking
//! is attempted in two steps:
//!
//! 1. **Full link**: the root and every dependency go into one pool.
//! 2. **Syntax only**: if linking fails, or the root declares no message,
//!    the root is built on its own. Imports are dropped and anything that
//!    points outside the file is degraded or removed.

use prost_reflect::{DescriptorError, DescriptorPool, FileDescriptor, MessageDescriptor};
use prost_types::field_descriptor_proto::Type;
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use std::collections::HashMap;

use crate::parser::SchemaParseError;

/// File name given to a root schema parsed from raw text.
pub const ROOT_FILE_NAME: &str = "schema.proto";

/// How a descriptor was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Linked with every dependency.
    Linked,
    /// Built from the root file alone, with external types degraded.
    SyntaxOnly,
}

/// Errors that make the full link attempt fail.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The pool rejected the file set.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// The root file is absent from the pool after linking.
    #[error("file {0} missing after linking")]
    MissingFile(String),
}

/// Parses `.proto` text into its abstract file representation.
pub fn parse_proto(name: &str, text: &str) -> Result<FileDescriptorProto, SchemaParseError> {
    protox_parse::parse(name, text).map_err(|e| SchemaParseError::ProtoSyntax {
        file: name.to_string(),
        source: Box::new(e),
    })
}

/// Builds a descriptor for `root`, linking it with `dependencies`.
///
/// Falls back to a syntax-only build when linking fails or the root declares
/// no message. Only a failure of the syntax-only build is returned.
pub fn build_file_descriptor(
    root: &FileDescriptorProto,
    dependencies: &[FileDescriptorProto],
) -> Result<(FileDescriptor, LinkOutcome), SchemaParseError> {
    if root.message_type.is_empty() {
        log::debug!("{} declares no message, building from syntax only", root.name());
        return Ok((build_syntax_only(root, dependencies)?, LinkOutcome::SyntaxOnly));
    }

    match link(root, dependencies) {
        Ok(file) => Ok((file, LinkOutcome::Linked)),
        Err(e) => {
            log::warn!(
                "linking {} failed ({}), falling back to a syntax-only descriptor",
                root.name(),
                e
            );
            Ok((build_syntax_only(root, dependencies)?, LinkOutcome::SyntaxOnly))
        }
    }
}

/// Links `root` together with `dependencies` in a fresh pool.
pub fn link(
    root: &FileDescriptorProto,
    dependencies: &[FileDescriptorProto],
) -> Result<FileDescriptor, LinkError> {
    let mut files: Vec<FileDescriptorProto> = dependencies.to_vec();
    files.extend(well_known_imports(root, dependencies));
    files.push(root.clone());

    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_protos(files)?;
    pool.get_file_by_name(root.name())
        .ok_or_else(|| LinkError::MissingFile(root.name().to_string()))
}

// Imports not supplied as dependencies but known to the global pool.
fn well_known_imports(
    root: &FileDescriptorProto,
    dependencies: &[FileDescriptorProto],
) -> Vec<FileDescriptorProto> {
    let global = DescriptorPool::global();
    let mut found: Vec<FileDescriptorProto> = Vec::new();
    let mut pending: Vec<String> = root.dependency.clone();
    for dependency in dependencies {
        pending.extend(dependency.dependency.iter().cloned());
    }

    while let Some(import) = pending.pop() {
        let supplied = dependencies.iter().any(|d| d.name() == import)
            || found.iter().any(|d| d.name() == import);
        if supplied {
            continue;
        }
        if let Some(file) = global.get_file_by_name(&import) {
            let proto = file.file_descriptor_proto().clone();
            pending.extend(proto.dependency.iter().cloned());
            found.push(proto);
        }
    }
    found
}

/// Builds `root` on its own, degrading references to types it does not declare.
///
/// `dependencies` are only consulted to tell external enums from messages.
pub fn build_syntax_only(
    root: &FileDescriptorProto,
    dependencies: &[FileDescriptorProto],
) -> Result<FileDescriptor, SchemaParseError> {
    let degraded = degrade(root, dependencies);
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(degraded)?;
    pool.get_file_by_name(root.name())
        .ok_or_else(|| SchemaParseError::MissingFile(root.name().to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeKind {
    Message,
    Enum,
}

/// Returns a copy of `root` that references no other file.
///
/// - imports are removed
/// - fields of undeclared types become `int32` when `dependencies` (or the
///   well-known types) declare the type as an enum, and `bytes` otherwise,
///   including when the type is found nowhere
/// - extensions of undeclared types and RPC methods with undeclared input or
///   output types are removed
pub fn degrade(root: &FileDescriptorProto, dependencies: &[FileDescriptorProto]) -> FileDescriptorProto {
    let package = root.package().to_string();
    let locals = declared_types(std::slice::from_ref(root));
    let mut externals = declared_types(dependencies);
    externals.extend(declared_types(&well_known_imports(root, dependencies)));
    let types = Types {
        locals: &locals,
        externals: &externals,
    };

    let mut file = root.clone();
    file.dependency.clear();
    file.public_dependency.clear();
    file.weak_dependency.clear();

    for message in &mut file.message_type {
        degrade_message(&package, message, &types);
    }
    file.extension
        .retain(|ext| resolve_local(ext.extendee(), &package, &locals).is_some());
    for ext in &mut file.extension {
        degrade_field(&package, ext, &types);
    }
    for service in &mut file.service {
        service.method.retain(|method| {
            resolve_local(method.input_type(), &package, &locals) == Some(TypeKind::Message)
                && resolve_local(method.output_type(), &package, &locals)
                    == Some(TypeKind::Message)
        });
    }
    file
}

struct Types<'a> {
    locals: &'a HashMap<String, TypeKind>,
    externals: &'a HashMap<String, TypeKind>,
}

fn declared_types(files: &[FileDescriptorProto]) -> HashMap<String, TypeKind> {
    let mut types = HashMap::new();
    for file in files {
        for message in &file.message_type {
            collect_message_names(file.package(), message, &mut types);
        }
        for e in &file.enum_type {
            types.insert(qualify(file.package(), e.name()), TypeKind::Enum);
        }
    }
    types
}

fn collect_message_names(scope: &str, message: &DescriptorProto, locals: &mut HashMap<String, TypeKind>) {
    let name = qualify(scope, message.name());
    for nested in &message.nested_type {
        collect_message_names(&name, nested, locals);
    }
    for e in &message.enum_type {
        locals.insert(qualify(&name, e.name()), TypeKind::Enum);
    }
    locals.insert(name, TypeKind::Message);
}

fn degrade_message(scope: &str, message: &mut DescriptorProto, types: &Types<'_>) {
    let name = qualify(scope, message.name());
    for field in &mut message.field {
        degrade_field(&name, field, types);
    }
    message
        .extension
        .retain(|ext| resolve_local(ext.extendee(), &name, types.locals).is_some());
    for ext in &mut message.extension {
        degrade_field(&name, ext, types);
    }
    for nested in &mut message.nested_type {
        degrade_message(&name, nested, types);
    }
}

fn degrade_field(scope: &str, field: &mut FieldDescriptorProto, types: &Types<'_>) {
    if field.type_name().is_empty() {
        return;
    }
    if resolve_local(field.type_name(), scope, types.locals).is_some() {
        return;
    }

    let degraded = match resolve_local(field.type_name(), scope, types.externals) {
        Some(TypeKind::Enum) => Type::Int32,
        _ => Type::Bytes,
    };
    log::trace!(
        "degrading field {}.{} of unknown type {} to {:?}",
        scope,
        field.name(),
        field.type_name(),
        degraded
    );
    field.set_type(degraded);
    field.type_name = None;
    field.default_value = None;
}

// Resolves a type reference the way protoc scopes names: innermost scope first.
fn resolve_local(type_name: &str, scope: &str, locals: &HashMap<String, TypeKind>) -> Option<TypeKind> {
    if let Some(absolute) = type_name.strip_prefix('.') {
        return locals.get(absolute).copied();
    }
    let mut scope = scope;
    loop {
        let candidate = qualify(scope, type_name);
        if let Some(kind) = locals.get(&candidate) {
            return Some(*kind);
        }
        if scope.is_empty() {
            return None;
        }
        scope = scope.rsplit_once('.').map(|(parent, _)| parent).unwrap_or("");
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

/// Returns every message type declared in `file`, nested ones included.
///
/// Synthetic map entry types are skipped.
pub fn messages_in_file(file: &FileDescriptor) -> Vec<MessageDescriptor> {
    let mut messages = Vec::new();
    for message in file.messages() {
        collect_messages(message, &mut messages);
    }
    messages
}

fn collect_messages(message: MessageDescriptor, out: &mut Vec<MessageDescriptor>) {
    if message.is_map_entry() {
        return;
    }
    for child in message.child_messages() {
        collect_messages(child, out);
    }
    out.push(message);
}
