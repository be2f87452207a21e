//! Rendering of file descriptors back to `.proto` text.

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    ServiceDescriptorProto,
};
use std::fmt::Write;

const MAX_FIELD_NUMBER: i32 = 536_870_911;
const INDENT: &str = "  ";

/// Renders a file descriptor as `.proto` source.
///
/// Type references are written fully qualified, so the output re-links
/// against the same set of imports regardless of scoping.
pub fn print_file(file: &FileDescriptorProto) -> String {
    let mut out = String::new();
    let syntax = if file.syntax().is_empty() { "proto2" } else { file.syntax() };
    let proto3 = syntax == "proto3";

    let _ = writeln!(out, "syntax = \"{}\";", syntax);
    if !file.package().is_empty() {
        let _ = writeln!(out, "package {};", file.package());
    }

    if !file.dependency.is_empty() {
        out.push('\n');
    }
    for (index, import) in file.dependency.iter().enumerate() {
        let index = index as i32;
        let modifier = if file.public_dependency.contains(&index) {
            "public "
        } else if file.weak_dependency.contains(&index) {
            "weak "
        } else {
            ""
        };
        let _ = writeln!(out, "import {}\"{}\";", modifier, escape(import));
    }

    print_file_options(&mut out, file);

    for message in &file.message_type {
        out.push('\n');
        print_message(&mut out, message, proto3, 0);
    }
    for e in &file.enum_type {
        out.push('\n');
        print_enum(&mut out, e, 0);
    }
    print_extensions(&mut out, &file.extension, proto3, 0);
    for service in &file.service {
        out.push('\n');
        print_service(&mut out, service);
    }
    out
}

fn print_file_options(out: &mut String, file: &FileDescriptorProto) {
    let Some(options) = &file.options else {
        return;
    };

    let mut lines = Vec::new();
    if let Some(v) = &options.java_package {
        lines.push(format!("java_package = \"{}\"", escape(v)));
    }
    if let Some(v) = &options.java_outer_classname {
        lines.push(format!("java_outer_classname = \"{}\"", escape(v)));
    }
    if let Some(v) = options.java_multiple_files {
        lines.push(format!("java_multiple_files = {}", v));
    }
    if let Some(v) = &options.go_package {
        lines.push(format!("go_package = \"{}\"", escape(v)));
    }
    if let Some(v) = &options.csharp_namespace {
        lines.push(format!("csharp_namespace = \"{}\"", escape(v)));
    }
    if let Some(v) = &options.objc_class_prefix {
        lines.push(format!("objc_class_prefix = \"{}\"", escape(v)));
    }
    if options.optimize_for.is_some() {
        lines.push(format!("optimize_for = {}", options.optimize_for().as_str_name()));
    }
    if let Some(true) = options.deprecated {
        lines.push("deprecated = true".to_string());
    }

    if !lines.is_empty() {
        out.push('\n');
    }
    for line in lines {
        let _ = writeln!(out, "option {};", line);
    }
}

fn print_message(out: &mut String, message: &DescriptorProto, proto3: bool, depth: usize) {
    let pad = INDENT.repeat(depth);
    let _ = writeln!(out, "{}message {} {{", pad, message.name());

    print_reserved(out, message, depth + 1);

    let extension_ranges: Vec<String> = message
        .extension_range
        .iter()
        .map(|r| range_text(r.start(), r.end() - 1))
        .collect();
    if !extension_ranges.is_empty() {
        let _ = writeln!(
            out,
            "{}extensions {};",
            INDENT.repeat(depth + 1),
            extension_ranges.join(", ")
        );
    }

    for field in &message.field {
        let in_real_oneof = field.oneof_index.is_some() && !field.proto3_optional();
        if !in_real_oneof {
            print_field(out, field, message, proto3, depth + 1);
        }
    }

    for (index, oneof) in message.oneof_decl.iter().enumerate() {
        let members: Vec<&FieldDescriptorProto> = message
            .field
            .iter()
            .filter(|f| f.oneof_index == Some(index as i32) && !f.proto3_optional())
            .collect();
        if members.is_empty() {
            continue;
        }
        let inner = INDENT.repeat(depth + 1);
        let _ = writeln!(out, "{}oneof {} {{", inner, oneof.name());
        for field in members {
            print_field(out, field, message, false, depth + 2);
        }
        let _ = writeln!(out, "{}}}", inner);
    }

    for nested in &message.nested_type {
        if is_map_entry(nested) {
            continue;
        }
        print_message(out, nested, proto3, depth + 1);
    }
    for e in &message.enum_type {
        print_enum(out, e, depth + 1);
    }
    print_extensions(out, &message.extension, proto3, depth + 1);

    let _ = writeln!(out, "{}}}", pad);
}

fn print_reserved(out: &mut String, message: &DescriptorProto, depth: usize) {
    let pad = INDENT.repeat(depth);
    // Message ranges are end-exclusive.
    let ranges: Vec<String> = message
        .reserved_range
        .iter()
        .map(|r| range_text(r.start(), r.end() - 1))
        .collect();
    if !ranges.is_empty() {
        let _ = writeln!(out, "{}reserved {};", pad, ranges.join(", "));
    }
    if !message.reserved_name.is_empty() {
        let names: Vec<String> = message
            .reserved_name
            .iter()
            .map(|n| format!("\"{}\"", escape(n)))
            .collect();
        let _ = writeln!(out, "{}reserved {};", pad, names.join(", "));
    }
}

fn range_text(start: i32, last: i32) -> String {
    if start == last {
        start.to_string()
    } else if last >= MAX_FIELD_NUMBER {
        format!("{} to max", start)
    } else {
        format!("{} to {}", start, last)
    }
}

fn print_field(
    out: &mut String,
    field: &FieldDescriptorProto,
    parent: &DescriptorProto,
    proto3: bool,
    depth: usize,
) {
    let pad = INDENT.repeat(depth);

    if let Some(entry) = map_entry_for(field, parent) {
        let key = entry.field.iter().find(|f| f.number() == 1);
        let value = entry.field.iter().find(|f| f.number() == 2);
        if let (Some(key), Some(value)) = (key, value) {
            let _ = writeln!(
                out,
                "{}map<{}, {}> {} = {};",
                pad,
                type_text(key),
                type_text(value),
                field.name(),
                field.number()
            );
            return;
        }
    }

    let label = match field.label() {
        Label::Repeated => "repeated ",
        Label::Required => "required ",
        Label::Optional if field.proto3_optional() => "optional ",
        Label::Optional if !proto3 && field.oneof_index.is_none() => "optional ",
        Label::Optional => "",
    };

    let mut options = Vec::new();
    if let Some(default) = &field.default_value {
        let value = match field.r#type() {
            Type::String => format!("\"{}\"", escape(default)),
            Type::Bytes => format!("\"{}\"", default),
            _ => default.clone(),
        };
        options.push(format!("default = {}", value));
    }
    if let Some(json_name) = &field.json_name {
        if json_name != &default_json_name(field.name()) {
            options.push(format!("json_name = \"{}\"", escape(json_name)));
        }
    }
    if let Some(field_options) = &field.options {
        if let Some(packed) = field_options.packed {
            options.push(format!("packed = {}", packed));
        }
        if let Some(true) = field_options.deprecated {
            options.push("deprecated = true".to_string());
        }
    }

    let suffix = if options.is_empty() {
        String::new()
    } else {
        format!(" [{}]", options.join(", "))
    };

    let _ = writeln!(
        out,
        "{}{}{} {} = {}{};",
        pad,
        label,
        type_text(field),
        field.name(),
        field.number(),
        suffix
    );
}

fn map_entry_for<'a>(
    field: &FieldDescriptorProto,
    parent: &'a DescriptorProto,
) -> Option<&'a DescriptorProto> {
    if field.label() != Label::Repeated || field.type_name().is_empty() {
        return None;
    }
    let simple = field.type_name().rsplit('.').next()?;
    parent
        .nested_type
        .iter()
        .find(|nested| nested.name() == simple && is_map_entry(nested))
}

fn is_map_entry(message: &DescriptorProto) -> bool {
    message
        .options
        .as_ref()
        .map(|o| o.map_entry())
        .unwrap_or(false)
}

fn type_text(field: &FieldDescriptorProto) -> String {
    if !field.type_name().is_empty() {
        return field.type_name().to_string();
    }
    scalar_name(field.r#type()).to_string()
}

fn scalar_name(ty: Type) -> &'static str {
    match ty {
        Type::Double => "double",
        Type::Float => "float",
        Type::Int64 => "int64",
        Type::Uint64 => "uint64",
        Type::Int32 => "int32",
        Type::Fixed64 => "fixed64",
        Type::Fixed32 => "fixed32",
        Type::Bool => "bool",
        Type::String => "string",
        Type::Bytes => "bytes",
        Type::Uint32 => "uint32",
        Type::Sfixed32 => "sfixed32",
        Type::Sfixed64 => "sfixed64",
        Type::Sint32 => "sint32",
        Type::Sint64 => "sint64",
        // Named types carry a type_name and never reach here.
        Type::Group | Type::Message | Type::Enum => "bytes",
    }
}

fn default_json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn print_enum(out: &mut String, e: &EnumDescriptorProto, depth: usize) {
    let pad = INDENT.repeat(depth);
    let inner = INDENT.repeat(depth + 1);
    let _ = writeln!(out, "{}enum {} {{", pad, e.name());

    if let Some(true) = e.options.as_ref().and_then(|o| o.allow_alias) {
        let _ = writeln!(out, "{}option allow_alias = true;", inner);
    }
    // Enum ranges are end-inclusive.
    let ranges: Vec<String> = e
        .reserved_range
        .iter()
        .map(|r| range_text(r.start(), r.end()))
        .collect();
    if !ranges.is_empty() {
        let _ = writeln!(out, "{}reserved {};", inner, ranges.join(", "));
    }
    if !e.reserved_name.is_empty() {
        let names: Vec<String> = e
            .reserved_name
            .iter()
            .map(|n| format!("\"{}\"", escape(n)))
            .collect();
        let _ = writeln!(out, "{}reserved {};", inner, names.join(", "));
    }

    for value in &e.value {
        let _ = writeln!(out, "{}{} = {};", inner, value.name(), value.number());
    }
    let _ = writeln!(out, "{}}}", pad);
}

fn print_extensions(out: &mut String, extensions: &[FieldDescriptorProto], proto3: bool, depth: usize) {
    let mut extendees: Vec<&str> = Vec::new();
    for ext in extensions {
        if !extendees.contains(&ext.extendee()) {
            extendees.push(ext.extendee());
        }
    }

    let pad = INDENT.repeat(depth);
    let holder = DescriptorProto::default();
    for extendee in extendees {
        let _ = writeln!(out, "{}extend {} {{", pad, extendee);
        for ext in extensions.iter().filter(|e| e.extendee() == extendee) {
            print_field(out, ext, &holder, proto3, depth + 1);
        }
        let _ = writeln!(out, "{}}}", pad);
    }
}

fn print_service(out: &mut String, service: &ServiceDescriptorProto) {
    let _ = writeln!(out, "service {} {{", service.name());
    for method in &service.method {
        let client = if method.client_streaming() { "stream " } else { "" };
        let server = if method.server_streaming() { "stream " } else { "" };
        let _ = writeln!(
            out,
            "{}rpc {}({}{}) returns ({}{});",
            INDENT,
            method.name(),
            client,
            method.input_type(),
            server,
            method.output_type()
        );
    }
    let _ = writeln!(out, "}}");
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
