//! Runtime type names for message descriptors.
//!
//! Decoders are registered under the name the generated code of a message
//! type carries at runtime: the Java-style class name derived from the file
//! options `java_package`, `java_outer_classname` and `java_multiple_files`,
//! with nested types joined by `$`.

use prost_reflect::MessageDescriptor;

/// Derives the runtime type name of a message.
///
/// Returns `None` when the file declares neither `java_outer_classname` nor
/// `java_multiple_files = true`, since the enclosing class is then unknown.
/// An empty package contributes no leading separator.
pub fn runtime_type_name(descriptor: &MessageDescriptor) -> Option<String> {
    let file = descriptor.parent_file();
    let options = file.file_descriptor_proto().options.as_ref();

    let package = options
        .and_then(|o| o.java_package.as_deref())
        .unwrap_or_else(|| file.package_name());

    let multiple_files = options.map(|o| o.java_multiple_files()).unwrap_or(false);
    let outer = if multiple_files {
        ""
    } else {
        options.and_then(|o| o.java_outer_classname.as_deref())?
    };

    let inner = nested_path(descriptor);
    let class = match (outer.is_empty(), inner.is_empty()) {
        (true, _) => inner,
        (false, true) => outer.to_string(),
        (false, false) => format!("{}${}", outer, inner),
    };

    if package.is_empty() {
        Some(class)
    } else {
        Some(format!("{}.{}", package, class))
    }
}

// Outermost first, joined by `$`.
fn nested_path(descriptor: &MessageDescriptor) -> String {
    let mut names = vec![descriptor.name().to_string()];
    let mut parent = descriptor.parent_message();
    while let Some(message) = parent {
        names.push(message.name().to_string());
        parent = message.parent_message();
    }
    names.reverse();
    names.join("$")
}
