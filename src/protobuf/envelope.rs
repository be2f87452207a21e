//! Message type selection for Protobuf payloads.
//!
//! A payload may be prefixed with a length-delimited [`TypeRef`] naming the
//! message type of the bytes that follow. When the prefix is absent or does
//! not name a type declared in the schema, the whole payload is read as the
//! first message type the schema declares.

use prost::Message;
use prost_reflect::{FileDescriptor, MessageDescriptor};

use super::descriptor::messages_in_file;

/// Envelope naming the message type of the bytes that follow it.
#[derive(Clone, PartialEq, Message)]
pub struct TypeRef {
    /// Simple or fully qualified message name.
    #[prost(string, tag = "1")]
    pub name: String,
}

/// What the envelope lookup found at the front of a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeOutcome {
    /// An envelope naming a type declared in the schema.
    Envelope(String),
    /// An envelope without a name.
    Unnamed,
    /// An envelope naming a type the schema does not declare.
    Unknown(String),
    /// The bytes do not start with a decodable envelope.
    Malformed,
}

/// The message type selected for a payload and the bytes to decode as it.
#[derive(Debug, Clone)]
pub struct MessageSelection<'a> {
    /// The selected message type.
    pub descriptor: MessageDescriptor,
    /// The payload bytes following any matched envelope.
    pub body: &'a [u8],
    /// The envelope outcome.
    pub outcome: EnvelopeOutcome,
}

/// Selects the message type for `bytes` within `file`.
///
/// Returns `None` only if the file declares no message types.
pub fn select_message<'a>(file: &FileDescriptor, bytes: &'a [u8]) -> Option<MessageSelection<'a>> {
    let mut cursor = bytes;
    let outcome = match TypeRef::decode_length_delimited(&mut cursor) {
        Err(_) => EnvelopeOutcome::Malformed,
        Ok(envelope) if envelope.name.is_empty() => EnvelopeOutcome::Unnamed,
        Ok(envelope) => match find_message(file, &envelope.name) {
            Some(descriptor) => {
                log::trace!("payload envelope selects {}", descriptor.full_name());
                return Some(MessageSelection {
                    descriptor,
                    body: cursor,
                    outcome: EnvelopeOutcome::Envelope(envelope.name),
                });
            }
            None => EnvelopeOutcome::Unknown(envelope.name),
        },
    };

    let descriptor = file.messages().next()?;
    log::debug!(
        "no usable envelope ({:?}), reading payload as first declared type {}",
        outcome,
        descriptor.full_name()
    );
    Some(MessageSelection {
        descriptor,
        body: bytes,
        outcome,
    })
}

/// Finds a message declared in `file` by simple or fully qualified name.
pub fn find_message(file: &FileDescriptor, name: &str) -> Option<MessageDescriptor> {
    let name = name.trim_start_matches('.');
    messages_in_file(file)
        .into_iter()
        .find(|m| m.full_name() == name || m.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_reflect::DescriptorPool;

    fn file() -> FileDescriptor {
        let proto = protox_parse::parse(
            "envelope.proto",
            r#"syntax = "proto3";
            package shop;
            message Order { string id = 1; }
            message Refund { string order_id = 1; message Reason { string text = 1; } }"#,
        )
        .unwrap();
        let mut pool = DescriptorPool::new();
        pool.add_file_descriptor_proto(proto).unwrap();
        pool.get_file_by_name("envelope.proto").unwrap()
    }

    fn enveloped(name: &str, body: &[u8]) -> Vec<u8> {
        let mut bytes = TypeRef {
            name: name.to_string(),
        }
        .encode_length_delimited_to_vec();
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn test_envelope_by_simple_name() {
        let file = file();
        let bytes = enveloped("Refund", &[0x0a, 0x01, b'x']);
        let selection = select_message(&file, &bytes).unwrap();

        assert_eq!(selection.descriptor.full_name(), "shop.Refund");
        assert_eq!(selection.body, &[0x0a, 0x01, b'x']);
        assert_eq!(selection.outcome, EnvelopeOutcome::Envelope("Refund".into()));
    }

    #[test]
    fn test_envelope_by_full_nested_name() {
        let file = file();
        let bytes = enveloped("shop.Refund.Reason", &[]);
        let selection = select_message(&file, &bytes).unwrap();
        assert_eq!(selection.descriptor.full_name(), "shop.Refund.Reason");
        assert!(selection.body.is_empty());
    }

    #[test]
    fn test_unknown_name_falls_back_without_losing_bytes() {
        let file = file();
        let bytes = enveloped("Invoice", &[0x0a, 0x01, b'x']);
        let selection = select_message(&file, &bytes).unwrap();

        assert_eq!(selection.descriptor.full_name(), "shop.Order");
        assert_eq!(selection.body, bytes.as_slice());
        assert_eq!(selection.outcome, EnvelopeOutcome::Unknown("Invoice".into()));
    }

    #[test]
    fn test_unnamed_envelope_falls_back() {
        let file = file();
        let bytes = [0x00];
        let selection = select_message(&file, &bytes).unwrap();
        assert_eq!(selection.outcome, EnvelopeOutcome::Unnamed);
        assert_eq!(selection.body, &bytes);
    }

    #[test]
    fn test_malformed_falls_back() {
        let file = file();
        // Length prefix claims more bytes than present.
        let bytes = [0x10, 0x0a];
        let selection = select_message(&file, &bytes).unwrap();
        assert_eq!(selection.outcome, EnvelopeOutcome::Malformed);
        assert_eq!(selection.descriptor.full_name(), "shop.Order");
        assert_eq!(selection.body, &bytes);
    }

    #[test]
    fn test_empty_payload_falls_back() {
        let file = file();
        let selection = select_message(&file, &[]).unwrap();
        assert_eq!(selection.outcome, EnvelopeOutcome::Malformed);
        assert!(selection.body.is_empty());
    }
}
