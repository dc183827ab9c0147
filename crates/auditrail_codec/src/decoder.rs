//! Single-use audit record decoder.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use uuid::Uuid;

use crate::error::{CodecError, CodecResult};
use crate::record::{field, AuditRecord, OperationStatus, RecordKind, RECORD_VERSION};
use crate::wire::CborReader;

/// Decodes one audit record from `bytes`.
///
/// Convenience wrapper over [`RecordDecoder`] for callers that only need a
/// single decode.
pub fn decode_record(bytes: &[u8]) -> CodecResult<AuditRecord> {
    RecordDecoder::new(bytes).decode()
}

/// Decodes at most one audit record, then must be discarded.
///
/// Fields are read by name in the fixed wire order; any failure aborts the
/// whole decode. Calling [`decode`](Self::decode) a second time on the same
/// instance fails with [`CodecError::AlreadyConsumed`] instead of silently
/// overwriting state.
#[derive(Debug)]
pub struct RecordDecoder<'a> {
    reader: CborReader<'a>,
    consumed: bool,
}

impl<'a> RecordDecoder<'a> {
    /// Creates a decoder over one encoded record.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            reader: CborReader::new(bytes),
            consumed: false,
        }
    }

    /// Decodes the record.
    ///
    /// # Errors
    ///
    /// Fails on version mismatch, an unknown kind literal, a client address
    /// that is not 4 or 16 bytes, an unrecognized status name, any
    /// structural wire error, or reuse of a consumed decoder. Error
    /// messages embed the offending value.
    pub fn decode(&mut self) -> CodecResult<AuditRecord> {
        if self.consumed {
            return Err(CodecError::AlreadyConsumed);
        }
        self.consumed = true;

        let declared_entries = self.reader.read_map_header()?;
        let mut entries = 0usize;

        self.expect_field(field::VERSION)?;
        let version = self.reader.read_uint()?;
        if version != u64::from(RECORD_VERSION) {
            return Err(CodecError::UnsupportedVersion { version });
        }
        entries += 1;

        self.expect_field(field::KIND)?;
        let kind_literal = self.reader.read_text()?;
        let kind = RecordKind::from_wire(&kind_literal)
            .ok_or(CodecError::UnknownKind { kind: kind_literal })?;
        entries += 1;

        self.expect_field(field::TIMESTAMP)?;
        let timestamp_millis = self.reader.read_int()?;
        entries += 1;

        self.expect_field(field::CLIENT)?;
        let client_bytes = self.reader.read_bytes()?;
        let client_address = parse_ip(&client_bytes)
            .ok_or(CodecError::CorruptClientAddress { len: client_bytes.len() })?;
        entries += 1;

        // Schema generation is resolved here: legacy data has no
        // coordinator field and goes straight to `user`.
        let mut key = self.reader.read_text()?;
        let coordinator_address = if key == field::COORDINATOR {
            let bytes = self.reader.read_bytes()?;
            let addr = parse_ip(&bytes).ok_or_else(|| {
                CodecError::invalid_structure(format!(
                    "corrupt coordinator address: {} bytes",
                    bytes.len()
                ))
            })?;
            entries += 1;
            key = self.reader.read_text()?;
            Some(addr)
        } else {
            None
        };

        if key != field::USER {
            return Err(CodecError::UnexpectedField {
                expected: field::USER,
                found: key,
            });
        }
        let user = self.reader.read_text()?;
        entries += 1;

        // Presence of the batch id must agree with the kind, independent of
        // whatever payload bytes happen to exist.
        let batch_id = match kind {
            RecordKind::Batch => {
                self.expect_field(field::BATCH_ID)?;
                let bytes = self.reader.read_bytes()?;
                let raw: [u8; 16] = bytes.as_slice().try_into().map_err(|_| {
                    CodecError::invalid_structure(format!("corrupt batch id: {} bytes", bytes.len()))
                })?;
                entries += 1;
                Some(Uuid::from_bytes(raw))
            }
            RecordKind::Single => None,
        };

        self.expect_field(field::STATUS)?;
        let status_name = self.reader.read_text()?;
        let status = OperationStatus::from_wire(&status_name)
            .ok_or(CodecError::CorruptStatus { status: status_name })?;
        entries += 1;

        self.expect_field(field::OPERATION)?;
        let operation = self.reader.read_text()?;
        entries += 1;

        if entries != declared_entries {
            return Err(CodecError::invalid_structure(format!(
                "map declares {declared_entries} entries, read {entries}"
            )));
        }

        Ok(AuditRecord {
            kind,
            timestamp_millis,
            client_address,
            coordinator_address,
            user,
            batch_id,
            status,
            operation,
        })
    }

    fn expect_field(&mut self, expected: &'static str) -> CodecResult<()> {
        let found = self.reader.read_text()?;
        if found != expected {
            return Err(CodecError::UnexpectedField { expected, found });
        }
        Ok(())
    }
}

fn parse_ip(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}
