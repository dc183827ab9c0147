//! # auditrail codec
//!
//! Versioned binary wire codec for audit records.
//!
//! A record is written as a canonical CBOR map whose fields appear in a
//! fixed order: version, kind, timestamp, client address, coordinator
//! address, user, batch id (batch records only), status, operation. The
//! decoder reads fields by name in that order, gates on the single
//! supported [`RECORD_VERSION`], and reports the offending value in every
//! format error.
//!
//! ## Usage
//!
//! ```
//! use auditrail_codec::{decode_record, AuditRecord, OperationStatus};
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! let record = AuditRecord::single(
//!     1_700_000_000_000,
//!     IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
//!     IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
//!     "cassandra",
//!     OperationStatus::Attempt,
//!     "SELECT * FROM ks.tbl",
//! );
//!
//! let bytes = record.encode();
//! let decoded = decode_record(&bytes).unwrap();
//! assert_eq!(decoded, record);
//! ```
//!
//! Decoder instances are single-use: [`RecordDecoder`] decodes at most one
//! record and fails a second attempt with a distinct reuse error instead of
//! overwriting state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod error;
mod record;
mod wire;

pub use decoder::{decode_record, RecordDecoder};
pub use error::{CodecError, CodecResult};
pub use record::{
    AuditRecord, OperationStatus, RecordKind, SchemaGeneration, RECORD_VERSION,
};
pub use wire::{CborReader, CborWriter};
