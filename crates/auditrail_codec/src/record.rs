//! Audit record type and wire encoding.

use std::net::IpAddr;

use uuid::Uuid;

use crate::wire::CborWriter;

/// The single wire format version this codec writes and accepts.
///
/// Compatibility across versions is handled by keeping old decoders
/// available, not by one decoder understanding multiple versions.
pub const RECORD_VERSION: u16 = 1;

/// Wire field names, in the order they are written.
pub(crate) mod field {
    pub const VERSION: &str = "version";
    pub const KIND: &str = "kind";
    pub const TIMESTAMP: &str = "timestamp";
    pub const CLIENT: &str = "client";
    pub const COORDINATOR: &str = "coordinator";
    pub const USER: &str = "user";
    pub const BATCH_ID: &str = "batch_id";
    pub const STATUS: &str = "status";
    pub const OPERATION: &str = "operation";
}

/// Discriminator between a standalone record and one that is part of a
/// multi-statement batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A standalone audit record.
    Single,
    /// A record belonging to a batch; carries a batch identifier.
    Batch,
}

impl RecordKind {
    /// The literal written on the wire.
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Batch => "batch",
        }
    }

    /// Parses a wire literal, returning `None` for unknown values.
    #[must_use]
    pub fn from_wire(literal: &str) -> Option<Self> {
        match literal {
            "single" => Some(Self::Single),
            "batch" => Some(Self::Batch),
            _ => None,
        }
    }
}

/// Outcome status of the audited operation. Closed set; unknown names are a
/// decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// The operation was attempted.
    Attempt,
    /// The operation succeeded.
    Succeeded,
    /// The operation failed a permission or validation check.
    Failed,
    /// The operation raised an execution error.
    Error,
}

impl OperationStatus {
    /// The status name written on the wire.
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Attempt => "ATTEMPT",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Error => "ERROR",
        }
    }

    /// Parses a wire name, returning `None` for unrecognized values.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "ATTEMPT" => Some(Self::Attempt),
            "SUCCEEDED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Schema generation of a stored record, resolved once at decode time.
///
/// Legacy data predates the coordinator address field; the read side must
/// tolerate its absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaGeneration {
    /// Coordinator address absent.
    Legacy,
    /// Coordinator address present. The encoder always writes this.
    Current,
}

/// A single persisted audit record.
///
/// `kind` and `batch_id` are always consistent: `Batch` records carry an
/// identifier, `Single` records never do. The constructors uphold this on
/// the write side; the decoder enforces it on the read side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Single/batch discriminator.
    pub kind: RecordKind,
    /// Event time, epoch milliseconds.
    pub timestamp_millis: i64,
    /// Address the client connected from.
    pub client_address: IpAddr,
    /// Address of the coordinating node. `None` only for legacy data.
    pub coordinator_address: Option<IpAddr>,
    /// Authenticated user.
    pub user: String,
    /// Batch identifier, present iff `kind` is [`RecordKind::Batch`].
    pub batch_id: Option<Uuid>,
    /// Operation outcome.
    pub status: OperationStatus,
    /// Fully rendered operation text.
    pub operation: String,
}

impl AuditRecord {
    /// Creates a standalone record.
    pub fn single(
        timestamp_millis: i64,
        client_address: IpAddr,
        coordinator_address: IpAddr,
        user: impl Into<String>,
        status: OperationStatus,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            kind: RecordKind::Single,
            timestamp_millis,
            client_address,
            coordinator_address: Some(coordinator_address),
            user: user.into(),
            batch_id: None,
            status,
            operation: operation.into(),
        }
    }

    /// Creates a record belonging to the batch identified by `batch_id`.
    #[allow(clippy::too_many_arguments)]
    pub fn batch(
        timestamp_millis: i64,
        client_address: IpAddr,
        coordinator_address: IpAddr,
        user: impl Into<String>,
        batch_id: Uuid,
        status: OperationStatus,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            kind: RecordKind::Batch,
            timestamp_millis,
            client_address,
            coordinator_address: Some(coordinator_address),
            user: user.into(),
            batch_id: Some(batch_id),
            status,
            operation: operation.into(),
        }
    }

    /// The schema generation this record was decoded from or will be
    /// written as; the encoder always emits [`SchemaGeneration::Current`].
    #[must_use]
    pub fn schema_generation(&self) -> SchemaGeneration {
        match self.coordinator_address {
            Some(_) => SchemaGeneration::Current,
            None => SchemaGeneration::Legacy,
        }
    }

    /// Encodes the record into its wire form.
    ///
    /// Deterministic and total: fields are written in the fixed order
    /// version, kind, timestamp, client, coordinator, user, batch id (batch
    /// records only), status, operation.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        self.encode_with_version(RECORD_VERSION)
    }

    pub(crate) fn encode_with_version(&self, version: u16) -> Vec<u8> {
        let mut w = CborWriter::new();

        let mut entries = 7;
        if self.coordinator_address.is_some() {
            entries += 1;
        }
        if self.batch_id.is_some() {
            entries += 1;
        }
        w.write_map_header(entries);

        w.write_text(field::VERSION);
        w.write_uint(u64::from(version));

        w.write_text(field::KIND);
        w.write_text(self.kind.as_wire());

        w.write_text(field::TIMESTAMP);
        w.write_int(self.timestamp_millis);

        w.write_text(field::CLIENT);
        write_ip(&mut w, self.client_address);

        if let Some(coordinator) = self.coordinator_address {
            w.write_text(field::COORDINATOR);
            write_ip(&mut w, coordinator);
        }

        w.write_text(field::USER);
        w.write_text(&self.user);

        if let Some(batch_id) = self.batch_id {
            w.write_text(field::BATCH_ID);
            w.write_bytes(batch_id.as_bytes());
        }

        w.write_text(field::STATUS);
        w.write_text(self.status.as_wire());

        w.write_text(field::OPERATION);
        w.write_text(&self.operation);

        w.into_bytes()
    }
}

fn write_ip(w: &mut CborWriter, addr: IpAddr) {
    match addr {
        IpAddr::V4(v4) => w.write_bytes(&v4.octets()),
        IpAddr::V6(v6) => w.write_bytes(&v6.octets()),
    }
}
