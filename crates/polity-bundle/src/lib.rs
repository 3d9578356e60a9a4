//! The universe bundle identity contract.
//!
//! A persisted simulation travels as a *bundle*: a required identity
//! record (the `TIME` chunk) plus one payload per known chunk kind and
//! any number of preserved foreign chunks. The contract this crate
//! enforces is identity, not format richness:
//!
//! - the identity declares a 64-bit FNV-1a digest per payload, and a
//!   load refuses [`BundleError::IdentityMismatch`] when any payload's
//!   digest differs from its declaration;
//! - the identity carries a `feature_epoch`, and a load refuses
//!   [`BundleError::MigrationRequired`] when the epoch is unsupported or
//!   differs from the caller's expectation;
//! - unrecognized chunks are preserved verbatim, keyed by
//!   `(type_id, version, flags)`, through any load/save cycle;
//! - encoding is a pure function of bundle state: two save cycles of the
//!   same in-memory bundle are byte-identical.

use serde::{Deserialize, Serialize};

use polity_types::fnv1a;

/// The supported feature epoch.
pub const FEATURE_EPOCH_CURRENT: u32 = 1;

/// Whether a feature epoch can be loaded without migration.
pub const fn feature_epoch_supported(epoch: u32) -> bool {
    epoch == FEATURE_EPOCH_CURRENT
}

/// Errors from bundle encoding, decoding, and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BundleError {
    /// The byte stream is not a well-formed bundle.
    #[error("invalid bundle format: {reason}")]
    InvalidFormat {
        /// What was malformed.
        reason: &'static str,
    },

    /// A payload digest differs from the identity's declaration, or the
    /// loaded identity differs from the expected one.
    #[error("bundle identity mismatch")]
    IdentityMismatch,

    /// The bundle's feature epoch is unsupported or unexpected.
    #[error("bundle requires migration (epoch {found}, supported {supported})")]
    MigrationRequired {
        /// The epoch found in the bundle.
        found: u32,
        /// The epoch this build supports.
        supported: u32,
    },

    /// A payload exceeds the encodable size.
    #[error("chunk payload too large")]
    PayloadTooLarge,
}

// ---------------------------------------------------------------------------
// Chunk kinds
// ---------------------------------------------------------------------------

/// Number of known payload chunk kinds.
pub const CHUNK_KIND_COUNT: usize = 14;

/// The known payload chunk kinds, in their fixed encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ChunkKind {
    /// Cosmological graph.
    Cosmo = 0,
    /// Star systems.
    Systems = 1,
    /// Bodies.
    Bodies = 2,
    /// Reference frames.
    Frames = 3,
    /// Body topology.
    Topology = 4,
    /// Orbits.
    Orbits = 5,
    /// Surface overrides.
    Surface = 6,
    /// Constructions.
    Constructions = 7,
    /// Stations.
    Stations = 8,
    /// Routes.
    Routes = 9,
    /// Transfers.
    Transfers = 10,
    /// Production.
    Production = 11,
    /// Macro economy.
    MacroEconomy = 12,
    /// Macro events.
    MacroEvents = 13,
}

/// All chunk kinds in encoding order.
pub const CHUNK_KINDS: [ChunkKind; CHUNK_KIND_COUNT] = [
    ChunkKind::Cosmo,
    ChunkKind::Systems,
    ChunkKind::Bodies,
    ChunkKind::Frames,
    ChunkKind::Topology,
    ChunkKind::Orbits,
    ChunkKind::Surface,
    ChunkKind::Constructions,
    ChunkKind::Stations,
    ChunkKind::Routes,
    ChunkKind::Transfers,
    ChunkKind::Production,
    ChunkKind::MacroEconomy,
    ChunkKind::MacroEvents,
];

impl ChunkKind {
    /// Index into per-kind tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The four-byte tag framing this kind on the wire.
    pub const fn tag(self) -> [u8; 4] {
        match self {
            Self::Cosmo => *b"COSM",
            Self::Systems => *b"SYSM",
            Self::Bodies => *b"BODS",
            Self::Frames => *b"FRAM",
            Self::Topology => *b"TOPB",
            Self::Orbits => *b"ORBT",
            Self::Surface => *b"SURF",
            Self::Constructions => *b"CNST",
            Self::Stations => *b"STAT",
            Self::Routes => *b"ROUT",
            Self::Transfers => *b"TRAN",
            Self::Production => *b"PROD",
            Self::MacroEconomy => *b"MECO",
            Self::MacroEvents => *b"MEVT",
        }
    }

    /// Reverse tag lookup.
    fn from_tag(tag: [u8; 4]) -> Option<Self> {
        CHUNK_KINDS.into_iter().find(|kind| kind.tag() == tag)
    }
}

/// The tag framing the identity record.
const TIME_TAG: [u8; 4] = *b"TIME";

/// The tag framing preserved foreign chunks.
const FOREIGN_TAG: [u8; 4] = *b"FORN";

/// The bundle magic.
const BUNDLE_MAGIC: [u8; 4] = *b"PBDL";

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The bundle identity carried by the `TIME` chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleIdentity {
    /// The universe this save belongs to.
    pub universe_id: String,
    /// The instance (one playthrough of a universe).
    pub instance_id: String,
    /// Digest of the content graph the save was produced against.
    pub content_graph_hash: u64,
    /// Digest of the simulation flags.
    pub sim_flags_hash: u64,
    /// Updates per second the simulation ran at; must be non-zero.
    pub ups: u32,
    /// The tick the save was taken at.
    pub tick_index: u64,
    /// The feature epoch; must be non-zero.
    pub feature_epoch: u32,
    /// Declared FNV-1a digest per known payload kind (`0` = payload not
    /// covered).
    pub payload_hashes: [u64; CHUNK_KIND_COUNT],
}

impl Default for BundleIdentity {
    fn default() -> Self {
        Self {
            universe_id: String::new(),
            instance_id: String::new(),
            content_graph_hash: 0,
            sim_flags_hash: 0,
            ups: 1,
            tick_index: 0,
            feature_epoch: FEATURE_EPOCH_CURRENT,
            payload_hashes: [0; CHUNK_KIND_COUNT],
        }
    }
}

impl BundleIdentity {
    /// The declared digest for one payload kind.
    pub const fn hash_for(&self, kind: ChunkKind) -> u64 {
        self.payload_hashes[kind.index()]
    }

    /// Declare a payload digest.
    pub const fn set_hash(&mut self, kind: ChunkKind, hash: u64) {
        self.payload_hashes[kind.index()] = hash;
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// A preserved chunk this build does not understand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignChunk {
    /// The foreign type id.
    pub type_id: u32,
    /// The foreign chunk version.
    pub version: u16,
    /// The foreign chunk flags.
    pub flags: u16,
    /// The payload, byte for byte.
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct KnownChunk {
    version: u16,
    payload: Vec<u8>,
}

/// An in-memory universe bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseBundle {
    identity: BundleIdentity,
    chunks: [Option<KnownChunk>; CHUNK_KIND_COUNT],
    foreign: Vec<ForeignChunk>,
}

impl Default for UniverseBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl UniverseBundle {
    /// Create an empty bundle with a default identity.
    pub fn new() -> Self {
        Self {
            identity: BundleIdentity::default(),
            chunks: [const { None }; CHUNK_KIND_COUNT],
            foreign: Vec::new(),
        }
    }

    /// The bundle identity.
    pub const fn identity(&self) -> &BundleIdentity {
        &self.identity
    }

    /// Replace the bundle identity.
    pub fn set_identity(&mut self, identity: BundleIdentity) {
        self.identity = identity;
    }

    /// Set a known payload.
    pub fn set_chunk(&mut self, kind: ChunkKind, version: u16, payload: &[u8]) {
        if let Some(slot) = self.chunks.get_mut(kind.index()) {
            *slot = Some(KnownChunk {
                version,
                payload: payload.to_vec(),
            });
        }
    }

    /// A known payload and its version, if present.
    pub fn chunk(&self, kind: ChunkKind) -> Option<(&[u8], u16)> {
        self.chunks
            .get(kind.index())
            .and_then(Option::as_ref)
            .map(|chunk| (chunk.payload.as_slice(), chunk.version))
    }

    /// Preserve a foreign chunk.
    pub fn add_foreign(&mut self, type_id: u32, version: u16, flags: u16, payload: &[u8]) {
        self.foreign.push(ForeignChunk {
            type_id,
            version,
            flags,
            payload: payload.to_vec(),
        });
    }

    /// Drop all preserved foreign chunks.
    pub fn clear_foreign(&mut self) {
        self.foreign.clear();
    }

    /// The preserved foreign chunks, in preservation order.
    pub fn foreign(&self) -> &[ForeignChunk] {
        &self.foreign
    }

    /// Recompute and declare the digest of every present payload.
    pub fn refresh_payload_hashes(&mut self) {
        for kind in CHUNK_KINDS {
            let hash = self
                .chunks
                .get(kind.index())
                .and_then(Option::as_ref)
                .map_or(0, |chunk| fnv1a(&chunk.payload));
            self.identity.set_hash(kind, hash);
        }
    }

    /// Validate the bundle against its own declarations and,
    /// optionally, a caller expectation.
    ///
    /// Epoch problems refuse `MigrationRequired`; everything else
    /// refuses `IdentityMismatch`. A declared digest of zero skips the
    /// check for that payload.
    pub fn validate(&self, expected: Option<&BundleIdentity>) -> Result<(), BundleError> {
        if self.identity.ups == 0 || self.identity.feature_epoch == 0 {
            return Err(BundleError::InvalidFormat {
                reason: "identity requires non-zero ups and feature epoch",
            });
        }
        if !feature_epoch_supported(self.identity.feature_epoch) {
            return Err(BundleError::MigrationRequired {
                found: self.identity.feature_epoch,
                supported: FEATURE_EPOCH_CURRENT,
            });
        }
        for kind in CHUNK_KINDS {
            let declared = self.identity.hash_for(kind);
            if declared == 0 {
                continue;
            }
            let Some((payload, _)) = self.chunk(kind) else {
                return Err(BundleError::IdentityMismatch);
            };
            if fnv1a(payload) != declared {
                return Err(BundleError::IdentityMismatch);
            }
        }
        if let Some(expected) = expected {
            if expected.feature_epoch != self.identity.feature_epoch {
                return Err(BundleError::MigrationRequired {
                    found: self.identity.feature_epoch,
                    supported: expected.feature_epoch,
                });
            }
            if expected.universe_id != self.identity.universe_id
                || expected.instance_id != self.identity.instance_id
                || expected.content_graph_hash != self.identity.content_graph_hash
                || expected.sim_flags_hash != self.identity.sim_flags_hash
            {
                return Err(BundleError::IdentityMismatch);
            }
            for kind in CHUNK_KINDS {
                let want = expected.hash_for(kind);
                if want != 0 && want != self.identity.hash_for(kind) {
                    return Err(BundleError::IdentityMismatch);
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------

    /// Encode the bundle to bytes.
    ///
    /// The layout is fixed: magic, `TIME` chunk, known chunks in kind
    /// order, foreign chunks in preservation order. Encoding the same
    /// in-memory bundle twice yields identical bytes.
    pub fn encode(&self) -> Result<Vec<u8>, BundleError> {
        let mut out = Vec::new();
        out.extend_from_slice(&BUNDLE_MAGIC);
        write_chunk(&mut out, TIME_TAG, 1, 0, &encode_identity(&self.identity)?)?;
        for kind in CHUNK_KINDS {
            if let Some(chunk) = self.chunks.get(kind.index()).and_then(Option::as_ref) {
                write_chunk(&mut out, kind.tag(), chunk.version, 0, &chunk.payload)?;
            }
        }
        for foreign in &self.foreign {
            let mut framed = Vec::with_capacity(foreign.payload.len().saturating_add(4));
            framed.extend_from_slice(&foreign.type_id.to_le_bytes());
            framed.extend_from_slice(&foreign.payload);
            write_chunk(&mut out, FOREIGN_TAG, foreign.version, foreign.flags, &framed)?;
        }
        Ok(out)
    }

    /// Decode and validate a bundle.
    ///
    /// Unknown chunk tags are preserved as foreign chunks. The decoded
    /// bundle is validated against its own declarations and the
    /// caller's expectation before being returned.
    pub fn decode(bytes: &[u8], expected: Option<&BundleIdentity>) -> Result<Self, BundleError> {
        let mut reader = Reader::new(bytes);
        if reader.take(4)? != BUNDLE_MAGIC.as_slice() {
            return Err(BundleError::InvalidFormat {
                reason: "bad magic",
            });
        }
        let mut bundle = Self::new();
        let mut saw_time = false;
        while !reader.done() {
            let tag: [u8; 4] = reader
                .take(4)?
                .try_into()
                .map_err(|_| BundleError::InvalidFormat { reason: "tag" })?;
            let version = reader.u16()?;
            let flags = reader.u16()?;
            let len = reader.u32()? as usize;
            let payload = reader.take(len)?;
            if tag == TIME_TAG {
                bundle.identity = decode_identity(payload)?;
                saw_time = true;
            } else if tag == FOREIGN_TAG {
                let mut inner = Reader::new(payload);
                let type_id = inner.u32()?;
                let body = inner.rest();
                bundle.foreign.push(ForeignChunk {
                    type_id,
                    version,
                    flags,
                    payload: body.to_vec(),
                });
            } else if let Some(kind) = ChunkKind::from_tag(tag) {
                if let Some(slot) = bundle.chunks.get_mut(kind.index()) {
                    *slot = Some(KnownChunk {
                        version,
                        payload: payload.to_vec(),
                    });
                }
            } else {
                // An unrecognized known-style chunk: preserve it
                // verbatim under its own tag as type id.
                bundle.foreign.push(ForeignChunk {
                    type_id: u32::from_le_bytes(tag),
                    version,
                    flags,
                    payload: payload.to_vec(),
                });
            }
        }
        if !saw_time {
            return Err(BundleError::InvalidFormat {
                reason: "missing TIME chunk",
            });
        }
        bundle.validate(expected)?;
        Ok(bundle)
    }
}

// ---------------------------------------------------------------------------
// Identity TLV encoding
// ---------------------------------------------------------------------------

const TLV_UNIVERSE_ID: u16 = 0x0001;
const TLV_INSTANCE_ID: u16 = 0x0002;
const TLV_CONTENT_HASH: u16 = 0x0003;
const TLV_SIM_FLAGS_HASH: u16 = 0x0004;
const TLV_UPS: u16 = 0x0005;
const TLV_TICK_INDEX: u16 = 0x0006;
const TLV_FEATURE_EPOCH: u16 = 0x0007;
const TLV_PAYLOAD_HASH_BASE: u16 = 0x0008;

fn encode_identity(identity: &BundleIdentity) -> Result<Vec<u8>, BundleError> {
    let mut out = Vec::new();
    write_tlv(&mut out, TLV_UNIVERSE_ID, identity.universe_id.as_bytes())?;
    write_tlv(&mut out, TLV_INSTANCE_ID, identity.instance_id.as_bytes())?;
    write_tlv(&mut out, TLV_CONTENT_HASH, &identity.content_graph_hash.to_le_bytes())?;
    write_tlv(&mut out, TLV_SIM_FLAGS_HASH, &identity.sim_flags_hash.to_le_bytes())?;
    write_tlv(&mut out, TLV_UPS, &identity.ups.to_le_bytes())?;
    write_tlv(&mut out, TLV_TICK_INDEX, &identity.tick_index.to_le_bytes())?;
    write_tlv(&mut out, TLV_FEATURE_EPOCH, &identity.feature_epoch.to_le_bytes())?;
    for kind in CHUNK_KINDS {
        let tag = TLV_PAYLOAD_HASH_BASE + u16::try_from(kind.index()).unwrap_or(0);
        write_tlv(&mut out, tag, &identity.hash_for(kind).to_le_bytes())?;
    }
    Ok(out)
}

fn decode_identity(bytes: &[u8]) -> Result<BundleIdentity, BundleError> {
    let mut identity = BundleIdentity {
        ups: 0,
        feature_epoch: 0,
        ..BundleIdentity::default()
    };
    let mut reader = Reader::new(bytes);
    while !reader.done() {
        let tag = reader.u16()?;
        let len = reader.u32()? as usize;
        let value = reader.take(len)?;
        match tag {
            TLV_UNIVERSE_ID => {
                identity.universe_id = String::from_utf8(value.to_vec())
                    .map_err(|_| BundleError::InvalidFormat { reason: "universe id" })?;
            }
            TLV_INSTANCE_ID => {
                identity.instance_id = String::from_utf8(value.to_vec())
                    .map_err(|_| BundleError::InvalidFormat { reason: "instance id" })?;
            }
            TLV_CONTENT_HASH => identity.content_graph_hash = read_u64(value)?,
            TLV_SIM_FLAGS_HASH => identity.sim_flags_hash = read_u64(value)?,
            TLV_UPS => identity.ups = read_u32(value)?,
            TLV_TICK_INDEX => identity.tick_index = read_u64(value)?,
            TLV_FEATURE_EPOCH => identity.feature_epoch = read_u32(value)?,
            _ => {
                let hash_index = tag.checked_sub(TLV_PAYLOAD_HASH_BASE).map(usize::from);
                if let Some(idx) = hash_index {
                    if let Some(slot) = identity.payload_hashes.get_mut(idx) {
                        *slot = read_u64(value)?;
                    }
                }
                // Unknown identity fields are skipped, not refused.
            }
        }
    }
    Ok(identity)
}

// ---------------------------------------------------------------------------
// Little-endian plumbing
// ---------------------------------------------------------------------------

fn write_chunk(
    out: &mut Vec<u8>,
    tag: [u8; 4],
    version: u16,
    flags: u16,
    payload: &[u8],
) -> Result<(), BundleError> {
    let len = u32::try_from(payload.len()).map_err(|_| BundleError::PayloadTooLarge)?;
    out.extend_from_slice(&tag);
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

fn write_tlv(out: &mut Vec<u8>, tag: u16, value: &[u8]) -> Result<(), BundleError> {
    let len = u32::try_from(value.len()).map_err(|_| BundleError::PayloadTooLarge)?;
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(value);
    Ok(())
}

fn read_u32(value: &[u8]) -> Result<u32, BundleError> {
    let bytes: [u8; 4] = value
        .try_into()
        .map_err(|_| BundleError::InvalidFormat { reason: "u32 field" })?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64(value: &[u8]) -> Result<u64, BundleError> {
    let bytes: [u8; 8] = value
        .try_into()
        .map_err(|_| BundleError::InvalidFormat { reason: "u64 field" })?;
    Ok(u64::from_le_bytes(bytes))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn done(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], BundleError> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(BundleError::InvalidFormat { reason: "overflow" })?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(BundleError::InvalidFormat { reason: "truncated" })?;
        self.pos = end;
        Ok(slice)
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = self.bytes.get(self.pos..).unwrap_or(&[]);
        self.pos = self.bytes.len();
        slice
    }

    fn u16(&mut self) -> Result<u16, BundleError> {
        let bytes: [u8; 2] = self
            .take(2)?
            .try_into()
            .map_err(|_| BundleError::InvalidFormat { reason: "u16" })?;
        Ok(u16::from_le_bytes(bytes))
    }

    fn u32(&mut self) -> Result<u32, BundleError> {
        let bytes: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| BundleError::InvalidFormat { reason: "u32" })?;
        Ok(u32::from_le_bytes(bytes))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_bundle() -> UniverseBundle {
        let mut bundle = UniverseBundle::new();
        bundle.set_identity(BundleIdentity {
            universe_id: String::from("u1"),
            instance_id: String::from("inst1"),
            content_graph_hash: 0x1122_3344_5566_7788,
            sim_flags_hash: 0x8899_aabb_ccdd_eeff,
            ups: 60,
            tick_index: 42,
            feature_epoch: FEATURE_EPOCH_CURRENT,
            payload_hashes: [0; CHUNK_KIND_COUNT],
        });
        bundle.set_chunk(ChunkKind::Cosmo, 1, b"cosmo-graph-payload");
        bundle.set_chunk(ChunkKind::Bodies, 2, b"bodies");
        bundle.add_foreign(0x4E52_4F46, 3, 7, b"mystery bytes");
        bundle.refresh_payload_hashes();
        bundle
    }

    #[test]
    fn save_load_save_is_byte_identical() {
        let bundle = sample_bundle();
        let first = bundle.encode().unwrap();
        let loaded = UniverseBundle::decode(&first, None).unwrap();
        let second = loaded.encode().unwrap();
        assert_eq!(first, second);
        assert_eq!(loaded, bundle);
    }

    #[test]
    fn tampered_payload_is_an_identity_mismatch() {
        let bundle = sample_bundle();
        let mut tampered = bundle;
        tampered.set_chunk(ChunkKind::Cosmo, 1, b"cosmo-graph-PAYLOAD");
        // The identity still declares the old digest.
        let bytes = tampered.encode().unwrap();
        assert_eq!(
            UniverseBundle::decode(&bytes, None).unwrap_err(),
            BundleError::IdentityMismatch
        );
    }

    #[test]
    fn unsupported_epoch_requires_migration() {
        let mut bundle = sample_bundle();
        let mut identity = bundle.identity().clone();
        identity.feature_epoch = FEATURE_EPOCH_CURRENT + 1;
        bundle.set_identity(identity);
        let bytes = bundle.encode().unwrap();
        assert_eq!(
            UniverseBundle::decode(&bytes, None).unwrap_err(),
            BundleError::MigrationRequired {
                found: FEATURE_EPOCH_CURRENT + 1,
                supported: FEATURE_EPOCH_CURRENT,
            }
        );
    }

    #[test]
    fn expectation_epoch_mismatch_requires_migration() {
        let bundle = sample_bundle();
        let bytes = bundle.encode().unwrap();
        let mut expected = bundle.identity().clone();
        expected.feature_epoch = FEATURE_EPOCH_CURRENT + 1;
        assert_eq!(
            UniverseBundle::decode(&bytes, Some(&expected)).unwrap_err(),
            BundleError::MigrationRequired {
                found: FEATURE_EPOCH_CURRENT,
                supported: FEATURE_EPOCH_CURRENT + 1,
            }
        );
    }

    #[test]
    fn expectation_identity_mismatch_refuses() {
        let bundle = sample_bundle();
        let bytes = bundle.encode().unwrap();
        let mut expected = bundle.identity().clone();
        expected.instance_id = String::from("other");
        assert_eq!(
            UniverseBundle::decode(&bytes, Some(&expected)).unwrap_err(),
            BundleError::IdentityMismatch
        );
        // The true identity loads cleanly.
        let expected = bundle.identity().clone();
        assert!(UniverseBundle::decode(&bytes, Some(&expected)).is_ok());
    }

    #[test]
    fn foreign_chunks_survive_round_trips() {
        let bundle = sample_bundle();
        let bytes = bundle.encode().unwrap();
        let loaded = UniverseBundle::decode(&bytes, None).unwrap();
        let foreign = loaded.foreign();
        assert_eq!(foreign.len(), 1);
        let chunk = foreign.first().unwrap();
        assert_eq!(chunk.type_id, 0x4E52_4F46);
        assert_eq!(chunk.version, 3);
        assert_eq!(chunk.flags, 7);
        assert_eq!(chunk.payload, b"mystery bytes");
    }

    #[test]
    fn unknown_known_style_chunks_are_preserved() {
        let bundle = sample_bundle();
        let mut bytes = bundle.encode().unwrap();
        // Append a chunk with an unknown tag.
        write_chunk(&mut bytes, *b"XNEW", 9, 1, b"future data").unwrap();
        let loaded = UniverseBundle::decode(&bytes, None).unwrap();
        assert_eq!(loaded.foreign().len(), 2);
        let preserved = loaded.foreign().get(1).unwrap();
        assert_eq!(preserved.type_id, u32::from_le_bytes(*b"XNEW"));
        assert_eq!(preserved.payload, b"future data");
        // And it survives the next save.
        let again = loaded.encode().unwrap();
        let reloaded = UniverseBundle::decode(&again, None).unwrap();
        assert_eq!(reloaded.foreign().len(), 2);
    }

    #[test]
    fn missing_time_chunk_is_invalid() {
        let bytes = BUNDLE_MAGIC.to_vec();
        assert_eq!(
            UniverseBundle::decode(&bytes, None).unwrap_err(),
            BundleError::InvalidFormat {
                reason: "missing TIME chunk"
            }
        );
    }

    #[test]
    fn declared_hash_without_payload_refuses() {
        let mut bundle = sample_bundle();
        let mut identity = bundle.identity().clone();
        identity.set_hash(ChunkKind::Routes, 0xDEAD);
        bundle.set_identity(identity);
        assert_eq!(bundle.validate(None).unwrap_err(), BundleError::IdentityMismatch);
    }
}
