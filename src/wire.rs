// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// FlatBuffer envelope for calls and replies.
//
// Schema (kept in sync by hand; there is no flatc step in the build):
//
//   table Value    { kind: ubyte; int: long; uint: ulong; float: double;
//                    str: string; bin: [ubyte]; }
//   table Envelope { id: ulong; kind: ubyte; class: string; method: string;
//                    values: [Value]; }
//   root_type Envelope;
//   file_identifier "OBSB";
//
// The table accessors below follow the shape of flatc's Rust output.

use flatbuffers::{
    FlatBufferBuilder, Follow, ForwardsUOffset, InvalidFlatbuffer, Table, VOffsetT, Vector,
    Verifiable, Verifier, WIPOffset,
};

use crate::transport::IpcBuffer;
use crate::value::{Kind, TypedValue};

/// 4-byte file identifier stamped on every envelope.
pub const FILE_ID: &str = "OBSB";

/// Root offset + file identifier.
const MIN_FRAME: usize = 8;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("frame too short ({0} bytes)")]
    TooShort(usize),
    #[error("frame does not carry the OBSB identifier")]
    BadIdentifier,
    #[error("malformed frame: {0}")]
    Malformed(#[from] InvalidFlatbuffer),
    #[error("unknown envelope kind {0}")]
    UnknownEnvelope(u8),
    #[error("value {index}: unknown kind tag {tag}")]
    UnknownKind { index: usize, tag: u8 },
    #[error("value {index}: {kind} payload out of range")]
    OutOfRange { index: usize, kind: Kind },
}

// ---------------------------------------------------------------------------
// Envelope: owned, decoded form of a frame
// ---------------------------------------------------------------------------

/// What a frame asks the receiver to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnvelopeKind {
    /// A call whose sender waits for a `Reply` with the same id.
    Call = 0,
    /// A fire-and-forget call; no reply is produced.
    Post = 1,
    Reply = 2,
}

impl EnvelopeKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Call),
            1 => Some(Self::Post),
            2 => Some(Self::Reply),
            _ => None,
        }
    }
}

/// A decoded call or reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub id: u64,
    pub kind: EnvelopeKind,
    pub class: String,
    pub method: String,
    pub values: Vec<TypedValue>,
}

impl Envelope {
    pub fn call(id: u64, class: &str, method: &str, values: Vec<TypedValue>) -> Self {
        Self {
            id,
            kind: EnvelopeKind::Call,
            class: class.to_owned(),
            method: method.to_owned(),
            values,
        }
    }

    pub fn post(class: &str, method: &str, values: Vec<TypedValue>) -> Self {
        Self {
            id: 0,
            kind: EnvelopeKind::Post,
            class: class.to_owned(),
            method: method.to_owned(),
            values,
        }
    }

    pub fn reply(id: u64, values: Vec<TypedValue>) -> Self {
        Self {
            id,
            kind: EnvelopeKind::Reply,
            class: String::new(),
            method: String::new(),
            values,
        }
    }
}

// ---------------------------------------------------------------------------
// Value table
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct ValueTable<'a> {
    tab: Table<'a>,
}

impl<'a> Follow<'a> for ValueTable<'a> {
    type Inner = ValueTable<'a>;
    #[inline]
    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        Self {
            tab: Table::new(buf, loc),
        }
    }
}

impl<'a> ValueTable<'a> {
    const VT_KIND: VOffsetT = 4;
    const VT_INT: VOffsetT = 6;
    const VT_UINT: VOffsetT = 8;
    const VT_FLOAT: VOffsetT = 10;
    const VT_STR: VOffsetT = 12;
    const VT_BIN: VOffsetT = 14;

    // Safety (all accessors): the table was produced by a verified root, and
    // each slot holds the type declared in the schema above.

    fn kind(&self) -> u8 {
        unsafe { self.tab.get::<u8>(Self::VT_KIND, Some(0)).unwrap_or(0) }
    }

    fn int(&self) -> i64 {
        unsafe { self.tab.get::<i64>(Self::VT_INT, Some(0)).unwrap_or(0) }
    }

    fn uint(&self) -> u64 {
        unsafe { self.tab.get::<u64>(Self::VT_UINT, Some(0)).unwrap_or(0) }
    }

    fn float(&self) -> f64 {
        unsafe { self.tab.get::<f64>(Self::VT_FLOAT, Some(0.0)).unwrap_or(0.0) }
    }

    fn str_(&self) -> Option<&'a str> {
        unsafe { self.tab.get::<ForwardsUOffset<&str>>(Self::VT_STR, None) }
    }

    fn bin(&self) -> Option<Vector<'a, u8>> {
        unsafe {
            self.tab
                .get::<ForwardsUOffset<Vector<'a, u8>>>(Self::VT_BIN, None)
        }
    }
}

impl Verifiable for ValueTable<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<u8>("kind", Self::VT_KIND, false)?
            .visit_field::<i64>("int", Self::VT_INT, false)?
            .visit_field::<u64>("uint", Self::VT_UINT, false)?
            .visit_field::<f64>("float", Self::VT_FLOAT, false)?
            .visit_field::<ForwardsUOffset<&str>>("str", Self::VT_STR, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, u8>>>("bin", Self::VT_BIN, false)?
            .finish();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Envelope table
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct EnvelopeTable<'a> {
    tab: Table<'a>,
}

impl<'a> Follow<'a> for EnvelopeTable<'a> {
    type Inner = EnvelopeTable<'a>;
    #[inline]
    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        Self {
            tab: Table::new(buf, loc),
        }
    }
}

impl<'a> EnvelopeTable<'a> {
    const VT_ID: VOffsetT = 4;
    const VT_KIND: VOffsetT = 6;
    const VT_CLASS: VOffsetT = 8;
    const VT_METHOD: VOffsetT = 10;
    const VT_VALUES: VOffsetT = 12;

    fn id(&self) -> u64 {
        unsafe { self.tab.get::<u64>(Self::VT_ID, Some(0)).unwrap_or(0) }
    }

    fn kind(&self) -> u8 {
        unsafe { self.tab.get::<u8>(Self::VT_KIND, Some(0)).unwrap_or(0) }
    }

    fn class(&self) -> Option<&'a str> {
        unsafe { self.tab.get::<ForwardsUOffset<&str>>(Self::VT_CLASS, None) }
    }

    fn method(&self) -> Option<&'a str> {
        unsafe { self.tab.get::<ForwardsUOffset<&str>>(Self::VT_METHOD, None) }
    }

    fn values(&self) -> Option<Vector<'a, ForwardsUOffset<ValueTable<'a>>>> {
        unsafe {
            self.tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<ValueTable<'a>>>>>(
                    Self::VT_VALUES,
                    None,
                )
        }
    }
}

impl Verifiable for EnvelopeTable<'_> {
    #[inline]
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<u64>("id", Self::VT_ID, false)?
            .visit_field::<u8>("kind", Self::VT_KIND, false)?
            .visit_field::<ForwardsUOffset<&str>>("class", Self::VT_CLASS, false)?
            .visit_field::<ForwardsUOffset<&str>>("method", Self::VT_METHOD, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<ValueTable<'_>>>>>(
                "values",
                Self::VT_VALUES,
                false,
            )?
            .finish();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builder: wraps FlatBufferBuilder for envelope construction
// ---------------------------------------------------------------------------

/// Reusable encoder for [`Envelope`] frames.
///
/// Usage:
/// ```ignore
/// let mut b = Builder::new(256);
/// b.encode(&Envelope::post("API", "SetUsername", vec!["streamer".into()]));
/// transport.send(b.data(), 0)?;
/// ```
pub struct Builder {
    fbb: FlatBufferBuilder<'static>,
    finished: bool,
}

impl Builder {
    pub fn new(initial_size: usize) -> Self {
        Self {
            fbb: FlatBufferBuilder::with_capacity(initial_size),
            finished: false,
        }
    }

    /// Encode `env`, replacing whatever the builder held before.
    pub fn encode(&mut self, env: &Envelope) -> &[u8] {
        self.clear();

        let offsets: Vec<WIPOffset<ValueTable<'static>>> = env
            .values
            .iter()
            .map(|v| push_value(&mut self.fbb, v))
            .collect();
        let values = self.fbb.create_vector(offsets.as_slice());
        let class = self.fbb.create_string(&env.class);
        let method = self.fbb.create_string(&env.method);

        let start = self.fbb.start_table();
        self.fbb.push_slot::<u64>(EnvelopeTable::VT_ID, env.id, 0);
        self.fbb.push_slot::<u8>(EnvelopeTable::VT_KIND, env.kind as u8, 0);
        self.fbb
            .push_slot_always::<WIPOffset<_>>(EnvelopeTable::VT_CLASS, class);
        self.fbb
            .push_slot_always::<WIPOffset<_>>(EnvelopeTable::VT_METHOD, method);
        self.fbb
            .push_slot_always::<WIPOffset<_>>(EnvelopeTable::VT_VALUES, values);
        let end = self.fbb.end_table(start);
        let root: WIPOffset<EnvelopeTable<'static>> = WIPOffset::new(end.value());

        self.fbb.finish(root, Some(FILE_ID));
        self.finished = true;
        self.data()
    }

    /// The finished frame. Empty until [`encode`](Self::encode) has run.
    pub fn data(&self) -> &[u8] {
        if !self.finished {
            return &[];
        }
        self.fbb.finished_data()
    }

    pub fn size(&self) -> usize {
        self.data().len()
    }

    /// Reset the builder for reuse.
    pub fn clear(&mut self) {
        self.fbb.reset();
        self.finished = false;
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new(256)
    }
}

fn push_value(
    fbb: &mut FlatBufferBuilder<'static>,
    value: &TypedValue,
) -> WIPOffset<ValueTable<'static>> {
    // Child objects must be written before the table is started.
    // Empty strings and blobs leave the slot absent.
    let str_off = match value {
        TypedValue::String(s) if !s.is_empty() => Some(fbb.create_string(s)),
        _ => None,
    };
    let bin_off = match value {
        TypedValue::Binary(b) if !b.is_empty() => Some(fbb.create_vector(b.as_slice())),
        _ => None,
    };

    let start = fbb.start_table();
    fbb.push_slot::<u8>(ValueTable::VT_KIND, value.kind().tag(), 0);
    match *value {
        TypedValue::Int32(v) => fbb.push_slot::<i64>(ValueTable::VT_INT, i64::from(v), 0),
        TypedValue::Int64(v) => fbb.push_slot::<i64>(ValueTable::VT_INT, v, 0),
        TypedValue::UInt32(v) => fbb.push_slot::<u64>(ValueTable::VT_UINT, u64::from(v), 0),
        TypedValue::UInt64(v) => fbb.push_slot::<u64>(ValueTable::VT_UINT, v, 0),
        TypedValue::Float64(v) => fbb.push_slot::<f64>(ValueTable::VT_FLOAT, v, 0.0),
        TypedValue::String(_) | TypedValue::Binary(_) => {}
    }
    if let Some(off) = str_off {
        fbb.push_slot_always::<WIPOffset<_>>(ValueTable::VT_STR, off);
    }
    if let Some(off) = bin_off {
        fbb.push_slot_always::<WIPOffset<_>>(ValueTable::VT_BIN, off);
    }
    let end = fbb.end_table(start);
    WIPOffset::new(end.value())
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Encode an envelope into an owned frame.
pub fn encode(env: &Envelope) -> IpcBuffer {
    let mut b = Builder::default();
    IpcBuffer::from_slice(b.encode(env))
}

/// Verify and decode a frame.
pub fn decode(data: &[u8]) -> Result<Envelope, WireError> {
    if data.len() < MIN_FRAME {
        return Err(WireError::TooShort(data.len()));
    }
    if !flatbuffers::buffer_has_identifier(data, FILE_ID, false) {
        return Err(WireError::BadIdentifier);
    }
    let env = flatbuffers::root::<EnvelopeTable>(data)?;

    let kind = EnvelopeKind::from_tag(env.kind()).ok_or(WireError::UnknownEnvelope(env.kind()))?;
    let mut values = Vec::new();
    if let Some(vs) = env.values() {
        values.reserve(vs.len());
        for (index, v) in vs.iter().enumerate() {
            values.push(read_value(index, &v)?);
        }
    }

    Ok(Envelope {
        id: env.id(),
        kind,
        class: env.class().unwrap_or_default().to_owned(),
        method: env.method().unwrap_or_default().to_owned(),
        values,
    })
}

fn read_value(index: usize, v: &ValueTable<'_>) -> Result<TypedValue, WireError> {
    let tag = v.kind();
    let kind = Kind::from_tag(tag).ok_or(WireError::UnknownKind { index, tag })?;
    let out_of_range = || WireError::OutOfRange { index, kind };

    Ok(match kind {
        Kind::Int32 => TypedValue::Int32(i32::try_from(v.int()).map_err(|_| out_of_range())?),
        Kind::UInt32 => TypedValue::UInt32(u32::try_from(v.uint()).map_err(|_| out_of_range())?),
        Kind::Int64 => TypedValue::Int64(v.int()),
        Kind::UInt64 => TypedValue::UInt64(v.uint()),
        Kind::Float64 => TypedValue::Float64(v.float()),
        // An absent string slot is the empty string, never an error.
        Kind::String => TypedValue::String(v.str_().unwrap_or_default().to_owned()),
        Kind::Binary => TypedValue::Binary(v.bin().map(|b| b.iter().collect()).unwrap_or_default()),
    })
}
