//! DNS message codec.
//!
//! Supports exactly what an authoritative A/TXT responder needs: the 12 byte header, the
//! question section and the answer section. Authority and additional sections are never read
//! and always written with zero counts. There is no EDNS and no TCP length framing, every
//! buffer is one already delimited UDP payload.
//!
//! Names are decompressed on input (following at most [`MAX_POINTER_HOPS`] pointers) and always
//! written uncompressed.

use crate::error::Error;
use std::net::Ipv4Addr;

/// Length of the fixed DNS header.
pub const HEADER_LEN: usize = 12;

/// Maximum number of compression pointers followed while reading a single name.
pub const MAX_POINTER_HOPS: usize = 5;

pub const TYPE_A: u16 = 1;
pub const TYPE_TXT: u16 = 16;
pub const CLASS_IN: u16 = 1;

const POINTER_MASK: u8 = 0xC0;
const MAX_LABEL_LEN: usize = 63;
const MAX_TXT_LEN: usize = 255;

/// The 16 bit header flag word: QR, Opcode, AA, TC, RD, RA, Z and RCODE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(u16);

impl Flags {
    pub const QR: u16 = 0x8000;
    pub const AA: u16 = 0x0400;
    pub const TC: u16 = 0x0200;
    pub const RD: u16 = 0x0100;
    pub const RA: u16 = 0x0080;
    const OPCODE_MASK: u16 = 0x7800;
    const RCODE_MASK: u16 = 0x000F;

    #[must_use]
    pub fn new(bits: u16) -> Self {
        Flags(bits)
    }

    #[must_use]
    pub fn bits(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn is_response(self) -> bool {
        self.0 & Self::QR != 0
    }

    #[must_use]
    pub fn authoritative(self) -> bool {
        self.0 & Self::AA != 0
    }

    #[must_use]
    pub fn truncated(self) -> bool {
        self.0 & Self::TC != 0
    }

    #[must_use]
    pub fn recursion_desired(self) -> bool {
        self.0 & Self::RD != 0
    }

    #[must_use]
    pub fn recursion_available(self) -> bool {
        self.0 & Self::RA != 0
    }

    #[must_use]
    pub fn opcode(self) -> u8 {
        // Masked to 4 bits, the cast can't truncate.
        #[allow(clippy::cast_possible_truncation)]
        let opcode = ((self.0 & Self::OPCODE_MASK) >> 11) as u8;
        opcode
    }

    #[must_use]
    pub fn response_code(self) -> u16 {
        self.0 & Self::RCODE_MASK
    }

    /// Return a copy with the bits in `mask` set or cleared.
    #[must_use]
    pub fn with(self, mask: u16, on: bool) -> Self {
        if on {
            Flags(self.0 | mask)
        } else {
            Flags(self.0 & !mask)
        }
    }

    /// Return a copy carrying the low four bits of `rcode` as its RCODE.
    #[must_use]
    pub fn with_response_code(self, rcode: u16) -> Self {
        Flags((self.0 & !Self::RCODE_MASK) | (rcode & Self::RCODE_MASK))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Dot separated labels without a trailing dot, casing as received.
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl Question {
    #[must_use]
    pub fn new(name: impl Into<String>, qtype: u16) -> Self {
        Question {
            name: name.into(),
            qtype,
            qclass: CLASS_IN,
        }
    }
}

/// Record payload. Only A and TXT are understood, anything else decodes as `Empty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    A(Ipv4Addr),
    /// A single character-string. Several TXT values are several records.
    Txt(String),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub rtype: u16,
    pub class: u16,
    pub ttl: u32,
    pub data: RecordData,
}

impl ResourceRecord {
    #[must_use]
    pub fn a(name: impl Into<String>, ttl: u32, addr: Ipv4Addr) -> Self {
        ResourceRecord {
            name: name.into(),
            rtype: TYPE_A,
            class: CLASS_IN,
            ttl,
            data: RecordData::A(addr),
        }
    }

    #[must_use]
    pub fn txt(name: impl Into<String>, ttl: u32, text: impl Into<String>) -> Self {
        ResourceRecord {
            name: name.into(),
            rtype: TYPE_TXT,
            class: CLASS_IN,
            ttl,
            data: RecordData::Txt(text.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub id: u16,
    pub flags: Flags,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
}

impl Message {
    /// Decode a query (or response) packet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPacket`] when the buffer is shorter than a header or a field
    /// runs past the end of the buffer, and [`Error::CompressionLoop`] when a name follows too
    /// many compression pointers.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::MalformedPacket("header too short"));
        }
        let mut reader = Reader::new(bytes);
        let id = reader.u16()?;
        let flags = Flags(reader.u16()?);
        let question_count = reader.u16()?;
        let answer_count = reader.u16()?;
        // Authority and additional counts are not used.
        reader.skip(4)?;

        let mut questions = Vec::with_capacity(usize::from(question_count.min(16)));
        for _ in 0..question_count {
            let name = reader.name()?;
            let qtype = reader.u16()?;
            let qclass = reader.u16()?;
            questions.push(Question {
                name,
                qtype,
                qclass,
            });
        }

        let mut answers = Vec::with_capacity(usize::from(answer_count.min(16)));
        for _ in 0..answer_count {
            answers.push(reader.record()?);
        }

        Ok(Message {
            id,
            flags,
            questions,
            answers,
        })
    }

    /// Encode the message. Section counts come from the list lengths, authority and additional
    /// counts are zero, and names are never compressed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NameEncoding`] for names that can't be written as labels,
    /// [`Error::TxtTooLong`] for TXT strings over 255 bytes, and [`Error::MalformedPacket`] when
    /// a section holds more entries than its 16 bit count can describe.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let question_count = u16::try_from(self.questions.len())
            .map_err(|_| Error::MalformedPacket("too many questions"))?;
        let answer_count = u16::try_from(self.answers.len())
            .map_err(|_| Error::MalformedPacket("too many answers"))?;

        let mut out = Vec::with_capacity(512);
        out.extend_from_slice(&self.id.to_be_bytes());
        out.extend_from_slice(&self.flags.bits().to_be_bytes());
        out.extend_from_slice(&question_count.to_be_bytes());
        out.extend_from_slice(&answer_count.to_be_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]);

        for question in &self.questions {
            write_name(&mut out, &question.name)?;
            out.extend_from_slice(&question.qtype.to_be_bytes());
            out.extend_from_slice(&question.qclass.to_be_bytes());
        }

        for answer in &self.answers {
            write_name(&mut out, &answer.name)?;
            out.extend_from_slice(&answer.rtype.to_be_bytes());
            out.extend_from_slice(&answer.class.to_be_bytes());
            out.extend_from_slice(&answer.ttl.to_be_bytes());
            let rdata = encode_rdata(&answer.data)?;
            // At most 256 bytes, always fits.
            #[allow(clippy::cast_possible_truncation)]
            let rdata_len = rdata.len() as u16;
            out.extend_from_slice(&rdata_len.to_be_bytes());
            out.extend_from_slice(&rdata);
        }

        Ok(out)
    }
}

/// Best-effort read of the transaction id and flags from a packet that may not parse.
#[must_use]
pub fn peek_header(bytes: &[u8]) -> (Option<u16>, Option<Flags>) {
    let id = bytes
        .get(0..2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]));
    let flags = bytes
        .get(2..4)
        .map(|b| Flags(u16::from_be_bytes([b[0], b[1]])));
    (id, flags)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(Error::MalformedPacket("read past end of packet"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.take(len).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, Error> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, Error> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a possibly compressed name. After following pointers the cursor is left just past
    /// the first pointer, so the fields after the name are read from the right place.
    fn name(&mut self) -> Result<String, Error> {
        let mut name = String::new();
        let mut jumped = false;
        let mut return_pos = self.pos;
        let mut hops = 0;

        loop {
            let len = self.u8()?;
            if len == 0 {
                break;
            }

            match len & POINTER_MASK {
                POINTER_MASK => {
                    let low = self.u8()?;
                    if !jumped {
                        return_pos = self.pos;
                        jumped = true;
                    }
                    hops += 1;
                    if hops > MAX_POINTER_HOPS {
                        return Err(Error::CompressionLoop);
                    }
                    self.pos = (usize::from(len & !POINTER_MASK) << 8) | usize::from(low);
                }
                0 => {
                    let label = self.take(usize::from(len))?;
                    if !name.is_empty() {
                        name.push('.');
                    }
                    name.extend(label.iter().copied().map(char::from));
                }
                _ => return Err(Error::MalformedPacket("reserved label type")),
            }
        }

        if jumped {
            self.pos = return_pos;
        }
        Ok(name)
    }

    fn record(&mut self) -> Result<ResourceRecord, Error> {
        let name = self.name()?;
        let rtype = self.u16()?;
        let class = self.u16()?;
        let ttl = self.u32()?;
        let rdata_len = usize::from(self.u16()?);
        let rdata = self.take(rdata_len)?;

        let data = match (rtype, rdata) {
            (TYPE_A, [a, b, c, d]) => RecordData::A(Ipv4Addr::new(*a, *b, *c, *d)),
            (TYPE_TXT, [text_len, rest @ ..]) => {
                let text = rest
                    .get(..usize::from(*text_len))
                    .ok_or(Error::MalformedPacket("TXT string longer than record data"))?;
                RecordData::Txt(text.iter().copied().map(char::from).collect())
            }
            _ => RecordData::Empty,
        };

        Ok(ResourceRecord {
            name,
            rtype,
            class,
            ttl,
            data,
        })
    }
}

/// Names and TXT strings are carried one byte per char, so anything up to U+00FF survives a
/// decode/encode round trip.
fn latin1_bytes(s: &str) -> Option<Vec<u8>> {
    s.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
}

fn write_name(out: &mut Vec<u8>, name: &str) -> Result<(), Error> {
    let name = name.strip_suffix('.').unwrap_or(name);
    if !name.is_empty() {
        for label in name.split('.') {
            let bytes = latin1_bytes(label)
                .filter(|b| !b.is_empty() && b.len() <= MAX_LABEL_LEN)
                .ok_or_else(|| Error::NameEncoding(name.to_string()))?;
            // Bounded by MAX_LABEL_LEN above.
            #[allow(clippy::cast_possible_truncation)]
            out.push(bytes.len() as u8);
            out.extend_from_slice(&bytes);
        }
    }
    out.push(0);
    Ok(())
}

fn encode_rdata(data: &RecordData) -> Result<Vec<u8>, Error> {
    match data {
        RecordData::A(addr) => Ok(addr.octets().to_vec()),
        RecordData::Txt(text) => {
            let bytes = latin1_bytes(text).ok_or(Error::TxtTooLong(text.len()))?;
            let len = u8::try_from(bytes.len()).map_err(|_| Error::TxtTooLong(bytes.len()))?;
            debug_assert!(bytes.len() <= MAX_TXT_LEN);
            let mut rdata = Vec::with_capacity(bytes.len() + 1);
            rdata.push(len);
            rdata.extend_from_slice(&bytes);
            Ok(rdata)
        }
        RecordData::Empty => Ok(Vec::new()),
    }
}
