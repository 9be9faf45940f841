//! Sealed segment file format (.hidx)
//!
//! Immutable, mmap-able segments storing per-field hash-token dictionaries
//! and delta-encoded posting lists in a compact binary format.
//!
//! ## File Format
//!
//! ```text
//! HEADER (32 bytes):
//!   magic "HIDX"            4B
//!   version                 u32 LE
//!   segment_id              u64 LE
//!   doc_count               u32 LE
//!   field_count             u32 LE
//!   field_table_offset      u64 LE    → byte offset to field table
//!
//! per field, in field-name order:
//!   TERM DICTIONARY (variable length, sorted by token bytes):
//!     per token:
//!       token_len           u16 LE
//!       token_bytes         [u8; token_len]
//!       df                  u32 LE
//!       posting_offset      u32 LE    → relative to the field's postings start
//!       posting_byte_len    u32 LE
//!   TERM OFFSET TABLE (term_count × 4 bytes):
//!     per token: offset     u32 LE    → relative to the field's dictionary start
//!   POSTINGS:
//!     per token's posting list:
//!       num_entries         u32 LE
//!       delta-encoded pairs: (delta_doc_id: varint, tf: varint)
//!
//! FIELD TABLE (field_count entries):
//!   name_len                u16 LE
//!   name_bytes              [u8; name_len]
//!   term_count              u32 LE
//!   dict_offset             u64 LE
//!   term_offsets_offset     u64 LE
//!   postings_offset         u64 LE
//! ```
//!
//! The header and field table are validated when a segment is opened.
//! Dictionary entries and postings are bounds-checked as they are read;
//! malformed bytes surface as [`HashMatchError::Corruption`].

use std::io::Write;
use std::path::Path;

use hashmatch_core::{DocId, HashMatchError, HashMatchResult};

use super::memory::MemorySegment;
use super::{PostingEntry, PostingIter, SeekState, SegmentReader, TermCursor};

/// Magic bytes for .hidx files
const HIDX_MAGIC: &[u8; 4] = b"HIDX";
/// Current format version
const HIDX_VERSION: u32 = 1;
/// Header size in bytes
const HEADER_SIZE: usize = 32;
/// Fixed bytes of a dictionary entry after the token
const DICT_ENTRY_TAIL: usize = 12;

// ============================================================================
// Varint (LEB128) Codec
// ============================================================================

/// Encode a u32 as a variable-length integer (LEB128).
pub(crate) fn encode_varint(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a varint from a byte slice, returning (value, bytes_consumed).
pub(crate) fn decode_varint(data: &[u8]) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        // fifth byte holds only the top 4 bits of a u32
        if shift == 28 && byte > 0x0F {
            return None;
        }
        value |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
        shift += 7;
        if shift >= 35 {
            return None; // overflow
        }
    }
    None // truncated
}

// ============================================================================
// SegmentData
// ============================================================================

/// Underlying storage for a sealed segment.
enum SegmentData {
    /// In-memory owned data (before mmap flush)
    Owned(Vec<u8>),
    /// Memory-mapped file data
    Mmap(memmap2::Mmap),
}

impl SegmentData {
    fn as_bytes(&self) -> &[u8] {
        match self {
            SegmentData::Owned(v) => v,
            SegmentData::Mmap(m) => m,
        }
    }
}

/// Bounds-checked little-endian reads tagged with the segment id.
#[derive(Clone, Copy)]
struct Bytes<'a> {
    data: &'a [u8],
    segment_id: u64,
}

impl<'a> Bytes<'a> {
    fn slice(&self, pos: usize, len: usize) -> HashMatchResult<&'a [u8]> {
        pos.checked_add(len)
            .and_then(|end| self.data.get(pos..end))
            .ok_or_else(|| {
                HashMatchError::corruption(
                    self.segment_id,
                    format!("read of {} bytes at offset {} past end of segment", len, pos),
                )
            })
    }

    fn u16_at(&self, pos: usize) -> HashMatchResult<u16> {
        let b = self.slice(pos, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32_at(&self, pos: usize) -> HashMatchResult<u32> {
        let b = self.slice(pos, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64_at(&self, pos: usize) -> HashMatchResult<u64> {
        let b = self.slice(pos, 8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    /// `base + delta`, failing as corruption on overflow
    fn add(&self, base: usize, delta: usize) -> HashMatchResult<usize> {
        base.checked_add(delta)
            .ok_or_else(|| HashMatchError::corruption(self.segment_id, "offset overflow"))
    }

    fn offset_at(&self, pos: usize) -> HashMatchResult<usize> {
        let v = self.u64_at(pos)?;
        usize::try_from(v)
            .map_err(|_| HashMatchError::corruption(self.segment_id, "offset exceeds usize"))
    }
}

// ============================================================================
// SealedSegment
// ============================================================================

/// Location of one field's sections inside the segment
#[derive(Debug, Clone)]
struct FieldSection {
    name: String,
    term_count: u32,
    dict_offset: usize,
    term_offsets_offset: usize,
    postings_offset: usize,
}

/// An immutable, searchable index segment.
///
/// Contains a sorted token dictionary and delta-encoded posting lists per
/// field. Can be backed by either owned memory or an mmap'd file.
pub struct SealedSegment {
    data: SegmentData,
    segment_id: u64,
    doc_count: u32,
    fields: Vec<FieldSection>,
}

impl SealedSegment {
    /// Create a sealed segment from raw bytes.
    pub fn from_bytes(data: Vec<u8>) -> HashMatchResult<Self> {
        Self::validate_and_create(SegmentData::Owned(data))
    }

    /// Load a sealed segment from an mmap'd file.
    pub fn from_mmap(path: &Path) -> HashMatchResult<Self> {
        let file = std::fs::File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        let seg = match Self::validate_and_create(SegmentData::Mmap(mmap)) {
            Ok(seg) => seg,
            Err(e) => {
                tracing::warn!(
                    target: "hashmatch::segment",
                    path = %path.display(),
                    error = %e,
                    "Failed to load sealed segment"
                );
                return Err(e);
            }
        };
        tracing::info!(
            target: "hashmatch::segment",
            segment_id = seg.segment_id,
            doc_count = seg.doc_count,
            fields = seg.fields.len(),
            "Sealed segment mapped from disk"
        );
        Ok(seg)
    }

    fn validate_and_create(data: SegmentData) -> HashMatchResult<Self> {
        let raw = data.as_bytes();
        // segment_id is unknown until the header parses
        let header = Bytes {
            data: raw,
            segment_id: 0,
        };
        if raw.len() < HEADER_SIZE {
            return Err(HashMatchError::corruption(0, "segment too small"));
        }
        if header.slice(0, 4)? != HIDX_MAGIC {
            return Err(HashMatchError::corruption(0, "bad HIDX magic"));
        }
        let version = header.u32_at(4)?;
        if version != HIDX_VERSION {
            return Err(HashMatchError::corruption(
                0,
                format!("unsupported HIDX version {}", version),
            ));
        }
        let segment_id = header.u64_at(8)?;
        let doc_count = header.u32_at(16)?;
        let field_count = header.u32_at(20)?;

        let bytes = Bytes {
            data: raw,
            segment_id,
        };
        let mut pos = bytes.offset_at(24)?;
        let mut fields = Vec::with_capacity(field_count.min(1024) as usize);
        for _ in 0..field_count {
            let name_len = bytes.u16_at(pos)? as usize;
            let name_pos = bytes.add(pos, 2)?;
            let name = std::str::from_utf8(bytes.slice(name_pos, name_len)?)
                .map_err(|_| HashMatchError::corruption(segment_id, "field name is not UTF-8"))?
                .to_string();
            pos = bytes.add(name_pos, name_len)?;
            bytes.slice(pos, 28)?;
            let section = FieldSection {
                name,
                term_count: bytes.u32_at(pos)?,
                dict_offset: bytes.offset_at(pos + 4)?,
                term_offsets_offset: bytes.offset_at(pos + 12)?,
                postings_offset: bytes.offset_at(pos + 20)?,
            };
            pos += 28;
            // Every section must start inside the segment and the offset
            // table must fit entirely
            let table_len = (section.term_count as usize)
                .checked_mul(4)
                .ok_or_else(|| HashMatchError::corruption(segment_id, "term count overflow"))?;
            bytes.slice(section.term_offsets_offset, table_len)?;
            bytes.slice(section.dict_offset, 0)?;
            bytes.slice(section.postings_offset, 0)?;
            fields.push(section);
        }

        Ok(SealedSegment {
            data,
            segment_id,
            doc_count,
            fields,
        })
    }

    /// Seal an in-memory segment into the binary format.
    pub fn seal(segment: &MemorySegment) -> SealedSegment {
        let segment_id = segment.segment_id();
        let doc_count = segment.doc_count();

        let mut buf: Vec<u8> = vec![0u8; HEADER_SIZE];
        let mut sections: Vec<FieldSection> = Vec::new();

        for field in segment.fields() {
            let mut dict_buf: Vec<u8> = Vec::new();
            let mut postings_buf: Vec<u8> = Vec::new();
            let mut term_offsets: Vec<u32> = Vec::new();

            for (token, entries) in segment.field_postings(field) {
                term_offsets.push(dict_buf.len() as u32);

                let posting_offset = postings_buf.len() as u32;
                encode_posting_list(entries, &mut postings_buf);
                let posting_byte_len = postings_buf.len() as u32 - posting_offset;

                let token_bytes = token.as_bytes();
                dict_buf.extend_from_slice(&(token_bytes.len() as u16).to_le_bytes());
                dict_buf.extend_from_slice(token_bytes);
                dict_buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
                dict_buf.extend_from_slice(&posting_offset.to_le_bytes());
                dict_buf.extend_from_slice(&posting_byte_len.to_le_bytes());
            }

            let dict_offset = buf.len();
            buf.extend_from_slice(&dict_buf);
            let term_offsets_offset = buf.len();
            for offset in &term_offsets {
                buf.extend_from_slice(&offset.to_le_bytes());
            }
            let postings_offset = buf.len();
            buf.extend_from_slice(&postings_buf);

            sections.push(FieldSection {
                name: field.to_string(),
                term_count: term_offsets.len() as u32,
                dict_offset,
                term_offsets_offset,
                postings_offset,
            });
        }

        let field_table_offset = buf.len() as u64;
        for section in &sections {
            let name = section.name.as_bytes();
            buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
            buf.extend_from_slice(name);
            buf.extend_from_slice(&section.term_count.to_le_bytes());
            buf.extend_from_slice(&(section.dict_offset as u64).to_le_bytes());
            buf.extend_from_slice(&(section.term_offsets_offset as u64).to_le_bytes());
            buf.extend_from_slice(&(section.postings_offset as u64).to_le_bytes());
        }

        // Header (32 bytes)
        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.extend_from_slice(HIDX_MAGIC);
        header.extend_from_slice(&HIDX_VERSION.to_le_bytes());
        header.extend_from_slice(&segment_id.to_le_bytes());
        header.extend_from_slice(&doc_count.to_le_bytes());
        header.extend_from_slice(&(sections.len() as u32).to_le_bytes());
        header.extend_from_slice(&field_table_offset.to_le_bytes());
        debug_assert_eq!(header.len(), HEADER_SIZE);
        buf[..HEADER_SIZE].copy_from_slice(&header);

        SealedSegment {
            data: SegmentData::Owned(buf),
            segment_id,
            doc_count,
            fields: sections,
        }
    }

    /// Raw segment bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// Number of distinct tokens in a field
    pub fn term_count(&self, field: &str) -> u32 {
        self.field(field).map(|f| f.term_count).unwrap_or(0)
    }

    /// Write this segment's data to a file (atomic temp+rename).
    pub fn write_to_file(&self, path: &Path) -> HashMatchResult<()> {
        let dir = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)?;
        let tmp_path = path.with_extension("hidx.tmp");
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(self.data.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;
        tracing::info!(
            target: "hashmatch::segment",
            segment_id = self.segment_id,
            bytes = self.data.as_bytes().len(),
            path = %path.display(),
            "Sealed segment written to disk"
        );
        Ok(())
    }

    fn field(&self, name: &str) -> Option<&FieldSection> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn bytes(&self) -> Bytes<'_> {
        Bytes {
            data: self.data.as_bytes(),
            segment_id: self.segment_id,
        }
    }
}

impl SegmentReader for SealedSegment {
    fn segment_id(&self) -> u64 {
        self.segment_id
    }

    fn doc_count(&self) -> u32 {
        self.doc_count
    }

    fn terms(&self, field: &str) -> HashMatchResult<Option<Box<dyn TermCursor + '_>>> {
        Ok(self
            .field(field)
            .filter(|f| f.term_count > 0)
            .map(|section| {
                Box::new(SealedTermCursor {
                    bytes: self.bytes(),
                    section,
                    seek: SeekState::default(),
                }) as Box<dyn TermCursor + '_>
            }))
    }
}

// ============================================================================
// SealedTermCursor
// ============================================================================

/// A decoded dictionary entry
struct DictEntry<'a> {
    token: &'a [u8],
    posting_offset: u32,
    posting_byte_len: u32,
}

struct SealedTermCursor<'a> {
    bytes: Bytes<'a>,
    section: &'a FieldSection,
    seek: SeekState,
}

impl<'a> SealedTermCursor<'a> {
    fn entry_at(bytes: Bytes<'a>, section: &FieldSection, idx: usize) -> HashMatchResult<DictEntry<'a>> {
        let rel = bytes.u32_at(bytes.add(section.term_offsets_offset, idx * 4)?)? as usize;
        let abs = bytes.add(section.dict_offset, rel)?;
        let token_len = bytes.u16_at(abs)? as usize;
        let token_pos = bytes.add(abs, 2)?;
        let token = bytes.slice(token_pos, token_len)?;
        let tail = bytes.add(token_pos, token_len)?;
        bytes.slice(tail, DICT_ENTRY_TAIL)?;
        Ok(DictEntry {
            token,
            posting_offset: bytes.u32_at(tail + 4)?,
            posting_byte_len: bytes.u32_at(tail + 8)?,
        })
    }
}

impl TermCursor for SealedTermCursor<'_> {
    fn seek_exact(&mut self, token: &[u8]) -> HashMatchResult<Option<PostingIter<'_>>> {
        let bytes = self.bytes;
        let section = self.section;
        let found = self.seek.seek(token, section.term_count as usize, |i| {
            Ok(Self::entry_at(bytes, section, i)?.token.cmp(token))
        })?;
        let idx = match found {
            Some(idx) => idx,
            None => return Ok(None),
        };

        let entry = Self::entry_at(bytes, section, idx)?;
        let start = bytes.add(section.postings_offset, entry.posting_offset as usize)?;
        let data = bytes.slice(start, entry.posting_byte_len as usize)?;
        let num_entries = Bytes {
            data,
            segment_id: bytes.segment_id,
        }
        .u32_at(0)?;

        Ok(Some(PostingIter::Encoded(EncodedPostings {
            data,
            pos: 4,
            remaining: num_entries,
            prev_doc_id: 0,
            segment_id: bytes.segment_id,
        })))
    }
}

// ============================================================================
// EncodedPostings: zero-allocation posting list traversal
// ============================================================================

/// Iterator that lazily decodes delta-encoded posting entries from segment data.
///
/// A decode failure is returned once as an error, after which the iterator
/// is exhausted.
pub struct EncodedPostings<'a> {
    data: &'a [u8],
    pos: usize,
    remaining: u32,
    prev_doc_id: DocId,
    segment_id: u64,
}

impl EncodedPostings<'_> {
    /// Entries left to decode
    pub fn remaining(&self) -> usize {
        self.remaining as usize
    }

    fn fail(&mut self, reason: &str) -> Option<HashMatchResult<PostingEntry>> {
        self.remaining = 0;
        Some(Err(HashMatchError::corruption(self.segment_id, reason)))
    }
}

impl Iterator for EncodedPostings<'_> {
    type Item = HashMatchResult<PostingEntry>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let Some((delta, n1)) = self.data.get(self.pos..).and_then(decode_varint) else {
            return self.fail("truncated posting doc id");
        };
        self.pos += n1;
        let Some((tf, n2)) = self.data.get(self.pos..).and_then(decode_varint) else {
            return self.fail("truncated posting term frequency");
        };
        self.pos += n2;
        let Some(doc_id) = self.prev_doc_id.checked_add(delta) else {
            return self.fail("posting doc id overflow");
        };
        self.prev_doc_id = doc_id;
        Some(Ok(PostingEntry::new(doc_id, tf)))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

/// Encode a posting list as delta-encoded varint pairs.
fn encode_posting_list(entries: &[PostingEntry], buf: &mut Vec<u8>) {
    buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    let mut prev_doc_id: DocId = 0;
    for entry in entries {
        let delta = entry.doc_id - prev_doc_id;
        encode_varint(delta, buf);
        encode_varint(entry.tf, buf);
        prev_doc_id = entry.doc_id;
    }
}

// ============================================================================
// Tests
// ============================================================================
