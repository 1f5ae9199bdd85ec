//! PAC container engine: header, index, variant dispatch, payload codecs,
//! Shift-JIS entry names.
//!
//! One `Options` struct threads through every packing policy decision,
//! files are processed sequentially in sorted order, and each codec choice
//! is logged at debug level. The multi-entry walk, Shift-JIS name encoding,
//! and deflate payload mode lean on `encoding_rs` and `flate2` for exactly
//! those concerns.

use std::collections::HashSet;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use encoding_rs::SHIFT_JIS;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::{Error, Result};
use crate::huffman::{huffman_decode, huffman_encode};
use crate::lzss::{lzss_decode, lzss_encode};

const HEADER_LEN: usize = 12;
const INDEX_RECORD_LEN: usize = 76;
const NAME_FIELD_LEN: usize = 64;
// Arbitrary: the format reserves one magic byte but does not name its value.
const MAGIC_BYTE: u8 = 0x01;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    Stored = 0,
    Lzss = 1,
    Huffman = 2,
    Deflate = 3,
    MaybeDeflate = 4,
}

impl Variant {
    fn from_tag(tag: u32) -> Result<Self> {
        Ok(match tag {
            0 => Variant::Stored,
            1 => Variant::Lzss,
            2 => Variant::Huffman,
            3 => Variant::Deflate,
            4 => Variant::MaybeDeflate,
            other => {
                return Err(Error::CorruptInput(format!(
                    "unsupported PAC variant tag {other}"
                )))
            }
        })
    }
}

/// Tunables that are not part of the on-disk format: the store-always
/// extension set is a packing policy choice, not a format requirement.
/// Verbosity is deliberately not here; it's process-wide state owned by
/// the CLI's logger setup, not a per-operation policy.
pub struct Options {
    pub store_always_extensions: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            store_always_extensions: vec!["ogg".to_string()],
        }
    }
}

struct Header {
    entry_count: u32,
    variant: Variant,
}

struct IndexEntry {
    name: String,
    offset: u32,
    decoded_length: u32,
    encoded_length: u32,
}

fn encode_name(name: &str) -> Result<[u8; NAME_FIELD_LEN]> {
    let (bytes, _, had_errors) = SHIFT_JIS.encode(name);
    if had_errors {
        return Err(Error::TranscodeFailure(format!(
            "'{name}' is not representable in Shift-JIS"
        )));
    }
    if bytes.len() >= NAME_FIELD_LEN {
        return Err(Error::NameTooLong {
            name: name.to_string(),
            needed: bytes.len(),
            limit: NAME_FIELD_LEN,
        });
    }
    let mut field = [0u8; NAME_FIELD_LEN];
    field[..bytes.len()].copy_from_slice(&bytes);
    Ok(field)
}

fn decode_name(field: &[u8]) -> Result<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let (text, _, had_errors) = SHIFT_JIS.decode(&field[..end]);
    if had_errors {
        return Err(Error::TranscodeFailure(
            "entry name is not valid Shift-JIS".to_string(),
        ));
    }
    let name = text.into_owned();
    if name.contains('/') || name.contains('\\') {
        return Err(Error::CorruptInput(format!(
            "entry name '{name}' contains a path separator"
        )));
    }
    Ok(name)
}

fn write_header(out: &mut impl Write, entry_count: u32, variant: Variant) -> Result<()> {
    out.write_all(b"PAC")?;
    out.write_all(&[MAGIC_BYTE])?;
    out.write_all(&entry_count.to_le_bytes())?;
    out.write_all(&(variant as u32).to_le_bytes())?;
    Ok(())
}

fn read_header(buf: &[u8]) -> Result<Header> {
    if buf.len() < HEADER_LEN || &buf[0..3] != b"PAC" {
        return Err(Error::CorruptInput("PAC header tag mismatch".to_string()));
    }
    let entry_count = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    let variant_tag = u32::from_le_bytes(buf[8..12].try_into().unwrap());
    Ok(Header {
        entry_count,
        variant: Variant::from_tag(variant_tag)?,
    })
}

fn write_index_record(out: &mut Vec<u8>, entry: &IndexEntry) -> Result<()> {
    let name_field = encode_name(&entry.name)?;
    out.extend_from_slice(&name_field);
    out.extend_from_slice(&entry.offset.to_le_bytes());
    out.extend_from_slice(&entry.decoded_length.to_le_bytes());
    out.extend_from_slice(&entry.encoded_length.to_le_bytes());
    Ok(())
}

fn read_index_record(buf: &[u8]) -> Result<IndexEntry> {
    let name = decode_name(&buf[0..NAME_FIELD_LEN])?;
    let offset = u32::from_le_bytes(buf[64..68].try_into().unwrap());
    let decoded_length = u32::from_le_bytes(buf[68..72].try_into().unwrap());
    let encoded_length = u32::from_le_bytes(buf[72..76].try_into().unwrap());
    Ok(IndexEntry {
        name,
        offset,
        decoded_length,
        encoded_length,
    })
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut dec = DeflateDecoder::new(data);
    let mut out = Vec::new();
    dec.read_to_end(&mut out)?;
    Ok(out)
}

/// Non-recursive directory walk; subdirectories are skipped, entries sorted
/// by filename for reproducible archives across platforms (see DESIGN.md).
fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn file_name_of(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

/// Packs `source_dir` into a variant-1 ("plain index") archive at
/// `out_path`: every payload is LZSS-encoded, and the index is written as a
/// flat array immediately after the header.
pub fn pack_lzss(source_dir: &Path, out_path: &Path) -> Result<()> {
    let files = collect_files(source_dir)?;
    let entry_count = files.len() as u32;

    let mut out = fs::File::create(out_path)?;
    write_header(&mut out, entry_count, Variant::Lzss)?;
    out.write_all(&vec![0u8; entry_count as usize * INDEX_RECORD_LEN])?;

    let mut entries = Vec::with_capacity(files.len());
    let mut offset = HEADER_LEN as u32 + entry_count * INDEX_RECORD_LEN as u32;
    for path in &files {
        let data = fs::read(path)?;
        let encoded = lzss_encode(&data);
        let name = file_name_of(path);
        log::debug!(
            "pack-bfe: {name} {} -> {} bytes (lzss)",
            data.len(),
            encoded.len()
        );
        out.write_all(&encoded)?;
        entries.push(IndexEntry {
            name,
            offset,
            decoded_length: data.len() as u32,
            encoded_length: encoded.len() as u32,
        });
        offset += encoded.len() as u32;
    }

    let mut index_bytes = Vec::with_capacity(entries.len() * INDEX_RECORD_LEN);
    for entry in &entries {
        write_index_record(&mut index_bytes, entry)?;
    }
    out.seek(SeekFrom::Start(HEADER_LEN as u64))?;
    out.write_all(&index_bytes)?;
    Ok(())
}

/// Packs `source_dir` into a variant-4 ("encoded index") archive at
/// `out_path`: each payload is deflated unless its extension is in
/// `options.store_always_extensions` or deflate does not shrink it; the
/// index is Huffman-compressed, XOR-0xFF-obfuscated, and appended after all
/// payloads along with its own length.
pub fn pack_deflate(source_dir: &Path, out_path: &Path, options: &Options) -> Result<()> {
    let files = collect_files(source_dir)?;
    let entry_count = files.len() as u32;
    let store_always: HashSet<String> = options
        .store_always_extensions
        .iter()
        .map(|e| e.to_ascii_lowercase())
        .collect();

    let mut out = fs::File::create(out_path)?;
    write_header(&mut out, entry_count, Variant::MaybeDeflate)?;

    let mut entries = Vec::with_capacity(files.len());
    let mut offset = HEADER_LEN as u32;
    for path in &files {
        let data = fs::read(path)?;
        let name = file_name_of(path);
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let payload = if store_always.contains(&ext) {
            log::debug!("pack: {name} stored ('.{ext}' is in the store-always set)");
            data.clone()
        } else {
            let deflated = deflate(&data)?;
            if deflated.len() < data.len() {
                log::debug!("pack: {name} deflated {} -> {} bytes", data.len(), deflated.len());
                deflated
            } else {
                log::debug!("pack: {name} stored (deflate did not shrink it)");
                data.clone()
            }
        };

        out.write_all(&payload)?;
        entries.push(IndexEntry {
            name,
            offset,
            decoded_length: data.len() as u32,
            encoded_length: payload.len() as u32,
        });
        offset += payload.len() as u32;
    }

    let mut index_bytes = Vec::with_capacity(entries.len() * INDEX_RECORD_LEN);
    for entry in &entries {
        write_index_record(&mut index_bytes, entry)?;
    }
    let compressed_index = huffman_encode("pac-index", &index_bytes)?;
    let obfuscated: Vec<u8> = compressed_index.iter().map(|b| b ^ 0xFF).collect();
    out.write_all(&obfuscated)?;
    out.write_all(&(obfuscated.len() as u32).to_le_bytes())?;
    Ok(())
}

/// Unpacks a PAC archive of either variant into `out_dir`, detecting the
/// index placement: plain index first, falling back to the
/// Huffman-compressed tail index.
pub fn unpack(archive_path: &Path, out_dir: &Path) -> Result<()> {
    let bytes = fs::read(archive_path)?;
    let header = read_header(&bytes)?;
    if !matches!(header.variant, Variant::Lzss | Variant::MaybeDeflate) {
        return Err(Error::CorruptInput(format!(
            "header variant {:?} is not a packable top-level container variant",
            header.variant
        )));
    }
    let entry_count = header.entry_count as usize;

    fs::create_dir_all(out_dir)?;
    if entry_count == 0 {
        return Ok(());
    }

    let index_region_len = entry_count * INDEX_RECORD_LEN;
    let plain_index = if bytes.len() >= HEADER_LEN + index_region_len {
        let candidate = &bytes[HEADER_LEN..HEADER_LEN + index_region_len];
        match read_index_record(&candidate[0..INDEX_RECORD_LEN]) {
            Ok(first) if first.offset as usize == HEADER_LEN + index_region_len => {
                let mut entries = Vec::with_capacity(entry_count);
                entries.push(first);
                for i in 1..entry_count {
                    let rec = &candidate[i * INDEX_RECORD_LEN..(i + 1) * INDEX_RECORD_LEN];
                    entries.push(read_index_record(rec)?);
                }
                Some(entries)
            }
            _ => None,
        }
    } else {
        None
    };

    let entries = match plain_index {
        Some(entries) => {
            log::debug!("unpack: plain index detected ({entry_count} entries)");
            entries
        }
        None => {
            log::debug!("unpack: plain index missing or invalid, trying encoded index");
            if bytes.len() < 4 {
                return Err(Error::CorruptInput(
                    "archive too small for an encoded index".to_string(),
                ));
            }
            let tail_len =
                u32::from_le_bytes(bytes[bytes.len() - 4..].try_into().unwrap()) as usize;
            if bytes.len() < 4 + tail_len {
                return Err(Error::CorruptInput(
                    "encoded index length exceeds archive size".to_string(),
                ));
            }
            let encoded_start = bytes.len() - 4 - tail_len;
            let obfuscated = &bytes[encoded_start..bytes.len() - 4];
            let deobfuscated: Vec<u8> = obfuscated.iter().map(|b| b ^ 0xFF).collect();
            let index_bytes = huffman_decode("pac-index", &deobfuscated, index_region_len)?;
            let mut entries = Vec::with_capacity(entry_count);
            for i in 0..entry_count {
                let rec = &index_bytes[i * INDEX_RECORD_LEN..(i + 1) * INDEX_RECORD_LEN];
                entries.push(read_index_record(rec)?);
            }
            entries
        }
    };

    for entry in &entries {
        let start = entry.offset as usize;
        let end = start
            .checked_add(entry.encoded_length as usize)
            .ok_or_else(|| Error::CorruptInput(format!("entry '{}' offset overflow", entry.name)))?;
        if end > bytes.len() {
            return Err(Error::CorruptInput(format!(
                "entry '{}' payload out of bounds",
                entry.name
            )));
        }
        let payload = &bytes[start..end];
        let decoded = match header.variant {
            Variant::Lzss => lzss_decode(payload, entry.decoded_length as usize),
            Variant::MaybeDeflate => {
                if entry.decoded_length > entry.encoded_length {
                    inflate(payload)?
                } else {
                    payload.to_vec()
                }
            }
            other => {
                return Err(Error::CorruptInput(format!(
                    "unpack does not support variant {other:?}"
                )))
            }
        };
        fs::write(out_dir.join(&entry.name), &decoded)?;
    }
    Ok(())
}
