//! Compiled-script text codec: extract a Shift-JIS text section into a
//! human-editable UTF-16LE transcript, and reinject a (possibly translated)
//! transcript back into the binary script.
//!
//! `extract` is grounded directly on §4.5.5; `reinject` is this crate's own
//! addition completing the round trip the purpose statement names but the
//! distilled format only describes one direction of. Both share the
//! Shift-JIS transcoding primitive with the `pac` module (`encoding_rs`);
//! the UTF-16LE transcript itself is produced and parsed by hand with
//! `str::encode_utf16`/`char::decode_utf16`, since `encoding_rs` treats
//! UTF-16 as decode-only (it targets legacy web encodings, not wide-text
//! output) and has no `encode` path to it.

use std::fs;
use std::path::Path;

use encoding_rs::SHIFT_JIS;

use crate::error::{Error, Result};

const HEADER_PREFIX: &str = "ZBSPAC-TRANSLATION ENCODING SHIFT_JIS COUNT";
const COUNT_FIELD_LEN: usize = 5;
const COUNT_FIELD_OFFSET: usize = 88; // BOM (2 bytes) + HEADER_PREFIX.chars().count() (43) * 2

#[derive(Debug, PartialEq, Eq)]
pub struct SegmentStats {
    pub segment_count: usize,
    pub not_text_count: usize,
}

struct Segment {
    raw_bytes: Vec<u8>,
    decoded: String,
    trailing_nulls: usize,
    not_text: bool,
}

fn is_not_text(raw: &[u8], decoded: &str) -> bool {
    raw.first()
        .map(|&c| c.is_ascii_digit() || c.is_ascii_uppercase())
        .unwrap_or(false)
        || decoded.ends_with(".bin")
}

/// Extracts the text section of a compiled script into `head.bin`,
/// `script.txt`, and `tail.bin` under `out_dir`.
pub fn extract(script_path: &Path, out_dir: &Path) -> Result<SegmentStats> {
    let bytes = fs::read(script_path)?;
    if bytes.len() < 8 {
        return Err(Error::CorruptInput(
            "script shorter than its 8-byte header".to_string(),
        ));
    }
    let n = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let text_offset = (n + 1)
        .checked_mul(8)
        .ok_or_else(|| Error::CorruptInput("text section offset overflow".to_string()))?
        as usize;
    if text_offset > bytes.len() {
        return Err(Error::CorruptInput(
            "text section offset beyond end of file".to_string(),
        ));
    }

    let mut cursor = text_offset;
    while cursor < bytes.len() && bytes[cursor] == 0 {
        cursor += 1;
    }
    let head_end = cursor;

    let mut segments = Vec::new();
    let mut not_text_count = 0usize;
    loop {
        if cursor >= bytes.len() {
            break;
        }
        let b = bytes[cursor];
        if b < 32 || b == 0xFF {
            break;
        }
        let seg_start = cursor;
        while cursor < bytes.len() && bytes[cursor] != 0 {
            cursor += 1;
        }
        let raw = bytes[seg_start..cursor].to_vec();
        let (decoded, _, had_errors) = SHIFT_JIS.decode(&raw);
        if had_errors {
            return Err(Error::TranscodeFailure(format!(
                "segment at offset {seg_start} is not valid Shift-JIS"
            )));
        }
        let decoded = decoded.into_owned();
        let not_text = is_not_text(&raw, &decoded);
        if not_text {
            not_text_count += 1;
        }

        let mut trailing_nulls = 0usize;
        while cursor < bytes.len() && bytes[cursor] == 0 {
            cursor += 1;
            trailing_nulls += 1;
        }

        segments.push(Segment {
            raw_bytes: raw,
            decoded,
            trailing_nulls,
            not_text,
        });
    }
    let text_end = cursor;

    log::info!(
        "extract: {} segments ({} flagged NOT-TEXT)",
        segments.len(),
        not_text_count
    );

    fs::create_dir_all(out_dir)?;
    fs::write(out_dir.join("head.bin"), &bytes[..head_end])?;
    fs::write(out_dir.join("tail.bin"), &bytes[text_end..])?;
    write_transcript(&out_dir.join("script.txt"), &segments)?;

    Ok(SegmentStats {
        segment_count: segments.len(),
        not_text_count,
    })
}

fn utf16le_bytes(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn write_transcript(path: &Path, segments: &[Segment]) -> Result<()> {
    let mut text = String::new();
    text.push_str(HEADER_PREFIX);
    text.push_str(&" ".repeat(COUNT_FIELD_LEN));
    text.push_str("\r\n\r\n");
    for (i, seg) in segments.iter().enumerate() {
        text.push_str(&format!("SEG {i} NULL {}", seg.trailing_nulls));
        if seg.not_text {
            text.push_str(" NOT-TEXT");
        }
        text.push_str("\r\n");
        text.push_str(&seg.decoded);
        text.push_str("\r\n");
        text.push_str(&"-".repeat(seg.raw_bytes.len()));
        text.push_str("\r\n");
        text.push_str(&seg.decoded); // untranslated transcript: translated == original
        text.push_str("\r\n\r\n");
    }

    let mut bytes = vec![0xFFu8, 0xFE];
    bytes.extend(utf16le_bytes(&text));

    let count_str = segments.len().to_string();
    if count_str.len() > COUNT_FIELD_LEN {
        return Err(Error::FormatMismatch(format!(
            "segment count {} does not fit the transcript's {}-character COUNT field",
            segments.len(),
            COUNT_FIELD_LEN
        )));
    }
    let padded = format!("{count_str:>COUNT_FIELD_LEN$}");
    let field_bytes = utf16le_bytes(&padded);
    bytes[COUNT_FIELD_OFFSET..COUNT_FIELD_OFFSET + field_bytes.len()]
        .copy_from_slice(&field_bytes);

    fs::write(path, &bytes)?;
    Ok(())
}

fn decode_utf16le(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::FormatMismatch(
            "transcript has an odd number of UTF-16LE bytes".to_string(),
        ));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::FormatMismatch(format!("invalid UTF-16 in transcript: {e}")))
}

fn parse_count(header_line: &str) -> Result<usize> {
    let mut parts = header_line.split_whitespace();
    if parts.next() != Some("ZBSPAC-TRANSLATION") {
        return Err(Error::FormatMismatch(
            "transcript missing ZBSPAC-TRANSLATION tag".to_string(),
        ));
    }
    if parts.next() != Some("ENCODING") {
        return Err(Error::FormatMismatch(
            "transcript header missing ENCODING field".to_string(),
        ));
    }
    parts.next().ok_or_else(|| {
        Error::FormatMismatch("transcript header missing encoding value".to_string())
    })?;
    if parts.next() != Some("COUNT") {
        return Err(Error::FormatMismatch(
            "transcript header missing COUNT field".to_string(),
        ));
    }
    parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::FormatMismatch("transcript header COUNT value is not a number".to_string()))
}

fn parse_seg_header(line: &str) -> Result<(usize, usize, bool)> {
    let mut parts = line.split_whitespace();
    if parts.next() != Some("SEG") {
        return Err(Error::FormatMismatch(format!(
            "expected a SEG header, got '{line}'"
        )));
    }
    let seg_index: usize = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::FormatMismatch(format!("malformed segment index in '{line}'")))?;
    if parts.next() != Some("NULL") {
        return Err(Error::FormatMismatch(format!(
            "expected a NULL field in '{line}'"
        )));
    }
    let trailing_nulls: usize = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::FormatMismatch(format!("malformed NULL count in '{line}'")))?;
    let not_text = parts.next() == Some("NOT-TEXT");
    Ok((seg_index, trailing_nulls, not_text))
}

fn encode_shift_jis(ctx: &str, text: &str) -> Result<Vec<u8>> {
    let (bytes, _, had_errors) = SHIFT_JIS.encode(text);
    if had_errors {
        return Err(Error::TranscodeFailure(format!(
            "{ctx}: not representable in Shift-JIS"
        )));
    }
    Ok(bytes.into_owned())
}

/// Reassembles a compiled script from a transcript (possibly translated)
/// plus the `head.bin`/`tail.bin` halves `extract` produced alongside it.
/// `NOT-TEXT` segments are re-encoded from their `<original>` line, never
/// their `<translated>` line, per §4.5.5's invariant that such segments
/// must not be retranslated.
pub fn reinject(
    transcript_path: &Path,
    head_path: &Path,
    tail_path: &Path,
    out_path: &Path,
) -> Result<()> {
    let raw = fs::read(transcript_path)?;
    if raw.len() < 2 || raw[0] != 0xFF || raw[1] != 0xFE {
        return Err(Error::FormatMismatch(
            "transcript is missing its UTF-16LE BOM".to_string(),
        ));
    }
    let text = decode_utf16le(&raw[2..])?;
    let lines: Vec<&str> = text.split("\r\n").collect();
    if lines.is_empty() {
        return Err(Error::FormatMismatch("transcript is empty".to_string()));
    }
    let declared_count = parse_count(lines[0])?;

    let mut segments: Vec<(Vec<u8>, usize)> = Vec::with_capacity(declared_count);
    let mut idx = 2; // line 0: header, line 1: blank separator
    while idx < lines.len() && !lines[idx].is_empty() {
        let (seg_index, trailing_nulls, not_text) = parse_seg_header(lines[idx])?;
        if seg_index != segments.len() {
            return Err(Error::FormatMismatch(format!(
                "expected segment {}, found {seg_index}",
                segments.len()
            )));
        }
        idx += 1;
        let original = *lines
            .get(idx)
            .ok_or_else(|| Error::FormatMismatch("transcript truncated".to_string()))?;
        idx += 2; // skip the original line and the dash-rule line
        let translated = *lines
            .get(idx)
            .ok_or_else(|| Error::FormatMismatch("transcript truncated".to_string()))?;
        idx += 1;
        if lines.get(idx).map(|l| l.is_empty()).unwrap_or(false) {
            idx += 1;
        }

        let chosen = if not_text { original } else { translated };
        let raw_bytes = encode_shift_jis(&format!("segment {seg_index}"), chosen)?;
        segments.push((raw_bytes, trailing_nulls));
    }

    if segments.len() != declared_count {
        return Err(Error::FormatMismatch(format!(
            "transcript declares COUNT {declared_count} but has {} segments",
            segments.len()
        )));
    }

    let head = fs::read(head_path)?;
    let tail = fs::read(tail_path)?;
    let mut out = head;
    for (raw_bytes, trailing_nulls) in &segments {
        out.extend_from_slice(raw_bytes);
        out.extend(std::iter::repeat(0u8).take(*trailing_nulls));
    }
    out.extend_from_slice(&tail);

    fs::write(out_path, &out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_script() -> Vec<u8> {
        let mut script = Vec::new();
        script.extend_from_slice(&0u64.to_le_bytes()); // n=0 -> text_offset=8
        script.extend_from_slice(b"hello\0"); // text segment
        script.extend_from_slice(b"BYE\0"); // NOT-TEXT segment (leading uppercase)
        script.push(0xFF); // end-of-text-section sentinel
        script.extend_from_slice(b"TAILDATA");
        script
    }

    #[test]
    fn extract_splits_segments_and_flags_not_text() {
        let dir = tempdir().unwrap();
        let script_path = dir.path().join("script.bin");
        fs::write(&script_path, sample_script()).unwrap();

        let out_dir = dir.path().join("out");
        let stats = extract(&script_path, &out_dir).unwrap();
        assert_eq!(stats.segment_count, 2);
        assert_eq!(stats.not_text_count, 1);

        let head = fs::read(out_dir.join("head.bin")).unwrap();
        assert_eq!(head, 0u64.to_le_bytes());
        let tail = fs::read(out_dir.join("tail.bin")).unwrap();
        assert_eq!(tail, {
            let mut t = vec![0xFFu8];
            t.extend_from_slice(b"TAILDATA");
            t
        });

        let transcript = fs::read(out_dir.join("script.txt")).unwrap();
        assert_eq!(&transcript[0..2], &[0xFF, 0xFE]);
    }

    #[test]
    fn extract_then_reinject_without_edits_round_trips() {
        let dir = tempdir().unwrap();
        let original = sample_script();
        let script_path = dir.path().join("script.bin");
        fs::write(&script_path, &original).unwrap();

        let out_dir = dir.path().join("out");
        extract(&script_path, &out_dir).unwrap();

        let rebuilt_path = dir.path().join("rebuilt.bin");
        reinject(
            &out_dir.join("script.txt"),
            &out_dir.join("head.bin"),
            &out_dir.join("tail.bin"),
            &rebuilt_path,
        )
        .unwrap();

        assert_eq!(fs::read(&rebuilt_path).unwrap(), original);
    }

    #[test]
    fn reinject_uses_original_for_not_text_segments() {
        let dir = tempdir().unwrap();
        let script_path = dir.path().join("script.bin");
        fs::write(&script_path, sample_script()).unwrap();
        let out_dir = dir.path().join("out");
        extract(&script_path, &out_dir).unwrap();

        let transcript_path = out_dir.join("script.txt");
        let raw = fs::read(&transcript_path).unwrap();
        let text = decode_utf16le(&raw[2..]).unwrap();
        // translate the first (text) segment's line, leave NOT-TEXT alone
        let translated = text.replacen("hello\r\n-----\r\nhello", "hello\r\n-----\r\nHELLO", 1);
        let mut bytes = vec![0xFFu8, 0xFE];
        bytes.extend(utf16le_bytes(&translated));
        fs::write(&transcript_path, &bytes).unwrap();

        let rebuilt_path = dir.path().join("rebuilt.bin");
        reinject(
            &transcript_path,
            &out_dir.join("head.bin"),
            &out_dir.join("tail.bin"),
            &rebuilt_path,
        )
        .unwrap();

        let rebuilt = fs::read(&rebuilt_path).unwrap();
        assert!(rebuilt.windows(5).any(|w| w == b"HELLO"));
        // the NOT-TEXT segment's bytes are untouched
        assert!(rebuilt.windows(3).any(|w| w == b"BYE"));
    }

    #[test]
    fn count_field_lands_at_byte_offset_88() {
        let dir = tempdir().unwrap();
        let segments = Vec::new();
        write_transcript(&dir.path().join("t.txt"), &segments).unwrap();
        let bytes = fs::read(dir.path().join("t.txt")).unwrap();
        let value = u16::from_le_bytes([bytes[88], bytes[89]]);
        assert_eq!(value, ' ' as u16); // COUNT=0 right-justified in 5 chars: "    0"
        let digit = u16::from_le_bytes([bytes[96], bytes[97]]);
        assert_eq!(digit, '0' as u16);
    }
}
