//! Entry name correction for archives written by legacy Windows tools.
//!
//! Those tools store names in the system code page (CP932 on Japanese
//! Windows) without setting the UTF-8 flag, so a conforming reader decodes
//! them as CP437 and produces mojibake.

use encoding_rs::SHIFT_JIS;

use super::cp437;
use super::structures::ZipFileEntry;

/// Recover the intended name of an entry.
///
/// * flagged UTF-8: `name` is returned as is;
/// * otherwise `name` is taken to be CP437-decoded. Its CP437 bytes are
///   re-read as CP932, falling back to `name` when that is not possible.
pub fn decode_entry_name(name: &str, is_utf8: bool) -> String {
    if is_utf8 {
        return name.to_string();
    }

    cp437::encode(name)
        .and_then(|raw| decode_cp932(&raw))
        .unwrap_or_else(|| name.to_string())
}

/// Corrected name for a parsed central directory entry, read straight from
/// the stored bytes
pub fn entry_name(entry: &ZipFileEntry) -> String {
    if entry.is_utf8() {
        return entry.file_name.clone();
    }
    decode_cp932(&entry.raw_name).unwrap_or_else(|| entry.file_name.clone())
}

/// Windows code page 932 single bytes that WHATWG Shift_JIS leaves unmapped
fn cp932_extra(byte: u8) -> Option<char> {
    match byte {
        0xA0 => Some('\u{F8F0}'),
        0xFD => Some('\u{F8F1}'),
        0xFE => Some('\u{F8F2}'),
        0xFF => Some('\u{F8F3}'),
        _ => None,
    }
}

fn is_lead_byte(byte: u8) -> bool {
    matches!(byte, 0x81..=0x9F | 0xE0..=0xFC)
}

/// Strict CP932 decoding; `None` on any invalid sequence
fn decode_cp932(raw: &[u8]) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut run_start = 0;
    let mut i = 0;

    while i < raw.len() {
        let byte = raw[i];
        if let Some(c) = cp932_extra(byte) {
            out.push_str(&SHIFT_JIS.decode_without_bom_handling_and_without_replacement(
                &raw[run_start..i],
            )?);
            out.push(c);
            i += 1;
            run_start = i;
        } else if is_lead_byte(byte) {
            i += 2;
        } else {
            i += 1;
        }
    }

    let tail = &raw[run_start.min(raw.len())..];
    out.push_str(&SHIFT_JIS.decode_without_bom_handling_and_without_replacement(tail)?);
    Some(out)
}
