use encoding_rs::WINDOWS_1252;
use simdutf8::basic;

use crate::schema::Release;

/// Decodes a fixed-width metadata field: the content is the prefix up to the
/// first zero byte, or the whole field when no zero byte is present.
#[must_use]
pub fn decode_field(bytes: &[u8], release: Release) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    decode_text(&bytes[..end], release)
}

/// Decodes raw text bytes for the given release.
///
/// Release 118 stores UTF-8; release 117 predates Unicode support and is
/// decoded as WINDOWS-1252. Invalid UTF-8 in a 118 file falls back to lossy
/// replacement rather than failing the whole read.
#[must_use]
pub fn decode_text(bytes: &[u8], release: Release) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    if let Ok(text) = basic::from_utf8(bytes) {
        return text.to_owned();
    }
    match release {
        Release::V118 => String::from_utf8_lossy(bytes).into_owned(),
        Release::V117 => {
            let (decoded, _, _) = WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}
