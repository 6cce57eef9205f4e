use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result, Section};

use super::byteorder::read_bytes;

/// Consumes the literal ASCII marker `tag` at the current position.
///
/// # Errors
///
/// Returns a `Format` error naming `section` when the bytes at the current
/// position differ from the expected marker.
pub fn expect_tag<R: Read>(reader: &mut R, tag: &'static str, section: Section) -> Result<()> {
    let found = read_bytes(reader, tag.len())?;
    if found != tag.as_bytes() {
        return Err(Error::format(
            section,
            format!(
                "expected marker '{tag}', found '{}'",
                String::from_utf8_lossy(&found)
            ),
        ));
    }
    Ok(())
}

/// Reads `len` bytes without advancing the stream.
///
/// # Errors
///
/// Returns an error if the bytes cannot be read or the stream cannot seek
/// back.
pub fn peek_bytes<R: Read + Seek>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let bytes = read_bytes(reader, len)?;
    reader.seek(SeekFrom::Current(-(len as i64)))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn matching_tag_advances() {
        let mut cursor = Cursor::new(b"<data>rest".to_vec());
        expect_tag(&mut cursor, "<data>", Section::Data { row: 0 }).unwrap();
        assert_eq!(cursor.position(), 6);
    }

    #[test]
    fn mismatch_reports_section() {
        let mut cursor = Cursor::new(b"<oops>".to_vec());
        let err = expect_tag(&mut cursor, "<data>", Section::Data { row: 0 }).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn peek_does_not_advance() {
        let mut cursor = Cursor::new(b"<strls>".to_vec());
        assert_eq!(peek_bytes(&mut cursor, 6).unwrap(), b"<strls");
        assert_eq!(cursor.position(), 0);
    }
}
