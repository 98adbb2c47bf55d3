//! AMF0 encoding primitives, just enough for the FLV `onMetaData` tag.

pub const NUMBER_MARKER: u8 = 0x00;
pub const STRING_MARKER: u8 = 0x02;
pub const ECMA_ARRAY_MARKER: u8 = 0x08;

/// Object-end trailer. The metadata writer deliberately omits it (the ECMA
/// array count is exact instead); kept for readers and tests.
pub const OBJECT_END: [u8; 3] = [0x00, 0x00, 0x09];

/// Marker + 8-byte IEEE-754 big-endian.
pub fn put_number(out: &mut Vec<u8>, value: f64) {
    out.push(NUMBER_MARKER);
    out.extend_from_slice(&value.to_be_bytes());
}

/// Marker + 2-byte length + UTF-8 bytes.
pub fn put_string(out: &mut Vec<u8>, value: &str) {
    out.push(STRING_MARKER);
    put_key(out, value);
}

/// Property key: 2-byte length + UTF-8 bytes, no marker.
pub fn put_key(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
}

/// Marker + 4-byte element count. Entries follow as key/value pairs.
pub fn put_ecma_array_header(out: &mut Vec<u8>, count: u32) {
    out.push(ECMA_ARRAY_MARKER);
    out.extend_from_slice(&count.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_encoding() {
        let mut out = Vec::new();
        put_number(&mut out, 1.0);
        assert_eq!(out, [0x00, 0x3f, 0xf0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn string_encoding() {
        let mut out = Vec::new();
        put_string(&mut out, "onMetaData");
        let mut expected = vec![STRING_MARKER, 0, 10];
        expected.extend_from_slice(b"onMetaData");
        assert_eq!(out, expected);
    }

    #[test]
    fn key_has_no_marker() {
        let mut out = Vec::new();
        put_key(&mut out, "duration");
        assert_eq!(&out[..2], &[0, 8]);
        assert_eq!(&out[2..], b"duration");
    }

    #[test]
    fn ecma_array_header() {
        let mut out = Vec::new();
        put_ecma_array_header(&mut out, 8);
        assert_eq!(out, [ECMA_ARRAY_MARKER, 0, 0, 0, 8]);
    }
}
