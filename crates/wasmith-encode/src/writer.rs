//! Little-endian byte buffer primitives: LEB128 writers and the matching
//! reader the runtime uses to walk encoded instruction streams.

/// Append-only byte buffer with WASM binary-format primitives.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    pub fn bytes(&mut self, bs: &[u8]) {
        self.buf.extend_from_slice(bs);
    }

    /// Unsigned LEB128.
    pub fn u32(&mut self, mut v: u32) {
        loop {
            let byte = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// Signed LEB128, 32-bit.
    pub fn s32(&mut self, v: i32) {
        self.s64(v as i64);
    }

    /// Signed LEB128, 64-bit.
    pub fn s64(&mut self, mut v: i64) {
        loop {
            let byte = (v & 0x7F) as u8;
            v >>= 7;
            let sign_clear = byte & 0x40 == 0;
            if (v == 0 && sign_clear) || (v == -1 && !sign_clear) {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// IEEE-754 double, little-endian.
    pub fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Length-prefixed UTF-8 name.
    pub fn name(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }
}

/// Cursor over an encoded instruction stream.
///
/// Only ever pointed at encoder-produced bytes, so reads index directly;
/// a malformed stream is an internal bug, not an input condition.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn jump(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn done(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn byte(&mut self) -> u8 {
        let b = self.bytes[self.pos];
        self.pos += 1;
        b
    }

    pub fn u32(&mut self) -> u32 {
        let mut result = 0u32;
        let mut shift = 0;
        loop {
            let b = self.byte();
            result |= u32::from(b & 0x7F) << shift;
            if b & 0x80 == 0 {
                return result;
            }
            shift += 7;
        }
    }

    pub fn s32(&mut self) -> i32 {
        self.s64() as i32
    }

    pub fn s64(&mut self) -> i64 {
        let mut result = 0i64;
        let mut shift = 0;
        loop {
            let b = self.byte();
            result |= i64::from(b & 0x7F) << shift;
            shift += 7;
            if b & 0x80 == 0 {
                if shift < 64 && b & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                return result;
            }
        }
    }

    pub fn f64(&mut self) -> f64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.bytes[self.pos..self.pos + 8]);
        self.pos += 8;
        f64::from_le_bytes(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut ByteWriter)) -> Vec<u8> {
        let mut w = ByteWriter::new();
        f(&mut w);
        w.into_bytes()
    }

    #[test]
    fn unsigned_leb_known_encodings() {
        assert_eq!(written(|w| w.u32(0)), [0x00]);
        assert_eq!(written(|w| w.u32(127)), [0x7F]);
        assert_eq!(written(|w| w.u32(128)), [0x80, 0x01]);
        assert_eq!(written(|w| w.u32(624485)), [0xE5, 0x8E, 0x26]);
    }

    #[test]
    fn signed_leb_known_encodings() {
        assert_eq!(written(|w| w.s32(0)), [0x00]);
        assert_eq!(written(|w| w.s32(-1)), [0x7F]);
        assert_eq!(written(|w| w.s32(63)), [0x3F]);
        assert_eq!(written(|w| w.s32(64)), [0xC0, 0x00]);
        assert_eq!(written(|w| w.s32(-64)), [0x40]);
        assert_eq!(written(|w| w.s32(-123456)), [0xC0, 0xBB, 0x78]);
    }

    #[test]
    fn leb_round_trips() {
        for v in [0u32, 1, 127, 128, 300, 65535, u32::MAX] {
            let bytes = written(|w| w.u32(v));
            assert_eq!(ByteReader::new(&bytes).u32(), v);
        }
        for v in [0i64, 1, -1, 64, -65, i32::MAX as i64, i64::MIN, i64::MAX] {
            let bytes = written(|w| w.s64(v));
            assert_eq!(ByteReader::new(&bytes).s64(), v);
        }
    }

    #[test]
    fn f64_and_names() {
        let bytes = written(|w| w.f64(1.5));
        assert_eq!(ByteReader::new(&bytes).f64(), 1.5);
        assert_eq!(written(|w| w.name("ab")), [0x02, b'a', b'b']);
    }
}
