use std::fmt;

/// Sentinel stored in 24-bit index fields that point nowhere.
pub const INT24_NONE: u32 = 0xFF_FFFF;

/// A 40-bit string checksum: the case-folded CRC32 of a string plus its
/// length in bytes.
///
/// Two different strings of the same length can collide; the key only
/// identifies a string approximately.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashKey {
    len: u8,
    crc: u32,
}

impl HashKey {
    pub const EMPTY: HashKey = HashKey { len: 0, crc: 0 };

    #[inline(always)]
    pub const fn new(crc: u32, len: u8) -> HashKey {
        HashKey { len, crc }
    }

    /// Computes the key for `text`. Uppercase ASCII is folded, so
    /// `HashKey::of("A/B") == HashKey::of("a/b")`.
    #[inline]
    pub fn of(text: &str) -> HashKey {
        Self::of_bytes(text.as_bytes())
    }

    /// Like [`HashKey::of`], but `None` for text longer than the 255 bytes a
    /// key can describe.
    #[inline]
    pub fn checked(text: &str) -> Option<HashKey> {
        if text.len() > u8::MAX as usize {
            None
        } else {
            Some(Self::of_bytes(text.as_bytes()))
        }
    }

    /// The length is stored modulo 256; callers with untrusted input use
    /// [`HashKey::checked`].
    #[inline]
    pub fn of_bytes(bytes: &[u8]) -> HashKey {
        HashKey {
            len: bytes.len() as u8,
            crc: crc32_folded(bytes),
        }
    }

    #[inline(always)]
    pub const fn from_raw(raw: u64) -> HashKey {
        HashKey {
            len: (raw >> 32) as u8,
            crc: raw as u32,
        }
    }

    /// `(len << 32) | crc`
    #[inline(always)]
    pub const fn raw(self) -> u64 {
        (self.len as u64) << 32 | self.crc as u64
    }

    #[inline(always)]
    pub const fn crc(self) -> u32 {
        self.crc
    }

    #[inline(always)]
    pub const fn len(self) -> u8 {
        self.len
    }

    /// A zero CRC marks a field that is present but empty.
    #[inline(always)]
    pub const fn is_empty(self) -> bool {
        self.crc == 0
    }
}

/// Renders the stable placeholder used when no text is known: `ll-cccccccc`.
impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}-{:08x}", self.len, self.crc)
    }
}

impl fmt::Debug for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// CRC32 (IEEE) over `bytes` with `A-Z` folded to `a-z` first. Other bytes,
/// including non-ASCII, are hashed unchanged.
pub fn crc32_folded(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; 64];

    for chunk in bytes.chunks(buf.len()) {
        for (dst, src) in buf.iter_mut().zip(chunk) {
            *dst = src.to_ascii_lowercase();
        }
        hasher.update(&buf[..chunk.len()]);
    }

    hasher.finalize()
}

/// Little-endian 3-byte unsigned integer used as a compact index.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Int24(u32);

impl Int24 {
    pub const NONE: Int24 = Int24(INT24_NONE);

    #[inline(always)]
    pub const fn new(value: u32) -> Int24 {
        Int24(value & INT24_NONE)
    }

    #[inline(always)]
    pub const fn from_le_bytes(bytes: [u8; 3]) -> Int24 {
        Int24((bytes[2] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[0] as u32)
    }

    #[inline(always)]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// `None` for the `0xFFFFFF` sentinel.
    #[inline(always)]
    pub fn index(self) -> Option<usize> {
        if self.0 == INT24_NONE {
            None
        } else {
            Some(self.0 as usize)
        }
    }
}

impl fmt::Debug for Int24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_plain_crc32_for_lowercase() {
        assert_eq!(crc32_folded(b"fighter/mario"), crc32fast::hash(b"fighter/mario"));
        assert_eq!(crc32_folded(b""), 0);
    }

    #[test]
    fn case_insensitive() {
        let s = "Sound/Bank/FIGHTER_voice/vc_Mario.nus3audio";
        assert_eq!(HashKey::of(s), HashKey::of(&s.to_ascii_lowercase()));
        assert_eq!(HashKey::of(s), HashKey::of(s));
    }

    #[test]
    fn folding_is_ascii_only() {
        // 0xC4 is not an ASCII uppercase letter and must pass through untouched.
        let upper = [0xC4u8, b'A'];
        let lower = [0xC4u8, b'a'];
        assert_eq!(crc32_folded(&upper), crc32_folded(&lower));
        assert_ne!(crc32_folded(&[0xE4u8, b'a']), crc32_folded(&lower));
    }

    #[test]
    fn long_input_spans_chunks() {
        let long = "A".repeat(200);
        assert_eq!(
            crc32_folded(long.as_bytes()),
            crc32fast::hash("a".repeat(200).as_bytes())
        );
    }

    #[test]
    fn raw_packing() {
        let key = HashKey::of("abc");
        assert_eq!(key.len(), 3);
        assert_eq!(key.raw() >> 32, 3);
        assert_eq!(HashKey::from_raw(key.raw()), key);
        assert_eq!(HashKey::of(""), HashKey::EMPTY);
        assert!(HashKey::EMPTY.is_empty());
    }

    #[test]
    fn checked_rejects_long_text() {
        assert_eq!(HashKey::checked("fighter"), Some(HashKey::of("fighter")));
        assert_eq!(HashKey::checked(&"a".repeat(255)).map(|x| x.len()), Some(255));
        assert_eq!(HashKey::checked(&"a".repeat(256)), None);
        assert_eq!(HashKey::checked(&"a".repeat(257)), None);
    }

    #[test]
    fn placeholder() {
        let key = HashKey::new(0x1234_abcd, 0x0b);
        assert_eq!(key.to_string(), "0b-1234abcd");
    }

    #[test]
    fn int24() {
        assert_eq!(Int24::from_le_bytes([0x01, 0x02, 0x03]).get(), 0x030201);
        assert_eq!(Int24::from_le_bytes([0xff, 0xff, 0xff]).index(), None);
        assert_eq!(Int24::new(7).index(), Some(7));
    }
}
