use crate::error::FormatError;
use crate::layout::ByteRange;

/// Read-only big-endian view over a byte slice.
///
/// All accessors are positional and bounds checked; a failed check names
/// the view's label, the offset and the number of bytes needed.
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    data: &'a [u8],
    what: &'static str,
}

impl<'a> ByteView<'a> {
    pub fn new(data: &'a [u8], what: &'static str) -> Self {
        Self { data, what }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    pub fn what(&self) -> &'static str {
        self.what
    }

    pub fn bytes_at(&self, offset: usize, n: usize) -> Result<&'a [u8], FormatError> {
        let end = offset
            .checked_add(n)
            .ok_or_else(|| FormatError::truncated(self.what, offset, n, self.data.len()))?;
        self.data
            .get(offset..end)
            .ok_or_else(|| FormatError::truncated(self.what, offset, n, self.data.len()))
    }

    pub fn array_at<const N: usize>(&self, offset: usize) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes_at(offset, N)?);
        Ok(out)
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, FormatError> {
        Ok(self.bytes_at(offset, 1)?[0])
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16, FormatError> {
        Ok(u16::from_be_bytes(self.array_at(offset)?))
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32, FormatError> {
        Ok(u32::from_be_bytes(self.array_at(offset)?))
    }

    pub fn read_f32(&self, offset: usize) -> Result<f32, FormatError> {
        Ok(f32::from_be_bytes(self.array_at(offset)?))
    }

    pub fn read_u16_array<const N: usize>(&self, offset: usize) -> Result<[u16; N], FormatError> {
        let mut result = [0u16; N];
        for (i, item) in result.iter_mut().enumerate() {
            *item = self.read_u16(offset + i * 2)?;
        }
        Ok(result)
    }

    pub fn read_u32_array<const N: usize>(&self, offset: usize) -> Result<[u32; N], FormatError> {
        let mut result = [0u32; N];
        for (i, item) in result.iter_mut().enumerate() {
            *item = self.read_u32(offset + i * 4)?;
        }
        Ok(result)
    }

    /// Read `n` elements of `width` bytes (1, 2 or 4) starting at `offset`.
    pub fn read_be_vec(&self, offset: usize, n: usize, width: usize) -> Result<Vec<u32>, FormatError> {
        if width == 0 {
            return Ok(Vec::new());
        }
        let raw = self.bytes_at(offset, n.saturating_mul(width))?;
        Ok(raw
            .chunks_exact(width)
            .map(|chunk| chunk.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
            .collect())
    }

    /// Read a NUL-terminated ASCII string from a fixed `n` byte field.
    /// Non-ASCII bytes are replaced rather than rejected.
    pub fn read_fixed_string(&self, offset: usize, n: usize) -> Result<String, FormatError> {
        let bytes = self.bytes_at(offset, n)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(n);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    pub fn sub(&self, what: &'static str, range: ByteRange) -> Result<ByteView<'a>, FormatError> {
        let data = self.bytes_at(range.start, range.len())?;
        Ok(ByteView { data, what })
    }

    /// Sub-view that is cut at the end of the buffer instead of failing.
    pub fn sub_clamped(&self, what: &'static str, range: ByteRange) -> ByteView<'a> {
        let start = range.start.min(self.data.len());
        let end = range.end.clamp(start, self.data.len());
        ByteView {
            data: &self.data[start..end],
            what,
        }
    }
}
