//! Growable byte buffer
//!
//! Used wherever text is built incrementally (content extraction,
//! node paths). Three growth policies:
//! - `Exact`: grow to the requested size plus a small constant
//! - `DoubleIt`: double the current size until the request fits
//! - `Immutable`: read-only view over external memory, never resized
//!
//! A failed allocation leaves the buffer exactly as it was.

use std::io::{self, Write};

use memchr::memchr;

use crate::error::{Result, TreeError};

/// Buffer growth policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocScheme {
    DoubleIt,
    #[default]
    Exact,
    Immutable,
}

impl AllocScheme {
    /// Parse a scheme name as passed from the host
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "double" | "doubleit" => Some(AllocScheme::DoubleIt),
            "exact" => Some(AllocScheme::Exact),
            "immutable" => Some(AllocScheme::Immutable),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Storage<'a> {
    Owned(Vec<u8>),
    View(&'a [u8]),
}

/// Byte buffer with a selectable growth policy
#[derive(Debug)]
pub struct Buffer<'a> {
    storage: Storage<'a>,
    /// Logical capacity, as managed by the growth policy
    size: usize,
    scheme: AllocScheme,
}

impl Default for Buffer<'static> {
    fn default() -> Self {
        Buffer {
            storage: Storage::Owned(Vec::new()),
            size: 0,
            scheme: AllocScheme::Exact,
        }
    }
}

impl Buffer<'static> {
    /// Create a buffer with the default size and `Exact` growth
    pub fn new() -> Result<Self> {
        Self::with_scheme(crate::config::DEFAULT_BUFFER_SIZE, AllocScheme::Exact)
    }

    /// Create a buffer of `size` bytes growing with `scheme`
    pub fn with_scheme(size: usize, scheme: AllocScheme) -> Result<Self> {
        let scheme = if scheme == AllocScheme::Immutable {
            AllocScheme::Exact
        } else {
            scheme
        };
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| TreeError::OutOfMemory("creating buffer"))?;
        Ok(Buffer {
            storage: Storage::Owned(data),
            size,
            scheme,
        })
    }

    /// Create a buffer holding `size` bytes plus terminator room.
    /// A size of 0 leaves it unallocated until the first write.
    pub fn with_size(size: usize) -> Result<Self> {
        let size = if size == 0 { 0 } else { size + 2 };
        Self::with_scheme(size, AllocScheme::Exact)
    }
}

impl<'a> Buffer<'a> {
    /// Wrap external memory as an immutable view. Empty memory is refused.
    pub fn from_static(mem: &'a [u8]) -> Option<Self> {
        if mem.is_empty() {
            return None;
        }
        Some(Buffer {
            storage: Storage::View(mem),
            size: mem.len(),
            scheme: AllocScheme::Immutable,
        })
    }

    #[inline]
    pub fn scheme(&self) -> AllocScheme {
        self.scheme
    }

    /// Change the growth policy. Ignored once the buffer is immutable.
    pub fn set_allocation_scheme(&mut self, scheme: AllocScheme) {
        if self.scheme == AllocScheme::Immutable {
            return;
        }
        self.scheme = scheme;
    }

    #[inline]
    fn is_immutable(&self) -> bool {
        self.scheme == AllocScheme::Immutable
    }

    /// Bytes currently held
    #[inline]
    pub fn content(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(data) => data,
            Storage::View(mem) => mem,
        }
    }

    /// Content as UTF-8, if valid
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.content()).ok()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.content().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical capacity
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Reset the length to zero. A view is repointed at empty memory.
    pub fn empty(&mut self) {
        match &mut self.storage {
            Storage::Owned(data) => data.clear(),
            Storage::View(mem) => *mem = b"",
        }
    }

    /// Drop `len` bytes from the front. Returns the number removed.
    pub fn shrink(&mut self, len: usize) -> Result<usize> {
        let available = self.len();
        if len > available {
            return Err(TreeError::InvalidLength { len, available });
        }
        match &mut self.storage {
            Storage::Owned(data) => {
                data.drain(..len);
            }
            Storage::View(mem) => *mem = &mem[len..],
        }
        Ok(len)
    }

    /// Make room for `len` more bytes. Returns the free space gained,
    /// or 0 when nothing needed to change.
    pub fn grow(&mut self, len: usize) -> Result<usize> {
        if self.is_immutable() {
            return Ok(0);
        }
        let used = self.len();
        if used + len < self.size {
            return Ok(0);
        }
        let size = used
            .checked_add(len)
            .and_then(|n| n.checked_add(100))
            .ok_or(TreeError::OutOfMemory("growing buffer"))?;
        self.reserve_to(size)?;
        self.size = size;
        Ok(size - used)
    }

    /// Resize to hold at least `size` bytes under the current policy
    pub fn resize(&mut self, size: usize) -> Result<()> {
        if self.is_immutable() {
            return Err(TreeError::ImmutableBuffer);
        }
        if size < self.size {
            return Ok(());
        }
        let new_size = match self.scheme {
            AllocScheme::DoubleIt => {
                let mut n = if self.size > 0 { self.size } else { size + 10 };
                while size > n {
                    n = n
                        .checked_mul(2)
                        .ok_or(TreeError::OutOfMemory("resizing buffer"))?;
                }
                n
            }
            AllocScheme::Exact | AllocScheme::Immutable => size + 10,
        };
        self.reserve_to(new_size)?;
        self.size = new_size;
        Ok(())
    }

    fn reserve_to(&mut self, size: usize) -> Result<()> {
        match &mut self.storage {
            Storage::Owned(data) => {
                if size > data.capacity() {
                    let extra = size - data.len();
                    data.try_reserve_exact(extra)
                        .map_err(|_| TreeError::OutOfMemory("growing buffer"))?;
                }
                Ok(())
            }
            Storage::View(_) => Err(TreeError::ImmutableBuffer),
        }
    }

    fn owned_mut(&mut self) -> Result<&mut Vec<u8>> {
        match &mut self.storage {
            Storage::Owned(data) => Ok(data),
            Storage::View(_) => Err(TreeError::ImmutableBuffer),
        }
    }

    /// Resolve the length argument: `None` means up to the first NUL
    fn effective_len(s: &[u8], len: Option<usize>) -> Result<usize> {
        match len {
            None => Ok(memchr(0, s).unwrap_or(s.len())),
            Some(len) if len > s.len() => Err(TreeError::InvalidLength {
                len,
                available: s.len(),
            }),
            Some(len) => Ok(len),
        }
    }

    /// Append `len` bytes of `s` (all of it up to a NUL when `None`)
    pub fn add(&mut self, s: &[u8], len: Option<usize>) -> Result<()> {
        if self.is_immutable() {
            return Err(TreeError::ImmutableBuffer);
        }
        let len = Self::effective_len(s, len)?;
        if len == 0 {
            return Ok(());
        }
        let need = self.len() + len + 2;
        if need > self.size {
            self.resize(need)?;
        }
        self.owned_mut()?.extend_from_slice(&s[..len]);
        Ok(())
    }

    /// Prepend `len` bytes of `s`
    pub fn add_head(&mut self, s: &[u8], len: Option<usize>) -> Result<()> {
        if self.is_immutable() {
            return Err(TreeError::ImmutableBuffer);
        }
        let len = Self::effective_len(s, len)?;
        if len == 0 {
            return Ok(());
        }
        let need = self.len() + len + 2;
        if need > self.size {
            self.resize(need)?;
        }
        self.owned_mut()?.splice(0..0, s[..len].iter().copied());
        Ok(())
    }

    /// Append a string
    #[inline]
    pub fn cat(&mut self, s: &str) -> Result<()> {
        self.add(s.as_bytes(), Some(s.len()))
    }

    /// Append a string byte by byte, growing in small steps
    pub fn ccat(&mut self, s: &str) -> Result<()> {
        if self.is_immutable() {
            return Err(TreeError::ImmutableBuffer);
        }
        for &b in s.as_bytes() {
            if self.len() + 10 >= self.size {
                self.resize(self.len() + 10)?;
            }
            self.owned_mut()?.push(b);
        }
        Ok(())
    }

    /// Append `s` wrapped in quotes. Double quotes are used unless `s`
    /// contains one; when both kinds occur, `"` is written as `&quot;`.
    pub fn write_quoted_string(&mut self, s: &str) -> Result<()> {
        if self.is_immutable() {
            return Err(TreeError::ImmutableBuffer);
        }
        let has_double = memchr(b'"', s.as_bytes()).is_some();
        if !has_double {
            self.cat("\"")?;
            self.cat(s)?;
            return self.cat("\"");
        }
        if memchr(b'\'', s.as_bytes()).is_none() {
            self.cat("'")?;
            self.cat(s)?;
            return self.cat("'");
        }
        self.cat("\"")?;
        let mut rest = s;
        while let Some(pos) = memchr(b'"', rest.as_bytes()) {
            self.cat(&rest[..pos])?;
            self.cat("&quot;")?;
            rest = &rest[pos + 1..];
        }
        self.cat(rest)?;
        self.cat("\"")
    }

    /// Write the content to `out`. Returns the number of bytes written.
    pub fn dump<W: Write>(&self, out: &mut W) -> io::Result<usize> {
        let content = self.content();
        out.write_all(content)?;
        Ok(content.len())
    }

    /// Detach the content
    pub fn into_bytes(self) -> Vec<u8> {
        match self.storage {
            Storage::Owned(data) => data,
            Storage::View(mem) => mem.to_vec(),
        }
    }

    /// Detach the content as a string, replacing invalid UTF-8
    pub fn into_string(self) -> String {
        match String::from_utf8(self.into_bytes()) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_cat() {
        let mut buf = Buffer::new().unwrap();
        buf.cat("abc").unwrap();
        buf.add(b"def\0ghi", None).unwrap();
        buf.add(b"xyz", Some(2)).unwrap();
        assert_eq!(buf.content(), b"abcdefxy");
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn test_add_zero_and_oversized() {
        let mut buf = Buffer::with_size(0).unwrap();
        assert_eq!(buf.size(), 0);
        buf.add(b"abc", Some(0)).unwrap();
        assert!(buf.is_empty());
        assert_eq!(
            buf.add(b"abc", Some(5)),
            Err(TreeError::InvalidLength { len: 5, available: 3 })
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_add_head() {
        let mut buf = Buffer::with_size(4).unwrap();
        buf.cat("world").unwrap();
        buf.add_head(b"hello ", None).unwrap();
        assert_eq!(buf.as_str(), Some("hello world"));
    }

    #[test]
    fn test_exact_resize() {
        let mut buf = Buffer::with_scheme(4, AllocScheme::Exact).unwrap();
        buf.resize(20).unwrap();
        assert_eq!(buf.size(), 30);
        // Smaller request keeps the current size
        buf.resize(5).unwrap();
        assert_eq!(buf.size(), 30);
    }

    #[test]
    fn test_double_resize() {
        let mut buf = Buffer::with_scheme(8, AllocScheme::DoubleIt).unwrap();
        buf.resize(50).unwrap();
        assert_eq!(buf.size(), 64);

        let mut empty = Buffer::with_scheme(0, AllocScheme::DoubleIt).unwrap();
        empty.resize(5).unwrap();
        assert_eq!(empty.size(), 15);
    }

    #[test]
    fn test_grow() {
        let mut buf = Buffer::with_size(10).unwrap();
        assert_eq!(buf.grow(2).unwrap(), 0);
        buf.cat("abcdef").unwrap();
        let gained = buf.grow(20).unwrap();
        assert_eq!(buf.size(), 6 + 20 + 100);
        assert_eq!(gained, 120);
    }

    #[test]
    fn test_shrink() {
        let mut buf = Buffer::new().unwrap();
        buf.cat("abcdef").unwrap();
        assert_eq!(buf.shrink(2).unwrap(), 2);
        assert_eq!(buf.content(), b"cdef");
        assert!(buf.shrink(10).is_err());
        assert_eq!(buf.content(), b"cdef");
    }

    #[test]
    fn test_immutable_view() {
        assert!(Buffer::from_static(b"").is_none());
        let mut buf = Buffer::from_static(b"static text").unwrap();
        assert_eq!(buf.add(b"x", None), Err(TreeError::ImmutableBuffer));
        assert_eq!(buf.resize(100), Err(TreeError::ImmutableBuffer));
        assert_eq!(buf.grow(100).unwrap(), 0);
        buf.set_allocation_scheme(AllocScheme::DoubleIt);
        assert_eq!(buf.scheme(), AllocScheme::Immutable);

        assert_eq!(buf.shrink(7).unwrap(), 7);
        assert_eq!(buf.content(), b"text");
        buf.empty();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_quoted_string() {
        let mut buf = Buffer::new().unwrap();
        buf.write_quoted_string("plain").unwrap();
        buf.write_quoted_string("say \"hi\"").unwrap();
        buf.write_quoted_string("both ' and \"").unwrap();
        assert_eq!(
            buf.as_str(),
            Some("\"plain\"'say \"hi\"'\"both ' and &quot;\"")
        );
    }

    #[test]
    fn test_ccat_and_dump() {
        let mut buf = Buffer::with_size(0).unwrap();
        buf.ccat("incremental").unwrap();
        let mut out = Vec::new();
        assert_eq!(buf.dump(&mut out).unwrap(), 11);
        assert_eq!(out, b"incremental");
        assert_eq!(buf.into_string(), "incremental");
    }

    #[test]
    fn test_scheme_names() {
        assert_eq!(AllocScheme::from_name("double"), Some(AllocScheme::DoubleIt));
        assert_eq!(AllocScheme::from_name("exact"), Some(AllocScheme::Exact));
        assert_eq!(AllocScheme::from_name("hybrid"), None);
    }
}
