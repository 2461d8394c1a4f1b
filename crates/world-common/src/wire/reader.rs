use super::error::{Malformed, ReadErr};
use crate::geom::{Vec2, Vec3};

/// Cursor over an in-memory buffer that reads little-endian primitives.
///
/// Every read returns [`ReadErr::NeedMore`] rather than panicking or
/// consuming the buffer when there isn't enough data yet, so a
/// [`tokio_util::codec::Decoder`] can call a reader speculatively against
/// whatever bytes have arrived so far, and simply wait for more on
/// `NeedMore` without losing any state (the underlying `BytesMut` is only
/// advanced once a full frame has been confirmed present).
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes consumed so far. The caller advances the real buffer
    /// by this amount once decoding succeeds.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ReadErr> {
        if self.buf.len() - self.pos < n {
            return Err(ReadErr::NeedMore);
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn u8(&mut self) -> Result<u8, ReadErr> {
        Ok(self.take(1)?[0])
    }

    pub fn bool(&mut self) -> Result<bool, ReadErr> {
        Ok(self.u8()? != 0)
    }

    pub fn u32(&mut self) -> Result<u32, ReadErr> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn u64(&mut self) -> Result<u64, ReadErr> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn i32(&mut self) -> Result<i32, ReadErr> {
        Ok(self.u32()? as i32)
    }

    pub fn f32(&mut self) -> Result<f32, ReadErr> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn f64(&mut self) -> Result<f64, ReadErr> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn bytes_exact(&mut self, n: usize) -> Result<&'a [u8], ReadErr> {
        self.take(n)
    }

    /// Reads the remainder of the buffer as an opaque blob. Used for the
    /// voice packet payload, which the server never interprets.
    pub fn remainder(&mut self) -> &'a [u8] {
        let s = &self.buf[self.pos..];
        self.pos = self.buf.len();
        s
    }

    pub fn string(&mut self, max_len: u32) -> Result<String, ReadErr> {
        let len = self.u32()?;
        if len > max_len {
            return Err(ReadErr::Malformed(Malformed::StringTooLong {
                max: max_len,
                got: len,
            }));
        }
        let raw = self.take(len as usize)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| ReadErr::Malformed(Malformed::InvalidUtf8))
    }

    pub fn vec2_f64(&mut self) -> Result<Vec2<f64>, ReadErr> {
        Ok(Vec2::new(self.f64()?, self.f64()?))
    }

    pub fn vec3_f64(&mut self) -> Result<Vec3<f64>, ReadErr> {
        Ok(Vec3::new(self.f64()?, self.f64()?, self.f64()?))
    }

    pub fn vec3_f32(&mut self) -> Result<Vec3<f32>, ReadErr> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    pub fn vec3_i32(&mut self) -> Result<Vec3<i32>, ReadErr> {
        Ok(Vec3::new(self.i32()?, self.i32()?, self.i32()?))
    }

    /// Reads a `u32`-count-prefixed vector, applying `read_one` to each
    /// element and rejecting counts above `max_count`.
    pub fn vec<T>(
        &mut self,
        max_count: u32,
        mut read_one: impl FnMut(&mut Self) -> Result<T, ReadErr>,
    ) -> Result<Vec<T>, ReadErr> {
        let count = self.u32()?;
        if count > max_count {
            return Err(ReadErr::Malformed(Malformed::VecTooLong {
                max: max_count,
                got: count,
            }));
        }
        let mut out = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            out.push(read_one(self)?);
        }
        Ok(out)
    }
}
