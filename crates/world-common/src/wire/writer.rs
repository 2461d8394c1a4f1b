use bytes::{BufMut, BytesMut};

use crate::geom::{Vec2, Vec3};

/// Appends little-endian primitives to a `BytesMut`. The encode side never
/// fails (lengths are whatever they are; callers that build the in-memory
/// model are trusted, per spec §7 decoders being where validation lives).
pub(crate) struct ByteWriter<'a> {
    buf: &'a mut BytesMut,
}

impl<'a> ByteWriter<'a> {
    pub fn new(buf: &'a mut BytesMut) -> Self {
        Self { buf }
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn bool(&mut self, v: bool) {
        self.u8(v as u8);
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    pub fn f32(&mut self, v: f32) {
        self.buf.put_f32_le(v);
    }

    pub fn f64(&mut self, v: f64) {
        self.buf.put_f64_le(v);
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.put_slice(v);
    }

    pub fn string(&mut self, v: &str) {
        self.u32(v.len() as u32);
        self.buf.put_slice(v.as_bytes());
    }

    pub fn vec2_f64(&mut self, v: Vec2<f64>) {
        self.f64(v.x);
        self.f64(v.y);
    }

    pub fn vec3_f64(&mut self, v: Vec3<f64>) {
        self.f64(v.x);
        self.f64(v.y);
        self.f64(v.z);
    }

    pub fn vec3_f32(&mut self, v: Vec3<f32>) {
        self.f32(v.x);
        self.f32(v.y);
        self.f32(v.z);
    }

    pub fn vec3_i32(&mut self, v: Vec3<i32>) {
        self.i32(v.x);
        self.i32(v.y);
        self.i32(v.z);
    }

    pub fn vec<T>(&mut self, items: &[T], mut write_one: impl FnMut(&mut Self, &T)) {
        self.u32(items.len() as u32);
        for item in items {
            write_one(self, item);
        }
    }
}
