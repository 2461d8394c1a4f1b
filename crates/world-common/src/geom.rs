//! Minimal vector types. The server only ever stores, compares and
//! encodes/decodes these fields — no vector algebra is needed, so unlike the
//! client-side crates in the example pack this doesn't pull in `glam`.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> Vec3<T> {
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2<T> {
    pub x: T,
    pub y: T,
}

impl<T> Vec2<T> {
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

/// A 2x2 transform matrix, used to generate deterministic bootstrap parcel
/// layouts (reflections/rotations of a base block) per spec §6.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix2d {
    pub m00: f64,
    pub m01: f64,
    pub m10: f64,
    pub m11: f64,
}

impl Matrix2d {
    pub const IDENTITY: Self = Self {
        m00: 1.0,
        m01: 0.0,
        m10: 0.0,
        m11: 1.0,
    };

    pub const fn rotation_90(times: u8) -> Self {
        match times % 4 {
            0 => Self::IDENTITY,
            1 => Self {
                m00: 0.0,
                m01: -1.0,
                m10: 1.0,
                m11: 0.0,
            },
            2 => Self {
                m00: -1.0,
                m01: 0.0,
                m10: 0.0,
                m11: -1.0,
            },
            _ => Self {
                m00: 0.0,
                m01: 1.0,
                m10: -1.0,
                m11: 0.0,
            },
        }
    }

    pub const fn reflect_x() -> Self {
        Self {
            m00: -1.0,
            m01: 0.0,
            m10: 0.0,
            m11: 1.0,
        }
    }

    pub fn apply(&self, v: Vec2<f64>) -> Vec2<f64> {
        Vec2::new(
            self.m00 * v.x + self.m01 * v.y,
            self.m10 * v.x + self.m11 * v.y,
        )
    }
}
