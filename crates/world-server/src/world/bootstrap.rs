//! Deterministic "town square" parcel generation: when no snapshot exists
//! on disk, the world still needs a reproducible starting layout rather
//! than an empty void. Grounded in
//! `original_source/server/CryptoVoxelsLoader.cpp`'s notion of a
//! deterministically imported block layout, reduced here to a fixed base
//! block reflected/rotated by [`Matrix2d`] per parcel.

use world_common::geom::{Matrix2d, Vec2};
use world_common::ids::UserId;
use world_common::model::{LifecycleState, Parcel};

/// Half-extent of the base square block, in world units, before any
/// transform is applied.
const BLOCK_HALF_EXTENT: f64 = 10.0;
/// The base block's center, deliberately off both axes so the 8
/// reflection/rotation variants below land on 8 distinct locations.
const BASE_CENTER: Vec2<f64> = Vec2 { x: 15.0, y: 6.0 };

/// (apply reflection first?, then rotate by this many quarter-turns).
const VARIANTS: [(bool, u8); 8] = [
    (false, 0),
    (false, 1),
    (false, 2),
    (false, 3),
    (true, 0),
    (true, 1),
    (true, 2),
    (true, 3),
];

/// Builds the fixed set of bootstrap parcels: a base square block
/// reflected/rotated around the origin by a fixed sequence of [`Matrix2d`]
/// transforms, so a fresh server always starts with the same town square
/// regardless of when it's first run.
pub fn bootstrap_parcels() -> Vec<Parcel> {
    let corners = [
        Vec2::new(-BLOCK_HALF_EXTENT, -BLOCK_HALF_EXTENT),
        Vec2::new(BLOCK_HALF_EXTENT, -BLOCK_HALF_EXTENT),
        Vec2::new(BLOCK_HALF_EXTENT, BLOCK_HALF_EXTENT),
        Vec2::new(-BLOCK_HALF_EXTENT, BLOCK_HALF_EXTENT),
    ];

    VARIANTS
        .iter()
        .enumerate()
        .map(|(i, &(reflect, rotate_times))| {
            let mut center = BASE_CENTER;
            if reflect {
                center = Matrix2d::reflect_x().apply(center);
            }
            center = Matrix2d::rotation_90(rotate_times).apply(center);
            let verts = [
                Vec2::new(center.x + corners[0].x, center.y + corners[0].y),
                Vec2::new(center.x + corners[1].x, center.y + corners[1].y),
                Vec2::new(center.x + corners[2].x, center.y + corners[2].y),
                Vec2::new(center.x + corners[3].x, center.y + corners[3].y),
            ];
            Parcel {
                // IDs are assigned by `World::seed_parcel`'s allocator at
                // insertion time; the placeholder here is overwritten.
                id: world_common::ids::ParcelId::from_raw((i + 1) as u64),
                owner_user_id: UserId::INVALID,
                admin_user_ids: vec![],
                writer_user_ids: vec![],
                all_writeable: true,
                verts,
                zbounds: (-1.0, 50.0),
                created_time: 0.0,
                description: format!("town square block {}", i + 1),
                lifecycle_state: LifecycleState::Alive,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_is_deterministic() {
        let a = bootstrap_parcels();
        let b = bootstrap_parcels();
        assert_eq!(a, b);
    }

    #[test]
    fn bootstrap_parcels_have_ordered_zbounds() {
        for parcel in bootstrap_parcels() {
            assert!(parcel.zbounds_ordered());
        }
    }

    #[test]
    fn bootstrap_parcels_are_distinct_locations() {
        let parcels = bootstrap_parcels();
        for (i, a) in parcels.iter().enumerate() {
            for b in &parcels[i + 1..] {
                assert_ne!(a.verts, b.verts);
            }
        }
    }
}
