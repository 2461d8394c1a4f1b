use crate::geom::Vec2;
use crate::ids::{ParcelId, UserId};
use crate::model::lifecycle::LifecycleState;

#[derive(Debug, Clone, PartialEq)]
pub struct Parcel {
    pub id: ParcelId,
    pub owner_user_id: UserId,
    pub admin_user_ids: Vec<UserId>,
    pub writer_user_ids: Vec<UserId>,
    pub all_writeable: bool,
    pub verts: [Vec2<f64>; 4],
    pub zbounds: (f64, f64),
    pub created_time: f64,
    pub description: String,
    pub lifecycle_state: LifecycleState,
}

impl Parcel {
    /// Invariant 5 (z-bounds half); convexity of `verts` is a property of
    /// how callers build the quad and isn't independently re-derivable
    /// server-side without a full polygon library, so it's checked at
    /// construction time by [`Self::new`] rather than as a standing
    /// invariant method.
    pub fn zbounds_ordered(&self) -> bool {
        self.zbounds.0 <= self.zbounds.1
    }

    pub fn contains_point(&self, p: Vec2<f64>) -> bool {
        // Standard point-in-convex-quad test via consistent winding of cross
        // products against each edge.
        let mut sign = 0f64;
        for i in 0..4 {
            let a = self.verts[i];
            let b = self.verts[(i + 1) % 4];
            let edge = Vec2::new(b.x - a.x, b.y - a.y);
            let to_p = Vec2::new(p.x - a.x, p.y - a.y);
            let cross = edge.x * to_p.y - edge.y * to_p.x;
            if cross.abs() < f64::EPSILON {
                continue;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    pub fn can_write(&self, user: UserId) -> bool {
        self.all_writeable
            || self.owner_user_id == user
            || self.admin_user_ids.contains(&user)
            || self.writer_user_ids.contains(&user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_parcel() -> Parcel {
        Parcel {
            id: ParcelId::from_raw(1),
            owner_user_id: UserId::from_raw(1),
            admin_user_ids: vec![],
            writer_user_ids: vec![UserId::from_raw(2)],
            all_writeable: false,
            verts: [
                Vec2::new(0.0, 0.0),
                Vec2::new(10.0, 0.0),
                Vec2::new(10.0, 10.0),
                Vec2::new(0.0, 10.0),
            ],
            zbounds: (0.0, 10.0),
            created_time: 0.0,
            description: String::new(),
            lifecycle_state: LifecycleState::Alive,
        }
    }

    #[test]
    fn contains_point_inside_and_outside() {
        let p = square_parcel();
        assert!(p.contains_point(Vec2::new(5.0, 5.0)));
        assert!(!p.contains_point(Vec2::new(50.0, 50.0)));
    }

    #[test]
    fn can_write_rules() {
        let p = square_parcel();
        assert!(p.can_write(UserId::from_raw(1))); // owner
        assert!(p.can_write(UserId::from_raw(2))); // writer
        assert!(!p.can_write(UserId::from_raw(3)));
    }

    #[test]
    fn all_writeable_overrides() {
        let mut p = square_parcel();
        p.all_writeable = true;
        assert!(p.can_write(UserId::from_raw(99)));
    }

    #[test]
    fn zbounds_ordering_check() {
        let mut p = square_parcel();
        assert!(p.zbounds_ordered());
        p.zbounds = (5.0, 1.0);
        assert!(!p.zbounds_ordered());
    }
}
