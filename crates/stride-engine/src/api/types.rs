use glam::Vec2;

/// Unique badge identifying a scheduled entity.
///
/// Badges are issued by the level scheduler, monotonically increasing and
/// never reused within a level. `EntityId::UNSET` marks an entity that has
/// not been handed to a scheduler yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl EntityId {
    pub const UNSET: EntityId = EntityId(0);
}

/// A sound cue emitted by simulation logic.
/// The numeric value maps to a host-defined sound; the core never decodes
/// or mixes audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct SoundCue(pub u32);

/// Axis-aligned bounding box: top-left corner plus size, Y-down.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub pos: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            pos: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    pub fn center(&self) -> Vec2 {
        self.pos + self.size / 2.0
    }

    /// Overlap test. Touching edges do not count as overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.pos.x < other.pos.x + other.size.x
            && self.pos.x + self.size.x > other.pos.x
            && self.pos.y < other.pos.y + other.size.y
            && self.pos.y + self.size.y > other.pos.y
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.pos.x
            && p.x < self.pos.x + self.size.x
            && p.y >= self.pos.y
            && p.y < self.pos.y + self.size.y
    }

    pub fn translated(&self, by: Vec2) -> Rect {
        Rect {
            pos: self.pos + by,
            size: self.size,
        }
    }

    pub fn at(&self, pos: Vec2) -> Rect {
        Rect {
            pos,
            size: self.size,
        }
    }

    /// Integer cell span `(x0, y0, x1, y1)` covered by this rect,
    /// end-exclusive. A degenerate rect still covers the cell under its
    /// corner.
    pub fn cell_span(&self) -> (i32, i32, i32, i32) {
        let x0 = self.pos.x.floor() as i32;
        let y0 = self.pos.y.floor() as i32;
        let x1 = ((self.pos.x + self.size.x).ceil() as i32).max(x0 + 1);
        let y1 = ((self.pos.y + self.size.y).ceil() as i32).max(y0 + 1);
        (x0, y0, x1, y1)
    }

    /// The point inside this rect closest to `p`.
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(self.pos.x, self.pos.x + self.size.x),
            p.y.clamp(self.pos.y, self.pos.y + self.size.y),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_and_touching() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        let c = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // edge contact only
    }

    #[test]
    fn center_and_closest_point() {
        let r = Rect::new(0.0, 0.0, 4.0, 2.0);
        assert_eq!(r.center(), Vec2::new(2.0, 1.0));
        assert_eq!(r.closest_point(Vec2::new(10.0, -5.0)), Vec2::new(4.0, 0.0));
    }
}
