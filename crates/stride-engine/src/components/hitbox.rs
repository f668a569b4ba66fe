//! Hit-box shapes and precise collision testing.
//!
//! The bounding box answers coarse queries; the hit-box refines them.
//! Testing picks the more precise of the two shapes involved: any pairing
//! with a pixel mask samples per-cell opacity inside the overlapping
//! rectangle, circles use centre distance, plain rectangles use AABB
//! overlap. Testing never mutates either side.

use std::sync::Arc;

use glam::Vec2;

use crate::api::types::Rect;

/// Per-cell opacity bitmap, row-major. Stretched over the owning entity's
/// bounding box when sampled.
#[derive(Debug, Clone)]
pub struct PixelMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl PixelMask {
    /// Build from an explicit bitmap. `bits.len()` must equal
    /// `width * height`.
    pub fn new(width: u32, height: u32, bits: Vec<bool>) -> Self {
        assert_eq!(bits.len(), (width * height) as usize);
        Self {
            width,
            height,
            bits,
        }
    }

    /// Build by sampling a predicate over the grid.
    pub fn from_fn(width: u32, height: u32, mut opaque: impl FnMut(u32, u32) -> bool) -> Self {
        let mut bits = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                bits.push(opaque(x, y));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Opacity at a mask cell. Out-of-range samples are transparent.
    pub fn opaque(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[(y * self.width + x) as usize]
    }
}

/// Shape used for precise collision testing, distinct from the bounding
/// box used for coarse queries.
#[derive(Clone)]
pub enum Hitbox {
    /// The bounding box itself.
    Rectangle,
    /// Circle centred on the bounding box.
    Circle { radius: f32 },
    /// Opacity masks stretched over the bounding box, one per visual
    /// frame so the hit shape tracks the animation; a single-element
    /// slice acts as a static mask. Shared so templated spawns do not
    /// copy the bitmaps.
    Mask(Arc<[PixelMask]>),
}

impl Hitbox {
    fn opaque_at(&self, bounds: &Rect, point: Vec2, frame: usize) -> bool {
        match self {
            Hitbox::Rectangle => bounds.contains_point(point),
            Hitbox::Circle { radius } => point.distance(bounds.center()) <= *radius,
            Hitbox::Mask(masks) => {
                // Frames past the last mask keep sampling the last mask.
                let Some(mask) = masks.get(frame).or_else(|| masks.last()) else {
                    return false;
                };
                if !bounds.contains_point(point) || bounds.size.x <= 0.0 || bounds.size.y <= 0.0 {
                    return false;
                }
                let local = (point - bounds.pos) / bounds.size;
                let mx = (local.x * mask.width() as f32) as u32;
                let my = (local.y * mask.height() as f32) as u32;
                mask.opaque(mx, my)
            }
        }
    }
}

/// Precise collision test between two placed hit-boxes. The frame
/// arguments are the entities' current visual frame indices; they select
/// which mask an animated mask shape samples.
pub fn collides(
    a_bounds: &Rect,
    a: &Hitbox,
    a_frame: usize,
    b_bounds: &Rect,
    b: &Hitbox,
    b_frame: usize,
) -> bool {
    match (a, b) {
        (Hitbox::Mask(_), _) | (_, Hitbox::Mask(_)) => {
            mask_overlap(a_bounds, a, a_frame, b_bounds, b, b_frame)
        }
        (Hitbox::Circle { radius: ra }, Hitbox::Circle { radius: rb }) => {
            a_bounds.center().distance(b_bounds.center()) < ra + rb
        }
        (Hitbox::Rectangle, Hitbox::Circle { radius }) => {
            rect_circle(a_bounds, b_bounds.center(), *radius)
        }
        (Hitbox::Circle { radius }, Hitbox::Rectangle) => {
            rect_circle(b_bounds, a_bounds.center(), *radius)
        }
        (Hitbox::Rectangle, Hitbox::Rectangle) => a_bounds.overlaps(b_bounds),
    }
}

fn rect_circle(rect: &Rect, center: Vec2, radius: f32) -> bool {
    rect.closest_point(center).distance(center) < radius
}

/// Sample unit cells inside the overlapping rectangle, requiring both
/// shapes to be opaque at the same point.
fn mask_overlap(
    a_bounds: &Rect,
    a: &Hitbox,
    a_frame: usize,
    b_bounds: &Rect,
    b: &Hitbox,
    b_frame: usize,
) -> bool {
    if !a_bounds.overlaps(b_bounds) {
        return false;
    }
    let x0 = a_bounds.pos.x.max(b_bounds.pos.x).floor() as i32;
    let y0 = a_bounds.pos.y.max(b_bounds.pos.y).floor() as i32;
    let x1 = (a_bounds.pos.x + a_bounds.size.x)
        .min(b_bounds.pos.x + b_bounds.size.x)
        .ceil() as i32;
    let y1 = (a_bounds.pos.y + a_bounds.size.y)
        .min(b_bounds.pos.y + b_bounds.size.y)
        .ceil() as i32;

    for y in y0..y1 {
        for x in x0..x1 {
            let point = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            if a.opaque_at(a_bounds, point, a_frame) && b.opaque_at(b_bounds, point, b_frame) {
                return true;
            }
        }
    }
    false
}
