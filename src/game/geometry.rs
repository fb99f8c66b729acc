//! Collision primitives - circle and axis-aligned rectangle tests

use serde::{Deserialize, Serialize};

/// A 2D position or offset
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Check whether two circles overlap (strict, touching does not count)
pub fn circles_overlap(a: Vec2, radius_a: f32, b: Vec2, radius_b: f32) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let combined = radius_a + radius_b;
    dx * dx + dy * dy < combined * combined
}

/// Check whether a square hitbox of half-extent `half` centered at `center`
/// overlaps an axis-aligned rectangle at `(rx, ry)` with size `rw` x `rh`.
/// Circular hitboxes are approximated by their bounding square.
pub fn hitbox_overlaps_rect(center: Vec2, half: f32, rx: f32, ry: f32, rw: f32, rh: f32) -> bool {
    center.x + half > rx
        && center.x - half < rx + rw
        && center.y + half > ry
        && center.y - half < ry + rh
}

/// Push a square hitbox out of a rectangle along the axis of minimum
/// penetration. Assumes the hitbox overlaps the rectangle. Ties are broken
/// in a fixed face order: right, left, bottom, top.
pub fn resolve_hitbox_rect(center: Vec2, half: f32, rx: f32, ry: f32, rw: f32, rh: f32) -> Vec2 {
    let pen_right = (rx + rw) - (center.x - half); // distance to clear the right face
    let pen_left = (center.x + half) - rx; // distance to clear the left face
    let pen_bottom = (ry + rh) - (center.y - half); // distance to clear the bottom face
    let pen_top = (center.y + half) - ry; // distance to clear the top face

    let min_pen = pen_right.min(pen_left).min(pen_bottom).min(pen_top);

    let mut resolved = center;
    if min_pen == pen_right {
        resolved.x = rx + rw + half;
    } else if min_pen == pen_left {
        resolved.x = rx - half;
    } else if min_pen == pen_bottom {
        resolved.y = ry + rh + half;
    } else {
        resolved.y = ry - half;
    }
    resolved
}

/// Clamp a position so a hitbox of half-extent `half` stays inside
/// `[0, width] x [0, height]`
pub fn clamp_to_bounds(pos: Vec2, half: f32, width: f32, height: f32) -> Vec2 {
    Vec2 {
        x: pos.x.clamp(half, width - half),
        y: pos.y.clamp(half, height - half),
    }
}
