// Copyright 2025 the Thicket Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry helpers shared by the tree and the query layer.

use kurbo::{Affine, Point, Rect};
use thicket_index::Aabb;

/// Transform an axis-aligned `Rect` by an `Affine` and return a conservative
/// axis-aligned bounding box in scene space.
pub(crate) fn transform_rect_bbox(affine: Affine, rect: Rect) -> Rect {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    let min_x = (a * rect.x0).min(a * rect.x1) + (c * rect.y0).min(c * rect.y1);
    let max_x = (a * rect.x0).max(a * rect.x1) + (c * rect.y0).max(c * rect.y1);
    let min_y = (b * rect.x0).min(b * rect.x1) + (d * rect.y0).min(d * rect.y1);
    let max_y = (b * rect.x0).max(b * rect.x1) + (d * rect.y0).max(d * rect.y1);
    Rect::new(min_x + e, min_y + f, max_x + e, max_y + f)
}

pub(crate) fn rect_to_aabb(r: Rect) -> Aabb {
    Aabb::new(r.x0, r.y0, r.x1, r.y1)
}

/// True if the affine is a pure translation.
pub(crate) fn is_translation(affine: Affine) -> bool {
    let [a, b, c, d, _, _] = affine.as_coeffs();
    a == 1.0 && b == 0.0 && c == 0.0 && d == 1.0
}

/// The four corners of `rect` mapped through `affine` (a parallelogram).
pub(crate) fn transform_rect_quad(affine: Affine, rect: Rect) -> [Point; 4] {
    [
        affine * Point::new(rect.x0, rect.y0),
        affine * Point::new(rect.x1, rect.y0),
        affine * Point::new(rect.x1, rect.y1),
        affine * Point::new(rect.x0, rect.y1),
    ]
}

/// Exact overlap test between a transformed rectangle (as a parallelogram)
/// and an axis-aligned rectangle, via separating axes. Edge contact counts
/// as overlap.
pub(crate) fn quad_overlaps_rect(quad: &[Point; 4], rect: Rect) -> bool {
    // Degenerate rects and quads still participate: a zero-area interval
    // simply projects to a single value.
    let axes = [
        (1.0, 0.0),
        (0.0, 1.0),
        // The two unique edge normals of the parallelogram.
        (-(quad[1].y - quad[0].y), quad[1].x - quad[0].x),
        (-(quad[3].y - quad[0].y), quad[3].x - quad[0].x),
    ];
    let rect_pts = [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
    ];
    for (ax, ay) in axes {
        if ax == 0.0 && ay == 0.0 {
            continue;
        }
        let (mut qmin, mut qmax) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in quad {
            let d = p.x * ax + p.y * ay;
            qmin = qmin.min(d);
            qmax = qmax.max(d);
        }
        let (mut rmin, mut rmax) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in rect_pts {
            let d = p.x * ax + p.y * ay;
            rmin = rmin.min(d);
            rmax = rmax.max(d);
        }
        if qmax < rmin || rmax < qmin {
            return false;
        }
    }
    true
}

/// True if the axis-aligned `rect` fully contains the parallelogram.
pub(crate) fn rect_contains_quad(rect: Rect, quad: &[Point; 4]) -> bool {
    quad.iter()
        .all(|p| rect.x0 <= p.x && p.x <= rect.x1 && rect.y0 <= p.y && p.y <= rect.y1)
}
