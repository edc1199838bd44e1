use macroquad::math::Vec2;

/// First blocking cell found along a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub cell: (i32, i32),
    /// Distance from the segment start to the boundary of the hit cell.
    pub distance: f32,
}

/// Walks the grid cells crossed by the segment `from -> to` using the
/// Amanatides–Woo voxel traversal and returns the first cell for which
/// `is_blocking` holds. The starting cell is never tested, so an agent standing
/// in a cell can always leave it. Callers treat out-of-bounds cells as blocking
/// inside `is_blocking`.
pub fn traverse_segment<F>(from: Vec2, to: Vec2, is_blocking: F) -> Option<RayHit>
where
    F: Fn(i32, i32) -> bool,
{
    let delta = to - from;
    let length = delta.length();
    if !length.is_finite() || length < 1e-6 {
        return None;
    }
    let dir = delta / length;

    let mut cell_x = from.x.floor() as i32;
    let mut cell_y = from.y.floor() as i32;
    let end_x = to.x.floor() as i32;
    let end_y = to.y.floor() as i32;

    let step_x: i32 = if dir.x > 0.0 { 1 } else { -1 };
    let step_y: i32 = if dir.y > 0.0 { 1 } else { -1 };

    let t_delta_x = if dir.x.abs() < 1e-6 {
        f32::INFINITY
    } else {
        (1.0 / dir.x).abs()
    };
    let t_delta_y = if dir.y.abs() < 1e-6 {
        f32::INFINITY
    } else {
        (1.0 / dir.y).abs()
    };

    let mut t_max_x = if dir.x.abs() < 1e-6 {
        f32::INFINITY
    } else if dir.x > 0.0 {
        ((cell_x as f32 + 1.0) - from.x) / dir.x
    } else {
        (cell_x as f32 - from.x) / dir.x
    };
    let mut t_max_y = if dir.y.abs() < 1e-6 {
        f32::INFINITY
    } else if dir.y > 0.0 {
        ((cell_y as f32 + 1.0) - from.y) / dir.y
    } else {
        (cell_y as f32 - from.y) / dir.y
    };

    // A segment can cross at most this many cell boundaries.
    let max_steps = (end_x - cell_x).unsigned_abs() + (end_y - cell_y).unsigned_abs() + 2;
    for _ in 0..max_steps {
        if cell_x == end_x && cell_y == end_y {
            return None;
        }
        let boundary;
        if t_max_x < t_max_y {
            if t_max_x > length {
                return None;
            }
            boundary = t_max_x;
            cell_x += step_x;
            t_max_x += t_delta_x;
        } else {
            if t_max_y > length {
                return None;
            }
            boundary = t_max_y;
            cell_y += step_y;
            t_max_y += t_delta_y;
        }

        if is_blocking(cell_x, cell_y) {
            return Some(RayHit {
                cell: (cell_x, cell_y),
                distance: boundary.max(0.0),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_segment_has_no_hit() {
        let hit = traverse_segment(Vec2::new(0.5, 0.5), Vec2::new(4.5, 2.5), |_, _| false);
        assert_eq!(hit, None);
    }

    #[test]
    fn stops_at_first_wall() {
        let hit = traverse_segment(Vec2::new(0.5, 0.5), Vec2::new(5.5, 0.5), |x, _| x >= 3)
            .unwrap();
        assert_eq!(hit.cell, (3, 0));
        assert!((hit.distance - 2.5).abs() < 1e-5);
    }

    #[test]
    fn start_cell_is_ignored() {
        let hit = traverse_segment(Vec2::new(1.2, 1.2), Vec2::new(1.8, 1.7), |_, _| true);
        assert_eq!(hit, None);
    }

    #[test]
    fn cannot_skip_over_a_thin_wall() {
        // One long step across a single-cell wall at x = 2.
        let hit = traverse_segment(Vec2::new(1.9, 0.5), Vec2::new(3.1, 0.5), |x, _| x == 2);
        assert_eq!(hit.map(|h| h.cell), Some((2, 0)));
    }

    #[test]
    fn diagonal_and_negative_directions() {
        let hit = traverse_segment(Vec2::new(5.5, 5.5), Vec2::new(0.5, 0.5), |x, y| {
            x < 0 || y < 0 || (x == 2 && y == 2)
        });
        assert_eq!(hit.map(|h| h.cell), Some((2, 2)));
        let out = traverse_segment(Vec2::new(0.5, 0.5), Vec2::new(-0.5, 0.5), |x, _| x < 0);
        assert_eq!(out.map(|h| h.cell), Some((-1, 0)));
    }
}
