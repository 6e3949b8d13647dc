//! Percentage-based geometry for watermark areas.
//!
//! Every coordinate here is a percentage (0-100) of the frame's width or
//! height, so a selection survives any change in display size. Pointer
//! positions are converted into this space by [`Bounds::relative`] before
//! they reach the draw/move/resize functions.

use serde::{Deserialize, Serialize};

/// Smallest width/height (in percent) a selection is allowed to shrink to.
pub const MIN_SIZE: f64 = 2.0;

/// A point in percentage space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A rectangle in percentage space marking a watermark region.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Area {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Area {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the area is big enough to be confirmed.
    pub fn is_valid(&self) -> bool {
        self.width > 1.0 && self.height > 1.0
    }

    /// Whether the area is too small to be anything but a click.
    pub fn is_click(&self) -> bool {
        self.width < MIN_SIZE || self.height < MIN_SIZE
    }

    /// Converts the area into pixel bounds `(x, y, width, height)` on a
    /// surface of the given size.
    pub fn to_pixels(&self, surface_width: u32, surface_height: u32) -> (f64, f64, f64, f64) {
        let sw = f64::from(surface_width);
        let sh = f64::from(surface_height);
        (
            self.x / 100.0 * sw,
            self.y / 100.0 * sh,
            self.width / 100.0 * sw,
            self.height / 100.0 * sh,
        )
    }
}

/// A container's bounding box in client (pointer) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Maps a client-space pointer position into percentage space, clamped
    /// to `[0, 100]` on both axes.
    ///
    /// A degenerate container maps everything to the origin.
    pub fn relative(&self, client_x: f64, client_y: f64) -> Point {
        if self.width <= 0.0 || self.height <= 0.0 {
            return Point::default();
        }
        let x = (client_x - self.left) / self.width * 100.0;
        let y = (client_y - self.top) / self.height * 100.0;
        Point::new(x.clamp(0.0, 100.0), y.clamp(0.0, 100.0))
    }
}

/// One of the eight resize anchors on a selection's border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::TopLeft,
        Handle::TopCenter,
        Handle::TopRight,
        Handle::CenterLeft,
        Handle::CenterRight,
        Handle::BottomLeft,
        Handle::BottomCenter,
        Handle::BottomRight,
    ];

    pub fn moves_top(self) -> bool {
        matches!(self, Handle::TopLeft | Handle::TopCenter | Handle::TopRight)
    }

    pub fn moves_bottom(self) -> bool {
        matches!(
            self,
            Handle::BottomLeft | Handle::BottomCenter | Handle::BottomRight
        )
    }

    pub fn moves_left(self) -> bool {
        matches!(
            self,
            Handle::TopLeft | Handle::CenterLeft | Handle::BottomLeft
        )
    }

    pub fn moves_right(self) -> bool {
        matches!(
            self,
            Handle::TopRight | Handle::CenterRight | Handle::BottomRight
        )
    }
}

/// Rectangle spanned by a drag from `start` to `current`.
pub fn draw(start: Point, current: Point) -> Area {
    Area {
        x: start.x.min(current.x),
        y: start.y.min(current.y),
        width: (current.x - start.x).abs(),
        height: (current.y - start.y).abs(),
    }
}

/// Translates a selection by a pointer delta. No clamping here.
pub fn translate(start: Area, dx: f64, dy: f64) -> Area {
    Area {
        x: start.x + dx,
        y: start.y + dy,
        ..start
    }
}

/// Drags the edges implicated by `handle` by a pointer delta.
///
/// Dragging an edge past the opposite one flips the rectangle instead of
/// producing a negative dimension.
pub fn resize(start: Area, handle: Handle, dx: f64, dy: f64) -> Area {
    let Area {
        mut x,
        mut y,
        mut width,
        mut height,
    } = start;

    if handle.moves_right() {
        width += dx;
    }
    if handle.moves_left() {
        x += dx;
        width -= dx;
    }
    if handle.moves_bottom() {
        height += dy;
    }
    if handle.moves_top() {
        y += dy;
        height -= dy;
    }

    if width < 0.0 {
        x += width;
        width = -width;
    }
    if height < 0.0 {
        y += height;
        height = -height;
    }

    Area {
        x,
        y,
        width,
        height,
    }
}

/// Forces an area back inside the frame.
///
/// Offsets are kept within `[0, 100 - MIN_SIZE]` so the minimum size always
/// fits; dimensions are at least [`MIN_SIZE`] and never overflow the right
/// or bottom edge.
pub fn constrain(area: Area) -> Area {
    let x = area.x.clamp(0.0, 100.0 - MIN_SIZE);
    let y = area.y.clamp(0.0, 100.0 - MIN_SIZE);
    Area {
        x,
        y,
        width: area.width.max(MIN_SIZE).min(100.0 - x),
        height: area.height.max(MIN_SIZE).min(100.0 - y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inside_frame(a: &Area) -> bool {
        a.x >= 0.0
            && a.y >= 0.0
            && a.x + a.width <= 100.0 + 1e-9
            && a.y + a.height <= 100.0 + 1e-9
            && a.width >= MIN_SIZE
            && a.height >= MIN_SIZE
    }

    #[test]
    fn relative_clamps_to_container() {
        let bounds = Bounds::new(100.0, 50.0, 200.0, 100.0);
        assert_eq!(bounds.relative(200.0, 100.0), Point::new(50.0, 50.0));
        assert_eq!(bounds.relative(0.0, 0.0), Point::new(0.0, 0.0));
        assert_eq!(bounds.relative(1000.0, 1000.0), Point::new(100.0, 100.0));
    }

    #[test]
    fn relative_on_empty_container_is_origin() {
        let bounds = Bounds::new(10.0, 10.0, 0.0, 20.0);
        assert_eq!(bounds.relative(15.0, 15.0), Point::default());
    }

    #[test]
    fn draw_normalizes_direction() {
        let a = draw(Point::new(60.0, 40.0), Point::new(20.0, 70.0));
        assert_eq!(a, Area::new(20.0, 40.0, 40.0, 30.0));
    }

    #[test]
    fn resize_right_edge_grows_width_only() {
        let a = resize(Area::new(10.0, 10.0, 20.0, 20.0), Handle::CenterRight, 5.0, 30.0);
        assert_eq!(a, Area::new(10.0, 10.0, 25.0, 20.0));
    }

    #[test]
    fn resize_top_left_moves_origin() {
        let a = resize(Area::new(10.0, 10.0, 20.0, 20.0), Handle::TopLeft, 5.0, -5.0);
        assert_eq!(a, Area::new(15.0, 5.0, 15.0, 25.0));
    }

    #[test]
    fn resize_past_opposite_edge_flips_to_swept_region() {
        // Right edge at 30 dragged to 5: the box now spans 5..10.
        let a = resize(Area::new(10.0, 10.0, 20.0, 20.0), Handle::CenterRight, -25.0, 0.0);
        assert_eq!(a, Area::new(5.0, 10.0, 5.0, 20.0));

        // Top edge at 10 dragged to 45: the box now spans 30..45.
        let b = resize(Area::new(10.0, 10.0, 20.0, 20.0), Handle::TopCenter, 0.0, 35.0);
        assert_eq!(b, Area::new(10.0, 30.0, 20.0, 15.0));
        assert!(b.width >= 0.0 && b.height >= 0.0);
    }

    #[test]
    fn constrain_pulls_everything_inside() {
        let a = constrain(Area::new(-5.0, 99.5, 0.5, 10.0));
        assert_eq!(a.x, 0.0);
        assert_eq!(a.y, 98.0);
        assert_eq!(a.width, MIN_SIZE);
        assert_eq!(a.height, MIN_SIZE);
    }

    #[test]
    fn every_gesture_ends_inside_the_frame() {
        let start = Area::new(40.0, 40.0, 20.0, 20.0);
        let deltas = [-120.0, -60.0, -21.0, -1.0, 0.0, 0.5, 19.0, 45.0, 130.0];
        for &dx in &deltas {
            for &dy in &deltas {
                assert!(inside_frame(&constrain(translate(start, dx, dy))));
                for handle in Handle::ALL {
                    let resized = constrain(resize(start, handle, dx, dy));
                    assert!(inside_frame(&resized), "{handle:?} {dx} {dy}: {resized:?}");
                }
                let p = Point::new((50.0 + dx).clamp(0.0, 100.0), (50.0 + dy).clamp(0.0, 100.0));
                assert!(inside_frame(&constrain(draw(Point::new(50.0, 50.0), p))));
            }
        }
    }

    #[test]
    fn pixels_scale_with_surface() {
        let (x, y, w, h) = Area::new(50.0, 25.0, 10.0, 50.0).to_pixels(200, 400);
        assert_eq!((x, y, w, h), (100.0, 100.0, 20.0, 200.0));
    }
}
