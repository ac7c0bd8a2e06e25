//! Integer screen space geometry, used to place sources and clouds on the playfield.

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// A position on the playfield plane. `y` grows downwards.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

// -------------------------------------------------------------------------------------------------

/// A placement rectangle on the playfield plane.
///
/// Width and height are always strictly positive: rectangles are used as denominators
/// when mapping grain positions to source offsets and gains, so degenerate ones can't
/// be created. The right and bottom edges always fit into an `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl Rect {
    /// Create a new rectangle. Fails when `width` or `height` is not positive, or when the
    /// right or bottom edge does not fit into an `i32`.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Result<Self, Error> {
        if width <= 0 || height <= 0 {
            return Err(Error::ParameterError(format!(
                "Invalid rectangle size: {width}x{height}. Width and height must be > 0"
            )));
        }
        if x.checked_add(width).is_none() || y.checked_add(height).is_none() {
            return Err(Error::ParameterError(format!(
                "Invalid rectangle position: {x},{y} with size {width}x{height} is out of range"
            )));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Create a new rectangle with the given size, centered at the given point.
    pub fn centered_at(center: Point, width: i32, height: i32) -> Result<Self, Error> {
        let out_of_range = || {
            Error::ParameterError(format!(
                "Invalid rectangle center: {},{} is out of range",
                center.x, center.y
            ))
        };
        let x = center.x.checked_sub(width / 2).ok_or_else(out_of_range)?;
        let y = center.y.checked_sub(height / 2).ok_or_else(out_of_range)?;
        Self::new(x, y, width, height)
    }

    pub fn x(&self) -> i32 {
        self.x
    }
    pub fn y(&self) -> i32 {
        self.y
    }
    pub fn width(&self) -> i32 {
        self.width
    }
    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn left(&self) -> i32 {
        self.x
    }
    pub fn top(&self) -> i32 {
        self.y
    }
    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }
    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Copy of this rectangle, moved to the given top left position. Fails when the moved
    /// rectangle's edges would leave the `i32` range.
    pub fn with_origin(&self, origin: Point) -> Result<Self, Error> {
        Self::new(origin.x, origin.y, self.width, self.height)
    }

    /// True when the point lies within the half open range `[left, right) x [top, bottom)`.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_sizes() {
        assert!(Rect::new(0, 0, 0, 10).is_err());
        assert!(Rect::new(0, 0, 10, 0).is_err());
        assert!(Rect::new(0, 0, -5, 10).is_err());
        assert!(Rect::new(-20, -20, 1, 1).is_ok());
    }

    #[test]
    fn contains_is_half_open() {
        let rect = Rect::new(10, 20, 30, 40).unwrap();
        assert!(rect.contains(Point::new(10, 20)));
        assert!(rect.contains(Point::new(39, 59)));
        assert!(!rect.contains(Point::new(40, 20)));
        assert!(!rect.contains(Point::new(10, 60)));
        assert!(!rect.contains(Point::new(9, 30)));
    }

    #[test]
    fn centered() {
        let rect = Rect::centered_at(Point::new(100, 100), 160, 160).unwrap();
        assert_eq!(rect.origin(), Point::new(20, 20));
        assert_eq!(rect.right(), 180);
        assert_eq!(rect.bottom(), 180);

        let moved = rect.with_origin(Point::new(0, 5)).unwrap();
        assert_eq!((moved.x(), moved.y()), (0, 5));
        assert_eq!((moved.width(), moved.height()), (160, 160));
    }

    #[test]
    fn rejects_out_of_range_edges() {
        assert!(Rect::new(i32::MAX - 50, 0, 160, 160).is_err());
        assert!(Rect::new(0, i32::MAX - 50, 160, 160).is_err());
        assert!(Rect::new(i32::MAX - 160, i32::MAX - 160, 160, 160).is_ok());
        assert!(Rect::new(i32::MIN, i32::MIN, 160, 160).is_ok());

        let rect = Rect::new(0, 0, 160, 160).unwrap();
        assert!(rect.with_origin(Point::new(i32::MAX - 10, 0)).is_err());
        assert!(Rect::centered_at(Point::new(i32::MIN, 0), 160, 160).is_err());
        assert!(Rect::centered_at(Point::new(i32::MAX - 10, 0), 160, 160).is_err());
    }
}
