use std::fmt;

/// The shape of a row-major matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    rows: usize,
    cols: usize,
}

impl Shape {
    /// Create a new shape from row and column counts.
    pub const fn new(rows: usize, cols: usize) -> Self {
        Shape { rows, cols }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of elements (`rows * cols`).
    ///
    /// Saturates at `usize::MAX` so that absurd shapes still compare as
    /// larger than any capacity instead of wrapping around.
    pub fn numel(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// Total number of elements, or `None` if `rows * cols` overflows.
    pub fn checked_numel(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }

    /// Linear row-major offset of `(row, col)`, or `None` outside the extent.
    pub fn offset(&self, row: usize, col: usize) -> Option<usize> {
        if row < self.rows && col < self.cols {
            Some(row * self.cols + col)
        } else {
            None
        }
    }

    /// Inverse of [`Shape::offset`] for a linear index inside the extent.
    pub fn coords(&self, index: usize) -> Option<(usize, usize)> {
        if self.cols == 0 || index >= self.numel() {
            return None;
        }
        Some((index / self.cols, index % self.cols))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}x{}]", self.rows, self.cols)
    }
}

impl From<(usize, usize)> for Shape {
    fn from((rows, cols): (usize, usize)) -> Self {
        Shape::new(rows, cols)
    }
}

impl From<Shape> for (usize, usize) {
    fn from(shape: Shape) -> Self {
        (shape.rows, shape.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_shape() {
        let s = Shape::new(2, 3);
        assert_eq!(s.rows(), 2);
        assert_eq!(s.cols(), 3);
        assert_eq!(s.numel(), 6);
        assert_eq!(s.to_string(), "[2x3]");
    }

    #[test]
    fn test_offset_and_coords() {
        let s = Shape::new(2, 3);
        assert_eq!(s.offset(1, 2), Some(5));
        assert_eq!(s.offset(2, 0), None);
        assert_eq!(s.offset(0, 3), None);
        assert_eq!(s.coords(5), Some((1, 2)));
        assert_eq!(s.coords(6), None);
    }

    #[test]
    fn test_numel_saturates() {
        let s = Shape::new(usize::MAX, 2);
        assert_eq!(s.numel(), usize::MAX);
        assert_eq!(s.checked_numel(), None);
        assert_eq!(Shape::new(4, 5).checked_numel(), Some(20));
    }
}
