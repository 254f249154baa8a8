use crate::element::Elem;
use crate::error::{Result, TensorError};
use crate::shape::Shape;

/// Bounded local storage standing in for the kernel's on-chip arrays.
///
/// The backing allocation is sized to the capacity ceiling when the buffer is
/// created, independent of the operand it will hold. [`WorkingBuffer::bind`]
/// then fixes the logical extent of the operand; a request larger than the
/// capacity is rejected before anything is written. Element accessors are
/// bounds-checked against the bound extent, never against the capacity.
#[derive(Debug)]
pub struct WorkingBuffer {
    label: &'static str,
    data: Vec<Elem>,
    extent: Shape,
}

impl WorkingBuffer {
    /// Allocate a zero-filled buffer holding at most `capacity` elements.
    ///
    /// # Errors
    /// Returns `AllocationFailed` if the allocator cannot provide `capacity`
    /// elements.
    pub fn new(label: &'static str, capacity: usize) -> Result<Self> {
        Ok(WorkingBuffer {
            label,
            data: zeroed(label, capacity)?,
            extent: Shape::new(0, 0),
        })
    }

    /// Allocate a buffer and bind it to `extent` in one step.
    pub fn for_extent(label: &'static str, capacity: usize, extent: Shape) -> Result<Self> {
        check_capacity(label, extent, capacity)?;
        let mut buf = WorkingBuffer::new(label, capacity)?;
        buf.extent = extent;
        Ok(buf)
    }

    /// Fix the logical extent of the data held by this buffer.
    ///
    /// # Errors
    /// Returns `CapacityExceeded` if `extent` does not fit.
    pub fn bind(&mut self, extent: Shape) -> Result<()> {
        check_capacity(self.label, extent, self.capacity())?;
        self.extent = extent;
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn extent(&self) -> Shape {
        self.extent
    }

    /// Bounds-checked read; `None` outside the bound extent.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<Elem> {
        self.extent.offset(row, col).map(|i| self.data[i])
    }

    /// The bound region as a row-major slice.
    pub fn as_slice(&self) -> &[Elem] {
        &self.data[..self.extent.numel()]
    }

    /// The bound region as a mutable row-major slice.
    pub fn as_mut_slice(&mut self) -> &mut [Elem] {
        let n = self.extent.numel();
        &mut self.data[..n]
    }

    /// Copy a contiguous run of `src` into row `row` starting at `col`.
    pub(crate) fn write_run(&mut self, row: usize, col: usize, src: &[Elem]) -> Result<()> {
        let start = self.run_start(row, col, src.len())?;
        self.data[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }

    /// Borrow a contiguous run of `len` elements of row `row` starting at `col`.
    pub(crate) fn read_run(&self, row: usize, col: usize, len: usize) -> Result<&[Elem]> {
        let start = self.run_start(row, col, len)?;
        Ok(&self.data[start..start + len])
    }

    fn run_start(&self, row: usize, col: usize, len: usize) -> Result<usize> {
        if len == 0 {
            return Ok(0);
        }
        match (
            self.extent.offset(row, col),
            self.extent.offset(row, col + len - 1),
        ) {
            (Some(start), Some(_)) => Ok(start),
            _ => Err(TensorError::ShapeMismatch {
                expected: self.extent.into(),
                got: (row + 1, col + len),
            }),
        }
    }
}

/// A zero-filled vector of `len` elements, or `AllocationFailed` instead of
/// aborting when the allocator refuses.
pub(crate) fn zeroed(operand: &'static str, len: usize) -> Result<Vec<Elem>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| TensorError::AllocationFailed {
            operand,
            requested: len,
        })?;
    data.resize(len, 0);
    Ok(data)
}

/// Fails with `CapacityExceeded` when `extent` does not fit in `capacity` elements.
pub fn check_capacity(operand: &'static str, extent: Shape, capacity: usize) -> Result<()> {
    let requested = extent.numel();
    if requested > capacity {
        return Err(TensorError::CapacityExceeded {
            operand,
            requested,
            capacity,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed() {
        let buf = WorkingBuffer::new("a", 16).unwrap();
        assert_eq!(buf.capacity(), 16);
        assert_eq!(buf.extent(), Shape::new(0, 0));
        assert!(buf.as_slice().is_empty());
    }

    #[test]
    fn test_bind_within_capacity() {
        let mut buf = WorkingBuffer::new("a", 16).unwrap();
        buf.bind(Shape::new(2, 8)).unwrap();
        assert_eq!(buf.as_slice(), &[0; 16]);
    }

    #[test]
    fn test_bind_over_capacity() {
        let mut buf = WorkingBuffer::new("b", 15).unwrap();
        assert_eq!(
            buf.bind(Shape::new(4, 4)).unwrap_err(),
            TensorError::CapacityExceeded {
                operand: "b",
                requested: 16,
                capacity: 15
            }
        );
        assert!(WorkingBuffer::for_extent("c", 3, Shape::new(2, 2)).is_err());
    }

    #[test]
    fn test_get_bounds() {
        let mut buf = WorkingBuffer::for_extent("a", 16, Shape::new(2, 3)).unwrap();
        buf.write_run(1, 2, &[42]).unwrap();
        assert_eq!(buf.get(1, 2), Some(42));
        assert_eq!(buf.get(2, 0), None);
        assert_eq!(buf.get(0, 3), None);
    }

    #[test]
    fn test_unallocatable_capacity_is_an_error() {
        let err = WorkingBuffer::new("c", usize::MAX).unwrap_err();
        assert_eq!(
            err,
            TensorError::AllocationFailed {
                operand: "c",
                requested: usize::MAX
            }
        );
    }

    #[test]
    fn test_runs() {
        let mut buf = WorkingBuffer::for_extent("a", 16, Shape::new(2, 3)).unwrap();
        buf.write_run(1, 1, &[7, 8]).unwrap();
        assert_eq!(buf.read_run(1, 0, 3).unwrap(), &[0, 7, 8]);
        assert!(buf.write_run(1, 2, &[1, 2]).is_err());
        assert!(buf.read_run(0, 0, 4).is_err());
    }
}
