/// Element type of every matrix and working buffer.
///
/// The kernel computes in 32-bit two's-complement integers. Products and sums
/// wrap on overflow, both in the tiled engine and in the reference backend, so
/// the two agree bit for bit even when intermediate values overflow.
pub type Elem = i32;

/// One multiply-accumulate step: `acc + a * b` with wraparound.
#[inline(always)]
pub fn mac(acc: Elem, a: Elem, b: Elem) -> Elem {
    acc.wrapping_add(a.wrapping_mul(b))
}

/// Narrows a real value to [`Elem`] by truncation toward zero.
///
/// Returns `None` for NaN, infinities and values whose truncation lies outside
/// the `i32` range.
pub fn narrow_f64(value: f64) -> Option<Elem> {
    if !value.is_finite() {
        return None;
    }
    let t = value.trunc();
    if t < Elem::MIN as f64 || t > Elem::MAX as f64 {
        return None;
    }
    Some(t as Elem)
}
