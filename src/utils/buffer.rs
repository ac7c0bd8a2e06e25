//! Mixing helpers for plain `f32` sample buffers.

// -------------------------------------------------------------------------------------------------

/// Screen-blend a new contribution `value` into the running accumulator `acc`.
///
/// Combines the grains within a cloud and the clouds within a playfield. Unlike a plain
/// sum it saturates towards ±1 instead of clipping. An accumulator of exactly zero passes `value` through
/// unchanged.
#[inline]
pub fn screen_blend(acc: f32, value: f32) -> f32 {
    if acc != 0.0 {
        acc + value - acc * value
    } else {
        value
    }
}

// -------------------------------------------------------------------------------------------------

/// Clear the given buffer with zeros.
#[inline]
pub fn clear_buffer(buffer: &mut [f32]) {
    buffer.iter_mut().for_each(|s| *s = 0.0);
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_with_zero() {
        for value in [-1.0, -0.5, -0.001, 0.0, 0.25, 0.5, 1.0] {
            assert_eq!(screen_blend(0.0, value), value);
            assert_eq!(screen_blend(value, 0.0), value);
        }
    }

    #[test]
    fn blend_saturates() {
        assert_eq!(screen_blend(0.5, 0.5), 0.75);
        assert_eq!(screen_blend(1.0, 0.5), 1.0);
        // repeated blends approach but never exceed full scale
        let mut acc = 0.0;
        for _ in 0..64 {
            acc = screen_blend(acc, 0.5);
            assert!(acc <= 1.0);
        }
        assert!(acc > 0.999);
    }

    #[test]
    fn clear() {
        let mut buffer = vec![0.25, 0.5, 0.75, 1.0];
        clear_buffer(&mut buffer[1..3]);
        assert_eq!(buffer, vec![0.25, 0.0, 0.0, 1.0]);
    }
}
