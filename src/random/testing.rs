//! Deterministic random sources for unit tests.

use crate::rand::RngCore;

/// Produces the same `u64` forever and counts how many were requested.
///
/// `rand` builds a uniform `f64` in `[0, 1)` from the top 53 bits of a `u64`,
/// so `ConstantRng::unit(0.5)` makes every `random::<f64>()` return exactly 0.5.
pub(crate) struct ConstantRng {
    value: u64,
    pub(crate) draws: usize,
}

impl ConstantRng {
    pub(crate) fn unit(r: f64) -> Self {
        assert!((0.0..1.0).contains(&r));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mantissa = (r * (1u64 << 53) as f64) as u64;
        ConstantRng {
            value: mantissa << 11,
            draws: 0,
        }
    }
}

impl RngCore for ConstantRng {
    fn next_u32(&mut self) -> u32 {
        self.draws += 1;
        (self.value >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.draws += 1;
        self.value
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        self.draws += 1;
        for (i, byte) in dst.iter_mut().enumerate() {
            *byte = self.value.to_le_bytes()[i % 8];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConstantRng;
    use crate::rand::Rng;

    #[test]
    fn constant_unit_values() {
        for r in [0.0, 0.25, 0.5, 0.75] {
            let mut rng = ConstantRng::unit(r);
            assert_eq!(rng.random::<f64>(), r);
        }
    }
}
