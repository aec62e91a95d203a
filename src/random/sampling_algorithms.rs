//! Uniform sampling helpers shared by the simulation modules.

use crate::rand::Rng;

/// Sample a random element uniformly from a container of known length.
///
/// The container need not be randomly indexable, only iterable. Returns
/// `None` for an empty container without consuming a random draw.
pub fn sample_single_from_known_length<I, R, T>(rng: &mut R, mut iter: I) -> Option<T>
where
    R: Rng + ?Sized,
    I: ExactSizeIterator<Item = T>,
{
    let len = iter.len();
    if len == 0 {
        return None;
    }
    let index = rng.random_range(0..len);
    iter.nth(index)
}
