use rand::{seq::SliceRandom, Rng};

/// Draws a random training mask over `len` samples.
///
/// Exactly `round(len · training_ratio)` entries are `true`, so that every split of a given
/// set has the same size.
pub fn training_mask(rng: &mut impl Rng, len: usize, training_ratio: f64) -> Vec<bool> {
    let training = ((len as f64 * training_ratio).round() as usize).min(len);
    let mut mask: Vec<bool> = (0..len).map(|i| i < training).collect();
    mask.shuffle(rng);
    mask
}
