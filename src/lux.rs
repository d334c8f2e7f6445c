//! Lux conversion for the LTR-329ALS, per appendix A of the datasheet.
//!
//! The two photodiodes have different spectral responses, so the ratio of the IR channel to the
//! total picks which linear combination of the counts gives illuminance.

/// Ratio bands and their `(ch0, ch1)` coefficients. Ratios at or above the last bound are out of
/// the usable range.
///
/// Bounds are compared as `f32`, the same width as the ratio, so a ratio that rounds to a bound
/// (16/25 to 0.64) starts the next band. Widening only the bound would put it in the band below.
const BANDS: [(f32, f32, f32); 3] = [
    (0.45, 1.7743, 1.1059),
    (0.64, 4.2785, -1.9548),
    (0.85, 0.5926, 0.1185),
];

/// Calculate lux from the two channel counts.
///  - ch0 = visible + infrared
///  - ch1 = infrared
///
/// `gain` and `integration_ms` must be the values in effect while the counts were captured.
pub fn compute_lux(ch0: u16, ch1: u16, gain: u8, integration_ms: u16) -> f32 {
    let ch0 = ch0 as f32;
    let ch1 = ch1 as f32;

    let sum = ch0 + ch1;
    if sum == 0.0 {
        return 0.0;
    }
    let ratio = ch1 / sum;

    let counts = BANDS
        .iter()
        .find(|(bound, _, _)| ratio < *bound)
        .map_or(0.0, |(_, c0, c1)| c0 * ch0 + c1 * ch1);

    (counts * 100.0) / (gain as f32 * integration_ms as f32)
}
