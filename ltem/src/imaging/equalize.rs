use common::Grid;

/// Global histogram equalization.
///
/// Maps every level through the normalized cumulative histogram so the
/// darkest present level goes to 0 and the brightest to 255. Constant
/// images are returned unchanged.
pub fn equalize_histogram(image: &Grid<u8>) -> Grid<u8> {
    let mut histogram = [0usize; 256];
    for &v in image.iter() {
        histogram[v as usize] += 1;
    }

    let mut cdf = [0usize; 256];
    let mut running = 0;
    for (level, &count) in histogram.iter().enumerate() {
        running += count;
        cdf[level] = running;
    }

    let total = image.len();
    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    if total == cdf_min {
        return image.clone();
    }

    let scale = 255.0 / (total - cdf_min) as f64;
    let lut: Vec<u8> = cdf
        .iter()
        .map(|&c| (c.saturating_sub(cdf_min) as f64 * scale).round() as u8)
        .collect();

    tracing::debug!(rows = image.rows(), cols = image.cols(), "Histogram equalized");

    image.map(|&v| lut[v as usize])
}
