//! Grayscale image operators used by classification and preprocessing.
//!
//! All operators are deterministic and keep the input dimensions. Border
//! handling follows the usual conventions: reflect-101 for convolutions,
//! replicate for the adaptive-threshold mean and the Sobel pass, and
//! out-of-image samples ignored for morphology.

use image::GrayImage;

/// Half-size of the comparison patch used by non-local means (7x7 patch).
const NLM_PATCH_RADIUS: i64 = 3;
/// Half-size of the search window used by non-local means (11x11 window).
const NLM_SEARCH_RADIUS: i64 = 5;

fn reflect101(index: i64, len: i64) -> usize {
    if len <= 1 {
        return 0;
    }
    let mut index = index;
    loop {
        if index < 0 {
            index = -index;
        } else if index >= len {
            index = 2 * len - 2 - index;
        } else {
            return index as usize;
        }
    }
}

fn replicate(index: i64, len: i64) -> usize {
    index.clamp(0, len - 1) as usize
}

fn saturate(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        image::Luma([pixels[y as usize * width as usize + x as usize]])
    })
}

/// Population variance of the pixel intensities.
pub fn intensity_variance(image: &GrayImage) -> f64 {
    let pixels = image.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }
    let count = pixels.len() as f64;
    let mean = pixels.iter().map(|&value| value as f64).sum::<f64>() / count;
    pixels
        .iter()
        .map(|&value| {
            let delta = value as f64 - mean;
            delta * delta
        })
        .sum::<f64>()
        / count
}

/// Canny edge detector with a 3x3 Sobel aperture and L1 gradient magnitude.
/// Edge pixels are 255, everything else 0.
pub fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as i64, height as i64);
    if w == 0 || h == 0 {
        return image.clone();
    }

    let src = image.as_raw();
    let at = |x: i64, y: i64| src[replicate(y, h) * w as usize + replicate(x, w)] as i32;

    let size = (w * h) as usize;
    let mut dx = vec![0i32; size];
    let mut dy = vec![0i32; size];
    let mut magnitude = vec![0i32; size];

    for y in 0..h {
        for x in 0..w {
            let gx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
            let gy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));
            let index = (y * w + x) as usize;
            dx[index] = gx;
            dy[index] = gy;
            magnitude[index] = gx.abs() + gy.abs();
        }
    }

    let mag = |x: i64, y: i64| -> i32 {
        if x < 0 || y < 0 || x >= w || y >= h {
            0
        } else {
            magnitude[(y * w + x) as usize]
        }
    };

    const TAN_22_5: f64 = 0.414_213_562_373_095_1;
    const TAN_67_5: f64 = 2.414_213_562_373_095;

    // 0 = suppressed, 1 = weak candidate, 2 = strong edge
    let mut state = vec![0u8; size];
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let index = (y * w + x) as usize;
            let m = magnitude[index];
            if (m as f32) <= low {
                continue;
            }
            let ax = dx[index].abs() as f64;
            let ay = dy[index].abs() as f64;

            let is_max = if ay <= ax * TAN_22_5 {
                m > mag(x - 1, y) && m >= mag(x + 1, y)
            } else if ay >= ax * TAN_67_5 {
                m > mag(x, y - 1) && m >= mag(x, y + 1)
            } else {
                let step = if (dx[index] ^ dy[index]) < 0 { -1 } else { 1 };
                m > mag(x - step, y - 1) && m > mag(x + step, y + 1)
            };

            if !is_max {
                continue;
            }
            if (m as f32) > high {
                state[index] = 2;
                stack.push((x, y));
            } else {
                state[index] = 1;
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        for ny in (y - 1)..=(y + 1) {
            for nx in (x - 1)..=(x + 1) {
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let neighbour = (ny * w + nx) as usize;
                if state[neighbour] == 1 {
                    state[neighbour] = 2;
                    stack.push((nx, ny));
                }
            }
        }
    }

    let edges = state
        .into_iter()
        .map(|value| if value == 2 { 255 } else { 0 })
        .collect();
    from_raw(width, height, edges)
}

/// Non-local means denoising; `strength` plays the role of the filter parameter `h`.
pub fn nl_means_denoise(image: &GrayImage, strength: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as i64, height as i64);
    if w == 0 || h == 0 || strength <= 0.0 {
        return image.clone();
    }

    let src = image.as_raw();
    let size = (w * h) as usize;
    let stride = (w + 1) as usize;
    let h2 = (strength as f64) * (strength as f64);

    let mut weight_sum = vec![0f64; size];
    let mut value_sum = vec![0f64; size];
    let mut integral = vec![0f64; stride * (h as usize + 1)];

    for oy in -NLM_SEARCH_RADIUS..=NLM_SEARCH_RADIUS {
        for ox in -NLM_SEARCH_RADIUS..=NLM_SEARCH_RADIUS {
            // Summed-area table of squared differences between the image and its shifted copy.
            for y in 0..h {
                let mut row_sum = 0f64;
                for x in 0..w {
                    let here = src[(y * w + x) as usize] as f64;
                    let there = src[reflect101(y + oy, h) * w as usize + reflect101(x + ox, w)] as f64;
                    let delta = here - there;
                    row_sum += delta * delta;
                    let cell = (y as usize + 1) * stride + x as usize + 1;
                    integral[cell] = integral[cell - stride] + row_sum;
                }
            }

            for y in 0..h {
                let top = (y - NLM_PATCH_RADIUS).max(0) as usize;
                let bottom = (y + NLM_PATCH_RADIUS).min(h - 1) as usize + 1;
                for x in 0..w {
                    let left = (x - NLM_PATCH_RADIUS).max(0) as usize;
                    let right = (x + NLM_PATCH_RADIUS).min(w - 1) as usize + 1;
                    let patch = integral[bottom * stride + right] - integral[top * stride + right]
                        - integral[bottom * stride + left]
                        + integral[top * stride + left];
                    let area = ((bottom - top) * (right - left)) as f64;
                    let weight = (-(patch / area) / h2).exp();

                    let sample = src[reflect101(y + oy, h) * w as usize + reflect101(x + ox, w)] as f64;
                    let index = (y * w + x) as usize;
                    weight_sum[index] += weight;
                    value_sum[index] += weight * sample;
                }
            }
        }
    }

    let pixels = value_sum
        .iter()
        .zip(weight_sum.iter())
        .map(|(value, weight)| saturate(value / weight))
        .collect();
    from_raw(width, height, pixels)
}

/// Contrast-limited adaptive histogram equalization over a `tiles_x` x `tiles_y` grid.
pub fn clahe(image: &GrayImage, clip_limit: f32, tiles_x: u32, tiles_y: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || tiles_x == 0 || tiles_y == 0 {
        return image.clone();
    }
    let (w, h) = (width as i64, height as i64);
    let src = image.as_raw();

    let tile_w = (width as i64 + tiles_x as i64 - 1) / tiles_x as i64;
    let tile_h = (height as i64 + tiles_y as i64 - 1) / tiles_y as i64;
    let tile_area = (tile_w * tile_h) as f64;
    let clip = ((clip_limit as f64 * tile_area / 256.0) as i64).max(1);
    let lut_scale = 255.0 / tile_area;

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y as i64 {
        for tx in 0..tiles_x as i64 {
            let mut histogram = [0i64; 256];
            for y in (ty * tile_h)..((ty + 1) * tile_h) {
                for x in (tx * tile_w)..((tx + 1) * tile_w) {
                    let value = src[reflect101(y, h) * w as usize + reflect101(x, w)];
                    histogram[value as usize] += 1;
                }
            }

            let mut excess = 0i64;
            for bin in histogram.iter_mut() {
                if *bin > clip {
                    excess += *bin - clip;
                    *bin = clip;
                }
            }
            let batch = excess / 256;
            let residual = excess - batch * 256;
            for bin in histogram.iter_mut() {
                *bin += batch;
            }
            if residual > 0 {
                let step = (256 / residual).max(1) as usize;
                for (placed, bin) in histogram.iter_mut().step_by(step).enumerate() {
                    if placed as i64 >= residual {
                        break;
                    }
                    *bin += 1;
                }
            }

            let lut = &mut luts[(ty * tiles_x as i64 + tx) as usize];
            let mut cumulative = 0i64;
            for (value, bin) in histogram.iter().enumerate() {
                cumulative += bin;
                lut[value] = saturate(cumulative as f64 * lut_scale);
            }
        }
    }

    let inv_tw = 1.0 / tile_w as f64;
    let inv_th = 1.0 / tile_h as f64;
    let max_tx = tiles_x as i64 - 1;
    let max_ty = tiles_y as i64 - 1;

    let mut pixels = Vec::with_capacity(src.len());
    for y in 0..h {
        let tyf = y as f64 * inv_th - 0.5;
        let ty1 = tyf.floor() as i64;
        let ya = tyf - ty1 as f64;
        let (ty1, ty2) = (ty1.clamp(0, max_ty), (ty1 + 1).clamp(0, max_ty));
        for x in 0..w {
            let txf = x as f64 * inv_tw - 0.5;
            let tx1 = txf.floor() as i64;
            let xa = txf - tx1 as f64;
            let (tx1, tx2) = (tx1.clamp(0, max_tx), (tx1 + 1).clamp(0, max_tx));

            let value = src[(y * w + x) as usize] as usize;
            let lut_at = |tx: i64, ty: i64| luts[(ty * tiles_x as i64 + tx) as usize][value] as f64;
            let top = lut_at(tx1, ty1) * (1.0 - xa) + lut_at(tx2, ty1) * xa;
            let bottom = lut_at(tx1, ty2) * (1.0 - xa) + lut_at(tx2, ty2) * xa;
            pixels.push(saturate(top * (1.0 - ya) + bottom * ya));
        }
    }
    from_raw(width, height, pixels)
}

/// Edge-preserving bilateral filter over a circular neighbourhood of `diameter`.
pub fn bilateral(image: &GrayImage, diameter: u32, sigma_color: f64, sigma_space: f64) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as i64, height as i64);
    if w == 0 || h == 0 {
        return image.clone();
    }
    let src = image.as_raw();
    let radius = (diameter / 2).max(1) as i64;

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let color_weights: Vec<f64> = (0..256)
        .map(|delta| ((delta * delta) as f64 * color_coeff).exp())
        .collect();

    let mut offsets = Vec::new();
    for oy in -radius..=radius {
        for ox in -radius..=radius {
            let distance2 = (ox * ox + oy * oy) as f64;
            if distance2 <= (radius * radius) as f64 {
                offsets.push((ox, oy, (distance2 * space_coeff).exp()));
            }
        }
    }

    let mut pixels = Vec::with_capacity(src.len());
    for y in 0..h {
        for x in 0..w {
            let center = src[(y * w + x) as usize] as i32;
            let mut total = 0f64;
            let mut norm = 0f64;
            for &(ox, oy, space_weight) in &offsets {
                let sample = src[reflect101(y + oy, h) * w as usize + reflect101(x + ox, w)] as i32;
                let weight = space_weight * color_weights[(sample - center).unsigned_abs() as usize];
                total += weight * sample as f64;
                norm += weight;
            }
            pixels.push(saturate(total / norm));
        }
    }
    from_raw(width, height, pixels)
}

fn morph(image: &GrayImage, kernel_w: u32, kernel_h: u32, dilate: bool) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as i64, height as i64);
    if kernel_w <= 1 && kernel_h <= 1 {
        return image.clone();
    }
    let src = image.as_raw();
    let (anchor_x, anchor_y) = ((kernel_w / 2) as i64, (kernel_h / 2) as i64);

    let mut pixels = Vec::with_capacity(src.len());
    for y in 0..h {
        for x in 0..w {
            let mut value = if dilate { 0u8 } else { 255u8 };
            for ky in 0..kernel_h as i64 {
                for kx in 0..kernel_w as i64 {
                    let (sx, sy) = (x + kx - anchor_x, y + ky - anchor_y);
                    if sx < 0 || sy < 0 || sx >= w || sy >= h {
                        continue;
                    }
                    let sample = src[(sy * w + sx) as usize];
                    value = if dilate { value.max(sample) } else { value.min(sample) };
                }
            }
            pixels.push(value);
        }
    }
    from_raw(width, height, pixels)
}

/// Morphological closing (dilate, then erode) with a rectangular kernel of ones.
pub fn morph_close(image: &GrayImage, kernel_w: u32, kernel_h: u32) -> GrayImage {
    let dilated = morph(image, kernel_w, kernel_h, true);
    morph(&dilated, kernel_w, kernel_h, false)
}

/// 3x3 sharpening convolution `[-1 -1 -1; -1 9 -1; -1 -1 -1]`.
pub fn sharpen(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as i64, height as i64);
    if w == 0 || h == 0 {
        return image.clone();
    }
    let src = image.as_raw();
    let mut pixels = Vec::with_capacity(src.len());
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0i32;
            for oy in -1..=1 {
                for ox in -1..=1 {
                    let sample = src[reflect101(y + oy, h) * w as usize + reflect101(x + ox, w)] as i32;
                    sum += if ox == 0 && oy == 0 { 9 * sample } else { -sample };
                }
            }
            pixels.push(sum.clamp(0, 255) as u8);
        }
    }
    from_raw(width, height, pixels)
}

fn gaussian_kernel(size: u32) -> Vec<f64> {
    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size as f64 - 1.0) / 2.0;
    let raw: Vec<f64> = (0..size)
        .map(|index| {
            let offset = index as f64 - center;
            (-(offset * offset) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|value| value / total).collect()
}

/// Gaussian-weighted adaptive threshold: a pixel becomes 255 when it is brighter
/// than its `block` x `block` weighted neighbourhood mean minus `offset`.
pub fn adaptive_threshold_gaussian(image: &GrayImage, block: u32, offset: i32) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as i64, height as i64);
    if w == 0 || h == 0 {
        return image.clone();
    }
    let src = image.as_raw();
    let kernel = gaussian_kernel(block.max(3) | 1);
    let radius = (kernel.len() / 2) as i64;

    let mut horizontal = vec![0f64; src.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f64;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = replicate(x + k as i64 - radius, w);
                acc += weight * src[(y * w) as usize + sx] as f64;
            }
            horizontal[(y * w + x) as usize] = acc;
        }
    }

    let mut pixels = Vec::with_capacity(src.len());
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f64;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = replicate(y + k as i64 - radius, h);
                acc += weight * horizontal[sy * w as usize + x as usize];
            }
            let mean = saturate(acc) as i32;
            let value = src[(y * w + x) as usize] as i32;
            pixels.push(if value > mean - offset { 255 } else { 0 });
        }
    }
    from_raw(width, height, pixels)
}

/// Otsu's global threshold level: the intensity maximising between-class variance.
pub fn otsu_level(image: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for &value in image.as_raw() {
        histogram[value as usize] += 1;
    }
    let total = image.as_raw().len() as f64;
    if total == 0.0 {
        return 0;
    }

    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum();

    let mut best_level = 0u8;
    let mut best_variance = 0f64;
    let mut background = 0f64;
    let mut background_sum = 0f64;

    for (level, &count) in histogram.iter().enumerate() {
        background += count as f64;
        if background == 0.0 {
            continue;
        }
        let foreground = total - background;
        if foreground == 0.0 {
            break;
        }
        background_sum += level as f64 * count as f64;
        let mean_background = background_sum / background;
        let mean_foreground = (weighted_total - background_sum) / foreground;
        let delta = mean_background - mean_foreground;
        let variance = background * foreground * delta * delta;
        if variance > best_variance {
            best_variance = variance;
            best_level = level as u8;
        }
    }
    best_level
}

/// Binarizes with Otsu's level: pixels above the level become 255.
pub fn otsu_threshold(image: &GrayImage) -> GrayImage {
    let level = otsu_level(image);
    let pixels = image
        .as_raw()
        .iter()
        .map(|&value| if value > level { 255 } else { 0 })
        .collect();
    from_raw(image.width(), image.height(), pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn split_image(width: u32, height: u32, left: u8, right: u8) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([if x < width / 2 { left } else { right }]))
    }

    #[test]
    fn variance_of_two_level_image() {
        let image = split_image(20, 10, 100, 140);
        assert!((intensity_variance(&image) - 400.0).abs() < 1e-9);
        assert_eq!(intensity_variance(&GrayImage::new(4, 4)), 0.0);
    }

    #[test]
    fn canny_finds_a_vertical_step_edge() {
        let image = split_image(32, 16, 0, 255);
        let edges = canny(&image, 50.0, 150.0);
        let count = edges.as_raw().iter().filter(|&&v| v == 255).count();
        assert!(count >= 16, "expected a continuous edge, got {count} pixels");
        assert!(edges.get_pixel(2, 8).0[0] == 0);
        assert!(edges.get_pixel(29, 8).0[0] == 0);
    }

    #[test]
    fn canny_on_flat_image_has_no_edges() {
        let image = GrayImage::from_pixel(16, 16, Luma([128]));
        let edges = canny(&image, 50.0, 150.0);
        assert!(edges.as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn denoise_keeps_flat_image_and_shrinks_outlier() {
        let mut image = GrayImage::from_pixel(16, 16, Luma([120]));
        let flat = nl_means_denoise(&image, 10.0);
        assert!(flat.as_raw().iter().all(|&v| v == 120));

        image.put_pixel(8, 8, Luma([200]));
        let denoised = nl_means_denoise(&image, 25.0);
        assert!(denoised.get_pixel(8, 8).0[0] < 200);
    }

    #[test]
    fn clahe_stretches_low_contrast_image() {
        let image = split_image(32, 32, 110, 130);
        let enhanced = clahe(&image, 3.0, 8, 8);
        assert_eq!(enhanced.dimensions(), image.dimensions());
        let spread_before = intensity_variance(&image);
        let spread_after = intensity_variance(&enhanced);
        assert!(spread_after > spread_before);
    }

    #[test]
    fn closing_fills_single_pixel_gap() {
        let mut image = GrayImage::from_pixel(8, 8, Luma([255]));
        image.put_pixel(4, 4, Luma([0]));
        let closed = morph_close(&image, 2, 2);
        assert_eq!(closed.get_pixel(4, 4).0[0], 255);
        assert_eq!(morph_close(&image, 1, 1), image);
    }

    #[test]
    fn otsu_separates_two_levels() {
        let image = split_image(10, 10, 40, 200);
        let level = otsu_level(&image);
        assert!((40..200).contains(&level));
        let binary = otsu_threshold(&image);
        assert_eq!(binary.get_pixel(0, 0).0[0], 0);
        assert_eq!(binary.get_pixel(9, 0).0[0], 255);
    }

    #[test]
    fn adaptive_threshold_is_binary() {
        let image = GrayImage::from_fn(24, 24, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let binary = adaptive_threshold_gaussian(&image, 11, 2);
        assert!(binary.as_raw().iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn sharpen_and_bilateral_keep_flat_regions() {
        let image = GrayImage::from_pixel(9, 9, Luma([77]));
        assert_eq!(sharpen(&image), image);
        assert_eq!(bilateral(&image, 9, 75.0, 75.0), image);
    }
}
