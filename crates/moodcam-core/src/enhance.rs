//! Face crop preprocessing: minimum-size upscale and luminance CLAHE.

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Crops smaller than this on either side are resized to a square of this size.
pub const MIN_FACE_SIDE: u32 = 96;
/// Tile grid (per axis) for contrast-limited equalization.
pub const CLAHE_TILES: u32 = 8;
/// Clip limit as a multiple of the mean histogram bin height.
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;

/// Prepare a face crop for the classifier.
pub fn prepare_face(face: &RgbImage) -> RgbImage {
    let mut out = if face.width() < MIN_FACE_SIDE || face.height() < MIN_FACE_SIDE {
        imageops::resize(face, MIN_FACE_SIDE, MIN_FACE_SIDE, FilterType::Triangle)
    } else {
        face.clone()
    };
    enhance_luminance(&mut out, CLAHE_TILES, CLAHE_CLIP_LIMIT);
    out
}

/// Equalize the luminance channel in place, leaving chroma untouched.
pub fn enhance_luminance(img: &mut RgbImage, tiles: u32, clip_limit: f32) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }

    let mut luma = Vec::with_capacity((w * h) as usize);
    let mut chroma = Vec::with_capacity((w * h) as usize);
    for p in img.pixels() {
        let (y, cb, cr) = rgb_to_ycbcr(p.0);
        luma.push(y.round().clamp(0.0, 255.0) as u8);
        chroma.push((cb, cr));
    }

    clahe(&mut luma, w, h, tiles, clip_limit);

    for ((p, &y), &(cb, cr)) in img.pixels_mut().zip(luma.iter()).zip(chroma.iter()) {
        p.0 = ycbcr_to_rgb(y as f32, cb, cr);
    }
}

fn rgb_to_ycbcr([r, g, b]: [u8; 3]) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    (y, cb, cr)
}

fn ycbcr_to_rgb(y: f32, cb: f32, cr: f32) -> [u8; 3] {
    let r = y + 1.402 * (cr - 128.0);
    let g = y - 0.344_136 * (cb - 128.0) - 0.714_136 * (cr - 128.0);
    let b = y + 1.772 * (cb - 128.0);
    [to_u8(r), to_u8(g), to_u8(b)]
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Contrast-Limited Adaptive Histogram Equalization on an 8-bit plane.
///
/// Histograms are clipped at `clip_limit × (tile_pixels / 256)`, the excess is
/// redistributed evenly, and each pixel is mapped by bilinear interpolation
/// between the four nearest tile CDFs.
fn clahe(plane: &mut [u8], width: u32, height: u32, tiles: u32, clip_limit: f32) {
    let (w, h) = (width as usize, height as usize);
    let t = tiles.max(1) as usize;
    let tile_w = w / t;
    let tile_h = h / t;
    if tile_w == 0 || tile_h == 0 || plane.len() < w * h {
        return;
    }
    let tile_pixels = tile_w * tile_h;
    let clip = ((clip_limit * tile_pixels as f32 / 256.0) as u32).max(1);

    let mut luts: Vec<[f32; 256]> = Vec::with_capacity(t * t);
    for row in 0..t {
        for col in 0..t {
            let mut hist = [0u32; 256];
            for y in row * tile_h..(row + 1) * tile_h {
                for &p in &plane[y * w + col * tile_w..y * w + (col + 1) * tile_w] {
                    hist[p as usize] += 1;
                }
            }

            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > clip {
                    excess += *bin - clip;
                    *bin = clip;
                }
            }
            let share = excess / 256;
            let remainder = (excess % 256) as usize;
            for (i, bin) in hist.iter_mut().enumerate() {
                *bin += share + u32::from(i < remainder);
            }

            let scale = 255.0 / tile_pixels as f32;
            let mut lut = [0f32; 256];
            let mut acc = 0u32;
            for (i, &count) in hist.iter().enumerate() {
                acc += count;
                lut[i] = (acc as f32 * scale).min(255.0);
            }
            luts.push(lut);
        }
    }

    let last = (t - 1) as f32;
    for y in 0..h {
        let fy = (y as f32 / tile_h as f32 - 0.5).clamp(0.0, last);
        let r0 = fy as usize;
        let r1 = (r0 + 1).min(t - 1);
        let dy = fy - r0 as f32;

        for x in 0..w {
            let fx = (x as f32 / tile_w as f32 - 0.5).clamp(0.0, last);
            let c0 = fx as usize;
            let c1 = (c0 + 1).min(t - 1);
            let dx = fx - c0 as f32;

            let v = plane[y * w + x] as usize;
            let top = luts[r0 * t + c0][v] * (1.0 - dx) + luts[r0 * t + c1][v] * dx;
            let bottom = luts[r1 * t + c0][v] * (1.0 - dx) + luts[r1 * t + c1][v] * dx;
            plane[y * w + x] = to_u8(top * (1.0 - dy) + bottom * dy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn stddev(data: &[u8]) -> f32 {
        let n = data.len() as f32;
        let mean = data.iter().map(|&b| b as f32).sum::<f32>() / n;
        let variance = data.iter().map(|&b| (b as f32 - mean).powi(2)).sum::<f32>() / n;
        variance.sqrt()
    }

    #[test]
    fn test_small_face_is_upscaled() {
        let face = RgbImage::from_pixel(40, 60, Rgb([120, 100, 90]));
        let out = prepare_face(&face);
        assert_eq!(out.dimensions(), (MIN_FACE_SIDE, MIN_FACE_SIDE));
    }

    #[test]
    fn test_large_face_keeps_size() {
        let face = RgbImage::from_pixel(150, 120, Rgb([120, 100, 90]));
        let out = prepare_face(&face);
        assert_eq!(out.dimensions(), (150, 120));
    }

    #[test]
    fn test_one_small_side_triggers_resize() {
        let face = RgbImage::from_pixel(200, 50, Rgb([10, 10, 10]));
        assert_eq!(prepare_face(&face).dimensions(), (MIN_FACE_SIDE, MIN_FACE_SIDE));
    }

    #[test]
    fn test_clahe_increases_contrast() {
        let (w, h) = (32u32, 32u32);
        let mut plane: Vec<u8> = (0..(w * h) as usize).map(|i| 100 + (i % 11) as u8).collect();
        let before = stddev(&plane);
        clahe(&mut plane, w, h, 2, CLAHE_CLIP_LIMIT);
        let after = stddev(&plane);
        assert!(after > before, "CLAHE should increase contrast: {before:.2} -> {after:.2}");
    }

    #[test]
    fn test_clahe_tiny_plane_untouched() {
        let mut plane = vec![50u8, 60, 70];
        clahe(&mut plane, 3, 1, 8, CLAHE_CLIP_LIMIT);
        assert_eq!(plane, vec![50, 60, 70]);
    }

    #[test]
    fn test_ycbcr_roundtrip_close() {
        for rgb in [[0u8, 0, 0], [255, 255, 255], [200, 30, 90], [12, 180, 250]] {
            let (y, cb, cr) = rgb_to_ycbcr(rgb);
            let back = ycbcr_to_rgb(y, cb, cr);
            for c in 0..3 {
                assert!((back[c] as i32 - rgb[c] as i32).abs() <= 1, "{rgb:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn test_gray_stays_gray() {
        let mut img = RgbImage::from_fn(64, 64, |x, y| {
            let v = (90 + (x + y) % 30) as u8;
            Rgb([v, v, v])
        });
        enhance_luminance(&mut img, CLAHE_TILES, CLAHE_CLIP_LIMIT);
        for p in img.pixels() {
            let [r, g, b] = p.0;
            assert!((r as i32 - g as i32).abs() <= 1 && (g as i32 - b as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_empty_image_is_noop() {
        let mut img = RgbImage::new(0, 0);
        enhance_luminance(&mut img, CLAHE_TILES, CLAHE_CLIP_LIMIT);
        assert_eq!(img.dimensions(), (0, 0));
    }
}
