//! Frame type and pixel utilities: YUYV conversion, mirroring and cropping.

use image::RgbImage;

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Build a frame from packed RGB bytes, checking the buffer length.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        let expected = (width * height * 3) as usize;
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Flip the frame horizontally in place (selfie view).
    pub fn mirror(&mut self) {
        let w = self.width as usize;
        if w == 0 {
            return;
        }
        let row_bytes = w * 3;
        for row in self.data.chunks_exact_mut(row_bytes) {
            for x in 0..w / 2 {
                let left = x * 3;
                let right = (w - 1 - x) * 3;
                for c in 0..3 {
                    row.swap(left + c, right + c);
                }
            }
        }
    }

    /// Copy the frame into an owned `image` buffer.
    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// Copy a rectangular region, clamped to the frame bounds.
    ///
    /// Returns an empty (0×0) image when the region lies entirely outside.
    pub fn crop(&self, x: i32, y: i32, width: u32, height: u32) -> RgbImage {
        let x0 = x.max(0) as u32;
        let y0 = y.max(0) as u32;
        let x1 = (x.saturating_add(width as i32)).clamp(0, self.width as i32) as u32;
        let y1 = (y.saturating_add(height as i32)).clamp(0, self.height as i32) as u32;
        if x0 >= x1 || y0 >= y1 {
            return RgbImage::new(0, 0);
        }

        let (cw, ch) = (x1 - x0, y1 - y0);
        let stride = self.width as usize * 3;
        let mut out = Vec::with_capacity((cw * ch * 3) as usize);
        for row in y0..y1 {
            let start = row as usize * stride + x0 as usize * 3;
            out.extend_from_slice(&self.data[start..start + cw as usize * 3]);
        }
        RgbImage::from_raw(cw, ch, out).unwrap_or_else(|| RgbImage::new(0, 0))
    }
}

/// Convert packed YUYV (4:2:2) to packed RGB using BT.601 limited-range coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U/V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for quad in yuyv[..expected].chunks_exact(4) {
        let u = quad[1] as i32 - 128;
        let v = quad[3] as i32 - 128;
        for y in [quad[0], quad[2]] {
            let c = 298 * (y as i32 - 16);
            rgb.push(clamp_u8((c + 409 * v + 128) >> 8));
            rgb.push(clamp_u8((c - 100 * u - 208 * v + 128) >> 8));
            rgb.push(clamp_u8((c + 516 * u + 128) >> 8));
        }
    }
    Ok(rgb)
}

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_2x2() -> Frame {
        // Pixels: (0,0)=1 (1,0)=2 / (0,1)=3 (1,1)=4, replicated over RGB
        let data = [1u8, 2, 3, 4]
            .iter()
            .flat_map(|&p| [p, p, p])
            .collect();
        Frame::from_rgb(data, 2, 2).unwrap()
    }

    #[test]
    fn test_yuyv_black_and_white() {
        // Y=16 is black, Y=235 is white at neutral chroma
        let yuyv = vec![16, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(&rgb[..3], &[0, 0, 0]);
        assert_eq!(&rgb[3..], &[255, 255, 255]);
    }

    #[test]
    fn test_yuyv_output_length() {
        let yuyv = vec![128u8; 4 * 2 * 2];
        let rgb = yuyv_to_rgb(&yuyv, 4, 2).unwrap();
        assert_eq!(rgb.len(), 4 * 2 * 3);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128];
        assert!(yuyv_to_rgb(&yuyv, 2, 1).is_err());
    }

    #[test]
    fn test_from_rgb_rejects_short_buffer() {
        assert!(Frame::from_rgb(vec![0; 5], 2, 1).is_err());
    }

    #[test]
    fn test_mirror_swaps_columns() {
        let mut frame = frame_2x2();
        frame.mirror();
        let firsts: Vec<u8> = frame.data.chunks(3).map(|p| p[0]).collect();
        assert_eq!(firsts, vec![2, 1, 4, 3]);
    }

    #[test]
    fn test_mirror_odd_width_keeps_center() {
        let data = [1u8, 2, 3].iter().flat_map(|&p| [p, p, p]).collect();
        let mut frame = Frame::from_rgb(data, 3, 1).unwrap();
        frame.mirror();
        let firsts: Vec<u8> = frame.data.chunks(3).map(|p| p[0]).collect();
        assert_eq!(firsts, vec![3, 2, 1]);
    }

    #[test]
    fn test_crop_inside() {
        let frame = frame_2x2();
        let crop = frame.crop(1, 1, 1, 1);
        assert_eq!(crop.dimensions(), (1, 1));
        assert_eq!(crop.get_pixel(0, 0).0, [4, 4, 4]);
    }

    #[test]
    fn test_crop_clamps_to_bounds() {
        let frame = frame_2x2();
        let crop = frame.crop(-5, 0, 10, 1);
        assert_eq!(crop.dimensions(), (2, 1));
    }

    #[test]
    fn test_crop_outside_is_empty() {
        let frame = frame_2x2();
        let crop = frame.crop(10, 10, 5, 5);
        assert_eq!(crop.dimensions(), (0, 0));
    }
}
