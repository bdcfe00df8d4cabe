//! Box drawing into frame pixels.

use moodcam_core::FaceBox;
use moodcam_hw::Frame;

/// Line width of face boxes, in pixels.
pub const BOX_THICKNESS: u32 = 2;

/// Draw a hollow rectangle around `face`, clipped to the frame.
pub fn draw_box(frame: &mut Frame, face: &FaceBox, color: [u8; 3], thickness: u32) {
    let (fw, fh) = (frame.width as i64, frame.height as i64);
    let x1 = face.x as i64;
    let y1 = face.y as i64;
    let x2 = x1 + face.width as i64 - 1;
    let y2 = y1 + face.height as i64 - 1;
    if face.width == 0 || face.height == 0 || x2 < 0 || y2 < 0 || x1 >= fw || y1 >= fh {
        return;
    }
    let t = thickness.max(1) as i64;

    for y in y1.max(0)..=y2.min(fh - 1) {
        for x in x1.max(0)..=x2.min(fw - 1) {
            let on_edge = x < x1 + t || x > x2 - t || y < y1 + t || y > y2 - t;
            if on_edge {
                let i = ((y * fw + x) * 3) as usize;
                frame.data[i..i + 3].copy_from_slice(&color);
            }
        }
    }
}
