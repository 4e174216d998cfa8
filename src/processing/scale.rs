//! Cell scaling and blitting

use crate::compositor::CellGeometry;
use crate::error::{Error, Result};
use crate::types::{Frame, FrameFormat};

const BPP: usize = 4;

/// Destination canvas (packed BGRA, tightly strided)
pub struct Canvas<'a> {
    pub data: &'a mut [u8],
    pub width: u32,
    pub height: u32,
}

/// Fill the whole canvas with one BGRA colour
pub fn fill(canvas: &mut Canvas<'_>, bgra: [u8; 4]) {
    for px in canvas.data.chunks_exact_mut(BPP) {
        px.copy_from_slice(&bgra);
    }
}

/// Nearest-neighbour scale `frame` into the rectangle `geometry` of `canvas`.
///
/// Parts of the rectangle outside the canvas are clipped.
pub fn blit_scaled(canvas: &mut Canvas<'_>, frame: &Frame, geometry: &CellGeometry) -> Result<()> {
    let swap = match frame.format {
        FrameFormat::Bgra => false,
        FrameFormat::Rgba => true,
        other => return Err(Error::UnsupportedFormat(format!("{:?}", other))),
    };

    let src_w = frame.width as usize;
    let src_h = frame.height as usize;
    let stride = frame.stride as usize;
    if src_w == 0 || src_h == 0 || geometry.width == 0 || geometry.height == 0 {
        return Ok(());
    }
    if stride < src_w * BPP || frame.data.len() < stride * (src_h - 1) + src_w * BPP {
        return Err(Error::Internal(format!(
            "frame data too small for {}x{} (stride {}, {} bytes)",
            frame.width,
            frame.height,
            frame.stride,
            frame.data.len()
        )));
    }

    let canvas_w = canvas.width as usize;
    let canvas_h = canvas.height as usize;
    if canvas.data.len() < canvas_w * canvas_h * BPP {
        return Err(Error::Internal("canvas buffer too small".into()));
    }

    let dst_w = geometry.width as usize;
    let dst_h = geometry.height as usize;
    let x0 = geometry.x as usize;
    let y0 = geometry.y as usize;
    let visible_w = dst_w.min(canvas_w.saturating_sub(x0));
    let visible_h = dst_h.min(canvas_h.saturating_sub(y0));

    for y in 0..visible_h {
        let src_y = y * src_h / dst_h;
        let src_row = &frame.data[src_y * stride..];
        let dst_row = (y0 + y) * canvas_w * BPP;
        for x in 0..visible_w {
            let src_x = x * src_w / dst_w;
            let s = src_x * BPP;
            let d = dst_row + (x0 + x) * BPP;
            let px = &src_row[s..s + BPP];
            let out = &mut canvas.data[d..d + BPP];
            if swap {
                out.copy_from_slice(&[px[2], px[1], px[0], px[3]]);
            } else {
                out.copy_from_slice(px);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(x: u32, y: u32, width: u32, height: u32) -> CellGeometry {
        CellGeometry {
            x,
            y,
            width,
            height,
            z_order: 1,
        }
    }

    #[test]
    fn test_blit_downscale() {
        let mut data = vec![0u8; 4 * 2 * BPP];
        let mut canvas = Canvas {
            data: &mut data,
            width: 4,
            height: 2,
        };
        let frame = Frame::solid_bgra(8, 8, [10, 20, 30, 255]);
        blit_scaled(&mut canvas, &frame, &geometry(2, 0, 2, 2)).unwrap();

        // Left half untouched, right half filled
        assert_eq!(&data[0..4], &[0, 0, 0, 0]);
        assert_eq!(&data[8..12], &[10, 20, 30, 255]);
        assert_eq!(&data[(4 + 3) * BPP..(4 + 3) * BPP + 4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_rgba_is_swapped() {
        let mut data = vec![0u8; BPP];
        let mut canvas = Canvas {
            data: &mut data,
            width: 1,
            height: 1,
        };
        let frame = Frame::from_data(vec![1, 2, 3, 4], 1, 1, FrameFormat::Rgba);
        blit_scaled(&mut canvas, &frame, &geometry(0, 0, 1, 1)).unwrap();
        assert_eq!(data, vec![3, 2, 1, 4]);
    }

    #[test]
    fn test_clipped_at_canvas_edge() {
        let mut data = vec![0u8; 2 * 2 * BPP];
        let mut canvas = Canvas {
            data: &mut data,
            width: 2,
            height: 2,
        };
        let frame = Frame::solid_bgra(2, 2, [9, 9, 9, 9]);
        blit_scaled(&mut canvas, &frame, &geometry(1, 1, 4, 4)).unwrap();
        assert_eq!(&data[12..16], &[9, 9, 9, 9]);
        assert_eq!(&data[0..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_planar_rejected() {
        let mut data = vec![0u8; BPP];
        let mut canvas = Canvas {
            data: &mut data,
            width: 1,
            height: 1,
        };
        let frame = Frame::new(2, 2, FrameFormat::I420);
        assert!(matches!(
            blit_scaled(&mut canvas, &frame, &geometry(0, 0, 1, 1)),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_fill() {
        let mut data = vec![0u8; 3 * BPP];
        let mut canvas = Canvas {
            data: &mut data,
            width: 3,
            height: 1,
        };
        fill(&mut canvas, [1, 2, 3, 4]);
        assert_eq!(data, [1, 2, 3, 4].repeat(3));
    }
}
