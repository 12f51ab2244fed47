// Software blitting into a softbuffer frame (u32 per pixel, 0x00RRGGBB).

use crate::element::Element;

pub const BG_COLOR: [u8; 4] = [31, 31, 31, 255];

/// Pack RGB into softbuffer u32 format: 0x00RRGGBB.
pub fn rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

fn unpack_rgb(v: u32) -> (u8, u8, u8) {
    ((v >> 16) as u8, (v >> 8) as u8, v as u8)
}

fn blend(src: u8, dst: u8, alpha: u32) -> u8 {
    ((src as u32 * alpha + dst as u32 * (255 - alpha)) / 255) as u8
}

/// Draw an element at its laid-out position and scale, nearest-neighbor
/// sampled and alpha-blended over the frame.
pub fn blit_element(dst: &mut [u32], dst_w: u32, dst_h: u32, element: &Element) {
    let pixels = element.pixels();
    let (src_w, src_h) = (element.width(), element.height());
    let (x0, y0) = element.position();
    let scale = element.scale();
    if src_w == 0 || src_h == 0 || dst_w == 0 || scale <= 0.0 {
        return;
    }
    // Never write past the rows the frame actually holds.
    let dst_h = dst_h.min((dst.len() / dst_w as usize) as u32);

    let dx_start = x0.max(0.0) as u32;
    let dy_start = y0.max(0.0) as u32;
    let dx_end = ((x0 + element.draw_width()).ceil().max(0.0) as u32).min(dst_w);
    let dy_end = ((y0 + element.draw_height()).ceil().max(0.0) as u32).min(dst_h);

    let inv_scale = 1.0 / scale;
    let src = &pixels.rgba_bytes;

    for dy in dy_start..dy_end {
        let sy = ((dy as f32 - y0) * inv_scale) as u32;
        if sy >= src_h {
            continue;
        }
        for dx in dx_start..dx_end {
            let sx = ((dx as f32 - x0) * inv_scale) as u32;
            if sx >= src_w {
                continue;
            }

            let si = (sy as usize * src_w as usize + sx as usize) * 4;
            let di = dy as usize * dst_w as usize + dx as usize;

            let sa = src[si + 3] as u32;
            if sa == 255 {
                dst[di] = rgb(src[si], src[si + 1], src[si + 2]);
            } else if sa > 0 {
                let (dr, dg, db) = unpack_rgb(dst[di]);
                dst[di] = rgb(
                    blend(src[si], dr, sa),
                    blend(src[si + 1], dg, sa),
                    blend(src[si + 2], db, sa),
                );
            }
        }
    }
}
