use std::collections::VecDeque;

use tracing::debug;

use crate::canvas::{Color, PixelSurface};
use crate::error::{SurfaceError, SurfaceResult};

/// Per-channel match against the colour under the seed pixel. All four
/// channels, alpha included, must be within `tolerance`.
#[inline(always)]
fn matches(p: &[u8], target: [u8; 4], tolerance: u8) -> bool {
    p.iter()
        .zip(target.iter())
        .all(|(&a, &b)| a.abs_diff(b) <= tolerance)
}

/// Breadth-first 4-connected flood fill starting at `start`.
///
/// Every pixel connected to the seed whose colour is within `tolerance` of the
/// seed's original colour is replaced with `fill`. Returns the number of pixels
/// recoloured; a seed that already equals `fill` is a no-op returning 0.
///
/// A visited mask guarantees each pixel is examined once, so the fill also
/// terminates when `fill` itself lies within the tolerance of the target.
pub fn flood_fill(
    surface: &mut PixelSurface,
    start: (u32, u32),
    fill: Color,
    tolerance: u8,
) -> SurfaceResult<usize> {
    let (w, h) = (surface.width(), surface.height());
    let (sx, sy) = start;
    if sx >= w || sy >= h {
        return Err(SurfaceError::OutOfBounds {
            x: sx as i64,
            y: sy as i64,
            width: w,
            height: h,
        });
    }

    let target = surface.get(sx, sy)?.0;
    if target == fill.0 {
        debug!(x = sx, y = sy, "flood fill: seed already has the fill colour");
        return Ok(0);
    }

    let wu = w as usize;
    let hu = h as usize;
    let pixels = surface.as_raw_mut();
    let mut visited = vec![false; wu * hu];
    let mut queue: VecDeque<usize> = VecDeque::with_capacity(4096);

    let seed = sy as usize * wu + sx as usize;
    visited[seed] = true;
    queue.push_back(seed);

    let mut filled = 0usize;
    while let Some(idx) = queue.pop_front() {
        let o = idx * 4;
        pixels[o..o + 4].copy_from_slice(&fill.0);
        filled += 1;

        let x = idx % wu;
        let y = idx / wu;
        let mut visit = |ni: usize, pixels: &[u8]| {
            if !visited[ni] && matches(&pixels[ni * 4..ni * 4 + 4], target, tolerance) {
                visited[ni] = true;
                queue.push_back(ni);
            }
        };
        if x > 0 {
            visit(idx - 1, pixels);
        }
        if x + 1 < wu {
            visit(idx + 1, pixels);
        }
        if y > 0 {
            visit(idx - wu, pixels);
        }
        if y + 1 < hu {
            visit(idx + wu, pixels);
        }
    }

    debug!(x = sx, y = sy, filled, "flood fill complete");
    Ok(filled)
}
