use super::{BUILTIN_AUTHOR, Transform, TransformRequest};
use crate::error::TransformError;

/// Neighbourhood radius; 1 gives the 3x3 window.
const RADIUS: i64 = 1;
const KERNEL: usize = ((2 * RADIUS + 1) * (2 * RADIUS + 1)) as usize;

/// Per-channel median over a clamped 3x3 window. Alpha comes from the centre
/// pixel of the source, unfiltered.
pub struct MatrixMedian;

impl MatrixMedian {
    pub const NAME: &'static str = "MatrixMedian";
}

impl Transform for MatrixMedian {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn author(&self) -> &str {
        BUILTIN_AUTHOR
    }

    fn apply(&self, request: &mut TransformRequest<'_>) -> Result<(), TransformError> {
        let cancel = request.cancel().clone();
        request.for_each_row(|source, y, row| {
            let w = source.width() as i64;
            let h = source.height() as i64;
            let stride = source.stride();
            let raw = source.as_raw();
            let mut channels = [[0u8; KERNEL]; 3];

            for x in 0..w {
                cancel.check()?;
                let mut k = 0;
                for ky in -RADIUS..=RADIUS {
                    let ny = (y as i64 + ky).clamp(0, h - 1) as usize;
                    for kx in -RADIUS..=RADIUS {
                        let nx = (x + kx).clamp(0, w - 1) as usize;
                        let o = ny * stride + nx * 4;
                        for (c, samples) in channels.iter_mut().enumerate() {
                            samples[k] = raw[o + c];
                        }
                        k += 1;
                    }
                }

                let out = x as usize * 4;
                for (c, samples) in channels.iter_mut().enumerate() {
                    samples.sort_unstable();
                    row[out + c] = samples[KERNEL / 2];
                }
                row[out + 3] = raw[y as usize * stride + out + 3];
            }
            Ok(())
        })
    }
}
