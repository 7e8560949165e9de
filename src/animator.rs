// src/animator.rs

//! Animator: a random walk of single pixels drawn straight into the mapped
//! surfaces.
//!
//! Every outer step picks one color. Each output then gets a stroke of up
//! to `max_stroke_len` pixels in a random direction along the current
//! orientation, and the orientation flips after every output's stroke. The
//! flip is shared by all outputs, so with an even number of outputs each
//! one keeps drawing along the same axis.

use crate::config::AnimationConfig;
use crate::drm::PixelMemory;
use crate::surface::Output;
use log::{debug, info, trace};
use std::time::Duration;

/// Wraps `value` into `[0, extent)`. `extent` must be positive.
pub fn wrap(value: i64, extent: i64) -> i64 {
    let r = value % extent;
    if r < 0 {
        r + extent
    } else {
        r
    }
}

/// Word offset of pixel `(x, y)`, assuming rows `width + row_padding` words
/// apart.
pub fn pixel_offset(x: u32, y: u32, width: u32, row_padding: u32) -> usize {
    y as usize * (width as usize + row_padding as usize) + x as usize
}

/// Writes one 32-bit pixel. Returns false, and writes nothing, when the
/// offset falls outside the mapping.
pub fn put_pixel<M: PixelMemory>(
    output: &mut Output<M>,
    x: u32,
    y: u32,
    color: u32,
    row_padding: u32,
) -> bool {
    let offset = pixel_offset(x, y, output.surface.width, row_padding);
    match output.memory.words_mut().get_mut(offset) {
        Some(word) => {
            *word = color;
            true
        }
        None => false,
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnimationReport {
    pub iterations: u32,
    pub pixels_written: u64,
    /// Writes dropped because they fell past the end of a mapping.
    pub pixels_clipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    fn flipped(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

pub struct Animator {
    config: AnimationConfig,
    rng: fastrand::Rng,
}

impl Animator {
    pub fn new(config: &AnimationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            config: config.clone(),
            rng,
        }
    }

    /// Runs exactly `steps` iterations, whatever the number of outputs.
    pub fn run<M: PixelMemory>(&mut self, outputs: &mut [Output<M>]) -> AnimationReport {
        let delay = Duration::from_micros(self.config.pixel_delay_us);
        let padding = self.config.row_padding;
        let mut report = AnimationReport::default();
        let mut orientation = Orientation::Vertical;

        let mut cursors: Vec<(i64, i64)> = outputs
            .iter()
            .map(|o| {
                let (w, h) = (o.surface.width as i64, o.surface.height as i64);
                if w > 0 && h > 0 {
                    (wrap(self.config.start_x, w), wrap(self.config.start_y, h))
                } else {
                    (0, 0)
                }
            })
            .collect();

        info!(
            "Animating {} output(s) for {} steps",
            outputs.len(),
            self.config.steps
        );

        for step in 0..self.config.steps {
            let color = self.rng.u32(..);
            trace!("step {}: color {:#010x}", step, color);

            for (output, cursor) in outputs.iter_mut().zip(cursors.iter_mut()) {
                let (w, h) = (output.surface.width as i64, output.surface.height as i64);
                if w <= 0 || h <= 0 {
                    continue;
                }

                let dir: i64 = if self.rng.bool() { 1 } else { -1 };
                let len = self.rng.u32(0..self.config.max_stroke_len.max(1));

                for _ in 0..len {
                    match orientation {
                        Orientation::Horizontal => cursor.0 = wrap(cursor.0 + dir, w),
                        Orientation::Vertical => cursor.1 = wrap(cursor.1 + dir, h),
                    }
                    if put_pixel(output, cursor.0 as u32, cursor.1 as u32, color, padding) {
                        report.pixels_written += 1;
                    } else {
                        report.pixels_clipped += 1;
                    }
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
                orientation = orientation.flipped();
            }
            report.iterations += 1;
        }

        debug!("Animation finished: {:?}", report);
        report
    }
}
