//! Zero-mean normalized cross-correlation (ZNCC) template search.
//!
//! The numerator of the correlation is computed for every offset at once in the
//! frequency domain; window sums for the denominator come from integral tables,
//! following the "fast normalized cross-correlation" formulation.

use std::{fmt, sync::Arc};

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::{
    integral_image::{integral_image, integral_squared_image},
    template_matching::find_extremes,
};
use ndarray::{Array2, Zip};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::image_utils::gray_to_array;

type IntegralTable = ImageBuffer<Luma<u64>, Vec<u64>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationPeak {
    /// Best correlation, clamped to [0, 1].
    pub confidence: f64,
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOutcome {
    Peak(CorrelationPeak),
    TemplateTooLarge,
    FlatTemplate,
}

/// Precomputed search state for one image: its spectrum and integral tables.
#[derive(Clone)]
pub struct CorrelationSearch {
    width: usize,
    height: usize,
    spectrum: Array2<Complex<f64>>,
    sums: IntegralTable,
    squared_sums: IntegralTable,
    row_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
}

impl CorrelationSearch {
    pub fn new(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let (width, height) = (width as usize, height as usize);

        let mut planner = FftPlanner::new();
        let row_forward = planner.plan_fft_forward(width);
        let row_inverse = planner.plan_fft_inverse(width);
        let col_forward = planner.plan_fft_forward(height);
        let col_inverse = planner.plan_fft_inverse(height);

        let mut spectrum = gray_to_array(image).mapv(|v| Complex::new(v, 0.0));
        fft_2d(&mut spectrum, &row_forward, &col_forward);

        Self {
            width,
            height,
            spectrum,
            sums: integral_image::<_, u64>(image),
            squared_sums: integral_squared_image::<_, u64>(image),
            row_forward,
            row_inverse,
            col_forward,
            col_inverse,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    /// Finds the offset where `template` correlates best with the image.
    ///
    /// Templates whose per-pixel variance is below `min_variance` carry no
    /// structure to correlate and are reported as flat.
    pub fn search(&self, template: &GrayImage, min_variance: f64) -> SearchOutcome {
        let (tw, th) = template.dimensions();
        let (tw, th) = (tw as usize, th as usize);

        if tw == 0 || th == 0 || tw > self.width || th > self.height {
            return SearchOutcome::TemplateTooLarge;
        }

        let n = (tw * th) as f64;
        let template_mean = template.iter().map(|&v| v as f64).sum::<f64>() / n;
        let template_energy = template
            .iter()
            .map(|&v| (v as f64 - template_mean).powi(2))
            .sum::<f64>();

        if template_energy / n < min_variance.max(f64::EPSILON) {
            return SearchOutcome::FlatTemplate;
        }

        let mut kernel = Array2::<Complex<f64>>::zeros((self.height, self.width));
        for (x, y, pixel) in template.enumerate_pixels() {
            kernel[[y as usize, x as usize]] = Complex::new(pixel[0] as f64 - template_mean, 0.0);
        }
        fft_2d(&mut kernel, &self.row_forward, &self.col_forward);

        // Reuse the kernel buffer for the cross-power spectrum and its inverse.
        Zip::from(&mut kernel)
            .and(&self.spectrum)
            .for_each(|k, &s| *k = s * k.conj());
        fft_2d(&mut kernel, &self.row_inverse, &self.col_inverse);
        let correlation = kernel;

        let scale = (self.width * self.height) as f64;
        let template_norm = template_energy.sqrt();
        let valid_w = self.width - tw + 1;
        let valid_h = self.height - th + 1;
        let mut surface = ImageBuffer::<Luma<f32>, Vec<f32>>::new(valid_w as u32, valid_h as u32);

        for y in 0..valid_h {
            for x in 0..valid_w {
                let (sum, squared) = self.window_sums(x, y, tw, th);
                // n·Σx² − (Σx)² is exact in integer arithmetic; zero means a flat window.
                let spread = (tw * th) as u128 * squared as u128;
                let spread = spread.saturating_sub(sum as u128 * sum as u128);
                let value = if spread == 0 {
                    0.0
                } else {
                    let window_norm = (spread as f64 / n).sqrt();
                    correlation[[y, x]].re / scale / (template_norm * window_norm)
                };
                surface.put_pixel(x as u32, y as u32, Luma([value as f32]));
            }
        }

        let extremes = find_extremes(&surface);
        let (x, y) = extremes.max_value_location;

        SearchOutcome::Peak(CorrelationPeak {
            confidence: (extremes.max_value as f64).clamp(0.0, 1.0),
            x,
            y,
        })
    }

    fn window_sums(&self, x: usize, y: usize, w: usize, h: usize) -> (u64, u64) {
        let rect = |table: &IntegralTable| {
            let at = |px: usize, py: usize| table.get_pixel(px as u32, py as u32)[0];
            (at(x + w, y + h) + at(x, y)) - (at(x, y + h) + at(x + w, y))
        };

        (rect(&self.sums), rect(&self.squared_sums))
    }
}

impl fmt::Debug for CorrelationSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationSearch")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

fn fft_2d(data: &mut Array2<Complex<f64>>, rows: &Arc<dyn Fft<f64>>, cols: &Arc<dyn Fft<f64>>) {
    let mut buffer = Vec::new();

    for mut row in data.rows_mut() {
        buffer.clear();
        buffer.extend(row.iter().copied());
        rows.process(&mut buffer);
        for (dst, src) in row.iter_mut().zip(&buffer) {
            *dst = *src;
        }
    }

    for mut col in data.columns_mut() {
        buffer.clear();
        buffer.extend(col.iter().copied());
        cols.process(&mut buffer);
        for (dst, src) in col.iter_mut().zip(&buffer) {
            *dst = *src;
        }
    }
}
