use featmatch_core::{FeatureResult, ResponseGrid};
use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use rayon::prelude::*;

/// Gradient covariance entries summed over a `block_size` window at every pixel
struct StructureTensor {
    width: usize,
    height: usize,
    ixx: Vec<f32>,
    iyy: Vec<f32>,
    ixy: Vec<f32>,
}

impl StructureTensor {
    /// Window offsets match an anchor at the block centre, `-(b/2) ..= b - 1 - b/2`;
    /// pixels outside the image are replicated from the border.
    fn compute(img: &GrayImage, block_size: usize) -> Self {
        let (w, h) = img.dimensions();
        let (width, height) = (w as usize, h as usize);

        let gx = horizontal_sobel(img);
        let gy = vertical_sobel(img);
        let (gx, gy) = (gx.as_raw(), gy.as_raw());

        let mut dxx = Vec::with_capacity(width * height);
        let mut dyy = Vec::with_capacity(width * height);
        let mut dxy = Vec::with_capacity(width * height);
        for (&x, &y) in gx.iter().zip(gy.iter()) {
            let (x, y) = (x as f32, y as f32);
            dxx.push(x * x);
            dyy.push(y * y);
            dxy.push(x * y);
        }

        let lo = -((block_size / 2) as isize);
        let hi = lo + block_size as isize - 1;

        let sums: Vec<(f32, f32, f32)> = (0..height)
            .into_par_iter()
            .flat_map_iter(|y| {
                let (dxx, dyy, dxy) = (&dxx, &dyy, &dxy);
                (0..width).map(move |x| {
                    let mut acc = (0.0f32, 0.0f32, 0.0f32);
                    for oy in lo..=hi {
                        let yy = (y as isize + oy).clamp(0, height as isize - 1) as usize;
                        for ox in lo..=hi {
                            let xx = (x as isize + ox).clamp(0, width as isize - 1) as usize;
                            let i = yy * width + xx;
                            acc.0 += dxx[i];
                            acc.1 += dyy[i];
                            acc.2 += dxy[i];
                        }
                    }
                    acc
                })
            })
            .collect();

        let mut ixx = Vec::with_capacity(sums.len());
        let mut iyy = Vec::with_capacity(sums.len());
        let mut ixy = Vec::with_capacity(sums.len());
        for (a, b, c) in sums {
            ixx.push(a);
            iyy.push(b);
            ixy.push(c);
        }

        Self {
            width,
            height,
            ixx,
            iyy,
            ixy,
        }
    }

    fn map<F>(&self, f: F) -> FeatureResult<ResponseGrid>
    where
        F: Fn(f32, f32, f32) -> f32 + Sync,
    {
        let data: Vec<f32> = self
            .ixx
            .par_iter()
            .zip(self.iyy.par_iter())
            .zip(self.ixy.par_iter())
            .map(|((&a, &c), &b)| f(a, c, b))
            .collect();
        ResponseGrid::new(self.width, self.height, data)
    }
}

/// Harris corner response `det(M) - k * trace(M)^2`
pub fn harris_response(img: &GrayImage, block_size: usize, k: f32) -> FeatureResult<ResponseGrid> {
    if img.width() == 0 || img.height() == 0 {
        return Ok(ResponseGrid::zeros(img.width() as usize, img.height() as usize));
    }
    StructureTensor::compute(img, block_size).map(|ixx, iyy, ixy| {
        let det = ixx * iyy - ixy * ixy;
        let trace = ixx + iyy;
        det - k * trace * trace
    })
}

/// Shi-Tomasi response: the smaller eigenvalue of the gradient covariance matrix
pub fn min_eigen_response(img: &GrayImage, block_size: usize) -> FeatureResult<ResponseGrid> {
    if img.width() == 0 || img.height() == 0 {
        return Ok(ResponseGrid::zeros(img.width() as usize, img.height() as usize));
    }
    StructureTensor::compute(img, block_size).map(|ixx, iyy, ixy| {
        let diff = ixx - iyy;
        let root = (diff * diff + 4.0 * ixy * ixy).sqrt();
        (0.5 * (ixx + iyy - root)).max(0.0)
    })
}
