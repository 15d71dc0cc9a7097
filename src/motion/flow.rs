//! 稠密光流 (Dense optical flow)
//!
//! 金字塔 Horn-Schunck: 从最粗层开始估计, 每层把上一层的流场放大后
//! 对第二帧做双线性 warp, 再解残差流. 输出整幅图光流矢量幅值的均值.

use anyhow::{anyhow, Result};
use fast_image_resize as fr;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use ndarray::Array2;

use crate::config::MotionConfig;

/// 金字塔最粗层的最小边长
const MIN_LEVEL_SIZE: u32 = 8;

/// 两帧之间的平均光流幅值
///
/// 返回非有限值表示该帧对无法计算 (尺寸不一致等), 由调用方按退化帧处理.
pub trait FlowEstimator {
    fn mean_magnitude(&self, prev: &GrayImage, next: &GrayImage) -> f64;
}

/// 预处理: RGB → 灰度 → 按比例缩小
pub fn prepare_frame(rgb: &RgbImage, scale: f64) -> Result<GrayImage> {
    let gray = imageops::grayscale(rgb);
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return Err(anyhow!("空帧 {}x{}", w, h));
    }
    let dw = ((w as f64 * scale).round() as u32).max(1);
    let dh = ((h as f64 * scale).round() as u32).max(1);
    if (dw, dh) == (w, h) {
        return Ok(gray);
    }

    let src = fr::images::Image::from_vec_u8(w, h, gray.into_raw(), fr::PixelType::U8)?;
    let mut dst = fr::images::Image::new(dw, dh, fr::PixelType::U8);
    let mut resizer = fr::Resizer::new();
    resizer.resize(
        &src,
        &mut dst,
        &fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
    )?;

    GrayImage::from_raw(dw, dh, dst.buffer().to_vec())
        .ok_or_else(|| anyhow!("缩放结果尺寸不符 {}x{}", dw, dh))
}

/// 金字塔 Horn-Schunck 光流
#[derive(Clone, Debug)]
pub struct HornSchunckFlow {
    levels: u32,
    pyramid_scale: f32,
    smoothness: f32,
    iterations: u32,
}

impl HornSchunckFlow {
    pub fn new(levels: u32, pyramid_scale: f32, smoothness: f32, iterations: u32) -> Self {
        Self {
            levels: levels.max(1),
            pyramid_scale: pyramid_scale.clamp(0.1, 0.9),
            smoothness,
            iterations: iterations.max(1),
        }
    }

    pub fn from_config(config: &MotionConfig) -> Self {
        Self::new(
            config.pyramid_levels,
            config.pyramid_scale,
            config.smoothness,
            config.iterations,
        )
    }

    /// 计算完整流场 (u, v), 单位为输入图像像素
    pub fn flow_field(&self, prev: &GrayImage, next: &GrayImage) -> Option<(Array2<f32>, Array2<f32>)> {
        if prev.dimensions() != next.dimensions() || prev.width() == 0 || prev.height() == 0 {
            return None;
        }

        let prev_pyr = self.build_pyramid(prev);
        let next_pyr = self.build_pyramid(next);

        let coarsest = &prev_pyr[prev_pyr.len() - 1];
        let shape = (coarsest.height() as usize, coarsest.width() as usize);
        let mut u = Array2::<f32>::zeros(shape);
        let mut v = Array2::<f32>::zeros(shape);

        for (p, n) in prev_pyr.iter().zip(next_pyr.iter()).rev() {
            let shape = (p.height() as usize, p.width() as usize);
            if u.dim() != shape {
                u = upsample_field(&u, shape);
                v = upsample_field(&v, shape);
            }

            let i1 = to_array(p);
            let i2 = warp(&to_array(n), &u, &v);
            let (du, dv) = self.solve_increment(&i1, &i2);
            u += &du;
            v += &dv;
        }

        Some((u, v))
    }

    fn build_pyramid(&self, base: &GrayImage) -> Vec<GrayImage> {
        let mut levels = vec![base.clone()];
        for _ in 1..self.levels {
            let last = &levels[levels.len() - 1];
            let w = (last.width() as f32 * self.pyramid_scale).round() as u32;
            let h = (last.height() as f32 * self.pyramid_scale).round() as u32;
            if w < MIN_LEVEL_SIZE || h < MIN_LEVEL_SIZE {
                break;
            }
            let next = imageops::resize(last, w, h, FilterType::Triangle);
            levels.push(next);
        }
        levels
    }

    /// 单层 Horn-Schunck 迭代, 求 i1 → i2 的残差流
    fn solve_increment(&self, i1: &Array2<f32>, i2: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
        let (h, w) = i1.dim();
        let mut ix = Array2::<f32>::zeros((h, w));
        let mut iy = Array2::<f32>::zeros((h, w));
        let it = i2 - i1;

        for y in 0..h {
            let ym = y.saturating_sub(1);
            let yp = (y + 1).min(h - 1);
            for x in 0..w {
                let xm = x.saturating_sub(1);
                let xp = (x + 1).min(w - 1);
                // 两帧梯度取平均
                ix[[y, x]] = 0.25 * (i1[[y, xp]] - i1[[y, xm]] + i2[[y, xp]] - i2[[y, xm]]);
                iy[[y, x]] = 0.25 * (i1[[yp, x]] - i1[[ym, x]] + i2[[yp, x]] - i2[[ym, x]]);
            }
        }

        let alpha2 = self.smoothness * self.smoothness;
        let mut u = Array2::<f32>::zeros((h, w));
        let mut v = Array2::<f32>::zeros((h, w));

        for _ in 0..self.iterations {
            let u_avg = neighbour_mean(&u);
            let v_avg = neighbour_mean(&v);
            for y in 0..h {
                for x in 0..w {
                    let gx = ix[[y, x]];
                    let gy = iy[[y, x]];
                    let ua = u_avg[[y, x]];
                    let va = v_avg[[y, x]];
                    let t = (gx * ua + gy * va + it[[y, x]]) / (alpha2 + gx * gx + gy * gy);
                    u[[y, x]] = ua - gx * t;
                    v[[y, x]] = va - gy * t;
                }
            }
        }

        (u, v)
    }
}

impl FlowEstimator for HornSchunckFlow {
    fn mean_magnitude(&self, prev: &GrayImage, next: &GrayImage) -> f64 {
        let Some((u, v)) = self.flow_field(prev, next) else {
            return f64::NAN;
        };
        let count = u.len();
        if count == 0 {
            return f64::NAN;
        }
        let sum: f64 = u
            .iter()
            .zip(v.iter())
            .map(|(a, b)| ((a * a + b * b) as f64).sqrt())
            .sum();
        sum / count as f64
    }
}

fn to_array(img: &GrayImage) -> Array2<f32> {
    let (w, h) = img.dimensions();
    Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        img.get_pixel(x as u32, y as u32)[0] as f32
    })
}

/// 四邻域均值, 边界复制
fn neighbour_mean(a: &Array2<f32>) -> Array2<f32> {
    let (h, w) = a.dim();
    Array2::from_shape_fn((h, w), |(y, x)| {
        let up = a[[y.saturating_sub(1), x]];
        let down = a[[(y + 1).min(h - 1), x]];
        let left = a[[y, x.saturating_sub(1)]];
        let right = a[[y, (x + 1).min(w - 1)]];
        0.25 * (up + down + left + right)
    })
}

/// 双线性采样, 越界取边缘值
fn sample(a: &Array2<f32>, x: f32, y: f32) -> f32 {
    let (h, w) = a.dim();
    let x = x.clamp(0.0, (w - 1) as f32);
    let y = y.clamp(0.0, (h - 1) as f32);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let top = a[[y0, x0]] * (1.0 - fx) + a[[y0, x1]] * fx;
    let bottom = a[[y1, x0]] * (1.0 - fx) + a[[y1, x1]] * fx;
    top * (1.0 - fy) + bottom * fy
}

/// 按当前流场把第二帧拉回第一帧坐标
fn warp(img: &Array2<f32>, u: &Array2<f32>, v: &Array2<f32>) -> Array2<f32> {
    Array2::from_shape_fn(img.dim(), |(y, x)| {
        sample(img, x as f32 + u[[y, x]], y as f32 + v[[y, x]])
    })
}

/// 流场放大到下一层尺寸, 矢量按比例放大
fn upsample_field(field: &Array2<f32>, shape: (usize, usize)) -> Array2<f32> {
    let (oh, ow) = field.dim();
    let (nh, nw) = shape;
    let sx = ow as f32 / nw as f32;
    let sy = oh as f32 / nh as f32;
    let gain = nw as f32 / ow as f32;
    Array2::from_shape_fn(shape, |(y, x)| sample(field, x as f32 * sx, y as f32 * sy) * gain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    /// 平滑亮度图, 每行/列的梯度都不为零
    fn pattern(w: u32, h: u32, shift: f32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let fx = x as f32 - shift;
            let value = 128.0 + 60.0 * (fx * 0.3).sin() + 40.0 * (y as f32 * 0.25).cos();
            Luma([value.clamp(0.0, 255.0) as u8])
        })
    }

    #[test]
    fn test_identical_frames_have_no_motion() {
        let flow = HornSchunckFlow::from_config(&MotionConfig::default());
        let a = pattern(64, 48, 0.0);
        let score = flow.mean_magnitude(&a, &a);
        assert!(score.abs() < 1e-6);
    }

    #[test]
    fn test_shifted_frame_has_motion() {
        let flow = HornSchunckFlow::from_config(&MotionConfig::default());
        let a = pattern(64, 48, 0.0);
        let b = pattern(64, 48, 2.0);
        let score = flow.mean_magnitude(&a, &b);
        assert!(score.is_finite());
        assert!(score > 0.3, "score = {}", score);
    }

    #[test]
    fn test_larger_shift_scores_higher() {
        let flow = HornSchunckFlow::from_config(&MotionConfig::default());
        let a = pattern(64, 48, 0.0);
        let small = flow.mean_magnitude(&a, &pattern(64, 48, 1.0));
        let large = flow.mean_magnitude(&a, &pattern(64, 48, 3.0));
        assert!(large > small);
    }

    #[test]
    fn test_size_mismatch_is_degenerate() {
        let flow = HornSchunckFlow::from_config(&MotionConfig::default());
        let score = flow.mean_magnitude(&pattern(64, 48, 0.0), &pattern(32, 24, 0.0));
        assert!(score.is_nan());
    }

    #[test]
    fn test_prepare_frame_scales_and_grays() {
        let rgb = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        let gray = prepare_frame(&rgb, 0.35).unwrap();
        assert_eq!(gray.dimensions(), (70, 35));
        assert!(gray.pixels().all(|p| p[0] > 250));
    }

    #[test]
    fn test_pyramid_stops_at_min_size() {
        let flow = HornSchunckFlow::new(5, 0.5, 10.0, 5);
        let levels = flow.build_pyramid(&pattern(40, 20, 0.0));
        // 40x20 → 20x10 → (10x5 太小)
        assert_eq!(levels.len(), 2);
    }
}
