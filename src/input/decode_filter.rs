/// FFmpeg解码过滤器: 视频文件 → RGB帧
/// FFmpeg decode filter for offline clips
use super::frame::VideoFrame;
use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use std::time::Instant;
use tracing::{debug, info};

/// 片段解码过滤器
///
/// 离线片段不能丢帧, 发送时阻塞等待消费方; 消费方关闭通道后返回错误中止解码.
pub struct ClipDecodeFilter {
    tx: Sender<VideoFrame>,
    index: u64,
    started: Instant,
}

impl ClipDecodeFilter {
    pub fn new(tx: Sender<VideoFrame>) -> Self {
        Self {
            tx,
            index: 0,
            started: Instant::now(),
        }
    }
}

/// YUV420P 平面 → RGB (BT.601)
///
/// # Safety
/// 三个平面指针必须指向至少 `h` 行 (色度 `h/2` 行) 的有效数据.
unsafe fn yuv420p_to_rgb(
    data_y: *const u8,
    data_u: *const u8,
    data_v: *const u8,
    y_stride: usize,
    uv_stride: usize,
    w: usize,
    h: usize,
) -> Vec<u8> {
    let mut rgb = vec![0u8; w * h * 3];
    for y in 0..h {
        for x in 0..w {
            let y_val = *data_y.add(y * y_stride + x) as f32;
            let u_val = *data_u.add((y / 2) * uv_stride + x / 2) as f32 - 128.0;
            let v_val = *data_v.add((y / 2) * uv_stride + x / 2) as f32 - 128.0;

            let idx = (y * w + x) * 3;
            rgb[idx] = (y_val + 1.402 * v_val).clamp(0.0, 255.0) as u8;
            rgb[idx + 1] = (y_val - 0.344 * u_val - 0.714 * v_val).clamp(0.0, 255.0) as u8;
            rgb[idx + 2] = (y_val + 1.772 * u_val).clamp(0.0, 255.0) as u8;
        }
    }
    rgb
}

impl FrameFilter for ClipDecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        debug!("✅ 片段解码启动");
        self.started = Instant::now();
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        let rgb = unsafe {
            if frame.as_ptr().is_null() {
                return Ok(Some(frame));
            }
            let raw = &*frame.as_ptr();
            let w = raw.width.max(0) as usize;
            let h = raw.height.max(0) as usize;
            if w == 0 || h == 0 || raw.data[0].is_null() {
                return Ok(Some(frame));
            }

            let data = yuv420p_to_rgb(
                raw.data[0],
                raw.data[1],
                raw.data[2],
                raw.linesize[0] as usize,
                raw.linesize[1] as usize,
                w,
                h,
            );
            RgbImage::from_raw(w as u32, h as u32, data)
        };

        let Some(image) = rgb else {
            return Err(format!("帧 {} 尺寸异常", self.index));
        };

        let decoded = VideoFrame {
            index: self.index,
            image,
        };
        self.index += 1;

        self.tx
            .send(decoded)
            .map_err(|_| "帧通道已关闭".to_string())?;
        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        let elapsed = self.started.elapsed().as_secs_f64();
        info!(
            "✅ 片段解码结束: {} 帧 | {:.1}s | {:.1}fps",
            self.index,
            elapsed,
            self.index as f64 / elapsed.max(1e-6)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv_gray_maps_to_gray() {
        // 4x2 中性色度: Y 直接成为 RGB
        let y = [10u8, 50, 90, 130, 170, 210, 250, 0];
        let u = [128u8, 128];
        let v = [128u8, 128];
        let rgb = unsafe { yuv420p_to_rgb(y.as_ptr(), u.as_ptr(), v.as_ptr(), 4, 2, 4, 2) };
        assert_eq!(rgb.len(), 24);
        for (i, &luma) in y.iter().enumerate() {
            assert_eq!(&rgb[i * 3..i * 3 + 3], &[luma, luma, luma]);
        }
    }

    #[test]
    fn test_yuv_red_chroma() {
        let y = [76u8; 4];
        let u = [85u8];
        let v = [255u8];
        let rgb = unsafe { yuv420p_to_rgb(y.as_ptr(), u.as_ptr(), v.as_ptr(), 2, 1, 2, 2) };
        assert!(rgb[0] > 240);
        assert!(rgb[1] < 20);
        assert!(rgb[2] < 20);
    }
}
