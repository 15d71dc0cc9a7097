/// 视频帧与帧源
use image::RgbImage;

/// 一帧解码后的RGB图像
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub index: u64, // 片段内帧序号, 从0开始
    pub image: RgbImage,
}

/// 逐帧读取的有限帧序列
pub trait FrameSource {
    /// 读取下一帧, 读完返回 None
    fn next_frame(&mut self) -> Option<VideoFrame>;

    /// 容器声明的帧率, 未知时为 None
    fn frame_rate(&self) -> Option<f64>;

    /// 容器声明的总帧数, 未知时为 None (只作参考, 以实际读到的帧为准)
    fn frame_count(&self) -> Option<u64>;
}

/// 内存帧源 (测试与离线处理)
pub struct MemoryFrameSource {
    frames: std::vec::IntoIter<VideoFrame>,
    fps: Option<f64>,
    total: u64,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<VideoFrame>, fps: Option<f64>) -> Self {
        Self {
            total: frames.len() as u64,
            frames: frames.into_iter(),
            fps,
        }
    }
}

impl FrameSource for MemoryFrameSource {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        self.frames.next()
    }

    fn frame_rate(&self) -> Option<f64> {
        self.fps
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_yields_in_order() {
        let frames = (0..3)
            .map(|i| VideoFrame {
                index: i,
                image: RgbImage::new(4, 4),
            })
            .collect();
        let mut source = MemoryFrameSource::new(frames, Some(25.0));
        assert_eq!(source.frame_rate(), Some(25.0));
        assert_eq!(source.frame_count(), Some(3));
        assert_eq!(source.next_frame().map(|f| f.index), Some(0));
        assert_eq!(source.next_frame().map(|f| f.index), Some(1));
        assert_eq!(source.next_frame().map(|f| f.index), Some(2));
        assert!(source.next_frame().is_none());
    }
}
