/// 视频文件解码帧源
/// FFmpeg-backed frame source for local clips
use super::decode_filter::ClipDecodeFilter;
use super::frame::{FrameSource, VideoFrame};
use crate::error::{PipelineError, Result};
use crossbeam_channel::{bounded, Receiver};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext};
use std::path::Path;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// 解码线程与消费方之间最多缓存的帧数
const FRAME_QUEUE: usize = 8;

/// 视频文件帧源
///
/// 解码在独立线程中运行, 帧通过有界通道送出.
pub struct FfmpegFrameSource {
    rx: Option<Receiver<VideoFrame>>,
    worker: Option<JoinHandle<()>>,
    frame_rate: Option<f64>,
    frame_count: Option<u64>,
}

impl FfmpegFrameSource {
    /// 打开本地视频文件
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PipelineError::SourceUnavailable(format!(
                "{}: 文件不存在",
                path.display()
            )));
        }
        let url = path.to_string_lossy().into_owned();
        let (frame_rate, frame_count) = probe_stream(&url)?;
        let (tx, rx) = bounded(FRAME_QUEUE);

        info!(
            "🎬 打开视频: {} | 帧率 {:?} | 帧数 {:?}",
            url, frame_rate, frame_count
        );
        let worker = std::thread::Builder::new()
            .name("clip-decoder".to_string())
            .spawn(move || {
                if let Err(e) = decode_clip(&url, ClipDecodeFilter::new(tx)) {
                    warn!("❌ 解码失败 {}: {}", url, e);
                }
            })
            .map_err(|e| PipelineError::SourceUnavailable(format!("解码线程启动失败: {}", e)))?;

        Ok(Self {
            rx: Some(rx),
            worker: Some(worker),
            frame_rate,
            frame_count,
        })
    }
}

/// 读取视频流的帧率与总帧数; 没有视频流时视为打不开
fn probe_stream(url: &str) -> Result<(Option<f64>, Option<u64>)> {
    let info = find_video_stream_info(url)
        .map_err(|e| PipelineError::SourceUnavailable(format!("{}: {}", url, e)))?;
    match info {
        Some(StreamInfo::Video {
            avg_frame_rate,
            nb_frames,
            ..
        }) => Ok((
            rational_fps(avg_frame_rate.num, avg_frame_rate.den),
            declared_frames(nb_frames),
        )),
        Some(_) => {
            debug!("{}: 非视频流信息", url);
            Ok((None, None))
        }
        None => Err(PipelineError::SourceUnavailable(format!(
            "{}: 没有视频流",
            url
        ))),
    }
}

/// 有理数帧率 → 浮点, 分母为0或结果非正时未知
fn rational_fps(num: i32, den: i32) -> Option<f64> {
    if den == 0 {
        return None;
    }
    let fps = num as f64 / den as f64;
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// 容器未记录帧数时为 0
fn declared_frames(nb_frames: i64) -> Option<u64> {
    (nb_frames > 0).then_some(nb_frames as u64)
}

fn decode_clip(url: &str, filter: ClipDecodeFilter) -> std::result::Result<(), String> {
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("decode", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(url)
        .filter_desc("format=yuv420p")
        .output(out)
        .build()
        .map_err(|e| format!("构建失败: {}", e))?;

    let sch = ctx.start().map_err(|e| format!("启动失败: {}", e))?;
    sch.wait().map_err(|e| format!("解码中断: {}", e))
}

impl FrameSource for FfmpegFrameSource {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        self.rx.as_ref()?.recv().ok()
    }

    fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }

    fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        // 先关通道, 让阻塞在 send 上的解码线程退出
        self.rx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
