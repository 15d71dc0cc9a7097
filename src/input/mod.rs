/// 视频输入系统 (Video Input System)
///
/// 片段按帧读取, 读完即止
/// - Frame:   帧类型与 FrameSource 抽象
/// - Decoder: 本地视频文件解码 (独立线程)
/// - Filter:  YUV420P → RGB 转换
pub mod decode_filter;
pub mod decoder;
pub mod frame;

pub use decode_filter::ClipDecodeFilter;
pub use decoder::FfmpegFrameSource;
pub use frame::{FrameSource, MemoryFrameSource, VideoFrame};
