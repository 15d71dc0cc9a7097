//! 流程配置 - 通过JSON文件调整参数

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 全部流程参数
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub counting: CountingConfig,
    pub motion: MotionConfig,
    pub correlate: CorrelateConfig,
    pub playback: PlaybackConfig,
    pub schedule: ScheduleConfig,
    pub storage: StorageConfig,
}

/// 越线计数参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CountingConfig {
    pub line_start: (f32, f32), // 计数线起点 (像素)
    pub line_end: (f32, f32),   // 计数线终点 (像素)
    pub max_age_frames: u64,    // 轨迹多久未出现后从位置缓存中移除
    pub person_class: u32,      // 只统计的类别 (COCO 0 = person)
    pub conf_threshold: f32,    // 原始检测框置信度下限
    pub tracker: TrackerParams,
}

/// IoU 跟踪器参数 (仅用于未带ID的原始检测框)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerParams {
    pub max_lost_frames: u32,      // 最大丢失帧数
    pub high_score_threshold: f32, // 高分阈值 (只有高分框能新建轨迹)
    pub low_score_threshold: f32,  // 低分阈值 (救援丢失轨迹)
    pub high_iou_threshold: f32,   // 高分匹配IOU阈值
    pub low_iou_threshold: f32,    // 低分匹配IOU阈值
}

/// 运动强度参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub scale: f64,          // 光流前的缩放比例
    pub alpha: f64,          // 指数平滑系数
    pub pyramid_levels: u32, // 金字塔层数
    pub pyramid_scale: f32,  // 相邻两层的缩放比
    pub smoothness: f32,     // Horn-Schunck 平滑权重
    pub iterations: u32,     // 每层迭代次数
}

/// 时间戳关联参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelateConfig {
    pub recent_window: usize,      // 每次展示关联的最近视频数
    pub max_gap_secs: Option<i64>, // 最近邻最大时间差, None = 不限
    pub utc_offset_hours: i32,     // 展示时区
}

/// 播放队列参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub url_ttl_secs: i64,    // 签名链接有效期
    pub video_prefix: String, // 视频在文件库中的前缀
}

/// 轮询调度参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub poll_interval_secs: u64, // 正常轮询间隔
    pub error_backoff_secs: u64, // 记录库故障后的退避
}

/// 存储位置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_root: PathBuf,
}

impl Default for CountingConfig {
    fn default() -> Self {
        // 1920x1080 画面下的部署几何, 见 CountingLine::from_frame_size
        Self {
            line_start: (0.0, 1030.0),
            line_end: (470.0, 780.0),
            max_age_frames: 90,
            person_class: 0,
            conf_threshold: 0.1,
            tracker: TrackerParams::default(),
        }
    }
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            max_lost_frames: 30,
            high_score_threshold: 0.5,
            low_score_threshold: 0.1,
            high_iou_threshold: 0.3,
            low_iou_threshold: 0.2,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            scale: 0.35,
            alpha: 0.7,
            pyramid_levels: 3,
            pyramid_scale: 0.5,
            smoothness: 10.0,
            iterations: 30,
        }
    }
}

impl Default for CorrelateConfig {
    fn default() -> Self {
        Self {
            recent_window: 10,
            max_gap_secs: None,
            utc_offset_hours: crate::DEFAULT_UTC_OFFSET_HOURS,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            url_ttl_secs: 3600,
            video_prefix: "videos/".to_string(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15,
            error_backoff_secs: 10,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            data_root: base.join("occupancy"),
        }
    }
}

impl StorageConfig {
    /// 记录库目录 (每个集合一个 jsonl 文件)
    pub fn records_dir(&self) -> PathBuf {
        self.data_root.join("records")
    }

    /// 文件库根目录
    pub fn blobs_dir(&self) -> PathBuf {
        self.data_root.join("blobs")
    }

    /// 下载片段的临时工作目录
    pub fn work_dir(&self) -> PathBuf {
        self.data_root.join("work")
    }

    /// 外部检测/跟踪结果目录 (<片段名>.jsonl)
    pub fn detections_dir(&self) -> PathBuf {
        self.data_root.join("detections")
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    warn!("❌ 保存配置失败: {}", e);
                } else {
                    info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => warn!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!(
            "🎛️  计数线: {:?} -> {:?} | 轨迹缓存 {} 帧",
            self.counting.line_start, self.counting.line_end, self.counting.max_age_frames
        );
        info!(
            "🎛️  运动分析: 缩放 {:.2} | 平滑 {:.2} | 金字塔 {} 层",
            self.motion.scale, self.motion.alpha, self.motion.pyramid_levels
        );
        info!(
            "🎛️  关联窗口: 最近 {} 条 | 最大时间差 {:?} 秒",
            self.correlate.recent_window, self.correlate.max_gap_secs
        );
        info!("🎛️  数据目录: {}", self.storage.data_root.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "motion": { "alpha": 0.5 }, "correlate": { "max_gap_secs": 600 } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.motion.alpha, 0.5);
        assert_eq!(config.motion.scale, 0.35);
        assert_eq!(config.correlate.max_gap_secs, Some(600));
        assert_eq!(config.correlate.recent_window, 10);
        assert_eq!(config.counting.max_age_frames, 90);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let config = PipelineConfig::load(&path);
        assert!(path.exists());
        assert_eq!(config.schedule.poll_interval_secs, 15);

        let reloaded = PipelineConfig::load(&path);
        assert_eq!(reloaded.playback.url_ttl_secs, 3600);
    }

    #[test]
    fn test_load_bad_json_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, "{ not json").unwrap();
        let config = PipelineConfig::load(&path);
        assert_eq!(config.motion.alpha, 0.7);
    }
}
