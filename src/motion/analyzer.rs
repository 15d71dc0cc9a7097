//! 运动强度分析器 (Motion Intensity Analyzer)
//!
//! 每对相邻帧算一次平均光流幅值 (raw), 做指数平滑:
//! `smoothed[i] = alpha * smoothed[i-1] + (1 - alpha) * raw[i]`, `smoothed[0] = raw[0]`.
//! raw 为零或非有限值时沿用上一平滑值, 不让单帧把均值拉到零.
//!
//! 片段分成固定 10 段, 段长 `max(1, n / 10)`, 不足 10 段补 0.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MotionConfig;
use crate::error::{PipelineError, Result};
use crate::input::FrameSource;

use super::flow::{prepare_frame, FlowEstimator};

/// 时间分段数, 下游图表依赖这个固定长度
pub const SEGMENT_COUNT: usize = 10;

/// 运动等级 (固定阶梯, 下界闭区间)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MotionLevel {
    #[serde(rename = "Very Low")]
    VeryLow,
    #[serde(rename = "Low")]
    Low,
    #[serde(rename = "Medium")]
    Medium,
    #[serde(rename = "High")]
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl MotionLevel {
    pub const ALL: [MotionLevel; 5] = [
        MotionLevel::VeryLow,
        MotionLevel::Low,
        MotionLevel::Medium,
        MotionLevel::High,
        MotionLevel::VeryHigh,
    ];

    /// `<0.5 VeryLow, <1.0 Low, <1.5 Medium, <2.0 High, 其余 VeryHigh`
    pub fn from_score(score: f64) -> Self {
        if score < 0.5 {
            MotionLevel::VeryLow
        } else if score < 1.0 {
            MotionLevel::Low
        } else if score < 1.5 {
            MotionLevel::Medium
        } else if score < 2.0 {
            MotionLevel::High
        } else {
            MotionLevel::VeryHigh
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MotionLevel::VeryLow => "Very Low",
            MotionLevel::Low => "Low",
            MotionLevel::Medium => "Medium",
            MotionLevel::High => "High",
            MotionLevel::VeryHigh => "Very High",
        }
    }

    /// 图表纵轴序号 0..4
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.label() == label)
    }
}

impl std::fmt::Display for MotionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 单帧运动分数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionSample {
    pub frame_index: u64,
    pub raw_score: f64,
    pub smoothed_score: f64,
}

/// 片段运动摘要
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionSummary {
    pub overall_score: f64,
    pub segment_scores: [f64; SEGMENT_COUNT],
    pub level: MotionLevel,
    pub frame_count: u64,
    /// 光流退化 (零值/NaN) 被替换的帧数
    pub degenerate_frames: u64,
}

/// 平滑 + 分段累加器, 不依赖图像
#[derive(Clone, Debug)]
pub struct MotionAccumulator {
    alpha: f64,
    samples: Vec<MotionSample>,
    degenerate: u64,
}

impl MotionAccumulator {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            samples: Vec::new(),
            degenerate: 0,
        }
    }

    /// 加入一帧原始分数, 返回平滑后的样本
    pub fn push(&mut self, frame_index: u64, raw_score: f64) -> MotionSample {
        let prev = self.samples.last().map(|s| s.smoothed_score);
        let degenerate = !raw_score.is_finite() || raw_score <= 0.0;

        let smoothed = match (prev, degenerate) {
            (Some(p), true) => p,
            (None, true) => 0.0,
            (None, false) => raw_score,
            (Some(p), false) => self.alpha * p + (1.0 - self.alpha) * raw_score,
        };
        if degenerate {
            self.degenerate += 1;
            debug!("帧 {} 光流退化 (raw={}), 沿用 {:.3}", frame_index, raw_score, smoothed);
        }

        let sample = MotionSample {
            frame_index,
            raw_score,
            smoothed_score: smoothed,
        };
        self.samples.push(sample);
        sample
    }

    pub fn samples(&self) -> &[MotionSample] {
        &self.samples
    }

    pub fn finish(&self) -> MotionSummary {
        let n = self.samples.len();
        let smoothed: Vec<f64> = self.samples.iter().map(|s| s.smoothed_score).collect();

        let overall = if n == 0 {
            0.0
        } else {
            smoothed.iter().sum::<f64>() / n as f64
        };

        let mut segment_scores = [0.0; SEGMENT_COUNT];
        let segment_len = (n / SEGMENT_COUNT).max(1);
        for (slot, chunk) in segment_scores
            .iter_mut()
            .zip(smoothed.chunks(segment_len))
        {
            *slot = chunk.iter().sum::<f64>() / chunk.len() as f64;
        }

        MotionSummary {
            overall_score: overall,
            segment_scores,
            level: MotionLevel::from_score(overall),
            frame_count: n as u64,
            degenerate_frames: self.degenerate,
        }
    }
}

/// 运动强度分析器
pub struct MotionAnalyzer<F: FlowEstimator> {
    config: MotionConfig,
    flow: F,
}

impl<F: FlowEstimator> MotionAnalyzer<F> {
    pub fn new(config: MotionConfig, flow: F) -> Self {
        Self { config, flow }
    }

    /// 分析一个片段
    ///
    /// N 帧产生 N-1 个帧对, 每个帧对的分数记在后一帧上.
    pub fn analyze(&self, source: &mut dyn FrameSource) -> Result<MotionSummary> {
        let first = source
            .next_frame()
            .ok_or_else(|| PipelineError::SourceUnavailable("没有可读取的帧".to_string()))?;
        debug!(
            "声明帧率 {:?} | 声明帧数 {:?}",
            source.frame_rate(),
            source.frame_count()
        );
        let mut prev = prepare_frame(&first.image, self.config.scale)
            .map_err(|e| PipelineError::SourceUnavailable(format!("首帧预处理失败: {}", e)))?;

        let mut acc = MotionAccumulator::new(self.config.alpha);
        while let Some(frame) = source.next_frame() {
            let raw = match prepare_frame(&frame.image, self.config.scale) {
                Ok(gray) => {
                    let score = self.flow.mean_magnitude(&prev, &gray);
                    prev = gray;
                    score
                }
                Err(e) => {
                    debug!("帧 {} 预处理失败: {}", frame.index, e);
                    f64::NAN
                }
            };

            let sample = acc.push(frame.index, raw);
            if frame.index % 100 == 0 {
                debug!(
                    "帧 {}: raw={:.3} smoothed={:.3}",
                    frame.index, sample.raw_score, sample.smoothed_score
                );
            }
        }

        let summary = acc.finish();
        info!(
            "📊 运动分析完成: {} 帧 | 平均 {:.2} | 等级 {} | 退化帧 {}",
            summary.frame_count, summary.overall_score, summary.level, summary.degenerate_frames
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{MemoryFrameSource, VideoFrame};
    use image::{GrayImage, RgbImage};
    use std::cell::RefCell;

    #[test]
    fn test_smoothing_scenario() {
        let mut acc = MotionAccumulator::new(0.7);
        for (i, raw) in [0.0, 2.0, 2.0].into_iter().enumerate() {
            acc.push(i as u64, raw);
        }
        let smoothed: Vec<f64> = acc.samples().iter().map(|s| s.smoothed_score).collect();
        assert!((smoothed[0] - 0.0).abs() < 1e-9);
        assert!((smoothed[1] - 0.6).abs() < 1e-9);
        assert!((smoothed[2] - 1.02).abs() < 1e-9);

        let summary = acc.finish();
        assert!((summary.overall_score - 0.54).abs() < 1e-9);
        assert_eq!(summary.frame_count, 3);
        assert_eq!(summary.degenerate_frames, 1);
        assert_eq!(summary.level, MotionLevel::Low);
    }

    #[test]
    fn test_first_sample_is_raw() {
        let mut acc = MotionAccumulator::new(0.7);
        assert_eq!(acc.push(1, 1.7).smoothed_score, 1.7);
    }

    #[test]
    fn test_degenerate_keeps_previous() {
        let mut acc = MotionAccumulator::new(0.7);
        acc.push(0, 1.0);
        let prev = acc.push(1, 3.0).smoothed_score;
        assert_eq!(acc.push(2, f64::NAN).smoothed_score, prev);
        assert_eq!(acc.push(3, 0.0).smoothed_score, prev);
        assert!(acc.finish().overall_score.is_finite());
    }

    #[test]
    fn test_segments_always_ten() {
        for n in [0usize, 1, 3, 9, 10, 11, 25, 99, 1200] {
            let mut acc = MotionAccumulator::new(0.7);
            for i in 0..n {
                acc.push(i as u64, 1.0 + (i % 7) as f64);
            }
            let summary = acc.finish();
            assert_eq!(summary.segment_scores.len(), SEGMENT_COUNT);
            assert_eq!(summary.frame_count, n as u64);
        }
    }

    #[test]
    fn test_short_clip_pads_with_zero() {
        let mut acc = MotionAccumulator::new(0.0);
        for (i, raw) in [1.0, 2.0, 3.0].into_iter().enumerate() {
            acc.push(i as u64, raw);
        }
        let summary = acc.finish();
        assert_eq!(summary.segment_scores[..3], [1.0, 2.0, 3.0]);
        assert!(summary.segment_scores[3..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_segment_means() {
        // alpha = 0 → smoothed == raw
        let mut acc = MotionAccumulator::new(0.0);
        for i in 0..20 {
            acc.push(i, (i / 2 + 1) as f64);
        }
        let summary = acc.finish();
        let expected: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        assert_eq!(summary.segment_scores.to_vec(), expected);
    }

    #[test]
    fn test_overall_is_mean_of_smoothed() {
        let mut acc = MotionAccumulator::new(0.7);
        for i in 0..37 {
            acc.push(i, ((i * 13) % 5) as f64 * 0.4);
        }
        let mean = acc.samples().iter().map(|s| s.smoothed_score).sum::<f64>() / 37.0;
        assert!((acc.finish().overall_score - mean).abs() < 1e-9);
    }

    #[test]
    fn test_empty_clip_overall_zero() {
        let summary = MotionAccumulator::new(0.7).finish();
        assert_eq!(summary.overall_score, 0.0);
        assert_eq!(summary.level, MotionLevel::VeryLow);
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(MotionLevel::from_score(0.0), MotionLevel::VeryLow);
        assert_eq!(MotionLevel::from_score(0.49), MotionLevel::VeryLow);
        assert_eq!(MotionLevel::from_score(0.5), MotionLevel::Low);
        assert_eq!(MotionLevel::from_score(1.0), MotionLevel::Medium);
        assert_eq!(MotionLevel::from_score(1.5), MotionLevel::High);
        assert_eq!(MotionLevel::from_score(2.0), MotionLevel::VeryHigh);
        assert_eq!(MotionLevel::from_score(42.0), MotionLevel::VeryHigh);
    }

    #[test]
    fn test_level_is_monotonic() {
        let mut last = MotionLevel::VeryLow;
        for i in 0..400 {
            let level = MotionLevel::from_score(i as f64 * 0.01);
            assert!(level >= last);
            last = level;
        }
    }

    #[test]
    fn test_level_labels_round_trip_through_serde() {
        let json = serde_json::to_string(&MotionLevel::VeryHigh).unwrap();
        assert_eq!(json, "\"Very High\"");
        assert_eq!(MotionLevel::from_label("Medium"), Some(MotionLevel::Medium));
        assert_eq!(MotionLevel::from_label("Unknown"), None);
        assert_eq!(MotionLevel::High.ordinal(), 3);
    }

    /// 按预设序列给分的光流
    struct ScriptedFlow {
        scores: RefCell<Vec<f64>>,
    }

    impl FlowEstimator for ScriptedFlow {
        fn mean_magnitude(&self, _prev: &GrayImage, _next: &GrayImage) -> f64 {
            self.scores.borrow_mut().remove(0)
        }
    }

    fn frames(n: u64) -> MemoryFrameSource {
        MemoryFrameSource::new(
            (0..n)
                .map(|i| VideoFrame {
                    index: i,
                    image: RgbImage::new(20, 10),
                })
                .collect(),
            Some(20.0),
        )
    }

    #[test]
    fn test_analyze_uses_frame_pairs() {
        let flow = ScriptedFlow {
            scores: RefCell::new(vec![0.0, 2.0, 2.0]),
        };
        let analyzer = MotionAnalyzer::new(MotionConfig::default(), flow);
        let summary = analyzer.analyze(&mut frames(4)).unwrap();
        assert_eq!(summary.frame_count, 3);
        assert!((summary.overall_score - 0.54).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_empty_source_fails() {
        let flow = ScriptedFlow {
            scores: RefCell::new(Vec::new()),
        };
        let analyzer = MotionAnalyzer::new(MotionConfig::default(), flow);
        let err = analyzer.analyze(&mut frames(0)).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    }

    #[test]
    fn test_analyze_single_frame_gives_empty_summary() {
        let flow = ScriptedFlow {
            scores: RefCell::new(Vec::new()),
        };
        let analyzer = MotionAnalyzer::new(MotionConfig::default(), flow);
        let summary = analyzer.analyze(&mut frames(1)).unwrap();
        assert_eq!(summary.frame_count, 0);
        assert_eq!(summary.segment_scores, [0.0; SEGMENT_COUNT]);
    }
}
