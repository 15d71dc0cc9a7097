/// 越线计数数据结构定义
/// Data structures for line-crossing counting
use serde::{Deserialize, Serialize};

/// 外部跟踪器给出的轨迹ID (同一片段内不复用)
pub type TrackId = u64;

/// 检测框 (Detection bounding box)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
}

/// 中心点
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub x: f32,
    pub y: f32,
}

/// 单帧中的一个已跟踪目标
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedDetection {
    pub track_id: TrackId,
    pub centroid: Centroid,
    pub frame_index: u64,
}

/// 一帧的全部跟踪结果
#[derive(Clone, Debug, Default)]
pub struct TrackedFrame {
    pub frame_index: u64,
    pub detections: Vec<TrackedDetection>,
}

impl Centroid {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: u32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> Centroid {
        Centroid::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// 平移 (用于轨迹预测)
    pub fn shifted(&self, dx: f32, dy: f32) -> BBox {
        BBox {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
            ..*self
        }
    }

    /// IOU (Intersection over Union)
    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.width() * self.height() + other.width() * other.height() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

impl TrackedDetection {
    /// 由检测框中心构造
    pub fn from_bbox(track_id: TrackId, bbox: &BBox, frame_index: u64) -> Self {
        Self {
            track_id,
            centroid: bbox.center(),
            frame_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center() {
        let b = BBox::new(10.0, 20.0, 30.0, 60.0, 0.9, 0);
        assert_eq!(b.center(), Centroid::new(20.0, 40.0));
    }

    #[test]
    fn test_iou_disjoint_and_identical() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0, 1.0, 0);
        let b = BBox::new(20.0, 20.0, 30.0, 30.0, 1.0, 0);
        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0, 1.0, 0);
        let b = a.shifted(5.0, 0.0);
        // 交集 50, 并集 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }
}
