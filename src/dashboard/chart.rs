//! 图表渲染 (PNG)
//!
//! 运动等级画折线, 人数画柱状图. 只画坐标轴/网格/数据, 不渲染文字.

use std::io::Cursor;

use anyhow::Result;
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;

use crate::correlate::CorrelatedRow;
use crate::motion::MotionLevel;

pub const CHART_WIDTH: u32 = 1000;
pub const CHART_HEIGHT: u32 = 500;
const MARGIN: u32 = 40;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const SERIES: Rgb<u8> = Rgb([31, 119, 180]);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartKind {
    MoveRate,
    PeopleCount,
}

impl ChartKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ChartKind::MoveRate => "move_rate.png",
            ChartKind::PeopleCount => "people_count.png",
        }
    }
}

/// 一条数据序列 (x 为展示时间)
#[derive(Clone, Debug, PartialEq)]
pub struct ChartSeries {
    pub kind: ChartKind,
    pub points: Vec<(String, f64)>,
}

impl ChartSeries {
    /// 等级 → 0..4, "Unknown" 的行不画
    pub fn move_rate(rows: &[CorrelatedRow]) -> Self {
        let points = rows
            .iter()
            .filter_map(|r| {
                MotionLevel::from_label(&r.move_rate).map(|l| (r.timestamp.clone(), l.ordinal() as f64))
            })
            .collect();
        Self {
            kind: ChartKind::MoveRate,
            points,
        }
    }

    pub fn people_count(rows: &[CorrelatedRow]) -> Self {
        let points = rows
            .iter()
            .map(|r| (r.timestamp.clone(), r.num_people as f64))
            .collect();
        Self {
            kind: ChartKind::PeopleCount,
            points,
        }
    }

    /// 纵轴范围
    fn y_range(&self) -> (f64, f64) {
        match self.kind {
            ChartKind::MoveRate => (0.0, (MotionLevel::ALL.len() - 1) as f64),
            ChartKind::PeopleCount => {
                let min = self.points.iter().map(|p| p.1).fold(0.0, f64::min);
                let max = self.points.iter().map(|p| p.1).fold(1.0, f64::max);
                (min, max)
            }
        }
    }
}

/// 渲染好的图表
#[derive(Clone, Debug)]
pub struct ChartImage {
    pub kind: ChartKind,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// 画图并编码为PNG; 没有数据点时返回 None
pub fn render_png(series: &ChartSeries) -> Result<Option<ChartImage>> {
    if series.points.is_empty() {
        return Ok(None);
    }

    let mut canvas = RgbImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, BACKGROUND);
    let plot = Rect::at(MARGIN as i32, MARGIN as i32)
        .of_size(CHART_WIDTH - 2 * MARGIN, CHART_HEIGHT - 2 * MARGIN);
    let (y_min, y_max) = series.y_range();

    // ========== 网格 + 坐标轴 ==========
    for i in 0..=4 {
        let y = plot.top() as f32 + plot.height() as f32 * i as f32 / 4.0;
        draw_line_segment_mut(
            &mut canvas,
            (plot.left() as f32, y),
            (plot.right() as f32, y),
            GRID,
        );
    }
    draw_hollow_rect_mut(&mut canvas, plot, AXIS);

    let n = series.points.len();
    let slot = plot.width() as f32 / n as f32;
    let to_y = |v: f64| -> f32 {
        let span = (y_max - y_min).max(f64::EPSILON);
        let t = ((v - y_min) / span) as f32;
        plot.bottom() as f32 - t * plot.height() as f32
    };
    let x_of = |i: usize| plot.left() as f32 + slot * (i as f32 + 0.5);

    // ========== 数据 ==========
    match series.kind {
        ChartKind::MoveRate => {
            let pts: Vec<(f32, f32)> = series
                .points
                .iter()
                .enumerate()
                .map(|(i, (_, v))| (x_of(i), to_y(*v)))
                .collect();
            for pair in pts.windows(2) {
                draw_line_segment_mut(&mut canvas, pair[0], pair[1], SERIES);
            }
            for (x, y) in pts {
                draw_filled_circle_mut(&mut canvas, (x as i32, y as i32), 4, SERIES);
            }
        }
        ChartKind::PeopleCount => {
            let bar_w = ((slot * 0.6) as u32).max(1);
            let zero = to_y(0.0);
            for (i, (_, v)) in series.points.iter().enumerate() {
                let top = to_y(*v).min(zero);
                let bottom = to_y(*v).max(zero);
                let h = ((bottom - top) as u32).max(1);
                let x = (x_of(i) - bar_w as f32 / 2.0) as i32;
                draw_filled_rect_mut(&mut canvas, Rect::at(x, top as i32).of_size(bar_w, h), SERIES);
            }
        }
    }

    let mut png = Vec::new();
    canvas.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(Some(ChartImage {
        kind: series.kind,
        width: CHART_WIDTH,
        height: CHART_HEIGHT,
        png,
    }))
}
