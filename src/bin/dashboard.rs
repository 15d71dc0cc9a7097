/// 关联报表 (Dashboard)
///
/// 打印最近片段的人数/运动关联表, 输出两张图表, 并列出接下来的播放项.
use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use occupancy_rs::dashboard::{ChartKind, Dashboard};
use occupancy_rs::{logging, store, PipelineConfig};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "人流/运动关联报表", long_about = None)]
struct Args {
    /// 配置文件
    #[arg(short, long, default_value = "pipeline.json")]
    config: PathBuf,

    /// 数据目录 (覆盖配置)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// 关联的最近视频数 (覆盖配置)
    #[arg(short, long)]
    limit: Option<usize>,

    /// 图表输出目录
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// 列出的播放项数量
    #[arg(short, long, default_value_t = 3)]
    next: usize,
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let mut config = PipelineConfig::load(&args.config);
    if let Some(root) = args.data_root {
        config.storage.data_root = root;
    }
    if let Some(limit) = args.limit {
        config.correlate.recent_window = limit;
    }

    let (records, blobs) = store::open_local(&config.storage)?;
    let dashboard = Dashboard::new(records, blobs, &config);

    // ========== 关联表 ==========
    let rows = dashboard.correlated_rows(dashboard.window());
    println!("{:<10} {:>8} {:<10} 视频", "时间", "人数", "运动");
    for row in &rows {
        println!(
            "{:<10} {:>8} {:<10} {}",
            row.timestamp, row.num_people, row.move_rate, row.video_name
        );
    }
    if rows.is_empty() {
        println!("(暂无数据)");
    }

    // ========== 图表 ==========
    fs::create_dir_all(&args.out_dir)?;
    for kind in [ChartKind::MoveRate, ChartKind::PeopleCount] {
        match dashboard.chart(kind) {
            Some(chart) => {
                let path = args.out_dir.join(kind.file_name());
                fs::write(&path, &chart.png)?;
                info!("💾 图表已保存: {}", path.display());
            }
            None => warn!("⚠️  {:?}: 没有数据", kind),
        }
    }

    // ========== 播放队列 ==========
    for _ in 0..args.next {
        match dashboard.next_video() {
            Some(item) => println!("▶️  {} | {}", item.name, item.url),
            None => {
                println!("(没有可播放的视频)");
                break;
            }
        }
    }
    Ok(())
}
