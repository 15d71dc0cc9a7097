/// 越线人数统计 (People counter)
///
/// 默认处理一个最早的未计数片段后退出 (由外部定时调用);
/// `--watch` 时按轮询间隔持续运行.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;
use occupancy_rs::pipeline::{shutdown_channel, CountingPass, Scheduler, SystemClock};
use occupancy_rs::{logging, store, PipelineConfig};
use tracing::info;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(author, version, about = "越线人数统计", long_about = None)]
struct Args {
    /// 配置文件
    #[arg(short, long, default_value = "pipeline.json")]
    config: PathBuf,

    /// 数据目录 (覆盖配置)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// 检测结果目录 (覆盖配置)
    #[arg(long)]
    detections: Option<PathBuf>,

    /// 轨迹缓存帧数 (覆盖配置)
    #[arg(long)]
    max_age_frames: Option<u64>,

    /// 持续轮询
    #[arg(short, long, default_value_t = false)]
    watch: bool,
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let mut config = PipelineConfig::load(&args.config);
    if let Some(root) = args.data_root {
        config.storage.data_root = root;
    }
    if let Some(frames) = args.max_age_frames {
        config.counting.max_age_frames = frames;
    }
    config.print_summary();

    let detections = args
        .detections
        .unwrap_or_else(|| config.storage.detections_dir());
    let (records, blobs) = store::open_local(&config.storage)?;
    let mut pass = CountingPass::new(
        records,
        blobs,
        config.counting.clone(),
        &detections,
        &config.playback.video_prefix,
        config.correlate.utc_offset_hours,
        Arc::new(SystemClock),
    );

    if !args.watch {
        pass.run_once()?;
        return Ok(());
    }

    info!("🚀 计数流程启动 (轮询模式)");
    let (_shutdown, mut ticker) = shutdown_channel();
    Scheduler::from_config(&config.schedule).run(&mut ticker, || pass.run_once());
    Ok(())
}
