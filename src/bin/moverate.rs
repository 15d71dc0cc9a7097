/// 运动强度分析 (Move rate)
///
/// 无人值守运行: 轮询文件库中的新片段, 逐个计算光流运动强度并写入记录库.
/// 记录库/文件库故障时退避重试, 不退出.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;
use occupancy_rs::pipeline::{shutdown_channel, MotionPass, Scheduler, SystemClock};
use occupancy_rs::{logging, store, PipelineConfig};
use tracing::info;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(author, version, about = "视频运动强度分析", long_about = None)]
struct Args {
    /// 配置文件
    #[arg(short, long, default_value = "pipeline.json")]
    config: PathBuf,

    /// 数据目录 (覆盖配置)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// 轮询间隔秒数 (覆盖配置)
    #[arg(long)]
    poll_interval: Option<u64>,

    /// 只检查一轮
    #[arg(long, default_value_t = false)]
    once: bool,
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let mut config = PipelineConfig::load(&args.config);
    if let Some(root) = args.data_root {
        config.storage.data_root = root;
    }
    if let Some(secs) = args.poll_interval {
        config.schedule.poll_interval_secs = secs;
    }
    config.print_summary();

    println!("\n{}", "=".repeat(50));
    println!("📹  视频运动强度分析");
    println!("{}\n", "=".repeat(50));

    let (records, blobs) = store::open_local(&config.storage)?;
    let mut pass = MotionPass::new(
        records,
        blobs,
        config.motion.clone(),
        &config.storage.work_dir(),
        &config.playback.video_prefix,
        config.correlate.utc_offset_hours,
        Arc::new(SystemClock),
    )?;

    if args.once {
        let saved = pass.poll_once()?;
        info!("✅ 本轮完成: {} 个片段", saved.len());
        return Ok(());
    }

    let (_shutdown, mut ticker) = shutdown_channel();
    let stats = Scheduler::from_config(&config.schedule).run(&mut ticker, || pass.poll_once());
    info!("✅ 退出: {:?}", stats);
    Ok(())
}
