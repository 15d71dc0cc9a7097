/// 片段登记 (Clip ingest)
///
/// 外部录制程序产出 mp4 后调用, 把片段上传到文件库并写入 VideoRecord.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use occupancy_rs::pipeline::{IngestPass, SystemClock};
use occupancy_rs::{logging, store, PipelineConfig};
use tracing::error;

#[derive(Parser, Debug)]
#[command(author, version, about = "登记新录制的视频片段", long_about = None)]
struct Args {
    /// 配置文件
    #[arg(short, long, default_value = "pipeline.json")]
    config: PathBuf,

    /// 数据目录 (覆盖配置)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// 要登记的 mp4 文件
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let mut config = PipelineConfig::load(&args.config);
    if let Some(root) = args.data_root {
        config.storage.data_root = root;
    }

    let (records, blobs) = store::open_local(&config.storage)?;
    let pass = IngestPass::new(
        records,
        blobs,
        &config.playback.video_prefix,
        Arc::new(SystemClock),
    );

    let mut failed = 0;
    for file in &args.files {
        if let Err(e) = pass.register(file) {
            error!("❌ 登记失败 {}: {}", file.display(), e);
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{} 个文件登记失败", failed);
    }
    Ok(())
}
