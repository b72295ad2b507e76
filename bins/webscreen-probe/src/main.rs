//! webscreen-probe - 采集探测工具
//!
//! 监听 scrcpy 服务端的连接 (或回放录制的带帧头码流文件), 运行采集管线,
//! 结束后输出设备信息与各采集任务的统计.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use webscreen::logging::{self, LoggingConfig};
use webscreen_capture::{CaptureConfig, CapturePipeline, MediaMeta, PipelineStats};
use webscreen_codec::{CodecId, MediaUnit};

/// webscreen 采集探测工具
#[derive(Parser, Debug)]
#[command(name = "webscreen-probe", version, about = "scrcpy 媒体采集探测工具")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// 采集配置文件 (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 日志目录
    #[arg(long, global = true, default_value = "logs")]
    log_dir: String,

    /// 详细输出 (-v debug, -vv trace, -vvv 全部 trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// 输出 JSON 格式
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 监听 scrcpy 服务端连接
    Listen(ListenArgs),
    /// 回放录制的带帧头码流文件
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
struct ListenArgs {
    /// 监听地址, 覆盖配置文件
    #[arg(long)]
    addr: Option<String>,

    /// 服务端会建立音频连接
    #[arg(long)]
    audio: bool,

    /// 服务端会建立控制连接
    #[arg(long)]
    control: bool,

    /// 连接建立后请求一次关键帧
    #[arg(long)]
    request_keyframe: bool,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// 录制文件
    input: PathBuf,

    /// 文件开头带有 scrcpy 握手 (设备名, 编码标识, 视频分辨率)
    #[arg(long)]
    handshake: bool,

    /// 无握手时的编码: h264, h265, av1, opus, aac, raw
    #[arg(long, default_value = "h264")]
    codec: String,
}

// ============================================================
// 输出结构体
// ============================================================

/// 完整探测结果
#[derive(Serialize)]
struct ProbeReport {
    meta: MediaMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    video: Option<StreamReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<StreamReport>,
}

/// 单个采集任务的结果
#[derive(Serialize)]
struct StreamReport {
    pipeline: PipelineStats,
    units: UnitSummary,
}

/// 消费端统计
#[derive(Debug, Default, Clone, Copy, Serialize)]
struct UnitSummary {
    total: u64,
    config: u64,
    keyframes: u64,
    bytes: u64,
    last_pts_ms: u64,
}

impl UnitSummary {
    fn record(&mut self, unit: &MediaUnit) {
        self.total += 1;
        self.bytes += unit.size() as u64;
        if unit.is_config {
            self.config += 1;
        } else {
            self.last_pts_ms = u64::try_from(unit.pts.as_millis()).unwrap_or(u64::MAX);
        }
        if unit.is_keyframe {
            self.keyframes += 1;
        }
    }
}

/// 各采集任务对应的消费任务
#[derive(Default)]
struct Consumers {
    video: Option<JoinHandle<UnitSummary>>,
    audio: Option<JoinHandle<UnitSummary>>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging_config = LoggingConfig {
        verbosity: cli.verbose,
        directory: cli.log_dir.clone(),
        file_prefix: "webscreen-probe".into(),
        ..LoggingConfig::default()
    };
    if let Err(e) = logging::init(&logging_config) {
        eprintln!("日志初始化失败: {:#}", e);
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("错误: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => CaptureConfig::from_json_file(path)
            .with_context(|| format!("加载配置失败, path={}", path.display()))?,
        None => CaptureConfig::default(),
    };
    if let Command::Listen(ListenArgs {
        addr: Some(addr), ..
    }) = &cli.command
    {
        config.listen_addr = addr.clone();
    }

    let mut pipeline = CapturePipeline::new(config).context("创建采集管线失败")?;
    let consumers = match &cli.command {
        Command::Listen(args) => listen(&mut pipeline, args).await?,
        Command::Replay(args) => replay(&mut pipeline, args).await?,
    };

    let finished = collect_summaries(consumers);
    tokio::pin!(finished);
    let mut interrupted = false;
    let (video_units, audio_units) = loop {
        tokio::select! {
            summaries = &mut finished => break summaries?,
            result = tokio::signal::ctrl_c(), if !interrupted => {
                if let Err(e) = result {
                    warn!("监听中断信号失败: {}", e);
                }
                info!("收到中断信号, 停止采集");
                pipeline.shutdown();
                interrupted = true;
            }
        }
    };

    let report = ProbeReport {
        meta: pipeline.media_meta(),
        video: pipeline
            .video_stats()
            .zip(video_units)
            .map(|(pipeline, units)| StreamReport { pipeline, units }),
        audio: pipeline
            .audio_stats()
            .zip(audio_units)
            .map(|(pipeline, units)| StreamReport { pipeline, units }),
    };
    let joined = pipeline.join().await;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("序列化探测结果失败")?
        );
    } else {
        print_report(&report);
    }

    joined.context("采集任务异常结束")
}

async fn listen(pipeline: &mut CapturePipeline, args: &ListenArgs) -> Result<Consumers> {
    let addr = pipeline.config().listen_addr.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("监听失败, addr={}", addr))?;
    info!("等待 scrcpy 连接, addr={}", addr);

    let mut consumers = Consumers::default();

    let (conn, peer) = listener.accept().await.context("接受视频连接失败")?;
    info!("视频连接已建立, peer={}", peer);
    let (header, rx) = pipeline
        .attach_stream(conn, true)
        .await
        .context("视频连接握手失败")?;
    info!(
        "视频: {}, 初始分辨率 {:?}",
        header.codec,
        header.size.unwrap_or_default()
    );
    consumers.video = Some(spawn_consumer("视频", rx));

    if args.audio {
        let (conn, peer) = listener.accept().await.context("接受音频连接失败")?;
        info!("音频连接已建立, peer={}", peer);
        let (header, rx) = pipeline
            .attach_stream(conn, false)
            .await
            .context("音频连接握手失败")?;
        info!("音频: {}", header.codec);
        consumers.audio = Some(spawn_consumer("音频", rx));
    }

    if args.control {
        let (conn, peer) = listener.accept().await.context("接受控制连接失败")?;
        info!("控制连接已建立, peer={}", peer);
        pipeline.attach_control(conn).await;
    }

    if args.request_keyframe {
        match pipeline.request_keyframe().await {
            Ok(outcome) => info!("关键帧请求结果: {:?}", outcome),
            Err(e) => warn!("关键帧请求失败: {}", e),
        }
    }

    Ok(consumers)
}

async fn replay(pipeline: &mut CapturePipeline, args: &ReplayArgs) -> Result<Consumers> {
    let file = tokio::fs::File::open(&args.input)
        .await
        .with_context(|| format!("打开录制文件失败, path={}", args.input.display()))?;
    let reader = BufReader::new(file);

    let (codec, rx) = if args.handshake {
        let (header, rx) = pipeline
            .attach_stream(reader, true)
            .await
            .context("读取录制文件握手失败")?;
        (header.codec, rx)
    } else {
        let codec = parse_codec(&args.codec)?;
        (codec, pipeline.start_stream(codec, reader)?)
    };
    info!("回放 {}, 编码 {}", args.input.display(), codec);

    let mut consumers = Consumers::default();
    match codec.media_type() {
        webscreen_core::MediaType::Video => consumers.video = Some(spawn_consumer("视频", rx)),
        webscreen_core::MediaType::Audio => consumers.audio = Some(spawn_consumer("音频", rx)),
    }
    Ok(consumers)
}

/// 解析编码名称, 接受 `name()` 与去掉空格的 fourcc
fn parse_codec(name: &str) -> Result<CodecId> {
    let name = name.to_ascii_lowercase();
    CodecId::ALL
        .into_iter()
        .find(|codec| codec.name() == name || codec.fourcc().trim_ascii_end() == name.as_bytes())
        .ok_or_else(|| anyhow!("未知编码: {}", name))
}

fn spawn_consumer(label: &'static str, mut rx: mpsc::Receiver<MediaUnit>) -> JoinHandle<UnitSummary> {
    tokio::spawn(async move {
        let mut summary = UnitSummary::default();
        while let Some(unit) = rx.recv().await {
            debug!(
                "{}: {} 字节, pts={:?}, 关键帧={}, 配置={}",
                label,
                unit.size(),
                unit.pts,
                unit.is_keyframe,
                unit.is_config
            );
            summary.record(&unit);
        }
        info!("{}输出结束, 共 {} 个单元", label, summary.total);
        summary
    })
}

async fn collect_summaries(
    consumers: Consumers,
) -> Result<(Option<UnitSummary>, Option<UnitSummary>)> {
    let video = match consumers.video {
        Some(handle) => Some(handle.await.context("视频消费任务异常退出")?),
        None => None,
    };
    let audio = match consumers.audio {
        Some(handle) => Some(handle.await.context("音频消费任务异常退出")?),
        None => None,
    };
    Ok((video, audio))
}

fn print_report(report: &ProbeReport) {
    let meta = &report.meta;
    if !meta.device_name.is_empty() {
        println!("设备: {}", meta.device_name);
    }
    if let Some(codec) = meta.video_codec {
        println!("视频: {} {}x{}", codec, meta.width, meta.height);
    }
    if let Some(codec) = meta.audio_codec {
        println!("音频: {}", codec);
    }
    for (label, stream) in [("视频", &report.video), ("音频", &report.audio)] {
        let Some(stream) = stream else {
            continue;
        };
        let stats = &stream.pipeline;
        let units = &stream.units;
        println!(
            "  [{}] 帧 {}, 负载 {} 字节, 单元 {} (配置 {}, 关键帧 {}), 阻塞 {}, 换新 {}, 超大帧 {}, 末帧 {:?}",
            label,
            stats.frames,
            stats.bytes,
            units.total,
            units.config,
            units.keyframes,
            stats.stalls,
            stats.rotations,
            stats.oversized,
            Duration::from_millis(units.last_pts_ms)
        );
    }
}
