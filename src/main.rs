use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use mesoslog::{write_logs, MesosSession, ShutdownManager};
use mesoslog_config::{AppConfig, ConfigValidator, LogFormat};
use mesoslog_domain::{app_name_for_path, LogKind, ResolveOptions};
use mesoslog_errors::MesosLogError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Mesos 任务日志工具
#[derive(Parser, Debug)]
#[command(name = "mesoslog")]
#[command(version = "1.0.0")]
#[command(about = "Mesos 任务沙箱日志定位与实时跟踪工具")]
#[command(long_about = "按应用名或任务ID定位集群中的任务实例，下载或实时跟踪其 stdout/stderr")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Mesos master 地址（覆盖配置）
    #[arg(short, long, global = true)]
    master: Option<String>,

    /// Mesos master 端口（覆盖配置）
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// 日志级别
    #[arg(short, long, global = true, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 列出集群中运行的应用及实例数
    List,
    /// 实时跟踪应用所有运行实例的日志
    Tail {
        /// 应用名或任务ID
        app: String,
        /// 跟踪 stderr 而不是 stdout
        #[arg(long)]
        stderr: bool,
        /// 轮询间隔 (秒)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// 下载应用实例的完整日志
    Logs {
        /// 应用名或任务ID
        app: String,
        /// 下载 stderr 而不是 stdout
        #[arg(long)]
        stderr: bool,
        /// 查询已完成的任务
        #[arg(long)]
        completed: bool,
        /// 只取最近的一个实例
        #[arg(long)]
        latest: bool,
        /// 写入目录，不指定时输出到 stdout
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// 根据任务ID或 Marathon 路径查询应用名
    Name {
        /// 任务ID；以 `/` 开头时按 Marathon 路径转换
        id: String,
        /// 在已完成的任务中查找
        #[arg(long)]
        completed: bool,
    },
}

impl Cli {
    fn log_kind(stderr: bool) -> LogKind {
        if stderr {
            LogKind::Stderr
        } else {
            LogKind::Stdout
        }
    }

    fn load_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::load(self.config.as_deref()).with_context(|| match &self.config {
            Some(path) => format!("加载配置文件失败: {path}"),
            None => "加载配置失败".to_string(),
        })?;

        if let Some(host) = &self.master {
            config.master.host = host.clone();
        }
        if let Some(port) = self.port {
            config.master.port = port;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }

        config.validate().context("命令行参数覆盖后配置校验失败")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    init_logging(
        &config.observability.log_level,
        config.observability.log_format,
    )?;

    if let Err(e) = run(cli.command, config).await {
        error!("执行失败: {e:#}");
        if let Some(message) = user_message(&e) {
            eprintln!("{message}");
        }
        return Err(e);
    }
    Ok(())
}

/// 面向用户的简短提示，只对领域错误生效
fn user_message(err: &anyhow::Error) -> Option<&str> {
    err.downcast_ref::<MesosLogError>()
        .map(MesosLogError::user_message)
}

async fn run(command: Commands, config: AppConfig) -> Result<()> {
    // Marathon 路径转换不需要访问集群
    if let Commands::Name { id, .. } = &command {
        if id.starts_with('/') {
            println!("{}", app_name_for_path(id));
            return Ok(());
        }
    }

    let session = MesosSession::connect(config)
        .await
        .context("连接 Mesos master 失败")?;
    info!("已连接 leading master: {}", session.master_url());

    match command {
        Commands::List => {
            let apps = session.list_application_names()?;
            for (name, count) in apps {
                println!("{name}\t{count}");
            }
        }
        Commands::Tail {
            app,
            stderr,
            interval,
        } => {
            let poll_interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| session.config().tail.poll_interval());
            tail(&session, &app, Cli::log_kind(stderr), poll_interval).await?;
        }
        Commands::Logs {
            app,
            stderr,
            completed,
            latest,
            dir,
        } => {
            let kind = Cli::log_kind(stderr);
            let mut options = if completed {
                ResolveOptions::completed()
            } else {
                ResolveOptions::default()
            };
            if latest {
                options = options.latest();
            }

            let outputs = session.fetch_logs(&app, kind, options).await?;
            match dir {
                Some(dir) => {
                    let paths = write_logs(&outputs, &dir, kind)
                        .await
                        .with_context(|| format!("写入日志目录失败: {}", dir.display()))?;
                    for path in paths {
                        println!("{}", path.display());
                    }
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    for output in &outputs {
                        stdout.write_all(&output.content)?;
                    }
                    stdout.flush()?;
                }
            }
        }
        Commands::Name { id, completed } => {
            println!("{}", session.app_name_for_task_id(&id, completed)?);
        }
    }
    Ok(())
}

/// 输出合并后的日志，直到收到关闭信号或所有实例的跟踪结束
async fn tail(
    session: &MesosSession,
    app: &str,
    kind: LogKind,
    poll_interval: Duration,
) -> Result<()> {
    let mut stream = session.tail_merged(app, kind, poll_interval).await?;

    let shutdown = ShutdownManager::new();
    let listener = shutdown.listen_for_signals();

    loop {
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => {
                info!("收到关闭信号，停止跟踪日志");
                break;
            }
            item = stream.next() => match item {
                Some(Ok(chunk)) => {
                    print!("{chunk}");
                    std::io::stdout().flush()?;
                }
                Some(Err(e)) => warn!("实例日志跟踪终止: {e}"),
                None => {
                    info!("所有实例的日志跟踪均已结束");
                    break;
                }
            },
        }
    }

    stream.stop().await;
    shutdown.shutdown();
    let _ = listener.await;
    Ok(())
}

/// 初始化日志系统，日志写到 stderr，stdout 只输出任务日志
fn init_logging(log_level: &str, log_format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        LogFormat::Json => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        LogFormat::Pretty => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
    }

    Ok(())
}
