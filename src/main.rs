//! Scout 命令行入口
//!
//! 初始化日志、加载配置、装配 Agent，对一个问题运行 ReAct / CodeAct 循环并打印答案。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use scout::config::load_config;
use scout::{create_agent, Dialect, ReactEvent};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "scout", version, about = "Answer a question with a bounded reasoning-action loop")]
struct Cli {
    /// 配置文件（叠加在 config/default.toml 之上）
    #[arg(short, long, env = "SCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// 推理风格：react（Thought/Action/Action Input）或 codeact（Thought/Code）
    #[arg(long, value_enum)]
    style: Option<Dialect>,

    /// 最大迭代次数
    #[arg(long)]
    max_iterations: Option<usize>,

    /// 附加上下文
    #[arg(long, default_value = "")]
    context: String,

    /// 打印每一步的过程事件
    #[arg(short, long)]
    verbose: bool,

    question: String,
}

fn print_event(ev: &ReactEvent) {
    match ev {
        ReactEvent::Iteration {
            iteration,
            max_iterations,
        } => eprintln!("\n── iteration {iteration}/{max_iterations} ──"),
        ReactEvent::Thought { text } => eprintln!("Thought: {text}"),
        ReactEvent::ToolCall { tool, input } => eprintln!("Action: {tool}\nAction Input: {input}"),
        ReactEvent::Observation { preview, .. } => eprintln!("Observation: {preview}"),
        ReactEvent::Stalled { iteration } => eprintln!("(no action at iteration {iteration})"),
        ReactEvent::Synthesis { entries } => {
            eprintln!("(synthesizing an answer from {entries} tool results)")
        }
        ReactEvent::TokenUsage { total_tokens, .. } if *total_tokens > 0 => {
            eprintln!("(tokens used: {total_tokens})")
        }
        ReactEvent::Error { text } => eprintln!("error: {text}"),
        _ => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(style) = cli.style {
        cfg.agent.style = style;
    }
    if let Some(n) = cli.max_iterations {
        cfg.agent.max_iterations = n;
    }

    let mut agent = create_agent(&cfg).context("Failed to create agent")?;

    let printer = if cli.verbose {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        agent = agent.with_event_tx(tx);
        Some(tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                print_event(&ev);
            }
        }))
    } else {
        None
    };

    let answer = agent.run(&cli.question, &cli.context).await;
    // 释放 agent 以关闭事件通道，等待打印任务收尾
    drop(agent);
    if let Some(handle) = printer {
        handle.await.context("Event printer failed")?;
    }

    println!("{answer}");
    Ok(())
}
