//! QueryBee 命令行入口
//!
//! 初始化日志、加载配置、构建 SQL Agent 并加载 schema，然后逐行读取 stdin：
//! 普通输入走 process_query，结果以 JSON 打印到 stdout；以 `:` 开头的是元命令。

use std::path::PathBuf;

use anyhow::Context;
use querybee::config::{load_config, AppConfig};
use querybee::core::AgentBuilder;
use querybee::observability;
use querybee::SqlAgent;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands: :tables  :schema <t1,t2>  :capabilities  :memory  :clear  :quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    if cfg.database.db_type.is_some() {
        match cfg.database.redacted_connection_string() {
            Ok(url) => tracing::info!("Data source: {}", url),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    let builder = AgentBuilder::new(cfg);
    let schema = builder.load_schema().unwrap_or_else(|e| {
        tracing::warn!("{}; continuing without schema", e);
        Default::default()
    });
    let agent = builder.build_sql_agent();

    let report = agent.initialize_with_schema(schema).await;
    if let Some(e) = &report.error {
        tracing::warn!("{}", e);
    }
    tracing::info!(
        app = builder.config().app.name.as_deref().unwrap_or("querybee"),
        restored = report.restored,
        "Ready"
    );

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix(':') {
            if !run_command(&agent, command).await? {
                break;
            }
            continue;
        }
        let outcome = agent.process_query(line).await;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    Ok(())
}

/// 执行元命令；返回 false 表示退出
async fn run_command(agent: &SqlAgent, command: &str) -> anyhow::Result<bool> {
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map(|(n, a)| (n, a.trim()))
        .unwrap_or((command, ""));
    match name {
        "quit" | "q" => return Ok(false),
        "tables" => {
            let schema = agent.schema().await;
            if schema.is_empty() {
                println!("Database not connected");
            } else {
                println!("{}", schema.table_names().join(", "));
            }
        }
        "schema" => println!("{}", agent.schema().await.describe(arg)),
        "capabilities" => {
            println!("{}", serde_json::to_string_pretty(agent.capabilities())?)
        }
        "memory" => {
            let episodes = agent.memory_snapshot().await;
            println!("{}", serde_json::to_string_pretty(&episodes)?);
        }
        "clear" => match agent.clear_memory().await {
            Ok(()) => println!("Memory cleared"),
            Err(e) => println!("Failed to clear memory: {}", e),
        },
        _ => println!("{}", HELP),
    }
    Ok(true)
}
