use anyhow::Context;
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

use taskloom_core::domain::{ParamConfig, ParamType, TaskInput, TaskOutput};
use taskloom_core::{
    EngineBuilder, EngineConfig, TaskError, TaskHandlerDescriptor, TaskMonitor, TaskSetup,
};

const CONFIG_ENV: &str = "TASKLOOM_CONFIG";

/// hello-task: 挨拶を返すだけの unit
fn hello(monitor: &TaskMonitor, input: &TaskInput) -> Result<TaskOutput, TaskError> {
    let name: String = input.get_or_default("name")?;
    let name = if name.is_empty() { "taskloom".to_string() } else { name };
    monitor.add_message(format!("greeting {name}"));
    TaskOutput::new().with_result("message", format!("Hello, {name}!"))
}

/// wordcount-task: taskable method の例（minLength 省略時は 1）
fn count_words(monitor: &TaskMonitor, text: String, min_length: Option<usize>) -> Result<usize, TaskError> {
    let min_length = min_length.unwrap_or(1);
    let count = text
        .split_whitespace()
        .filter(|word| word.chars().count() >= min_length)
        .count();
    monitor.add_message(format!("{count} word(s) of at least {min_length} char(s)"));
    Ok(count)
}

fn default_setup() -> TaskSetup {
    TaskSetup::new_builder()
        .add_task("hello-task")
        .set_param("name", "taskloom")
        .add_task("wordcount-task")
        .set_param("text", "weave the task loom one thread at a time")
        .set_param("minLength", 4)
        .log_messages()
        .build()
}

fn load_setup(path: Option<String>) -> anyhow::Result<TaskSetup> {
    let Some(path) = path else {
        return Ok(default_setup());
    };
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading setup {path}"))?;
    serde_json::from_str(&json).with_context(|| format!("parsing setup {path}"))
}

fn load_config() -> anyhow::Result<EngineConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => Ok(EngineConfig::load(&path)?),
        Err(_) => Ok(EngineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // (A) 設定と TaskSetup を読み込む
    let config = load_config()?;
    let setup = load_setup(std::env::args().nth(1))?;

    // (B) エンジンを組み立てる（現在の runtime を借りる）
    let engine = EngineBuilder::new()
        .config(config)
        .runtime_handle(Handle::current())
        .register(
            TaskHandlerDescriptor::unit("hello-task", hello)
                .with_description("Hello Task")
                .with_param(ParamConfig::new("name", ParamType::String)),
        )?
        .adapt_method(
            "demo-component",
            count_words,
            "wordcount-task",
            vec![
                ParamConfig::new("text", ParamType::String),
                ParamConfig::new("minLength", ParamType::Integer).with_description("Minimum Length"),
            ],
            false,
        )?
        .expect_tasks(&["hello-task", "wordcount-task"])
        .build()?;

    // (C) 起動
    let monitor = engine.launch_task(&setup)?;
    tracing::info!(monitor = %monitor.id(), "launched");

    // (D) 完了を待つ（await_done はブロッキングなので blocking pool で）
    let waiter = monitor.clone();
    tokio::task::spawn_blocking(move || waiter.await_done(None)).await?;

    // (E) 結果を出力
    println!("{}", serde_json::to_string_pretty(&monitor.snapshot())?);
    if monitor.has_errors() {
        anyhow::bail!("{} task(s) faulted", monitor.errors().len());
    }

    Ok(())
}
