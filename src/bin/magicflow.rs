use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use magicflow::logging::LoggingConfig;
use magicflow::{
    load_flow_from_path, EngineConfig, ExecutionData, ExecutionType, Flow, FlowExecutor,
    FlowRegistry, InMemoryGroupService, NodeRunnerFactory, Operator, RunnerServices, TriggerData,
    TriggerType,
};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "magicflow", version, about = "MagicFlow CLI", author)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 加载并校验流程文件
    Validate { file: PathBuf },
    /// 使用内置节点执行流程，输出每个节点的执行结果
    Run {
        file: PathBuf,
        /// 开始节点收到的参数（JSON）
        #[arg(long)]
        input: Option<String>,
        #[arg(long)]
        message: Option<String>,
        #[arg(long, default_value = "cli")]
        operator: String,
        /// 可被子流程节点调用的流程文件，可重复
        #[arg(long = "sub-flow")]
        sub_flows: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    LoggingConfig::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Validate { file } => handle_validate(file)?,
        Command::Run {
            file,
            input,
            message,
            operator,
            sub_flows,
        } => handle_run(file, input, message, operator, sub_flows).await?,
    }
    Ok(())
}

fn handle_validate(file: PathBuf) -> anyhow::Result<()> {
    let flow = load_flow_from_path(&file)?;
    println!(
        "Flow `{}` is valid: {} nodes ({} top level)",
        flow.code,
        flow.nodes.len(),
        flow.nodes.iter().filter(|node| node.is_top_level()).count()
    );
    Ok(())
}

async fn handle_run(
    file: PathBuf,
    input: Option<String>,
    message: Option<String>,
    operator: String,
    sub_flows: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let flow = load_flow_from_path(&file)?;
    let params: Value = match input {
        Some(raw) => serde_json::from_str(&raw)?,
        None => json!({}),
    };

    let mut registry = FlowRegistry::new();
    for path in &sub_flows {
        registry.register(load_flow_from_path(path)?);
    }
    let services = RunnerServices::new(Arc::new(InMemoryGroupService::new()), Arc::new(registry));
    let factory = Arc::new(NodeRunnerFactory::with_builtin_runners(services));

    let mut data = ExecutionData::new(
        TriggerType::ParamCall,
        TriggerData {
            message,
            params,
            ..TriggerData::default()
        },
        Operator::new(operator, ""),
    )
    .with_execution_type(ExecutionType::Api);

    let mut executor = FlowExecutor::new(flow, factory).with_config(EngineConfig::from_env());
    let report = executor.execute(&mut data, TriggerType::ParamCall).await?;

    let output = json!({
        "execution_id": data.execution_id(),
        "report": report,
        "nodes": debug_results(executor.flow()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn debug_results(flow: &Flow) -> Value {
    flow.nodes
        .iter()
        .filter_map(|node| {
            node.debug_result()
                .map(|result| (node.node_id.clone(), json!(result)))
        })
        .collect::<serde_json::Map<_, _>>()
        .into()
}
