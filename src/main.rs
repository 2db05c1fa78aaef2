use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use solana_sdk::pubkey::Pubkey;
use solana_system_interface::instruction as system_instruction;
use tracing::{error, info};

use tx_lander::config::{LanderConfig, load_config};
use tx_lander::monitoring::{self, metrics};
use tx_lander::rpc::{BlockhashOracle, SolanaRpc};
use tx_lander::{CommitmentTarget, ErrorClassifier, InstructionSet, TransactionEngine};

const CONFIG_TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/lander.toml.example"));

#[derive(Parser, Debug)]
#[command(name = "tx-lander", version, about = "Solana 交易构建、广播与确认")]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 lander.toml 或 config/lander.toml）"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 查询最新 blockhash 快照
    Blockhash,
    /// 发送一笔 SOL 转账并等待确认
    Transfer(TransferCmd),
    /// 写出配置模版
    Init(InitCmd),
}

#[derive(Args, Debug)]
struct TransferCmd {
    #[arg(long, help = "收款地址")]
    to: String,
    #[arg(long, help = "转账数量（lamports）")]
    lamports: u64,
    #[arg(long, value_enum, help = "等待的确认级别（默认取配置 target）")]
    target: Option<TargetArg>,
    #[arg(long, help = "只模拟，不发送")]
    simulate: bool,
}

#[derive(Args, Debug)]
struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    force: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TargetArg {
    Processed,
    Confirmed,
    Finalized,
}

impl From<TargetArg> for CommitmentTarget {
    fn from(value: TargetArg) -> Self {
        match value {
            TargetArg::Processed => CommitmentTarget::ProcessedOrBetter,
            TargetArg::Confirmed => CommitmentTarget::Confirmed,
            TargetArg::Finalized => CommitmentTarget::Finalized,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Init(args) = &cli.command {
        return init_config(args);
    }

    let config = load_config(cli.config.clone())?;
    monitoring::init_tracing(&config.logging)?;
    metrics::init_from_config(&config.prometheus)?;

    match cli.command {
        Command::Blockhash => print_blockhash(&config).await,
        Command::Transfer(args) => transfer(&config, args).await,
        Command::Init(_) => Ok(()),
    }
}

async fn print_blockhash(config: &LanderConfig) -> Result<()> {
    let commitment = config.commitment.commitment_config();
    let rpc = SolanaRpc::from_url(&config.rpc_url, commitment);
    let snapshot = BlockhashOracle::new(Arc::new(rpc), commitment)
        .fetch_snapshot()
        .await?;
    println!("blockhash:               {}", snapshot.blockhash);
    println!("last_valid_block_height: {}", snapshot.last_valid_block_height);
    println!("context_slot:            {}", snapshot.context_slot);
    Ok(())
}

async fn transfer(config: &LanderConfig, args: TransferCmd) -> Result<()> {
    let recipient =
        Pubkey::from_str(args.to.trim()).map_err(|err| anyhow!("收款地址非法 {}: {err}", args.to))?;
    let engine = TransactionEngine::from_config(config, ErrorClassifier::new()).await?;
    let set = InstructionSet::new(vec![system_instruction::transfer(
        &engine.payer(),
        &recipient,
        args.lamports,
    )]);

    if args.simulate {
        let report = engine.simulate(&set, &[recipient]).await?;
        info!(
            target: "lander::cli",
            units = ?report.units_consumed,
            err = ?report.err,
            "simulation finished"
        );
        for line in &report.logs {
            println!("{line}");
        }
        if let Some(err) = engine.classifier().classify_simulation(&report) {
            return Err(err.into());
        }
        return Ok(());
    }

    let target = args
        .target
        .map(CommitmentTarget::from)
        .unwrap_or_else(|| engine.default_target());
    match engine.submit(&set, target).await {
        Ok(outcome) => {
            println!(
                "{} {} (slot {}, sends {}, lander {})",
                outcome.signature,
                outcome.status.as_str(),
                outcome.slot,
                outcome.sends,
                outcome.lander
            );
            Ok(())
        }
        Err(err) => {
            error!(
                target: "lander::cli",
                kind = err.kind(),
                description = %err.description(),
                "transfer failed"
            );
            Err(err.into())
        }
    }
}

fn init_config(args: &InitCmd) -> Result<()> {
    let output_dir = match &args.output {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    fs::create_dir_all(&output_dir)?;

    let target_path = output_dir.join("lander.toml");
    if target_path.exists() && !args.force {
        println!(
            "跳过 {}（文件已存在，如需覆盖请加 --force）",
            target_path.display()
        );
        return Ok(());
    }
    fs::write(&target_path, CONFIG_TEMPLATE)?;
    println!("已写入 {}", target_path.display());
    Ok(())
}
