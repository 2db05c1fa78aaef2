use std::collections::HashMap;
use std::str::FromStr;

use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::lander::LanderError;
use crate::rpc::{PreflightFailure, RpcFailure, SimulationReport};
use crate::tx::{BuildError, SignError};

use super::error::SubmitError;

const GENERIC_SIMULATION_FAILURE: &str = "Transaction simulation failed";
const CUSTOM_ERROR_MARKER: &str = "custom program error: ";
const ANCHOR_CODE_MARKER: &str = "Error Code: ";
const ANCHOR_MESSAGE_MARKER: &str = "Error Message: ";
const LOG_ERROR_PREFIX: &str = "Program log: Error: ";

/// 把 RPC / 模拟 / 落地失败翻译成 [`SubmitError`]。原始日志文本只在这里被解释。
#[derive(Clone, Debug, Default)]
pub struct ErrorClassifier {
    program_errors: HashMap<(Pubkey, u32), String>,
    codes: HashMap<u32, String>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记某个程序的自定义错误码。
    pub fn with_program_error(
        mut self,
        program: Pubkey,
        code: u32,
        description: impl Into<String>,
    ) -> Self {
        self.program_errors.insert((program, code), description.into());
        self
    }

    /// 登记与程序无关的错误码，作为程序级登记的回退。
    pub fn with_error(mut self, code: u32, description: impl Into<String>) -> Self {
        self.codes.insert(code, description.into());
        self
    }

    fn lookup(&self, program: Option<&Pubkey>, code: u32) -> Option<&str> {
        program
            .and_then(|program| self.program_errors.get(&(*program, code)))
            .or_else(|| self.codes.get(&code))
            .map(String::as_str)
    }

    /// 从程序日志中提取可识别的错误描述，按 Anchor 日志、自定义错误码、
    /// `Error:` 日志、程序失败行的顺序匹配。
    pub fn describe_logs(&self, logs: &[String]) -> Option<String> {
        if let Some(description) = logs.iter().find_map(|line| anchor_description(line)) {
            return Some(description);
        }

        if let Some(description) = logs
            .iter()
            .find_map(|line| self.custom_error_description(line))
        {
            return Some(description);
        }

        if let Some(description) = logs.iter().find_map(|line| {
            line.strip_prefix(LOG_ERROR_PREFIX)
                .map(|rest| rest.trim().to_string())
                .filter(|rest| !rest.is_empty())
        }) {
            return Some(description);
        }

        logs.iter().find_map(|line| {
            let (program, reason) = failed_program_line(line)?;
            Some(format!("{reason} (program {program})"))
        })
    }

    /// 解析 `{"InstructionError":[i,{"Custom":n}]}` 形式的执行错误。
    pub fn describe_error(&self, err: &str) -> Option<String> {
        let value: Value = serde_json::from_str(err).ok()?;
        let instruction = value.get("InstructionError")?.as_array()?;
        let index = instruction.first()?.as_u64()?;
        let detail = instruction.get(1)?;
        match detail.get("Custom").and_then(Value::as_u64) {
            Some(code) => {
                let code = u32::try_from(code).ok()?;
                Some(
                    self.lookup(None, code)
                        .map(str::to_string)
                        .unwrap_or_else(|| {
                            format!("custom program error 0x{code:x} ({code}) at instruction {index}")
                        }),
                )
            }
            None => Some(format!("instruction {index} failed: {detail}")),
        }
    }

    fn describe(&self, logs: &[String], err: Option<&str>) -> Option<String> {
        self.describe_logs(logs)
            .or_else(|| err.and_then(|err| self.describe_error(err)))
    }

    fn custom_error_description(&self, line: &str) -> Option<String> {
        let start = line.find(CUSTOM_ERROR_MARKER)? + CUSTOM_ERROR_MARKER.len();
        let raw = line[start..].split_whitespace().next()?;
        let code = parse_code(raw)?;
        let program = failed_program_line(line).map(|(program, _)| program);
        let program_key = program.and_then(|program| Pubkey::from_str(program).ok());

        Some(match self.lookup(program_key.as_ref(), code) {
            Some(known) => known.to_string(),
            None => match program {
                Some(program) => {
                    format!("custom program error 0x{code:x} ({code}) in program {program}")
                }
                None => format!("custom program error 0x{code:x} ({code})"),
            },
        })
    }

    fn simulation_error(&self, err: Option<String>, logs: Vec<String>) -> SubmitError {
        let description = match self.describe(&logs, err.as_deref()) {
            Some(description) => description,
            None => match err.as_deref() {
                Some(err) => format!("{GENERIC_SIMULATION_FAILURE}: {err}"),
                None => GENERIC_SIMULATION_FAILURE.to_string(),
            },
        };
        debug!(
            target: "engine::classifier",
            description = %description,
            logs = logs.len(),
            "simulation failure classified"
        );
        SubmitError::Simulation {
            description,
            err,
            logs,
        }
    }

    /// 只读查询（blockhash、区块高度、模拟、查找表）的任何 RPC 失败都是网络错误。
    pub fn classify_query(&self, failure: &RpcFailure) -> SubmitError {
        SubmitError::Network(failure.clone())
    }

    /// 发送交易的失败：带预检数据的拒绝是模拟失败，其余拒绝无法归类。
    pub fn classify(&self, failure: &RpcFailure) -> SubmitError {
        match failure {
            RpcFailure::Transport(_) | RpcFailure::Malformed(_) => {
                SubmitError::Network(failure.clone())
            }
            RpcFailure::Rejected {
                preflight: Some(PreflightFailure { err, logs, .. }),
                ..
            } => self.simulation_error(err.clone(), logs.clone()),
            RpcFailure::Rejected { message, .. } => SubmitError::Fallthrough(message.clone()),
        }
    }

    /// 模拟成功时返回 `None`。
    pub fn classify_simulation(&self, report: &SimulationReport) -> Option<SubmitError> {
        if report.is_success() {
            return None;
        }
        Some(self.simulation_error(report.err.clone(), report.logs.clone()))
    }

    pub fn classify_sign(&self, err: SignError) -> SubmitError {
        match err {
            SignError::Wallet(reason) => SubmitError::Fallthrough(format!("钱包签名失败: {reason}")),
            other => SubmitError::TransactionBuilding(BuildError::Sign(other)),
        }
    }

    /// 查找表加载只会因 RPC 失败而报错（损坏的表已被跳过）。
    pub fn classify_lookup_tables(&self, err: &anyhow::Error) -> SubmitError {
        match err.downcast_ref::<RpcFailure>() {
            Some(failure) => self.classify_query(failure),
            None => SubmitError::Network(RpcFailure::transport(format!("{err:#}"))),
        }
    }

    pub fn classify_lander(&self, err: LanderError) -> SubmitError {
        match err {
            LanderError::Rpc(failure) => self.classify(&failure),
            LanderError::Unavailable(failure) => self.classify_query(&failure),
            LanderError::Network(err) => SubmitError::Network(RpcFailure::transport(err)),
            LanderError::Serde(err) => SubmitError::Network(RpcFailure::malformed(err)),
            LanderError::Encode(err) => SubmitError::TransactionBuilding(BuildError::Compile(err)),
            LanderError::Expired {
                signature,
                last_valid_block_height,
                observed_height,
            } => SubmitError::Timeout {
                signature,
                last_valid_block_height,
                observed_height,
            },
            LanderError::NotConfirmed {
                signature,
                bundle_id,
            } => SubmitError::NotConfirmed {
                signature,
                bundle_id,
            },
            LanderError::Reverted { signature, err } => SubmitError::Reverted {
                signature,
                description: self
                    .describe_error(&err)
                    .unwrap_or_else(|| format!("transaction failed: {err}")),
            },
            LanderError::PrecheckFailed(report) => {
                let report = *report;
                self.simulation_error(report.err, report.logs)
            }
            LanderError::Fatal(reason) => SubmitError::Fallthrough(reason),
        }
    }
}

fn anchor_description(line: &str) -> Option<String> {
    let message_start = line.find(ANCHOR_MESSAGE_MARKER)? + ANCHOR_MESSAGE_MARKER.len();
    let message = line[message_start..].trim();
    if message.is_empty() {
        return None;
    }
    let code = line.find(ANCHOR_CODE_MARKER).and_then(|start| {
        line[start + ANCHOR_CODE_MARKER.len()..]
            .split(['.', ' '])
            .next()
            .filter(|code| !code.is_empty())
    });
    Some(match code {
        Some(code) => format!("{code}: {message}"),
        None => message.to_string(),
    })
}

/// 解析 `Program <id> failed: <reason>`。
fn failed_program_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("Program ")?;
    let (program, reason) = rest.split_once(" failed: ")?;
    if program.contains(' ') {
        return None;
    }
    Some((program, reason.trim()))
}

fn parse_code(raw: &str) -> Option<u32> {
    match raw.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}
