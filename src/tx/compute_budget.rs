use std::mem;

use once_cell::sync::Lazy;
use smallvec::SmallVec;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

pub const COMPUTE_BUDGET_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("ComputeBudget111111111111111111111111111111");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BudgetKey {
    unit_limit: u32,
    unit_price: u64,
}

static CACHE: Lazy<dashmap::DashMap<BudgetKey, SmallVec<[Instruction; 2]>>> =
    Lazy::new(dashmap::DashMap::new);

pub fn compute_unit_limit_instruction(limit: u32) -> Instruction {
    let mut data = Vec::with_capacity(1 + mem::size_of::<u32>());
    data.push(2);
    data.extend_from_slice(&limit.to_le_bytes());
    Instruction {
        program_id: COMPUTE_BUDGET_PROGRAM_ID,
        accounts: Vec::new(),
        data,
    }
}

pub fn compute_unit_price_instruction(price_micro_lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(1 + mem::size_of::<u64>());
    data.push(3);
    data.extend_from_slice(&price_micro_lamports.to_le_bytes());
    Instruction {
        program_id: COMPUTE_BUDGET_PROGRAM_ID,
        accounts: Vec::new(),
        data,
    }
}

/// 生成 compute budget 前缀指令（limit 在前，price 在后），零值项省略。
pub fn compute_budget_sequence(unit_limit: u32, unit_price: u64) -> SmallVec<[Instruction; 2]> {
    let key = BudgetKey {
        unit_limit,
        unit_price,
    };
    if let Some(cached) = CACHE.get(&key) {
        return cached.clone();
    }

    let mut seq = SmallVec::<[Instruction; 2]>::new();
    if unit_limit > 0 {
        seq.push(compute_unit_limit_instruction(unit_limit));
    }
    if unit_price > 0 {
        seq.push(compute_unit_price_instruction(unit_price));
    }

    CACHE.insert(key, seq.clone());
    seq
}

pub fn is_compute_budget(ix: &Instruction) -> bool {
    ix.program_id == COMPUTE_BUDGET_PROGRAM_ID
}

/// 在指令前插入 compute budget 前缀；调用方已自带 compute budget 指令时原样返回。
pub fn with_compute_budget(
    instructions: &[Instruction],
    unit_limit: u32,
    unit_price: u64,
) -> Vec<Instruction> {
    if instructions.iter().any(is_compute_budget) {
        return instructions.to_vec();
    }
    let prefix = compute_budget_sequence(unit_limit, unit_price);
    let mut out = Vec::with_capacity(prefix.len() + instructions.len());
    out.extend(prefix);
    out.extend_from_slice(instructions);
    out
}
