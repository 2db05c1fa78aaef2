use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use super::InstructionSet;
use super::compiler::{CompileError, compile};

/// 按顺序把多个指令集贪心合并成尽量少的交易。
///
/// `reserved` 是提交时还会追加的指令（compute budget、tip），计入尺寸但不出现在输出里。
/// 每个输出集合加上 `reserved` 都能在协议上限内编译；单个指令集本身就超限时返回
/// [`CompileError::TooLarge`]。
pub fn pack_instruction_sets(
    payer: &Pubkey,
    sets: &[InstructionSet],
    lookup_tables: &[AddressLookupTableAccount],
    reserved: &[Instruction],
) -> Result<Vec<InstructionSet>, CompileError> {
    let fits = |set: &InstructionSet| {
        let mut instructions = reserved.to_vec();
        instructions.extend_from_slice(set.instructions());
        compile(payer, &instructions, Hash::default(), lookup_tables).map(|_| ())
    };
    let mut packed: Vec<InstructionSet> = Vec::new();
    let mut current: Option<InstructionSet> = None;

    for set in sets.iter().filter(|set| !set.is_empty()) {
        fits(set)?;

        current = match current.take() {
            None => Some(set.clone()),
            Some(acc) => {
                let candidate = acc.merged(set);
                match fits(&candidate) {
                    Ok(_) => Some(candidate),
                    Err(err) if err.is_too_large() => {
                        packed.push(acc);
                        Some(set.clone())
                    }
                    Err(err) => return Err(err),
                }
            }
        };
    }
    if let Some(last) = current {
        packed.push(last);
    }

    debug!(
        target: "tx::packer",
        input = sets.len(),
        output = packed.len(),
        "packed instruction sets"
    );
    Ok(packed)
}
