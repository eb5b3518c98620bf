/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/
use std::collections::{HashMap, HashSet};

use crate::ir::instruction::Instruction;
use crate::ir::operand::{Operand, Register, ALLOCATABLE_REGISTERS};

/// The first and last instruction index (within one function's instruction
/// list) at which a named temporary is referenced. Used to drive the
/// greedy linear-scan pass below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveInterval {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

fn collect_live_intervals(instructions: &[Instruction]) -> Vec<LiveInterval> {
    let mut bounds: HashMap<String, (usize, usize)> = HashMap::new();
    for (idx, instr) in instructions.iter().enumerate() {
        for operand in instr.operands() {
            if let Operand::Identifier(name) = operand {
                bounds
                    .entry(name.clone())
                    .and_modify(|(_, end)| *end = idx)
                    .or_insert((idx, idx));
            }
        }
    }
    let mut intervals: Vec<LiveInterval> = bounds
        .into_iter()
        .map(|(name, (start, end))| LiveInterval { name, start, end })
        .collect();
    intervals.sort_by_key(|i| i.start);
    intervals
}

/// LLVM-style greedy linear-scan register allocation over a fixed
/// 15-register pool. Live intervals that start after an already-active
/// interval's end free that interval's register; an interval that starts
/// while every register is in use is marked [`Register::Spilled`] rather
/// than materialized to a stack slot (spilling to memory is out of scope).
pub fn allocate(instructions: &[Instruction]) -> HashMap<String, Register> {
    let intervals = collect_live_intervals(instructions);
    let mut assignment: HashMap<String, Register> = HashMap::new();
    let mut active: Vec<LiveInterval> = Vec::new();
    let mut free: Vec<Register> = ALLOCATABLE_REGISTERS.iter().rev().copied().collect();
    let mut in_use: HashSet<Register> = HashSet::new();

    for interval in intervals {
        let mut freed_any = false;
        active.retain(|a| {
            if a.end <= interval.start {
                if let Some(reg) = assignment.get(&a.name) {
                    in_use.remove(reg);
                    free.push(*reg);
                    freed_any = true;
                }
                false
            } else {
                true
            }
        });
        // Keep `free` sorted so the lowest-index register is always last
        // (and so `Vec::pop` returns it next) — step 3b wants "the first
        // free register, lowest index", not whichever one most recently
        // became free.
        if freed_any {
            free.sort_by_key(|r| std::cmp::Reverse(r.matrix_index()));
        }

        match free.pop() {
            Some(reg) => {
                assignment.insert(interval.name.clone(), reg);
                in_use.insert(reg);
                active.push(interval);
            }
            None => {
                assignment.insert(interval.name.clone(), Register::Spilled);
            }
        }
    }

    assignment
}

/// Rewrites every `Operand::Identifier` in `instructions` to the
/// `Operand::Register` it was assigned (or `Register::Spilled`), in place.
/// Operands that are already registers, literals, or labels are untouched.
pub fn rewrite_operands(instructions: &mut [Instruction], assignment: &HashMap<String, Register>) {
    for instr in instructions {
        for operand in instr.operands_mut() {
            if let Operand::Identifier(name) = operand {
                if let Some(reg) = assignment.get(name) {
                    *operand = Operand::Register(*reg);
                }
            }
        }
    }
}

/// Runs allocation and rewrites a function's instruction list in place.
/// Returns the number of temporaries that spilled (had no free register).
pub fn allocate_function(instructions: &mut Vec<Instruction>) -> usize {
    let assignment = allocate(instructions);
    let spilled = assignment.values().filter(|r| **r == Register::Spilled).count();
    rewrite_operands(instructions, &assignment);
    spilled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instruction::Operation;

    fn ident(name: &str) -> Operand {
        Operand::Identifier(name.to_string())
    }

    #[test]
    fn assigns_distinct_registers_to_non_overlapping_reuse() {
        let instrs = vec![
            Instruction::with_args(Operation::Mov, ident("a"), Operand::IntLiteral(1)),
            Instruction::with_args(Operation::Mov, ident("b"), ident("a")),
        ];
        let assignment = allocate(&instrs);
        assert!(assignment.contains_key("a"));
        assert!(assignment.contains_key("b"));
    }

    #[test]
    fn spills_when_more_live_intervals_than_registers() {
        let mut instrs = Vec::new();
        // 16 temporaries defined up front, one more than the 15-register pool.
        for i in 0..16 {
            instrs.push(Instruction::with_args(
                Operation::Mov,
                ident(&format!("t{i}")),
                Operand::IntLiteral(i as i64),
            ));
        }
        // A trailing touch of each one, in definition order, stretches every
        // interval's end past every other temporary's start: all 16 are
        // simultaneously live at the end of this block.
        for i in 0..16 {
            instrs.push(Instruction::with_target(Operation::Inc, ident(&format!("t{i}"))));
        }
        let assignment = allocate(&instrs);
        let spilled = assignment.values().filter(|r| **r == Register::Spilled).count();
        assert_eq!(spilled, 1);
    }

    #[test]
    fn rewrite_operands_replaces_identifiers_with_assigned_registers() {
        let mut instrs = vec![Instruction::with_args(Operation::Mov, ident("a"), Operand::IntLiteral(1))];
        let mut assignment = HashMap::new();
        assignment.insert("a".to_string(), Register::Rax);
        rewrite_operands(&mut instrs, &assignment);
        assert_eq!(instrs[0].target, Some(Operand::Register(Register::Rax)));
    }

    #[test]
    fn frees_several_intervals_at_once_prefers_lowest_index_register() {
        let instrs = vec![
            Instruction::with_args(Operation::Mov, ident("a"), Operand::IntLiteral(1)), // a: 0..3, rax
            Instruction::with_args(Operation::Mov, ident("b"), Operand::IntLiteral(2)), // b: 1..1, rcx
            Instruction::with_args(Operation::Mov, ident("c"), Operand::IntLiteral(3)), // c: 2..4, rdx
            Instruction::with_target(Operation::Inc, ident("a")),
            Instruction::with_target(Operation::Inc, ident("c")),
            Instruction::with_args(Operation::Mov, ident("d"), Operand::IntLiteral(4)), // d: 5..5
        ];
        let assignment = allocate(&instrs);
        // a, b, and c all expire before d's interval starts and are freed in
        // the same pass; d must get the lowest-index register among them
        // (rax), not whichever happened to be freed last (rdx).
        assert_eq!(assignment.get("d"), Some(&Register::Rax));
    }

    #[test]
    fn frees_register_after_interval_ends_for_reuse() {
        let instrs = vec![
            Instruction::with_args(Operation::Mov, ident("a"), Operand::IntLiteral(1)),
            Instruction::with_target(Operation::Inc, ident("a")),
            Instruction::with_args(Operation::Mov, ident("b"), Operand::IntLiteral(2)),
        ];
        let assignment = allocate(&instrs);
        // 'a's interval ends at index 1, 'b' starts at index 2: they may
        // validly reuse the same register, which this asserts is possible
        // without the allocator running out of registers.
        assert_eq!(assignment.len(), 2);
    }
}
