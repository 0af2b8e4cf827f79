//! The instruction set of the intermediate byte code.

use smallvec::SmallVec;
use std::fmt;

use crate::ir::register::RegisterId;
use crate::ir::value::{RbcConstant, RbcValue};
use crate::ir::variable::VariableId;

/// Instruction opcodes.
///
/// The backend warns and skips on anything it does not model, so this enum
/// deliberately stays flat rather than encoding parameter shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Materialize a variable, optionally with an initial value.
    Create,
    Call,
    /// Store a value into a register or an existing variable.
    Save,
    /// Apply an arithmetic operator to a register in place.
    Math,
    Del,
    Eq,
    Neq,
    Gt,
    Lt,
    If,
    /// Inverted `If` (execute when the condition fails).
    Nif,
    EndIf,
    Else,
    Elif,
    /// Inverted `Elif`.
    Nelif,
    Ret,
    /// Copy the return slots into a variable.
    SaveRet,
    /// Stage one call argument.
    Push,
    /// Tear down one staged argument after the call.
    Pop,
    /// Enter a plain scope block.
    Inc,
    /// Leave a plain scope block.
    Dec,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::Create => "CREATE",
            Opcode::Call => "CALL",
            Opcode::Save => "SAVE",
            Opcode::Math => "MATH",
            Opcode::Del => "DEL",
            Opcode::Eq => "EQ",
            Opcode::Neq => "NEQ",
            Opcode::Gt => "GT",
            Opcode::Lt => "LT",
            Opcode::If => "IF",
            Opcode::Nif => "NIF",
            Opcode::EndIf => "ENDIF",
            Opcode::Else => "ELSE",
            Opcode::Elif => "ELIF",
            Opcode::Nelif => "NELIF",
            Opcode::Ret => "RET",
            Opcode::SaveRet => "SAVERET",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Inc => "INC",
            Opcode::Dec => "DEC",
        };
        f.write_str(name)
    }
}

/// Arithmetic operators carried by `Math` instructions, encoded as an int
/// constant in the third parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Xor,
    Pow,
}

impl MathOp {
    pub fn id(self) -> i32 {
        match self {
            MathOp::Add => 0,
            MathOp::Sub => 1,
            MathOp::Mul => 2,
            MathOp::Div => 3,
            MathOp::Mod => 4,
            MathOp::Xor => 5,
            MathOp::Pow => 6,
        }
    }

    pub fn from_id(id: i32) -> Option<MathOp> {
        match id {
            0 => Some(MathOp::Add),
            1 => Some(MathOp::Sub),
            2 => Some(MathOp::Mul),
            3 => Some(MathOp::Div),
            4 => Some(MathOp::Mod),
            5 => Some(MathOp::Xor),
            6 => Some(MathOp::Pow),
            _ => None,
        }
    }

    /// Operator character as written in source.
    pub fn symbol(self) -> char {
        match self {
            MathOp::Add => '+',
            MathOp::Sub => '-',
            MathOp::Mul => '*',
            MathOp::Div => '/',
            MathOp::Mod => '%',
            MathOp::Xor => 'x',
            MathOp::Pow => '^',
        }
    }

    pub fn from_char(op: char) -> Option<MathOp> {
        match op {
            '+' => Some(MathOp::Add),
            '-' => Some(MathOp::Sub),
            '*' => Some(MathOp::Mul),
            '/' => Some(MathOp::Div),
            '%' => Some(MathOp::Mod),
            '^' => Some(MathOp::Pow),
            _ => None,
        }
    }
}

/// One instruction: an opcode plus its value parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: Opcode,
    pub params: SmallVec<[RbcValue; 3]>,
}

impl Instruction {
    pub fn new(op: Opcode) -> Self {
        Instruction {
            op,
            params: SmallVec::new(),
        }
    }

    pub fn with(op: Opcode, params: impl IntoIterator<Item = RbcValue>) -> Self {
        Instruction {
            op,
            params: params.into_iter().collect(),
        }
    }
}

/// Store `value` into `register` and mark it occupied. The caller flips the
/// register's `vacant` flag; this only builds the instruction.
pub fn occupy(register: RegisterId, value: RbcValue) -> Instruction {
    Instruction::with(Opcode::Save, [RbcValue::Register(register), value])
}

/// Apply `op` to `register` with `value` as the right-hand operand.
pub fn operate(register: RegisterId, value: RbcValue, op: MathOp) -> Instruction {
    Instruction::with(
        Opcode::Math,
        [
            RbcValue::Register(register),
            value,
            RbcValue::Constant(RbcConstant::int(op.id() as i64)),
        ],
    )
}

/// Declare `variable` without an initial value.
pub fn create(variable: VariableId) -> Instruction {
    Instruction::with(Opcode::Create, [RbcValue::Variable(variable)])
}

/// Declare `variable` initialized to `value`.
pub fn create_with(variable: VariableId, value: RbcValue) -> Instruction {
    Instruction::with(Opcode::Create, [RbcValue::Variable(variable), value])
}

/// Overwrite an existing variable.
pub fn set(variable: VariableId, value: RbcValue) -> Instruction {
    Instruction::with(Opcode::Save, [RbcValue::Variable(variable), value])
}

/// Copy the call return slots into `variable`.
pub fn store_return(variable: VariableId) -> Instruction {
    Instruction::with(Opcode::SaveRet, [RbcValue::Variable(variable)])
}
