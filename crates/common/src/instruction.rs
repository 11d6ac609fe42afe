//! Bytecode instructions.

use crate::value::Value;

/// One bytecode instruction. Each variant carries only its own operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Push a literal.
    PushConst(Value),
    /// Push the value bound to a local.
    PushVar(String),
    /// Pop the top of stack into a local.
    PopVar(String),
    /// Remove a local binding.
    DeleteVar(String),
    /// Call a builtin, user or external routine with `argc` stacked arguments.
    Call { name: String, argc: usize },
    /// Abort the program with a message.
    Throw(String),
    /// Jump target. Executes as a no-op.
    Label(String),
    Jump(String),
    /// Pop a Bool and jump if it is false.
    JumpIfFalse(String),
    /// Pop a value and jump unless it is one of `values`.
    JumpIfNotIn { values: Vec<Value>, label: String },
    /// Return `n` values from the top of the stack.
    Return(usize),
    /// Return `n` values bound to `names`. Only meaningful in an entrypoint.
    ReturnNamed { n: usize, names: Vec<String> },
    /// Start of a function body: open a board transaction.
    Enter,
    /// End of a function body: roll the board transaction back.
    Leave,
    SetImmutable(String),
    ClearImmutable(String),
}

impl Instruction {
    /// Mnemonic used by the object-file format.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::PushConst(_) => "pushConst",
            Instruction::PushVar(_) => "pushFrom",
            Instruction::PopVar(_) => "popTo",
            Instruction::DeleteVar(_) => "delVar",
            Instruction::Call { .. } => "call",
            Instruction::Throw(_) => "THROW_ERROR",
            Instruction::Label(_) => "label",
            Instruction::Jump(_) => "jump",
            Instruction::JumpIfFalse(_) => "jumpIfFalse",
            Instruction::JumpIfNotIn { .. } => "jumpIfNotIn",
            Instruction::Return(_) => "return",
            Instruction::ReturnNamed { .. } => "returnVars",
            Instruction::Enter => "enter",
            Instruction::Leave => "leave",
            Instruction::SetImmutable(_) => "setImmutable",
            Instruction::ClearImmutable(_) => "unsetImmutable",
        }
    }

    /// The label this instruction may transfer control to, if any.
    pub fn jump_target(&self) -> Option<&str> {
        match self {
            Instruction::Jump(label)
            | Instruction::JumpIfFalse(label)
            | Instruction::JumpIfNotIn { label, .. } => Some(label),
            _ => None,
        }
    }

    /// The local variable this instruction reads or writes, if any.
    pub fn variable(&self) -> Option<&str> {
        match self {
            Instruction::PushVar(name)
            | Instruction::PopVar(name)
            | Instruction::DeleteVar(name)
            | Instruction::SetImmutable(name)
            | Instruction::ClearImmutable(name) => Some(name),
            _ => None,
        }
    }
}

/// Strip a polyname's `@Type...` suffix: `"x@Int"` becomes `"x"`.
pub fn polyname_base(name: &str) -> &str {
    name.split('@').next().unwrap_or(name)
}

/// The first `@Type` suffix of a polyname, if present.
pub fn polyname_type(name: &str) -> Option<&str> {
    name.split('@').nth(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polynames() {
        assert_eq!(polyname_base("x@Int"), "x");
        assert_eq!(polyname_base("x"), "x");
        assert_eq!(polyname_type("next@Color"), Some("Color"));
        assert_eq!(polyname_type("next"), None);
    }

    #[test]
    fn jump_targets() {
        assert_eq!(Instruction::Jump("L".into()).jump_target(), Some("L"));
        assert_eq!(
            Instruction::JumpIfNotIn {
                values: vec![],
                label: "M".into()
            }
            .jump_target(),
            Some("M")
        );
        assert_eq!(Instruction::Enter.jump_target(), None);
    }
}
