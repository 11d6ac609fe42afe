//! Run loop and opcode dispatch.

use crate::error::Fault;
use crate::machine::{ActivationRecord, Interpreter};
use gbs_common::{
    polyname_base, CallTarget, CompiledProgram, FaultKind, Instruction, Routine, RoutineKind,
    Value,
};
use tracing::{debug, instrument, trace};

/// Final answer of a run: the entrypoint's named return values.
pub type Bindings = Vec<(String, Value)>;

impl<'p, 'b> Interpreter<'p, 'b> {
    /// Run the program's entrypoint to completion.
    #[instrument(skip_all, name = "interpret")]
    pub fn execute(&mut self) -> Result<Bindings, Fault> {
        let program = self.program;
        let entry = program.entrypoint().ok_or_else(|| {
            Fault::new(FaultKind::UndefinedRoutine, "Program has no entrypoint")
        })?;
        debug!(entry = %entry.name, module = program.module(), "starting");
        self.frames.push(ActivationRecord::new(program, entry));

        loop {
            if let Some(bindings) = self.step()? {
                debug!(steps = self.steps, "finished");
                return Ok(bindings);
            }
        }
    }

    /// Execute one instruction. Returns the bindings once the outermost
    /// routine returns.
    pub fn step(&mut self) -> Result<Option<Bindings>, Fault> {
        self.count_step()?;

        let frame = self.current()?;
        let routine: &'p Routine = frame.routine;
        let at = frame.ip;
        let Some(instr) = routine.instructions().get(at) else {
            return Err(self.fault(
                FaultKind::MalformedBytecode,
                format!("{} {} ended without returning", routine.kind, routine.name),
            ));
        };
        trace!(routine = %routine.name, at, op = instr.mnemonic(), "step");

        match instr {
            // ---- Variables ----
            Instruction::PushConst(value) => {
                self.push(value.clone());
                self.advance()?;
            }
            Instruction::PushVar(name) => self.exec_push_var(name)?,
            Instruction::PopVar(name) => self.exec_pop_var(name)?,
            Instruction::DeleteVar(name) => {
                self.current_mut()?.locals.remove(name);
                self.advance()?;
            }
            Instruction::SetImmutable(name) => {
                self.current_mut()?.immutable.insert(name.clone());
                self.advance()?;
            }
            Instruction::ClearImmutable(name) => {
                self.current_mut()?.immutable.remove(name);
                self.advance()?;
            }

            // ---- Control flow ----
            Instruction::Label(_) => self.advance()?,
            Instruction::Jump(_) => self.jump(at)?,
            Instruction::JumpIfFalse(_) => match self.pop()? {
                Value::Bool(true) => self.advance()?,
                Value::Bool(false) => self.jump(at)?,
                _ => {
                    return Err(
                        self.fault(FaultKind::TypeMismatch, "Condition should be a boolean")
                    )
                }
            },
            Instruction::JumpIfNotIn { values, .. } => {
                let value = self.pop()?;
                if values.contains(&value) {
                    self.advance()?;
                } else {
                    self.jump(at)?;
                }
            }
            Instruction::Throw(message) => {
                return Err(self.fault(FaultKind::ExplicitThrow, message.clone()));
            }

            // ---- Calls ----
            Instruction::Call { name, argc } => self.exec_call(name, *argc)?,
            Instruction::Return(n) => return self.exec_return(*n),
            Instruction::ReturnNamed { n, names } => return self.exec_return_named(*n, names),

            // ---- Board transactions ----
            Instruction::Enter => {
                self.board.push_state();
                self.advance()?;
            }
            Instruction::Leave => {
                if let Err(err) = self.board.pop_state() {
                    return Err(self.fault(FaultKind::MalformedBytecode, err.to_string()));
                }
                self.advance()?;
            }
        }
        Ok(None)
    }

    fn exec_push_var(&mut self, name: &str) -> Result<(), Fault> {
        let bound = self.current()?.locals.get(name).cloned();
        match bound {
            Some(value) => {
                self.push(value);
                self.advance()
            }
            None => Err(self.fault(
                FaultKind::UninitializedVariable,
                format!("Uninitialized variable \"{name}\""),
            )),
        }
    }

    fn exec_pop_var(&mut self, name: &str) -> Result<(), Fault> {
        if self.current()?.immutable.contains(name) {
            return Err(self.fault(
                FaultKind::ImmutableAssignment,
                format!(
                    "Cannot modify \"{name}\": index of a foreach/repeatWith/repeat is immutable"
                ),
            ));
        }
        let value = self.pop()?;
        let frame = self.current_mut()?;
        frame.locals.insert(name.to_string(), value);
        frame.ip += 1;
        Ok(())
    }

    fn check_arity(
        &self,
        kind: RoutineKind,
        name: &str,
        params: &[String],
        argc: usize,
    ) -> Result<(), Fault> {
        if params.len() == argc {
            return Ok(());
        }
        let amount = if argc > params.len() { "many" } else { "few" };
        Err(self.fault(
            FaultKind::ArityMismatch,
            format!(
                "Too {amount} arguments for {kind} \"{name}\".\nExpected {} ({}), received {argc}",
                params.len(),
                params.join(", "),
            ),
        ))
    }

    fn exec_call(&mut self, name: &str, argc: usize) -> Result<(), Fault> {
        let module: &'p CompiledProgram = self.current()?.module;
        match module.resolve(name) {
            None => Err(self.fault(
                FaultKind::UndefinedRoutine,
                format!("function \"{name}\" is not defined"),
            )),
            Some(CallTarget::Builtin(builtin)) => {
                let params: Vec<String> = builtin.params.iter().map(|p| p.to_string()).collect();
                self.check_arity(builtin.kind, builtin.name, &params, argc)?;
                let args = self.pop_n(argc)?;
                let result = match (builtin.primitive)(self.board, &args) {
                    Ok(result) => result,
                    Err(err) => return Err(self.fault(err.kind, err.message)),
                };
                if builtin.kind == RoutineKind::Function {
                    if let Some(value) = result {
                        self.push(value);
                    }
                }
                self.advance()
            }
            Some(CallTarget::Routine(routine)) => self.enter_routine(module, routine, argc),
            Some(CallTarget::External { module, routine }) => {
                self.enter_routine(module, routine, argc)
            }
        }
    }

    fn enter_routine(
        &mut self,
        module: &'p CompiledProgram,
        routine: &'p Routine,
        argc: usize,
    ) -> Result<(), Fault> {
        self.check_arity(routine.kind, &routine.name, &routine.params, argc)?;
        let args = self.pop_n(argc)?;
        let mut record = ActivationRecord::new(module, routine);
        for (param, value) in routine.params.iter().zip(args) {
            record.locals.insert(param.clone(), value);
        }
        debug!(
            routine = %routine.name,
            module = module.module(),
            depth = self.frames.len() + 1,
            "call"
        );
        self.frames.push(record);
        Ok(())
    }

    /// Pop the running frame, leaving `n` values on the operand stack for
    /// the caller.
    fn exec_return(&mut self, n: usize) -> Result<Option<Bindings>, Fault> {
        if self.stack.len() < n {
            return Err(self.fault(FaultKind::MalformedBytecode, "operand stack underflow"));
        }
        self.frames.pop();
        if self.frames.is_empty() {
            return Ok(Some(Vec::new()));
        }
        self.advance()?;
        Ok(None)
    }

    /// At the outermost frame, collect the named locals in order; anywhere
    /// else, just return.
    fn exec_return_named(&mut self, n: usize, names: &[String]) -> Result<Option<Bindings>, Fault> {
        if names.len() != n {
            return Err(self.fault(
                FaultKind::MalformedBytecode,
                format!("returnVars declares {n} values but names {}", names.len()),
            ));
        }
        if self.frames.len() > 1 {
            self.frames.pop();
            self.advance()?;
            return Ok(None);
        }
        let mut bindings = Vec::with_capacity(n);
        for name in names {
            let base = polyname_base(name);
            match self.current()?.locals.get(base) {
                Some(value) => bindings.push((base.to_string(), value.clone())),
                None => {
                    return Err(self.fault(
                        FaultKind::UninitializedVariable,
                        format!("Uninitialized variable \"{base}\""),
                    ))
                }
            }
        }
        self.frames.pop();
        Ok(Some(bindings))
    }
}
