//! Running loaded native code against a board.

use crate::codegen::{MachineCode, FAULT_SENTINEL, MESSAGE_CAPACITY};
use crate::error::JitError;
use crate::memory::ExecutableMemory;
use gbs_common::{Board, Value, ValueType};
use std::mem;
use tracing::{debug, instrument};

/// The entrypoint's returned variables, in declaration order.
pub type Bindings = Vec<(String, Value)>;

/// SysV signature of the entry stub.
type EntryFn = unsafe extern "C" fn(board: *mut u8, results: *mut u8) -> i64;

/// A compiled program mapped into executable memory.
#[derive(Debug)]
pub struct NativeFunction {
    memory: ExecutableMemory,
    entry: usize,
    results: Vec<(String, ValueType)>,
}

impl NativeFunction {
    pub(crate) fn new(memory: ExecutableMemory, code: MachineCode) -> Self {
        Self {
            memory,
            entry: code.entry,
            results: code.results,
        }
    }

    /// Names and types of the values `run` returns.
    pub fn results(&self) -> &[(String, ValueType)] {
        &self.results
    }

    /// Run the program on `board`.
    ///
    /// On success the board holds the final head and cells. On a fault it
    /// is left as it was before the call.
    #[instrument(skip_all, name = "native")]
    pub fn run(&self, board: &mut Board) -> Result<Bindings, JitError> {
        let mut bytes = board.to_native_bytes();
        let mut words = vec![0u8; (8 * self.results.len()).max(MESSAGE_CAPACITY)];

        let status = unsafe {
            let entry: EntryFn = mem::transmute(self.memory.as_ptr().add(self.entry));
            entry(bytes.as_mut_ptr(), words.as_mut_ptr())
        };

        if status == FAULT_SENTINEL {
            let end = words.iter().position(|b| *b == 0).unwrap_or(words.len());
            let message = String::from_utf8_lossy(&words[..end]).into_owned();
            debug!(%message, "fault");
            return Err(JitError::Fault { message });
        }

        board.update_from_native(&bytes)?;
        let bindings = self
            .results
            .iter()
            .zip(words.chunks_exact(8))
            .map(|((name, ty), chunk)| {
                let mut word = [0u8; 8];
                word.copy_from_slice(chunk);
                Value::from_native(i64::from_le_bytes(word), *ty)
                    .map(|value| (name.clone(), value))
                    .ok_or_else(|| JitError::UntypedResult { name: name.clone() })
            })
            .collect::<Result<Bindings, _>>()?;
        debug!(results = bindings.len(), "finished");
        Ok(bindings)
    }
}
