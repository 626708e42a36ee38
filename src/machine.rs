//! The step-wise Brainfuck virtual machine.
//!
//! A [`VirtualMachine`] owns the program text, an instruction pointer, a
//! sparse [`MemoryTape`] and a memory pointer. Each call to
//! [`VirtualMachine::step`] executes exactly one symbol; [`VirtualMachine::run`]
//! steps until the instruction pointer reaches the end of the program.
//!
//! Behaviors:
//! - The tape is unbounded in both directions; untouched cells read as 0.
//! - `+`/`-` wrap around (255 + 1 = 0, 0 - 1 = 255).
//! - `.` writes the current cell to the sink (if any) and flushes.
//! - `,` polls the source (if any) without blocking; when nothing is ready
//!   the cell is set to [`DEFAULT_INPUT_VALUE`].
//! - Symbols outside `><+-.,[]` are comments.
//! - Loop brackets are matched by scanning the program at the moment the
//!   jump is taken. A scan that runs off either end of the program is
//!   reported as [`VmError::MalformedJump`].

use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::io::{ByteSink, ByteSource};
use crate::tape::MemoryTape;

/// Value stored by `,` when the source has no byte ready.
pub const DEFAULT_INPUT_VALUE: u8 = 0;

/// Errors that can occur while stepping the machine.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// `step` was called after the program ran to completion.
    #[error("Program has terminated and cannot be stepped (ip={ip})")]
    AlreadyTerminated { ip: usize },

    /// A bracket scan ran past the bounds of the program.
    #[error("Unmatched bracket {kind} at instruction {ip}")]
    MalformedJump { ip: usize, kind: UnmatchedBracketKind },

    /// The sink or source failed during `.` or `,`.
    #[error("I/O error at instruction {ip} ('{op}'): {source}")]
    IoFailure {
        ip: usize,
        op: char,
        #[source]
        source: std::io::Error,
    },
}

/// Which side of the loop was unmatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedBracketKind {
    Open,
    Close,
}

impl fmt::Display for UnmatchedBracketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmatchedBracketKind::Open => write!(f, "'['"),
            UnmatchedBracketKind::Close => write!(f, "']'"),
        }
    }
}

/// What to do when the sink or source fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IoPolicy {
    /// Log the failure, hand it to the `on_io_error` callback and keep going.
    #[default]
    Report,
    /// Return the failure from `step`/`run`.
    Halt,
}

impl FromStr for IoPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "report" => Ok(IoPolicy::Report),
            "halt" => Ok(IoPolicy::Halt),
            other => Err(format!("unknown I/O policy '{other}' (expected 'report' or 'halt')")),
        }
    }
}

type IoErrorHandler<'io> = Box<dyn FnMut(&VmError) + Send + 'io>;

/// Fluent configuration for a [`VirtualMachine`].
///
/// ```
/// use bf_vm::VirtualMachine;
///
/// let mut out = Vec::new();
/// let mut vm = VirtualMachine::builder("+++.").sink(&mut out).build();
/// vm.run().unwrap();
/// drop(vm);
/// assert_eq!(out, [3]);
/// ```
pub struct VirtualMachineBuilder<'io> {
    program: String,
    sink: Option<Box<dyn ByteSink + Send + 'io>>,
    source: Option<Box<dyn ByteSource + Send + 'io>>,
    io_policy: IoPolicy,
    on_io_error: Option<IoErrorHandler<'io>>,
}

impl<'io> VirtualMachineBuilder<'io> {
    fn new(program: String) -> Self {
        Self {
            program,
            sink: None,
            source: None,
            io_policy: IoPolicy::default(),
            on_io_error: None,
        }
    }

    /// Enable `.` by giving the machine somewhere to write.
    pub fn sink<S>(mut self, sink: S) -> Self
    where
        S: ByteSink + Send + 'io,
    {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Enable `,` by giving the machine something to read from.
    pub fn source<S>(mut self, source: S) -> Self
    where
        S: ByteSource + Send + 'io,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn io_policy(mut self, policy: IoPolicy) -> Self {
        self.io_policy = policy;
        self
    }

    /// Called with every I/O failure under [`IoPolicy::Report`].
    pub fn on_io_error<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&VmError) + Send + 'io,
    {
        self.on_io_error = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> VirtualMachine<'io> {
        VirtualMachine {
            instructions: self.program.chars().collect(),
            program: self.program,
            ip: 0,
            tape: MemoryTape::new(),
            mp: 0,
            sink: self.sink,
            source: self.source,
            io_policy: self.io_policy,
            on_io_error: self.on_io_error,
            steps: 0,
            io_failures: 0,
        }
    }
}

/// A Brainfuck machine that executes one symbol per [`step`](Self::step).
pub struct VirtualMachine<'io> {
    program: String,
    instructions: Vec<char>,
    ip: usize,
    tape: MemoryTape,
    mp: i64,
    sink: Option<Box<dyn ByteSink + Send + 'io>>,
    source: Option<Box<dyn ByteSource + Send + 'io>>,
    io_policy: IoPolicy,
    on_io_error: Option<IoErrorHandler<'io>>,
    steps: u64,
    io_failures: u64,
}

impl<'io> VirtualMachine<'io> {
    /// Create a machine with no sink and no source.
    pub fn new(program: impl Into<String>) -> Self {
        Self::builder(program).build()
    }

    pub fn builder(program: impl Into<String>) -> VirtualMachineBuilder<'io> {
        VirtualMachineBuilder::new(program.into())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// True once the instruction pointer sits one past the last symbol.
    pub fn terminated(&self) -> bool {
        self.ip == self.instructions.len()
    }

    /// Index of the next symbol to execute.
    pub fn instruction_pointer(&self) -> usize {
        self.ip
    }

    /// Address of the current cell.
    pub fn memory_pointer(&self) -> i64 {
        self.mp
    }

    pub fn current_cell(&self) -> u8 {
        self.tape.get(self.mp)
    }

    pub fn cell(&self, addr: i64) -> u8 {
        self.tape.get(addr)
    }

    pub fn tape(&self) -> &MemoryTape {
        &self.tape
    }

    /// Number of instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Number of sink/source failures seen so far.
    pub fn io_failures(&self) -> u64 {
        self.io_failures
    }

    /// Execute exactly one instruction.
    ///
    /// Fails with [`VmError::AlreadyTerminated`] or [`VmError::MalformedJump`]
    /// without changing any state. An [`VmError::IoFailure`] is only returned
    /// under [`IoPolicy::Halt`]; the instruction counts as executed.
    pub fn step(&mut self) -> Result<(), VmError> {
        let ip = self.ip;
        let Some(&instr) = self.instructions.get(ip) else {
            return Err(VmError::AlreadyTerminated { ip });
        };

        // Jump targets are resolved before anything is mutated.
        let next = match instr {
            '[' if self.current_cell() == 0 => {
                let target = self.match_forward(ip)?;
                trace!(ip, target, "cell is 0; skip loop");
                target
            }
            ']' if self.current_cell() != 0 => {
                let target = self.match_backward(ip)?;
                trace!(ip, target, "cell != 0; repeat loop");
                target
            }
            _ => ip + 1,
        };
        self.ip = next;
        self.steps += 1;

        match instr {
            '>' => self.mp += 1,
            '<' => self.mp -= 1,
            '+' => {
                self.tape.increment(self.mp);
            }
            '-' => {
                self.tape.decrement(self.mp);
            }
            '.' => self.output(ip)?,
            ',' => self.input(ip)?,
            _ => {}
        }
        Ok(())
    }

    /// Step until the program terminates.
    ///
    /// Returns `Ok(())` on termination or the first error `step` surfaces.
    pub fn run(&mut self) -> Result<(), VmError> {
        debug!(len = self.instructions.len(), "running program");
        while !self.terminated() {
            self.step()?;
        }
        debug!(steps = self.steps, "program terminated");
        Ok(())
    }

    /// Like [`run`](Self::run), but sleeps for `delay` between successive steps.
    pub fn run_paced(&mut self, delay: Duration) -> Result<(), VmError> {
        debug!(len = self.instructions.len(), delay_ms = delay.as_millis() as u64, "running program (paced)");
        while !self.terminated() {
            self.step()?;
            if !self.terminated() {
                thread::sleep(delay);
            }
        }
        debug!(steps = self.steps, "program terminated");
        Ok(())
    }

    /// Index just past the `]` matching the `[` at `open`.
    fn match_forward(&self, open: usize) -> Result<usize, VmError> {
        let mut depth = 0usize;
        for (i, &c) in self.instructions.iter().enumerate().skip(open + 1) {
            match c {
                '[' => depth += 1,
                ']' if depth == 0 => return Ok(i + 1),
                ']' => depth -= 1,
                _ => {}
            }
        }
        Err(VmError::MalformedJump {
            ip: open,
            kind: UnmatchedBracketKind::Open,
        })
    }

    /// Index just past the `[` matching the `]` at `close`.
    fn match_backward(&self, close: usize) -> Result<usize, VmError> {
        let mut depth = 0usize;
        for i in (0..close).rev() {
            match self.instructions[i] {
                ']' => depth += 1,
                '[' if depth == 0 => return Ok(i + 1),
                '[' => depth -= 1,
                _ => {}
            }
        }
        Err(VmError::MalformedJump {
            ip: close,
            kind: UnmatchedBracketKind::Close,
        })
    }

    fn output(&mut self, ip: usize) -> Result<(), VmError> {
        let value = self.current_cell();
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        match sink.write_byte(value) {
            Ok(()) => Ok(()),
            Err(source) => self.io_failed(VmError::IoFailure { ip, op: '.', source }),
        }
    }

    fn input(&mut self, ip: usize) -> Result<(), VmError> {
        let Some(source) = self.source.as_mut() else {
            return Ok(());
        };
        match source.poll_byte() {
            Ok(Some(b)) => self.tape.set(self.mp, b),
            Ok(None) => self.tape.set(self.mp, DEFAULT_INPUT_VALUE),
            Err(source) => return self.io_failed(VmError::IoFailure { ip, op: ',', source }),
        }
        Ok(())
    }

    fn io_failed(&mut self, err: VmError) -> Result<(), VmError> {
        self.io_failures += 1;
        match self.io_policy {
            IoPolicy::Halt => Err(err),
            IoPolicy::Report => {
                warn!(error = %err, "I/O failure; continuing");
                if let Some(handler) = self.on_io_error.as_mut() {
                    handler(&err);
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for VirtualMachine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualMachine")
            .field("ip", &self.ip)
            .field("len", &self.instructions.len())
            .field("mp", &self.mp)
            .field("steps", &self.steps)
            .field("has_sink", &self.sink.is_some())
            .field("has_source", &self.source.is_some())
            .field("io_policy", &self.io_policy)
            .finish()
    }
}
