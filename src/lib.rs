//! A small, step-wise Brainfuck virtual machine.
//!
//! The machine executes one symbol at a time against a sparse tape that is
//! unbounded in both directions, and talks to the outside world only
//! through two optional capabilities: a [`ByteSink`] for `.` and a
//! [`ByteSource`] for `,`.
//!
//! Features and behaviors:
//! - Cells hold a byte and wrap around on `+`/`-`; untouched cells read as 0.
//! - The memory pointer may move to any `i64` address, negative included.
//! - `.` writes the current cell to the sink and flushes; no sink, no-op.
//! - `,` polls the source without blocking; nothing ready stores 0.
//! - Any character outside `><+-.,[]` is a comment.
//! - Unbalanced brackets are reported as [`VmError::MalformedJump`] when a
//!   jump needs the missing partner.
//! - Sink/source failures are logged and reported through a callback by
//!   default ([`IoPolicy::Report`]), or stop the run ([`IoPolicy::Halt`]).
//!
//! Quick start:
//!
//! ```
//! use bf_vm::{VirtualMachine, WriteSink};
//!
//! // Classic "Hello World!" in Brainfuck
//! let code = "++++++++++[>+++++++>++++++++++>+++>+<<<<-]>++.>+.+++++++..+++.>++.<<+++++++++++++++.>.+++.------.--------.>+.>.";
//! let mut vm = VirtualMachine::builder(code)
//!     .sink(WriteSink::new(std::io::stdout()))
//!     .build();
//! vm.run().expect("program should run");
//! assert!(vm.terminated());
//! ```

pub mod cli_util;
pub mod commands;
pub mod config;
pub mod io;
pub mod logging;
pub mod machine;
pub mod tape;

pub use io::{ByteSink, ByteSource, PollingSource, WriteSink};
pub use machine::{
    IoPolicy, UnmatchedBracketKind, VirtualMachine, VirtualMachineBuilder, VmError,
    DEFAULT_INPUT_VALUE,
};
pub use tape::{MemoryTape, DEFAULT_MEMORY_VALUE};
