use std::io::{self, Write};
use crate::VmError;

/// Pretty-print a [`VmError`] with caret positioning.
/// If `program` is `Some("bfvm")`, prefix messages with "bfvm: ...".
pub fn print_vm_error(program: Option<&str>, code: &str, err: &VmError) {
    let prefix_program = |msg: &str| {
        if let Some(p) = program {
            format!("{p}: {msg}")
        } else {
            msg.to_string()
        }
    };

    match err {
        VmError::AlreadyTerminated { ip } => {
            let msg = prefix_program("Runtime error: program already terminated");
            print_error_with_context(&msg, code, *ip);
        }
        VmError::MalformedJump { ip, kind } => {
            let msg = prefix_program(&format!("Runtime error: unmatched bracket {kind}"));
            print_error_with_context(&msg, code, *ip);
        }
        VmError::IoFailure { ip, op, source } => {
            let msg = prefix_program(&format!("I/O error during '{op}': {source}"));
            print_error_with_context(&msg, code, *ip);
        }
    }
}

/// Print a concise error with instruction index and a caret context window,
/// working with UTF-8 by slicing using char indices.
pub fn print_error_with_context(prefix: &str, code: &str, pos: usize) {
    let mut stderr = io::stderr().lock();
    let _ = write_error_with_context(&mut stderr, prefix, code, pos);
    let _ = stderr.flush();
}

fn write_error_with_context<W: Write>(out: &mut W, prefix: &str, code: &str, pos: usize) -> io::Result<()> {
    writeln!(out, "{prefix} at instruction {pos}")?;

    // Show a short window around the position for context
    const WINDOW_CHARS: usize = 32;

    let total_chars = code.chars().count();
    let start_char = pos.saturating_sub(WINDOW_CHARS);
    let end_char = (pos + WINDOW_CHARS + 1).min(total_chars);

    let start_byte = char_to_byte_index(code, start_char);
    let end_byte = char_to_byte_index(code, end_char);
    let slice = &code[start_byte..end_byte];

    // Newlines in the window would break the caret alignment
    let slice: String = slice.chars().map(|c| if c.is_control() { ' ' } else { c }).collect();
    writeln!(out, "  {}", slice)?;

    // Caret under the exact position
    let caret_offset_chars = pos.saturating_sub(start_char);
    writeln!(out, "  {}^", " ".repeat(caret_offset_chars))
}

/// Convert a char index into a byte index in the given UTF-8 string.
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}
