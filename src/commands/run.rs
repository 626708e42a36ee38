use clap::Args;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use tracing::{debug, warn};

use crate::cli_util::print_vm_error;
use crate::config::RunSettings;
use crate::logging::init_logging;
use crate::{IoPolicy, PollingSource, VirtualMachine, VirtualMachineBuilder, WriteSink};

#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
pub struct RunArgs {
    /// Read Brainfuck code from PATH instead of positional "<code>"
    #[arg(short = 'f', long = "file")]
    pub file: Option<String>,

    /// Concatenated Brainfuck code parts
    #[arg(value_name = "code", trailing_var_arg = true)]
    pub code: Vec<String>,

    /// Pause between steps in milliseconds (fallback BFVM_DELAY_MS; default none)
    #[arg(long = "delay", value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Do not connect stdin; ',' becomes a no-op
    #[arg(long = "no-input")]
    pub no_input: bool,

    /// Do not connect stdout; '.' becomes a no-op
    #[arg(long = "no-output")]
    pub no_output: bool,

    /// What to do when stdin/stdout fail: report or halt (fallback BFVM_IO_POLICY)
    #[arg(long = "io-policy", value_name = "POLICY")]
    pub io_policy: Option<IoPolicy>,

    /// Log interpreter events to stderr
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

pub fn run(program: &str, args: RunArgs) -> i32 {
    if args.help {
        usage_and_exit(program, 0);
    }

    let RunArgs {
        file,
        code,
        delay_ms,
        no_input,
        no_output,
        io_policy,
        verbose,
        ..
    } = args;

    init_logging(verbose);

    if file.is_none() && code.is_empty() {
        usage_and_exit(program, 2);
    }

    if file.is_some() && !code.is_empty() {
        eprintln!("{program}: cannot use positional code together with --file");
        usage_and_exit(program, 2);
    }

    let code_str = if let Some(path) = file {
        match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{program}: failed to read code file as UTF-8: {e}");
                let _ = io::stderr().flush();
                return 1;
            }
        }
    } else {
        code.join("")
    };

    // Resolve settings: flags -> env -> config file -> defaults
    let mut settings = RunSettings::load();
    if delay_ms.is_some() {
        settings.delay_ms = delay_ms;
    }
    if let Some(policy) = io_policy {
        settings.io_policy = policy;
    }
    if no_input {
        settings.input = false;
    }
    if no_output {
        settings.output = false;
    }
    debug!(?settings, "resolved run settings");

    let mut builder = VirtualMachine::builder(code_str.clone()).io_policy(settings.io_policy);
    if settings.output {
        builder = builder.sink(WriteSink::new(io::stdout()));
    }
    if settings.input && code_str.contains(',') {
        builder = match attach_stdin(builder) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("{program}: failed to open stdin: {e}");
                let _ = io::stderr().flush();
                return 1;
            }
        };
    }
    let mut vm = builder.build();

    let result = match settings.delay() {
        Some(delay) => {
            // The pacing sleep is only interrupted from outside the process
            if let Err(e) = ctrlc::set_handler(|| {
                let _ = io::stdout().flush();
                let _ = io::stderr().flush();
                std::process::exit(130);
            }) {
                warn!("failed to set ctrl+c handler: {e}");
            }
            vm.run_paced(delay)
        }
        None => vm.run(),
    };
    let _ = io::stdout().flush();

    if vm.io_failures() > 0 && settings.io_policy == IoPolicy::Report {
        eprintln!("{program}: {} I/O failure(s) during run", vm.io_failures());
    }

    match result {
        Ok(()) => 0,
        Err(err) => {
            print_vm_error(Some(program), &code_str, &err);
            1
        }
    }
}

/// How long piped stdin gets to deliver its first read before the run starts.
const PIPE_GRACE: Duration = Duration::from_millis(100);

/// Stdin is polled on a background thread so `,` never waits. Piped or
/// redirected input gets a short, bounded head start so bytes written
/// before launch are ready at the first `,`; an open but silent pipe
/// only costs the grace period.
fn attach_stdin(builder: VirtualMachineBuilder<'static>) -> io::Result<VirtualMachineBuilder<'static>> {
    let mut source = PollingSource::stdin()?;
    if !io::stdin().is_terminal() {
        let ready = source.wait_ready(PIPE_GRACE);
        debug!(ready, "polled piped stdin");
    }
    Ok(builder.source(source))
}

fn usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} run [OPTIONS] "<code>"
  {0} run [OPTIONS] --file <PATH>

Options:
  --file,  -f <PATH>   Read Brainfuck code from PATH instead of positional "<code>"
  --delay <MS>         Pause MS milliseconds between steps
  --no-input           Do not connect stdin (',' does nothing)
  --no-output          Do not connect stdout ('.' does nothing)
  --io-policy <POLICY> report (default): log I/O failures and keep going
                       halt: stop with an error on the first I/O failure
  --verbose, -v        Log interpreter events to stderr
  --help,    -h        Show this help

Notes:
- Input (`,`) never waits: when no byte is ready the current cell is set to 0.
- Characters outside of Brainfuck's ><+-.,[] are ignored.
- Settings may also come from BFVM_DELAY_MS, BFVM_IO_POLICY and the [run]
  section of $XDG_CONFIG_HOME/bfvm.toml (or the file named by BFVM_CONFIG).

Examples:
- Load Brainfuck code from a file:
    {0} run --file ./program.bf
- Read bytes from a file as stdin (`,` will consume file input):
    {0} run ",[.,]" < input.txt
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}
