use bf_vm::{ByteSink, IoPolicy, VirtualMachine, VmError};
use std::collections::VecDeque;
use std::io;
use std::sync::mpsc;
use std::thread;

struct ClosedPipe;

impl ByteSink for ClosedPipe {
    fn write_byte(&mut self, _byte: u8) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
    }
}

#[test]
fn machines_run_independently_on_threads() {
    let handles: Vec<_> = (1..=4u8)
        .map(|n| {
            thread::spawn(move || {
                let mut out = Vec::new();
                let code = format!("{}.", "+".repeat(n as usize * 10));
                let mut vm = VirtualMachine::builder(code).sink(&mut out).build();
                vm.run().unwrap();
                drop(vm);
                out
            })
        })
        .collect();

    let outputs: Vec<Vec<u8>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(outputs, vec![vec![10], vec![20], vec![30], vec![40]]);
}

#[test]
fn channel_source_feeds_input() {
    let (tx, rx) = mpsc::channel();
    tx.send(b'q').unwrap();
    let mut out = Vec::new();
    let mut vm = VirtualMachine::builder(",.,.").source(rx).sink(&mut out).build();
    vm.run().unwrap();
    drop(vm);
    assert_eq!(out, [b'q', 0]);
}

#[test]
fn io_failures_are_observable_without_stopping() {
    let mut reported = Vec::new();
    let mut vm = VirtualMachine::builder("+.>+.")
        .sink(ClosedPipe)
        .on_io_error(|e| {
            if let VmError::IoFailure { ip, op, .. } = e {
                reported.push((*ip, *op));
            }
        })
        .build();
    vm.run().unwrap();
    assert_eq!(vm.memory_pointer(), 1);
    drop(vm);
    assert_eq!(reported, [(1, '.'), (4, '.')]);
}

#[test]
fn halting_policy_stops_at_first_failure() {
    let mut vm = VirtualMachine::builder("..")
        .sink(ClosedPipe)
        .io_policy(IoPolicy::Halt)
        .build();
    let err = vm.run().unwrap_err();
    assert!(matches!(err, VmError::IoFailure { ip: 0, op: '.', .. }));
    assert_eq!(vm.io_failures(), 1);
    assert_eq!(err.to_string(), "I/O error at instruction 0 ('.'): pipe closed");
}

#[test]
fn stepping_can_be_interleaved_with_inspection() {
    let mut vm = VirtualMachine::builder(",[->+<]")
        .source(VecDeque::from(vec![3]))
        .build();
    let mut max_ip = 0;
    while !vm.terminated() {
        vm.step().unwrap();
        max_ip = max_ip.max(vm.instruction_pointer());
    }
    assert_eq!(max_ip, 7);
    assert_eq!(vm.cell(0), 0);
    assert_eq!(vm.cell(1), 3);
    // ',' and '[' once, then three passes over "->+<]"
    assert_eq!(vm.steps(), 1 + 1 + 3 * 5);
    assert!(matches!(vm.step(), Err(VmError::AlreadyTerminated { ip: 7 })));
}
