//! Property tests for output ordering and terminal-state stability.

use proptest::prelude::*;
use serde_json::json;

use sandcrate_exec_core::{ExecutionCommand, PluginRef};
use sandcrate_exec_session::{LineKind, OutputAggregator, SessionMachine};
use sandcrate_exec_transport::decode_envelope;

#[derive(Debug, Clone)]
enum Op {
    Update(String),
    Status(String),
    Succeed(String),
    Fail(String),
    RuntimeError(String),
    Subscribed,
    Garbage(String),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => "[a-z ]{0,12}".prop_map(Op::Update),
        1 => prop_oneof![Just("starting"), Just("running"), Just("busy")]
            .prop_map(|s| Op::Status(s.to_string())),
        1 => "[a-z]{0,8}".prop_map(Op::Succeed),
        1 => "[a-z]{1,8}".prop_map(Op::Fail),
        1 => "[a-z]{1,8}".prop_map(Op::RuntimeError),
        1 => Just(Op::Subscribed),
        1 => "[a-z{]{1,8}".prop_map(Op::Garbage),
    ]
}

fn payload(op: &Op) -> String {
    match op {
        Op::Update(output) => json!({"type": "update", "output": output}).to_string(),
        Op::Status(status) => json!({"type": "status", "status": status}).to_string(),
        Op::Succeed(output) => {
            json!({"type": "result", "success": true, "output": output}).to_string()
        }
        Op::Fail(error) => {
            json!({"type": "result", "success": false, "error": error}).to_string()
        }
        Op::RuntimeError(message) => json!({"type": "error", "message": message}).to_string(),
        Op::Subscribed => json!({"type": "subscribed"}).to_string(),
        Op::Garbage(raw) => format!("<{raw}"),
    }
}

fn feed(machine: &mut SessionMachine, op: &Op) {
    let bytes = payload(op).into_bytes();
    match decode_envelope(&bytes) {
        Ok(envelope) => {
            machine.apply(envelope);
        }
        Err(e) => machine.decode_failed(&bytes, &e),
    }
}

proptest! {
    #[test]
    fn prop_aggregator_preserves_arrival_order(
        texts in prop::collection::vec("[a-z0-9]{0,10}", 0..40),
        split in 0usize..40,
    ) {
        let mut output = OutputAggregator::new();
        let split = split.min(texts.len());

        for text in &texts[..split] {
            output.append_output(text.clone());
        }
        let mut read: Vec<String> = output
            .read_since_last()
            .iter()
            .map(|line| line.text.clone())
            .collect();

        for text in &texts[split..] {
            output.append_output(text.clone());
        }
        read.extend(output.read_since_last().iter().map(|line| line.text.clone()));

        prop_assert_eq!(&read, &texts);
        prop_assert_eq!(output.texts(), texts.iter().map(String::as_str).collect::<Vec<_>>());
        prop_assert_eq!(output.unread_count(), 0);
    }

    #[test]
    fn prop_output_matches_accepted_updates(ops in prop::collection::vec(op(), 0..30)) {
        let mut machine = SessionMachine::new();
        let command = ExecutionCommand::new(&PluginRef::new("p", "P"), json!({}));
        machine.begin_execution(&command).unwrap();

        let mut active = true;
        let mut expected: Vec<String> = Vec::new();

        for op in &ops {
            let was_terminal = machine.status().is_terminal();
            let outputs_before = machine.output().output_texts().len();

            feed(&mut machine, op);

            match op {
                Op::Update(text) if active && !text.is_empty() => expected.push(text.clone()),
                Op::Succeed(text) if active => {
                    if !text.is_empty() {
                        expected.push(text.clone());
                    }
                    active = false;
                }
                Op::Fail(_) | Op::RuntimeError(_) if active => active = false,
                _ => {}
            }

            prop_assert_eq!(machine.status().is_terminal(), !active);
            if was_terminal {
                prop_assert!(machine.status().is_terminal());
                prop_assert_eq!(machine.output().output_texts().len(), outputs_before);
            }
        }

        prop_assert_eq!(
            machine.output().output_texts(),
            expected.iter().map(String::as_str).collect::<Vec<_>>()
        );
        let diagnostics = machine
            .output()
            .lines()
            .iter()
            .filter(|line| line.kind == LineKind::Diagnostic)
            .count();
        let garbage = ops.iter().filter(|op| matches!(op, Op::Garbage(_))).count();
        prop_assert!(diagnostics >= garbage);
    }
}
