use std::sync::Arc;

use anyhow::Result;
use flowinfer::{
    DType, Graph, OpAttrs, OpTag, RecordingListener, Session, SessionError, TensorValue,
};

use crate::common;

fn while_inputs(i: i32, j: i32) -> std::collections::HashMap<String, TensorValue> {
    common::bindings(vec![
        ("i", TensorValue::scalar(i)),
        ("j", TensorValue::scalar(j)),
    ])
}

#[test]
fn while_loop_counts_up_to_bound() -> Result<()> {
    let graph = Arc::new(common::while_graph()?);
    let mut session = Session::with_cpu(graph)?;
    let outputs = session.run(&["exit_i", "exit_j"], while_inputs(0, 3))?;
    assert_eq!(common::i32_scalar(&outputs["exit_i"])?, 3);
    assert_eq!(common::i32_scalar(&outputs["exit_j"])?, 3);
    Ok(())
}

#[test]
fn loop_body_runs_once_per_iteration() -> Result<()> {
    let graph = Arc::new(common::while_graph()?);
    let mut session = Session::with_cpu(graph)?;
    let mut listener = RecordingListener::new();
    session.output(&["exit_i"], while_inputs(0, 3), &mut [&mut listener])?;

    // Condition is evaluated for iterations 0..=3; the body runs for 0..3.
    assert_eq!(listener.count("cond"), 4);
    assert_eq!(listener.count("less"), 4);
    assert_eq!(listener.count("inc_i"), 3);
    assert_eq!(listener.count("next_i"), 3);
    assert_eq!(listener.count("exit_i"), 1);
    assert_eq!(listener.count("enter_i"), 1);

    let iterations: Vec<usize> = listener
        .finished
        .iter()
        .filter(|(execution, _)| execution.op_name == "inc_i")
        .map(|(execution, _)| execution.iteration)
        .collect();
    assert_eq!(iterations, vec![0, 1, 2]);

    let (exit, _) = listener
        .finished
        .iter()
        .find(|(execution, _)| execution.tag == OpTag::Exit)
        .expect("exit ran");
    assert_eq!(exit.frame, "root/while");
    assert_eq!(exit.iteration, 3);
    Ok(())
}

#[test]
fn zero_iteration_loop_passes_inputs_through() -> Result<()> {
    let graph = Arc::new(common::while_graph()?);
    let mut session = Session::with_cpu(graph)?;
    let mut listener = RecordingListener::new();
    let outputs = session.output(&["exit_i", "exit_j"], while_inputs(5, 3), &mut [&mut listener])?;
    assert_eq!(common::i32_scalar(&outputs["exit_i"])?, 5);
    assert_eq!(common::i32_scalar(&outputs["exit_j"])?, 3);
    assert_eq!(listener.count("inc_i"), 0);
    assert_eq!(listener.count("cond"), 1);
    Ok(())
}

#[test]
fn in_loop_variable_reports_last_iteration() -> Result<()> {
    let graph = Arc::new(common::while_graph()?);
    let mut session = Session::with_cpu(graph)?;
    let outputs = session.run(&["i_cur", "i_inc"], while_inputs(0, 3))?;
    assert_eq!(common::i32_scalar(&outputs["i_cur"])?, 3);
    assert_eq!(common::i32_scalar(&outputs["i_inc"])?, 3);
    Ok(())
}

#[test]
fn loop_results_feed_root_ops() -> Result<()> {
    let mut g = common::while_graph()?;
    g.add_ordinary("total", "add", OpAttrs::none(), &["exit_i", "j"], "total")?;
    let outputs = Session::with_cpu(Arc::new(g))?.run(&["total"], while_inputs(1, 4))?;
    assert_eq!(common::i32_scalar(&outputs["total"])?, 8);
    Ok(())
}

#[test]
fn nested_loops_restart_inner_frame_per_outer_iteration() -> Result<()> {
    let graph = Arc::new(common::nested_loop_graph()?);
    let mut session = Session::with_cpu(graph)?;
    let mut listener = RecordingListener::new();
    let outputs = session.output(
        &["acc_out", "i_out"],
        common::bindings(vec![
            ("n", TensorValue::scalar(3i32)),
            ("m", TensorValue::scalar(4i32)),
            ("acc", TensorValue::scalar(0i32)),
        ]),
        &mut [&mut listener],
    )?;
    assert_eq!(common::i32_scalar(&outputs["acc_out"])?, 12);
    assert_eq!(common::i32_scalar(&outputs["i_out"])?, 3);

    assert_eq!(listener.count("inc_inner_acc"), 12);
    assert_eq!(listener.count("exit_inner_acc"), 3);
    let mut inner_frames: Vec<String> = listener
        .finished
        .iter()
        .filter(|(execution, _)| execution.op_name == "exit_inner_acc")
        .map(|(execution, _)| execution.frame.clone())
        .collect();
    inner_frames.sort();
    inner_frames.dedup();
    assert_eq!(inner_frames.len(), 3);
    assert!(inner_frames.iter().all(|frame| frame.ends_with("/inner")));
    Ok(())
}

#[test]
fn nested_loops_with_empty_inner_loop() -> Result<()> {
    let graph = Arc::new(common::nested_loop_graph()?);
    let outputs = Session::with_cpu(graph)?.run(
        &["acc_out", "i_out"],
        common::bindings(vec![
            ("n", TensorValue::scalar(2i32)),
            ("m", TensorValue::scalar(0i32)),
            ("acc", TensorValue::scalar(7i32)),
        ]),
    )?;
    assert_eq!(common::i32_scalar(&outputs["acc_out"])?, 7);
    assert_eq!(common::i32_scalar(&outputs["i_out"])?, 2);
    Ok(())
}

#[test]
fn next_iteration_outside_loop_is_rejected() -> Result<()> {
    let mut g = Graph::new();
    g.add_placeholder("x", DType::F32, &[1])?;
    g.add_next_iteration("next", "x", "looped")?;
    let mut session = Session::with_cpu(Arc::new(g))?;
    let err = session
        .run(&["looped"], common::bindings(vec![("x", common::f32_tensor(vec![1.0], &[1])?)]))
        .unwrap_err();
    match err.downcast_ref::<SessionError>() {
        Some(SessionError::InvalidControlFlowState { op, context, .. }) => {
            assert_eq!(op, "next");
            assert_eq!(context, "root");
        }
        other => panic!("expected InvalidControlFlowState, got {:?}", other),
    }
    Ok(())
}
