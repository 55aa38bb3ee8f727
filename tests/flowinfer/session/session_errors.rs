use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use flowinfer::{
    DType, ExecState, Graph, OpAttrs, Session, SessionError, Tensor, TensorValue,
};

use crate::common::{self, FailingDispatcher};

fn session_error(err: &anyhow::Error) -> &SessionError {
    match err.downcast_ref::<SessionError>() {
        Some(kind) => kind,
        None => panic!("expected a SessionError, got {:#}", err),
    }
}

fn boom_graph() -> Result<Graph> {
    let mut g = Graph::new();
    g.add_placeholder("x", DType::F32, &[2])?;
    g.add_ordinary("pre", "neg", OpAttrs::none(), &["x"], "negated")?;
    g.add_ordinary("explode", "boom", OpAttrs::none(), &["negated"], "boomed")?;
    Ok(g)
}

fn x_binding() -> Result<HashMap<String, TensorValue>> {
    Ok(common::bindings(vec![(
        "x",
        common::f32_tensor(vec![1.0, 2.0], &[2])?,
    )]))
}

#[test]
fn unknown_output_name() -> Result<()> {
    let mut session = Session::with_cpu(Arc::new(common::add_mmul_sub_graph()?))?;
    let err = session.run(&["d", "nope"], HashMap::new()).unwrap_err();
    match session_error(&err) {
        SessionError::UnknownOutputName { name } => assert_eq!(name, "nope"),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(session.state(), ExecState::NotStarted);
    Ok(())
}

#[test]
fn unbound_placeholder_names_the_missing_input() -> Result<()> {
    let mut session = Session::with_cpu(Arc::new(common::add_mmul_sub_graph()?))?;
    let mut rng = common::seeded_rng(11);
    let inputs = common::bindings(vec![
        ("x", common::random_f32(&mut rng, &[3, 4])?),
        ("y", common::random_f32(&mut rng, &[1, 4])?),
    ]);
    let err = session.run(&["d"], inputs.clone()).unwrap_err();
    match session_error(&err) {
        SessionError::UnboundPlaceholder { name } => assert_eq!(name, "w"),
        other => panic!("unexpected error {:?}", other),
    }

    // `c` does not depend on `w`, so the same bindings are enough for it.
    let outputs = session.run(&["c"], inputs)?;
    assert_eq!(outputs["c"].shape(), &[3, 4]);
    Ok(())
}

#[test]
fn placeholder_mismatch_on_dtype_and_shape() -> Result<()> {
    let graph = Arc::new(common::switch_graph()?);

    let wrong_dtype = common::bindings(vec![
        ("x", TensorValue::zeros(DType::F64, &[3])),
        ("pred", TensorValue::scalar(true)),
    ]);
    let err = Session::with_cpu(graph.clone())?
        .run(&["out"], wrong_dtype)
        .unwrap_err();
    match session_error(&err) {
        SessionError::PlaceholderMismatch { name, .. } => assert_eq!(name, "x"),
        other => panic!("unexpected error {:?}", other),
    }

    let wrong_shape = common::bindings(vec![
        ("x", TensorValue::zeros(DType::F32, &[4])),
        ("pred", TensorValue::scalar(true)),
    ]);
    let err = Session::with_cpu(graph)?.run(&["out"], wrong_shape).unwrap_err();
    assert!(matches!(
        session_error(&err),
        SessionError::PlaceholderMismatch { .. }
    ));
    Ok(())
}

#[test]
fn dynamic_dimensions_accept_any_size() -> Result<()> {
    let mut g = Graph::new();
    g.add_placeholder_dynamic("x", DType::I32, vec![None, Some(2)])?;
    g.add_ordinary("twice", "add", OpAttrs::none(), &["x", "x"], "twice")?;
    let graph = Arc::new(g);

    let x = TensorValue::from(Tensor::with_shape(vec![1i32, 2, 3, 4, 5, 6], &[3, 2])?);
    let outputs = Session::with_cpu(graph.clone())?
        .run(&["twice"], common::bindings(vec![("x", x)]))?;
    assert_eq!(outputs["twice"].as_tensor::<i32>()?.data, vec![2, 4, 6, 8, 10, 12]);

    let bad = TensorValue::from(Tensor::with_shape(vec![1i32, 2, 3], &[1, 3])?);
    let err = Session::with_cpu(graph)?
        .run(&["twice"], common::bindings(vec![("x", bad)]))
        .unwrap_err();
    assert!(matches!(
        session_error(&err),
        SessionError::PlaceholderMismatch { .. }
    ));
    Ok(())
}

#[test]
fn kernel_failure_names_op_and_context() -> Result<()> {
    let mut session = Session::new(
        Arc::new(boom_graph()?),
        Arc::new(FailingDispatcher::default()),
    )?;
    let err = session.run(&["boomed"], x_binding()?).unwrap_err();
    match session_error(&err) {
        SessionError::KernelExecutionFailure { op, context, source } => {
            assert_eq!(op, "explode");
            assert_eq!(context, "root");
            assert!(source.to_string().contains("boom kernel exploded"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(session.state(), ExecState::Failed);
    assert_eq!(session.executed_instances(), 1);
    Ok(())
}

#[test]
fn missing_cpu_kernel_is_a_kernel_failure() -> Result<()> {
    let mut session = Session::with_cpu(Arc::new(boom_graph()?))?;
    let err = session.run(&["boomed"], x_binding()?).unwrap_err();
    assert!(matches!(
        session_error(&err),
        SessionError::KernelExecutionFailure { .. }
    ));
    assert!(format!("{:#}", err).contains("boom"));
    Ok(())
}

#[test]
fn kernel_failure_inside_loop_reports_iteration() -> Result<()> {
    let mut g = common::while_graph()?;
    g.add_ordinary("bad", "div", OpAttrs::none(), &["i_body", "i_body"], "ratio")?;
    let mut session = Session::with_cpu(Arc::new(g))?;
    let err = session
        .run(
            &["ratio"],
            common::bindings(vec![
                ("i", TensorValue::scalar(0i32)),
                ("j", TensorValue::scalar(2i32)),
            ]),
        )
        .unwrap_err();
    match session_error(&err) {
        SessionError::KernelExecutionFailure { op, context, .. } => {
            assert_eq!(op, "bad");
            assert_eq!(context, "root/while@0");
        }
        other => panic!("unexpected error {:?}", other),
    }
    Ok(())
}

#[test]
fn invalid_graph_is_rejected_at_construction() -> Result<()> {
    let mut g = Graph::new();
    g.add_placeholder("x", DType::F32, &[2])?;
    g.add_ordinary("reads_ghost", "add", OpAttrs::none(), &["x", "ghost"], "out")?;
    let err = match Session::with_cpu(Arc::new(g)) {
        Ok(_) => panic!("graph with a dangling input was accepted"),
        Err(err) => err,
    };
    match session_error(&err) {
        SessionError::InvalidGraph { detail } => assert!(detail.contains("ghost")),
        other => panic!("unexpected error {:?}", other),
    }
    Ok(())
}

#[test]
fn second_call_reports_finished() -> Result<()> {
    let mut session = Session::with_cpu(Arc::new(boom_graph()?))?;
    assert!(session.run(&["boomed"], x_binding()?).is_err());
    let err = session.run(&["negated"], x_binding()?).unwrap_err();
    assert!(matches!(session_error(&err), SessionError::SessionFinished));

    let mut session = Session::with_cpu(Arc::new(boom_graph()?))?;
    session.run(&["negated"], x_binding()?)?;
    let err = session.run(&["negated"], x_binding()?).unwrap_err();
    assert!(matches!(session_error(&err), SessionError::SessionFinished));
    Ok(())
}

#[test]
fn precondition_errors_leave_session_usable() -> Result<()> {
    let mut session = Session::with_cpu(Arc::new(boom_graph()?))?;
    assert!(session.run(&["missing"], x_binding()?).is_err());
    assert!(session.run(&["negated"], HashMap::new()).is_err());
    assert_eq!(session.state(), ExecState::NotStarted);
    let outputs = session.run(&["negated"], x_binding()?)?;
    assert_eq!(outputs["negated"].as_tensor::<f32>()?.data, vec![-1.0, -2.0]);
    Ok(())
}
