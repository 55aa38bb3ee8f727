use super::types::{Input, OpKind, Operation};

pub fn describe_op(op: &Operation) -> String {
    let inputs = format_inputs(&op.inputs);
    let outputs = op.outputs.join(",");
    match &op.kind {
        OpKind::Ordinary { op_type, .. } => {
            format!("op {}({}) >> {}", op_type, inputs, outputs)
        }
        OpKind::Switch => format!("switch {}({}) >> {}", op.name, inputs, outputs),
        OpKind::Merge => format!("merge {}({}) >> {}", op.name, inputs, outputs),
        OpKind::Enter {
            frame_name,
            is_constant,
        } => {
            if *is_constant {
                format!("enter {} const {} >> {}", frame_name, inputs, outputs)
            } else {
                format!("enter {} {} >> {}", frame_name, inputs, outputs)
            }
        }
        OpKind::Exit => format!("exit {} >> {}", inputs, outputs),
        OpKind::NextIteration => format!("next_iteration {} >> {}", inputs, outputs),
        OpKind::LoopCond => format!("loop_cond {} >> {}", inputs, outputs),
        OpKind::Identity => format!("identity {} >> {}", inputs, outputs),
    }
}

fn format_inputs(inputs: &[Input]) -> String {
    inputs
        .iter()
        .map(|input| {
            let base = match input.output_index {
                Some(index) => format!("{}:{}", input.var, index),
                None => input.var.clone(),
            };
            if input.control {
                format!("^{}", base)
            } else {
                base
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
