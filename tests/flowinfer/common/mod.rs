#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use flowinfer::{
    CpuBackend, DType, Graph, Input, KernelDispatcher, OpAttrs, OpKind, Tensor, TensorValue,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Wraps the CPU backend and counts calls per op type.
#[derive(Debug, Default)]
pub struct CountingDispatcher {
    inner: CpuBackend,
    calls: Mutex<HashMap<String, usize>>,
}

impl CountingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self, op_type: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(op_type).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }
}

impl KernelDispatcher for CountingDispatcher {
    fn invoke(
        &self,
        op_type: &str,
        attrs: &OpAttrs,
        inputs: &[&TensorValue],
    ) -> Result<Vec<TensorValue>> {
        {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| anyhow!("call counter poisoned"))?;
            *calls.entry(op_type.to_string()).or_insert(0) += 1;
        }
        self.inner.invoke(op_type, attrs, inputs)
    }
}

/// Dispatcher whose `boom` kernel always fails; everything else goes to the CPU backend.
#[derive(Debug, Default)]
pub struct FailingDispatcher {
    inner: CpuBackend,
}

impl KernelDispatcher for FailingDispatcher {
    fn invoke(
        &self,
        op_type: &str,
        attrs: &OpAttrs,
        inputs: &[&TensorValue],
    ) -> Result<Vec<TensorValue>> {
        if op_type == "boom" {
            return Err(anyhow!("boom kernel exploded"));
        }
        self.inner.invoke(op_type, attrs, inputs)
    }
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn random_f32(rng: &mut StdRng, shape: &[usize]) -> Result<TensorValue> {
    let len = shape.iter().product();
    let data: Vec<f32> = (0..len).map(|_| rng.gen_range(-4.0f32..4.0)).collect();
    Ok(TensorValue::F32(Tensor::with_shape(data, shape)?))
}

pub fn f32_tensor(data: Vec<f32>, shape: &[usize]) -> Result<TensorValue> {
    Ok(TensorValue::F32(Tensor::with_shape(data, shape)?))
}

pub fn bindings(pairs: Vec<(&str, TensorValue)>) -> HashMap<String, TensorValue> {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

pub fn assert_tensor_close(actual: &TensorValue, expected: &TensorValue, tol: f32) -> Result<()> {
    if actual.dtype() != expected.dtype() {
        return Err(anyhow!(
            "dtype mismatch: actual {} expected {}",
            actual.dtype(),
            expected.dtype()
        ));
    }
    if actual.shape() != expected.shape() {
        return Err(anyhow!(
            "shape mismatch: actual {:?} expected {:?}",
            actual.shape(),
            expected.shape()
        ));
    }
    match (actual, expected) {
        (TensorValue::F32(a), TensorValue::F32(e)) => {
            for (idx, (x, y)) in a.data.iter().zip(e.data.iter()).enumerate() {
                if (x - y).abs() > tol {
                    return Err(anyhow!("mismatch at {}: actual {} expected {}", idx, x, y));
                }
            }
            Ok(())
        }
        _ if actual == expected => Ok(()),
        _ => Err(anyhow!("values differ: {:?} vs {:?}", actual, expected)),
    }
}

/// x[3,4] + y[1,4] -> a; a @ w -> b; a - y -> c (never needed by d); a + b -> d.
pub fn add_mmul_sub_graph() -> Result<Graph> {
    let mut g = Graph::new();
    g.add_placeholder("x", DType::F32, &[3, 4])?;
    g.add_placeholder("y", DType::F32, &[1, 4])?;
    g.add_placeholder("w", DType::F32, &[4, 4])?;
    g.add_ordinary("a", "add", OpAttrs::none(), &["x", "y"], "a")?;
    g.add_ordinary("b", "mmul", OpAttrs::none(), &["a", "w"], "b")?;
    g.add_ordinary("c", "sub", OpAttrs::none(), &["a", "y"], "c")?;
    g.add_ordinary("d", "add", OpAttrs::none(), &["a", "b"], "d")?;
    Ok(g)
}

/// switch(x, pred): false branch adds 1, true branch adds 10, merged into `out`.
pub fn switch_graph() -> Result<Graph> {
    let mut g = Graph::new();
    g.add_placeholder("x", DType::F32, &[3])?;
    g.add_placeholder("pred", DType::Bool, &[])?;
    g.add_constant("one", TensorValue::scalar(1.0f32))?;
    g.add_constant("ten", TensorValue::scalar(10.0f32))?;
    g.add_switch("switch", "x", "pred", ("x_false", "x_true"))?;
    g.add_ordinary("add_false", "add", OpAttrs::none(), &["x_false", "one"], "plus_one")?;
    g.add_ordinary("add_true", "add", OpAttrs::none(), &["x_true", "ten"], "plus_ten")?;
    g.add_merge("merge", &["plus_one", "plus_ten"], "merged")?;
    g.add_identity("out", "merged", "out")?;
    Ok(g)
}

/// while (i < j) { i = i + 1 } with j carried through unchanged.
///
/// Exits are `exit_i` and `exit_j`; `one` enters the loop as a constant.
pub fn while_graph() -> Result<Graph> {
    let mut g = Graph::new();
    g.add_placeholder("i", DType::I32, &[])?;
    g.add_placeholder("j", DType::I32, &[])?;
    g.add_constant("one", TensorValue::scalar(1i32))?;

    g.add_enter("enter_i", "i", "while", false, "i_in")?;
    g.add_enter("enter_j", "j", "while", false, "j_in")?;
    g.add_enter("enter_one", "one", "while", true, "one_in")?;
    g.add_merge("merge_i", &["i_in", "i_next"], "i_cur")?;
    g.add_merge("merge_j", &["j_in", "j_next"], "j_cur")?;
    g.add_ordinary("less", "less", OpAttrs::none(), &["i_cur", "j_cur"], "keep_going")?;
    g.add_loop_cond("cond", "keep_going", "cond")?;
    g.add_switch("switch_i", "i_cur", "cond", ("i_done", "i_body"))?;
    g.add_switch("switch_j", "j_cur", "cond", ("j_done", "j_body"))?;
    g.add_exit("exit_i", "i_done", "exit_i")?;
    g.add_exit("exit_j", "j_done", "exit_j")?;
    g.add_ordinary("inc_i", "add", OpAttrs::none(), &["i_body", "one_in"], "i_inc")?;
    g.add_identity("keep_j", "j_body", "j_keep")?;
    g.add_next_iteration("next_i", "i_inc", "i_next")?;
    g.add_next_iteration("next_j", "j_keep", "j_next")?;
    Ok(g)
}

/// Outer loop runs `n` times; each outer iteration enters a fresh inner loop
/// that adds 1 to `acc` `m` times. `acc_out` ends at `acc + n * m`.
pub fn nested_loop_graph() -> Result<Graph> {
    let mut g = Graph::new();
    g.add_placeholder("n", DType::I32, &[])?;
    g.add_placeholder("m", DType::I32, &[])?;
    g.add_placeholder("acc", DType::I32, &[])?;
    g.add_constant("zero", TensorValue::scalar(0i32))?;
    g.add_constant("one", TensorValue::scalar(1i32))?;

    g.add_enter("enter_i", "zero", "outer", false, "i_in")?;
    g.add_enter("enter_acc", "acc", "outer", false, "acc_in")?;
    g.add_enter("enter_n", "n", "outer", true, "n_in")?;
    g.add_enter("enter_one_outer", "one", "outer", true, "one_outer")?;
    g.add_merge("merge_i", &["i_in", "i_next"], "i_cur")?;
    g.add_merge("merge_acc", &["acc_in", "acc_next"], "acc_cur")?;
    g.add_ordinary("outer_less", "less", OpAttrs::none(), &["i_cur", "n_in"], "outer_go")?;
    g.add_loop_cond("outer_cond", "outer_go", "outer_cond")?;
    g.add_switch("switch_i", "i_cur", "outer_cond", ("i_done", "i_body"))?;
    g.add_switch("switch_acc", "acc_cur", "outer_cond", ("acc_done", "acc_body"))?;
    g.add_exit("exit_i", "i_done", "i_out")?;
    g.add_exit("exit_acc", "acc_done", "acc_out")?;
    g.add_identity("outer_pivot", "i_body", "outer_pivot")?;
    g.add_ordinary("inc_i", "add", OpAttrs::none(), &["outer_pivot", "one_outer"], "i_inc")?;

    // Inner loop: entered once per live outer iteration, keyed off the pivot.
    let pivot = Input::control("outer_pivot");
    g.add_op(
        "enter_k",
        OpKind::Enter {
            frame_name: "inner".to_string(),
            is_constant: false,
        },
        vec![Input::data("zero"), pivot.clone()],
        &["k_in"],
    )?;
    g.add_op(
        "enter_m",
        OpKind::Enter {
            frame_name: "inner".to_string(),
            is_constant: true,
        },
        vec![Input::data("m"), pivot.clone()],
        &["m_in"],
    )?;
    g.add_op(
        "enter_one_inner",
        OpKind::Enter {
            frame_name: "inner".to_string(),
            is_constant: true,
        },
        vec![Input::data("one"), pivot],
        &["one_inner"],
    )?;
    g.add_enter("enter_inner_acc", "acc_body", "inner", false, "inner_acc_in")?;
    g.add_merge("merge_k", &["k_in", "k_next"], "k_cur")?;
    g.add_merge("merge_inner_acc", &["inner_acc_in", "inner_acc_next"], "inner_acc_cur")?;
    g.add_ordinary("inner_less", "less", OpAttrs::none(), &["k_cur", "m_in"], "inner_go")?;
    g.add_loop_cond("inner_cond", "inner_go", "inner_cond")?;
    g.add_switch("switch_k", "k_cur", "inner_cond", ("k_done", "k_body"))?;
    g.add_switch(
        "switch_inner_acc",
        "inner_acc_cur",
        "inner_cond",
        ("inner_acc_done", "inner_acc_body"),
    )?;
    g.add_exit("exit_inner_acc", "inner_acc_done", "inner_acc_out")?;
    g.add_ordinary("inc_k", "add", OpAttrs::none(), &["k_body", "one_inner"], "k_inc")?;
    g.add_ordinary(
        "inc_inner_acc",
        "add",
        OpAttrs::none(),
        &["inner_acc_body", "one_inner"],
        "inner_acc_inc",
    )?;
    g.add_next_iteration("next_k", "k_inc", "k_next")?;
    g.add_next_iteration("next_inner_acc", "inner_acc_inc", "inner_acc_next")?;

    g.add_next_iteration("next_i", "i_inc", "i_next")?;
    g.add_next_iteration("next_acc", "inner_acc_out", "acc_next")?;
    Ok(g)
}

pub fn i32_scalar(value: &TensorValue) -> Result<i32> {
    let tensor = value.as_tensor::<i32>()?;
    tensor
        .data
        .first()
        .copied()
        .ok_or_else(|| anyhow!("empty tensor"))
}
