/// Build the placeholder binding map for [`Session::output`](crate::Session::output).
///
/// ```
/// use flowinfer::{bindings, Tensor};
///
/// let inputs = bindings! {
///     x: Tensor::from_vec(vec![1.0f32, 2.0]).unwrap(),
///     y: Tensor::from_scalar(3.0f32),
/// };
/// assert_eq!(inputs.len(), 2);
/// ```
#[macro_export]
macro_rules! bindings {
    { $($name:ident : $value:expr),* $(,)? } => {{
        let mut map: ::std::collections::HashMap<String, $crate::TensorValue> =
            ::std::collections::HashMap::new();
        $( map.insert(stringify!($name).to_string(), $crate::TensorValue::from($value)); )*
        map
    }};
}

/// Pull typed tensors out of an output map, binding each to a local of the
/// same name. Panics when a name is missing or has a different dtype.
#[macro_export]
macro_rules! fetch_outputs {
    ($outputs:expr, { $($name:ident : $ty:ty),* $(,)? }) => {
        $(
            let $name: $ty = $crate::fetch_outputs!(@one $outputs, $name, $ty)
                .unwrap_or_else(|err| {
                    panic!("fetch_outputs failed for {}: {}", stringify!($name), err)
                });
        )*
    };
    (@one $outputs:expr, $name:ident, $ty:ty) => {
        $outputs
            .get(stringify!($name))
            .ok_or_else(|| $crate::__anyhow::anyhow!("output {} not present", stringify!($name)))
            .and_then(|value: &$crate::TensorValue| <$ty>::try_from(value))
    };
}

/// Fallible form of [`fetch_outputs!`] for a single name.
#[macro_export]
macro_rules! try_fetch_output {
    ($outputs:expr, $name:expr, $ty:ty) => {
        $outputs
            .get($name)
            .ok_or_else(|| $crate::__anyhow::anyhow!("output {} not present", $name))
            .and_then(|value: &$crate::TensorValue| <$ty>::try_from(value))
    };
}
