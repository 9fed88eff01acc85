//! Model loading utilities for safetensors format.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use safetensors::SafeTensors;
use tracing::debug;

/// Reads a safetensors file into a `VarBuilder` on `device`.
///
/// Half-precision and integer tensors are kept in their stored dtype; the
/// builder converts on access.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid safetensors, or
/// holds a dtype candle does not support.
pub fn load_safetensors(path: impl AsRef<Path>, device: &Device) -> Result<VarBuilder<'static>> {
    let path = path.as_ref();
    debug!("Loading weights from {}", path.display());

    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read model file: {}", path.display()))?;
    let tensors = SafeTensors::deserialize(&data)
        .with_context(|| format!("Failed to parse safetensors: {}", path.display()))?;

    let tensor_map = tensors
        .tensors()
        .into_iter()
        .map(|(name, view)| {
            let dtype = candle_dtype(view.dtype())?;
            let tensor = Tensor::from_raw_buffer(view.data(), dtype, view.shape(), device)
                .with_context(|| format!("Failed to create tensor '{name}'"))?;
            Ok((name, tensor))
        })
        .collect::<Result<HashMap<String, Tensor>>>()?;

    debug!(tensors = tensor_map.len(), "Weights loaded");
    Ok(VarBuilder::from_tensors(tensor_map, DType::F32, device))
}

fn candle_dtype(dtype: safetensors::Dtype) -> Result<DType> {
    use safetensors::Dtype as S;
    match dtype {
        S::F32 => Ok(DType::F32),
        S::F64 => Ok(DType::F64),
        S::F16 => Ok(DType::F16),
        S::BF16 => Ok(DType::BF16),
        S::I64 => Ok(DType::I64),
        S::U8 => Ok(DType::U8),
        S::U32 => Ok(DType::U32),
        other => anyhow::bail!("Unsupported weight dtype: {other:?}"),
    }
}
