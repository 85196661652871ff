//! Conversion of downloaded source models to GGUF, and quantization.
//!
//! Both steps delegate to the external llama.cpp toolchain through a
//! [`ToolRunner`](crate::toolchain::ToolRunner).

pub mod architecture;
mod converter;
mod quantize;

pub use converter::{ConversionJob, FormatConverter};
pub use quantize::{
    is_known_quant, quantized_output_path, QuantizationJob, Quantizer, KNOWN_QUANTS,
};
