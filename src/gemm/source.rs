//! Kernel-source module for one canonical GEMM descriptor.
//!
//! The module is the two generated headers, the descriptor baked in as
//! `constant` declarations and type aliases, then the caller's kernel body.
//! The body (tiling, main loop) is owned by the caller; it only relies on
//! the names declared here.

use std::fmt::Write;

use crate::codegen::{create_simdgroup_event, create_simdgroup_matrix_storage};
use crate::gemm::descriptor::GemmKey;

/// Kernel body and entry point appended after the generated prelude.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GemmSourceOptions {
    /// Metal source of the GEMM kernel itself.
    pub kernel_body: String,
    /// Name of the `kernel` function the pipeline is built from.
    pub entry_point: String,
}

impl GemmSourceOptions {
    pub fn new(kernel_body: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            kernel_body: kernel_body.into(),
            entry_point: entry_point.into(),
        }
    }
}

impl Default for GemmSourceOptions {
    fn default() -> Self {
        Self {
            kernel_body: String::new(),
            entry_point: "gemm".to_string(),
        }
    }
}

/// Declarations specializing the kernel body to `key`.
pub fn create_specialization(key: &GemmKey) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "constant uint M = {};", key.m);
    let _ = writeln!(out, "constant uint N = {};", key.n);
    let _ = writeln!(out, "constant uint K = {};", key.k);
    let _ = writeln!(out, "constant uint A_leading_dimension = {};", key.leading_dimensions.a);
    let _ = writeln!(out, "constant uint B_leading_dimension = {};", key.leading_dimensions.b);
    let _ = writeln!(out, "constant uint C_leading_dimension = {};", key.leading_dimensions.c);
    let _ = writeln!(out, "constant bool A_trans = {};", key.transpose.a);
    let _ = writeln!(out, "constant bool B_trans = {};", key.transpose.b);
    let _ = writeln!(out, "constant bool C_trans = {};", key.transpose.c);
    let _ = writeln!(out, "constant bool load_previous_C = {};", key.load_previous_c);
    out.push('\n');

    for (operand, precision) in [("A", key.precisions.a), ("B", key.precisions.b), ("C", key.precisions.c)] {
        let _ = writeln!(out, "typedef {} memory_name_{operand};", precision.metal_type());
        let _ = writeln!(out, "typedef {} register_name_{operand};", precision.register_type());
        let _ = writeln!(
            out,
            "constant bool {operand}_decodes_bfloat = {};",
            precision.decodes_bf16()
        );
    }
    out
}

/// Complete Metal module for `key`.
pub fn create_gemm_source(key: &GemmKey, options: &GemmSourceOptions) -> String {
    let mut source = String::new();
    let _ = writeln!(source, "// {key}");
    source.push_str("#include <metal_stdlib>\n");
    source.push_str(&create_simdgroup_event());
    source.push_str(&create_simdgroup_matrix_storage());
    source.push_str("using namespace metal;\n\n");
    source.push_str(&create_specialization(key));
    source.push('\n');
    source.push_str(&options.kernel_body);
    if !source.ends_with('\n') {
        source.push('\n');
    }

    log::debug!(
        "assembled source for {key}: {} bytes, entry point '{}'",
        source.len(),
        options.entry_point
    );
    source
}
