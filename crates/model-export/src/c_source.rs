//! C Sources for the Helmet Firmware
//!
//! The firmware scales features with the MinMax bounds from
//! `feature_indices.h` and classifies with the nested conditionals of
//! `classifier_tree.c`.

use crate::ExportError;
use event_window::EventLabel;
use forest_trainer::TreeRule;
use std::fmt::Write;

/// Render `feature_indices.h`
pub fn render_feature_header(
    feature_names: &[String],
    classes: &[EventLabel],
    feature_min: &[f64],
    feature_max: &[f64],
) -> Result<String, ExportError> {
    let n = feature_names.len();
    for len in [feature_min.len(), feature_max.len()] {
        if len != n {
            return Err(ExportError::LengthMismatch {
                expected: n,
                actual: len,
            });
        }
    }

    let class_defines = classes
        .iter()
        .enumerate()
        .map(|(i, c)| format!("#define CLASS_{} {}", c.as_str().to_ascii_uppercase(), i))
        .collect::<Vec<_>>()
        .join("\n");
    let floats = |values: &[f64]| {
        values
            .iter()
            .map(|v| format!("{:.6}f", v))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let names = feature_names
        .iter()
        .map(|name| format!("    \"{}\"", name))
        .collect::<Vec<_>>()
        .join(",\n");

    Ok(format!(
        "\n// Feature indices for ESP32 classifier\n\
         // Generated automatically from training script\n\
         \n\
         #ifndef FEATURE_INDICES_H\n\
         #define FEATURE_INDICES_H\n\
         \n\
         // Number of features\n\
         #define N_FEATURES {n}\n\
         \n\
         // Class definitions\n\
         {class_defines}\n\
         \n\
         // Feature scaling parameters (MinMax)\n\
         const float FEATURE_MIN[{n}] = {{{min}}};\n\
         const float FEATURE_MAX[{n}] = {{{max}}};\n\
         \n\
         // Feature names (for debugging)\n\
         const char* FEATURE_NAMES[{n}] = {{\n\
         {names}\n\
         }};\n\
         \n\
         #endif\n",
        n = n,
        class_defines = class_defines,
        min = floats(feature_min),
        max = floats(feature_max),
        names = names,
    ))
}

/// Render `classifier_tree.c`
pub fn render_tree_source(rules: &TreeRule, classes: &[EventLabel], accuracy: f64) -> String {
    let mut out = String::new();
    out.push_str("// Auto-generated decision tree classifier\n");
    let _ = writeln!(out, "// Accuracy: {:.4}", accuracy);
    out.push('\n');
    out.push_str("int classify_event(float* features) {\n");
    render_node(rules, classes, 1, &mut out);
    out.push_str("}\n");
    out
}

fn render_node(node: &TreeRule, classes: &[EventLabel], depth: usize, out: &mut String) {
    let indent = "    ".repeat(depth);
    match node {
        TreeRule::Leaf { class } => {
            let name = classes.get(*class).map(|c| c.as_str()).unwrap_or("unknown");
            let _ = writeln!(out, "{}return {}; // {}", indent, class, name);
        }
        TreeRule::Split {
            feature,
            threshold,
            left,
            right,
            ..
        } => {
            let _ = writeln!(out, "{}if (features[{}] < {:.6}f) {{", indent, feature, threshold);
            render_node(left, classes, depth + 1, out);
            let _ = writeln!(out, "{}}} else {{", indent);
            render_node(right, classes, depth + 1, out);
            let _ = writeln!(out, "{}}}", indent);
        }
    }
}
