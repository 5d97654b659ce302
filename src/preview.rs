use anyhow::{Context, Result};
use std::path::Path;

use crate::benchmark::load_input_data;

/// One-shot inspection of an input payload file: element count, value range,
/// and an optional check that the flat array factors into a tensor shape.
pub fn preview(path: &Path, shape: Option<&str>) -> Result<()> {
    let data = load_input_data(path)?;

    let (min, max) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });

    println!(
        "{}: {} values, range [{:.4}, {:.4}]",
        path.display(),
        data.len(),
        min,
        max
    );

    if let Some(shape) = shape {
        let dims = parse_shape(shape)?;
        let expected: usize = dims.iter().product();
        if expected != data.len() {
            anyhow::bail!(
                "shape {:?} holds {} values but {} has {}",
                dims,
                expected,
                path.display(),
                data.len()
            );
        }
        println!("reshapes to {:?}", dims);
    }

    Ok(())
}

fn parse_shape(shape: &str) -> Result<Vec<usize>> {
    shape
        .split(',')
        .map(|dim| {
            dim.trim()
                .parse::<usize>()
                .with_context(|| format!("invalid shape dimension {:?}", dim))
        })
        .collect()
}
