//! Filter command - print a composed level filter.

use indoormap::filter::{filter_with_level, Filter};
use serde_json::Value;

use crate::error::CliError;

/// Compose the level filter for `level` over an optional JSON base filter.
pub fn compose(level: f64, show_empty: bool, base: Option<&str>) -> Result<Value, CliError> {
    let base = match base {
        Some(json) => {
            let value: Value = serde_json::from_str(json)?;
            Filter::from_json(&value)?
        }
        None => Filter::always(),
    };
    Ok(filter_with_level(&base, level, show_empty).to_json())
}

/// Run the filter command.
pub fn run(level: f64, show_empty: bool, base: Option<&str>) -> Result<(), CliError> {
    let filter = compose(level, show_empty, base)?;
    println!("{}", serde_json::to_string_pretty(&filter)?);
    Ok(())
}
