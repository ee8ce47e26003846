//! Layers command - list the bundled indoor layer set.

use indoormap::style::default_layers;

use crate::error::CliError;

/// Run the layers command.
pub fn run() -> Result<(), CliError> {
    let layers = default_layers()?;

    println!("Bundled indoor layers ({}), bottom to top", layers.len());
    println!("────────────────────────────────────────");
    for layer in &layers {
        let kind = serde_json::to_value(layer.layer_type)?;
        println!(
            "  {:<28} {}",
            layer.id,
            kind.as_str().unwrap_or_default()
        );
    }

    Ok(())
}
