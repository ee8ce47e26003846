//! Inspect command - show what the selector would derive from a dataset.

use std::path::Path;

use geojson::GeoJson;
use indoormap::level::format_level;
use indoormap::IndoorMap;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the inspect command.
pub fn run(config_path: Option<&Path>, file: &Path) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("inspect");
    let options = runner.config().dataset.to_options()?;

    let map = IndoorMap::from_path(file, &options)?;
    let features = match map.geojson().as_ref() {
        GeoJson::FeatureCollection(fc) => fc.features.len(),
        GeoJson::Feature(_) => 1,
        GeoJson::Geometry(_) => 0,
    };
    let bounds = map.bounds();
    let range = map.level_range();

    println!("Dataset: {}", file.display());
    println!("  Features:      {}", features);
    println!("  Levels:        {} to {}", format_level(range.min), format_level(range.max));
    println!(
        "  Bounds:        {:.6},{:.6} to {:.6},{:.6} (lat,lon)",
        bounds.south(),
        bounds.west(),
        bounds.north(),
        bounds.east()
    );
    println!("  Start level:   {}", format_level(map.initial_level()));
    println!("  Layers:        {}", map.layers().len());
    if !map.layers_to_hide().is_empty() {
        println!("  Hides:         {}", map.layers_to_hide().join(", "));
    }

    Ok(())
}
