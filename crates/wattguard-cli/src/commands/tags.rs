//! Tag catalog command

use anyhow::Result;
use wattguard_core::share::format_weight;
use wattguard_core::{SplitConfig, WeightTable};

pub fn cmd_tags(config: &SplitConfig) -> Result<()> {
    let table = WeightTable::from_config(config);

    println!("Usage tags:");
    println!();
    for entry in table.catalog_entries() {
        println!("  {:<20} {:>5}", entry.name, format_weight(entry.weight));
    }
    println!();
    println!(
        "Any other tag counts as {} (custom).",
        format_weight(table.custom_weight())
    );
    println!("Minimum ratio per person: {}", config.params.ratio_floor);

    Ok(())
}
