//! Debug script: print each criterion's rule table and an ASCII class map
//! of the synthetic Kenya layers.

use banana_suitability::boundary::Boundary;
use banana_suitability::clip::PolygonClipper;
use banana_suitability::criteria::default_criteria;
use banana_suitability::providers::{Clipper, DataProvider};
use banana_suitability::reclassify::reclassify;
use banana_suitability::synthetic::{SyntheticParams, SyntheticProvider};
use banana_suitability::zonal::summarize;

fn class_char(class: Option<u8>) -> char {
    match class {
        Some(1) => '1',
        Some(2) => '2',
        Some(3) => '3',
        Some(4) => '4',
        Some(_) => '?',
        None => ' ',
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let width = 64;
    let height = 72;
    let seed = std::env::args()
        .nth(1)
        .map(|s| s.parse::<u64>())
        .transpose()?
        .unwrap_or(12345);

    let provider = SyntheticProvider::new(SyntheticParams {
        width,
        height,
        seed,
        extent: None,
    });
    let kenya = Boundary::kenya();

    println!("=== SUITABILITY CLASS DEBUG MAPS ({}x{}) seed={} ===", width, height, seed);
    println!("LEGEND: 1 = Unsuitable  2 = Marginal  3 = Moderate  4 = Highly suitable");

    for criterion in default_criteria() {
        println!();
        println!("--- {} ({}) ---", criterion.name, criterion.rule.unit());
        for (label, class) in criterion.rule.interval_labels() {
            println!("  {:<16} -> {}", label, class);
        }

        let raw = provider.fetch(&criterion.request)?;
        if let Some((min, max)) = raw.value_range() {
            println!("  source range: {:.1} to {:.1} {}", min, max, raw.unit);
        }
        let clipped = PolygonClipper.clip(&raw, &kenya)?;
        let classified = reclassify(&clipped, &criterion.rule, &criterion.name)?;
        let stats = summarize(&classified, &kenya, 1000.0)?;
        println!("  {}: {}", criterion.stats_label, stats);

        for y in 0..classified.height() {
            let row: String = (0..classified.width())
                .map(|x| class_char(classified.class_at(x, y)))
                .collect();
            println!("  |{}|", row);
        }
    }

    Ok(())
}
