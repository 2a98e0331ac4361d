//! Plain-text rendering of day summaries and heatmaps.

use chrono::NaiveDate;
use footfall_locate::heatmap::HeatmapGrid;
use footfall_locate::DaySummary;

pub fn print_summary(summary: &DaySummary, run_id: Option<&str>) {
    println!("Footfall — {}", summary.date);
    if let Some(ctx) = &summary.context {
        let holiday = if ctx.holiday { ", holiday" } else { "" };
        println!("{}{holiday}, {}", ctx.weekday, ctx.weather);
    }
    println!();
    println!(
        "Devices: {}  positions: {} ({} valid)",
        summary.devices, summary.positions, summary.valid_positions
    );
    for (platform, count) in &summary.platforms {
        println!("  {platform}: {count}");
    }

    let h = &summary.heatmap;
    println!(
        "Heatmap: total {}, max {}, {} active cells, mean {:.2}",
        h.total, h.max, h.active_cells, h.mean_active
    );
    for (window, stats) in &summary.windows {
        println!(
            "  {window:<10} total {:>8}  max {:>6}  active {:>6}",
            stats.total, stats.max, stats.active_cells
        );
    }

    if !summary.zones.is_empty() {
        println!("Zones:");
        for z in &summary.zones {
            println!("  {:<20} {:>6} devices {:>8} samples", z.zone, z.devices, z.samples);
        }
    }

    if let Some(peak) = &summary.peak_occupancy {
        println!("Peak: {} devices at {}", peak.devices, peak.timestamp);
    }

    if !summary.zone_visitors.is_empty() {
        println!("Visitors (qualified / seen, mean dwell):");
        for v in &summary.zone_visitors {
            println!(
                "  {:<20} {:>6} / {:<6} {:>6.1} min",
                v.zone, v.qualified, v.devices, v.avg_dwell_minutes
            );
        }
    }

    if !summary.transitions.is_empty() {
        println!("Top transitions:");
        for t in summary.transitions.iter().take(10) {
            println!("  {} -> {}: {}", t.from, t.to, t.count);
        }
    }

    if !summary.warnings.is_empty() {
        println!("Warnings:");
        for (kind, count) in &summary.warnings {
            println!("  {kind}: {count}");
        }
    }

    match run_id {
        Some(id) => println!("\nSaved as run {id}"),
        None => println!("\nNot saved"),
    }
}

pub fn print_heatmap(date: NaiveDate, label: &str, grid: &HeatmapGrid, top: usize) {
    let stats = grid.stats();
    let (w, h, cell) = grid.shape();
    println!("Heatmap {date} ({label}): {w}x{h} cells of {cell}px");
    println!(
        "total {}, max {}, {} active cells, mean {:.2}",
        stats.total, stats.max, stats.active_cells, stats.mean_active
    );
    if stats.total == 0 {
        return;
    }
    println!();
    println!("{:>4}  {:>6} {:>6}  {:>8}", "#", "x", "y", "value");
    for (i, spot) in grid.hotspots(top).iter().enumerate() {
        println!(
            "{:>4}  {:>6} {:>6}  {:>8}",
            i + 1,
            spot.col * cell as usize,
            spot.row * cell as usize,
            spot.value
        );
    }
}
