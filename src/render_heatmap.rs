use crate::conservation::ConservationProfile;
use anyhow::{Result, anyhow};
use resvg::{tiny_skia, usvg};
use std::fs;
use svg::Document;
use svg::node::element::{Rectangle, Text};

const W: f32 = 1600.0;
const HEATMAP_H: f32 = 640.0;
const STRIP_H: f32 = 200.0;
const MARGIN_LEFT: f32 = 100.0;
const MARGIN_RIGHT: f32 = 160.0;
const MARGIN_TOP: f32 = 60.0;
const MARGIN_BOTTOM: f32 = 80.0;
const CELL_STROKE: &str = "#808080";
const COLORBAR_W: f32 = 24.0;
const COLORBAR_STEPS: usize = 64;
const MIN_TICK_SPACING: f32 = 14.0;

// White-to-blue ramp endpoints
const RAMP_LOW: (f64, f64, f64) = (247.0, 251.0, 255.0);
const RAMP_HIGH: (f64, f64, f64) = (8.0, 48.0, 107.0);

fn ramp_color(value: f64) -> String {
    let v = value.clamp(0.0, 1.0);
    let channel = |from: f64, to: f64| (from + (to - from) * v).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        channel(RAMP_LOW.0, RAMP_HIGH.0),
        channel(RAMP_LOW.1, RAMP_HIGH.1),
        channel(RAMP_LOW.2, RAMP_HIGH.2)
    )
}

// Every n-th position gets a tick label, at least MIN_TICK_SPACING apart
fn tick_step(cell_w: f32) -> usize {
    ((MIN_TICK_SPACING / cell_w).ceil() as usize).max(1)
}

fn render_matrix(
    rows: &[Vec<f64>],
    row_labels: &[String],
    y_label: &str,
    positions: &[usize],
    height: f32,
    title: &str,
    colorbar_label: &str,
) -> Document {
    let n_columns = positions.len();
    let plot_left = MARGIN_LEFT;
    let plot_right = W - MARGIN_RIGHT;
    let plot_top = MARGIN_TOP;
    let plot_bottom = height - MARGIN_BOTTOM;
    let cell_w = (plot_right - plot_left) / n_columns.max(1) as f32;
    let cell_h = (plot_bottom - plot_top) / rows.len().max(1) as f32;

    let mut doc = Document::new()
        .set("viewBox", (0, 0, W, height))
        .set("width", W)
        .set("height", height)
        .add(
            Rectangle::new()
                .set("x", 0)
                .set("y", 0)
                .set("width", W)
                .set("height", height)
                .set("fill", "#ffffff"),
        );

    doc = doc.add(
        Text::new(title)
            .set("x", (plot_left + plot_right) / 2.0)
            .set("y", MARGIN_TOP - 24.0)
            .set("text-anchor", "middle")
            .set("font-family", "Helvetica, Arial, sans-serif")
            .set("font-size", 16)
            .set("fill", "#111111"),
    );

    for (r, row) in rows.iter().enumerate() {
        let y = plot_top + r as f32 * cell_h;
        for (c, value) in row.iter().enumerate() {
            let x = plot_left + c as f32 * cell_w;
            doc = doc.add(
                Rectangle::new()
                    .set("x", x)
                    .set("y", y)
                    .set("width", cell_w)
                    .set("height", cell_h)
                    .set("fill", ramp_color(*value))
                    .set("stroke", CELL_STROKE)
                    .set("stroke-width", 0.5),
            );
        }
        doc = doc.add(
            Text::new(row_labels[r].clone())
                .set("x", plot_left - 8.0)
                .set("y", y + cell_h / 2.0)
                .set("text-anchor", "end")
                .set("dominant-baseline", "middle")
                .set("font-family", "monospace")
                .set("font-size", 12)
                .set("fill", "#111111"),
        );
    }

    let step = tick_step(cell_w);
    for (c, position) in positions.iter().enumerate() {
        if c % step != 0 {
            continue;
        }
        doc = doc.add(
            Text::new(position.to_string())
                .set("x", plot_left + (c as f32 + 0.5) * cell_w)
                .set("y", plot_bottom + 16.0)
                .set("text-anchor", "middle")
                .set("font-family", "monospace")
                .set("font-size", 10)
                .set("fill", "#222222"),
        );
    }

    doc = doc.add(
        Text::new("Position i")
            .set("x", (plot_left + plot_right) / 2.0)
            .set("y", height - 24.0)
            .set("text-anchor", "middle")
            .set("font-family", "Helvetica, Arial, sans-serif")
            .set("font-size", 14)
            .set("fill", "#111111"),
    );
    if !y_label.is_empty() {
        doc = doc.add(
            Text::new(y_label)
                .set("x", 16)
                .set("y", MARGIN_TOP - 8.0)
                .set("font-family", "Helvetica, Arial, sans-serif")
                .set("font-size", 14)
                .set("fill", "#111111"),
        );
    }

    // Colorbar, value 1 at the top
    let bar_left = plot_right + 40.0;
    let bar_step_h = (plot_bottom - plot_top) / COLORBAR_STEPS as f32;
    for i in 0..COLORBAR_STEPS {
        let value = 1.0 - i as f64 / (COLORBAR_STEPS - 1) as f64;
        doc = doc.add(
            Rectangle::new()
                .set("x", bar_left)
                .set("y", plot_top + i as f32 * bar_step_h)
                .set("width", COLORBAR_W)
                .set("height", bar_step_h + 0.5)
                .set("fill", ramp_color(value)),
        );
    }
    doc = doc.add(
        Rectangle::new()
            .set("x", bar_left)
            .set("y", plot_top)
            .set("width", COLORBAR_W)
            .set("height", plot_bottom - plot_top)
            .set("fill", "none")
            .set("stroke", CELL_STROKE)
            .set("stroke-width", 0.5),
    );
    for (value, y) in [("1.0", plot_top), ("0.0", plot_bottom)] {
        doc = doc.add(
            Text::new(value)
                .set("x", bar_left + COLORBAR_W + 6.0)
                .set("y", y)
                .set("dominant-baseline", "middle")
                .set("font-family", "monospace")
                .set("font-size", 10)
                .set("fill", "#222222"),
        );
    }
    doc.add(
        Text::new(colorbar_label)
            .set("x", bar_left + COLORBAR_W / 2.0)
            .set("y", plot_bottom + 20.0)
            .set("text-anchor", "middle")
            .set("font-family", "Helvetica, Arial, sans-serif")
            .set("font-size", 11)
            .set("fill", "#111111"),
    )
}

/// Residue-by-position grid of frequencies, gap row first, like the CSV
/// column order.
pub fn export_heatmap_svg(profile: &ConservationProfile) -> String {
    render_matrix(
        &profile.frequency_matrix(),
        &ConservationProfile::residue_labels(),
        "Residue",
        &profile.positions(),
        HEATMAP_H,
        "Conservation Score",
        "Score",
    )
    .to_string()
}

/// Single-row strip of the per-position conservation scores.
pub fn export_strip_svg(profile: &ConservationProfile) -> String {
    render_matrix(
        &[profile.conservation_row()],
        &["Conservation".to_string()],
        "",
        &profile.positions(),
        STRIP_H,
        "Conservation Score",
        "Conservation Score",
    )
    .to_string()
}

/// Writes the SVG to `filename`; a `.png` path gets rasterized instead.
pub fn write_visual(svg_text: &str, filename: &str) -> Result<()> {
    if filename.ends_with(".png") {
        write_png(svg_text, filename)
    } else {
        fs::write(filename, svg_text)?;
        Ok(())
    }
}

fn write_png(svg_text: &str, filename: &str) -> Result<()> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg_text, &options)?;
    let size = tree.size().to_int_size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height()).ok_or_else(|| {
        anyhow!(
            "Could not allocate a {}x{} pixmap",
            size.width(),
            size.height()
        )
    })?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
    pixmap.save_png(filename)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{alignment::Alignment, conservation::AnalyzerSettings};

    fn demo_profile() -> ConservationProfile {
        let alignment = Alignment::from_fasta_file("test_files/demo_msa.a2m").unwrap();
        ConservationProfile::new_from_alignment(&alignment, &AnalyzerSettings::default())
    }

    #[test]
    fn test_ramp_endpoints() {
        assert_eq!(ramp_color(0.0), "#f7fbff");
        assert_eq!(ramp_color(1.0), "#08306b");
        assert_eq!(ramp_color(-0.5), "#f7fbff");
        assert_eq!(ramp_color(1.5), "#08306b");
    }

    #[test]
    fn test_tick_step() {
        assert_eq!(tick_step(20.0), 1);
        assert_eq!(tick_step(7.0), 2);
        assert_eq!(tick_step(1.0), 14);
    }

    #[test]
    fn test_heatmap_svg_content() {
        let svg = export_heatmap_svg(&demo_profile());
        assert!(svg.contains("Conservation Score"));
        assert!(svg.contains("Position i"));
        assert!(svg.contains("Residue"));
        // Column 1 is 100% A; its cell carries the top of the ramp
        assert!(svg.contains("#08306b"));
        // One rect per matrix cell, at least
        assert!(svg.matches("<rect").count() >= 21 * 8);
    }

    #[test]
    fn test_strip_svg_content() {
        let svg = export_strip_svg(&demo_profile());
        assert!(svg.contains("Conservation Score"));
        assert!(!svg.contains("Residue"));
        // A single matrix row plus colorbar and background
        assert!(svg.matches("<rect").count() < 21 * 8);
    }

    #[test]
    fn test_write_visual_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heatmap.svg");
        let svg = export_heatmap_svg(&demo_profile());
        write_visual(&svg, path.to_str().unwrap()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, svg);
    }

    #[test]
    fn test_write_visual_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heatmap.png");
        let svg = export_strip_svg(&demo_profile());
        write_visual(&svg, path.to_str().unwrap()).unwrap();
        let written = std::fs::read(&path).unwrap();
        assert!(written.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
