use conserv::{
    alignment::Alignment,
    conservation::{AnalyzerSettings, ConservationProfile},
    render_heatmap::{export_heatmap_svg, export_strip_svg, write_visual},
    table,
};
use serde::Serialize;
use std::env;

const PREVIEW_ROWS: usize = 5;

#[derive(Serialize)]
struct MsaSummary {
    sequences: usize,
    columns: usize,
    mean_conservation: f64,
    unrecognized_symbols: usize,
}

fn usage() {
    eprintln!(
        "Usage:\n  \
  conserv_cli --version\n  \
  conserv_cli analyze MSA_PATH OUTPUT.csv\n  \
  conserv_cli render-heatmap MSA_PATH OUTPUT.svg|OUTPUT.png\n  \
  conserv_cli render-strip MSA_PATH OUTPUT.svg|OUTPUT.png\n  \
  conserv_cli report MSA_PATH OUTPUT.csv OUTPUT_PLOT.svg|OUTPUT_PLOT.png\n  \
  conserv_cli summary MSA_PATH\n\n  \
  MSA_PATH is a row-aligned FASTA/A2M file, optionally gzipped"
    );
}

fn load_profile(msa_path: &str) -> Result<ConservationProfile, String> {
    let alignment = Alignment::from_fasta_file(msa_path)
        .map_err(|e| format!("Could not read MSA '{msa_path}': {e}"))?;
    let profile = ConservationProfile::new_from_alignment(&alignment, &AnalyzerSettings::default());
    let unrecognized = profile.unrecognized_total();
    if unrecognized > 0 {
        eprintln!(
            "Warning: {unrecognized} symbols outside the amino-acid alphabet were excluded from '{msa_path}'"
        );
    }
    Ok(profile)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Could not serialize JSON output: {e}"))?;
    println!("{text}");
    Ok(())
}

fn print_preview(profile: &ConservationProfile) {
    println!("i\tA_i\tconservation");
    for record in profile.records().iter().take(PREVIEW_ROWS) {
        println!(
            "{}\t{}\t{}",
            record.position(),
            record.reference(),
            record.conservation()
        );
    }
}

// conservation.csv + plot.png -> plot_strip.png
fn strip_path(plot_path: &str) -> String {
    match plot_path.rsplit_once('.') {
        Some((stem, extension)) => format!("{stem}_strip.{extension}"),
        None => format!("{plot_path}_strip"),
    }
}

fn write_csv(profile: &ConservationProfile, output: &str) -> Result<(), String> {
    table::write_csv_file(profile, output)
        .map_err(|e| format!("Could not write CSV output '{output}': {e}"))?;
    println!("CSV saved to: {output}");
    Ok(())
}

fn write_plot(svg_text: &str, output: &str) -> Result<(), String> {
    write_visual(svg_text, output)
        .map_err(|e| format!("Could not write plot output '{output}': {e}"))?;
    println!("Plot saved to: {output}");
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        return Err("Missing command".to_string());
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("conserv_cli {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let command = &args[1];
    match command.as_str() {
        "analyze" => {
            if args.len() <= 3 {
                usage();
                return Err("analyze requires: MSA_PATH OUTPUT.csv".to_string());
            }
            let profile = load_profile(&args[2])?;
            write_csv(&profile, &args[3])?;
            print_preview(&profile);
            Ok(())
        }
        "render-heatmap" => {
            if args.len() <= 3 {
                usage();
                return Err("render-heatmap requires: MSA_PATH OUTPUT.svg|OUTPUT.png".to_string());
            }
            let profile = load_profile(&args[2])?;
            write_plot(&export_heatmap_svg(&profile), &args[3])
        }
        "render-strip" => {
            if args.len() <= 3 {
                usage();
                return Err("render-strip requires: MSA_PATH OUTPUT.svg|OUTPUT.png".to_string());
            }
            let profile = load_profile(&args[2])?;
            write_plot(&export_strip_svg(&profile), &args[3])
        }
        "report" => {
            if args.len() <= 4 {
                usage();
                return Err(
                    "report requires: MSA_PATH OUTPUT.csv OUTPUT_PLOT.svg|OUTPUT_PLOT.png"
                        .to_string(),
                );
            }
            let profile = load_profile(&args[2])?;
            write_csv(&profile, &args[3])?;
            print_preview(&profile);
            write_plot(&export_heatmap_svg(&profile), &args[4])?;
            write_plot(&export_strip_svg(&profile), &strip_path(&args[4]))
        }
        "summary" => {
            if args.len() <= 2 {
                usage();
                return Err("summary requires: MSA_PATH".to_string());
            }
            let profile = load_profile(&args[2])?;
            print_json(&MsaSummary {
                sequences: profile.n_rows(),
                columns: profile.n_columns(),
                mean_conservation: profile.mean_conservation(),
                unrecognized_symbols: profile.unrecognized_total(),
            })
        }
        _ => {
            usage();
            Err(format!("Unknown command '{command}'"))
        }
    }
}
