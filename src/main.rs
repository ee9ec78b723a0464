use dcu_dashboard::analysis::{Analysis, SUBSET_NAMES};
use dcu_dashboard::downloader::{to_csv, to_xlsx};
use dcu_dashboard::history::MeterStatusSummary;
use dcu_dashboard::{AnalysisConfig, Dashboard, ExportError, Row};
use std::env;
use std::fs;
use std::path::Path;

struct Options {
    input: String,
    config: Option<String>,
    json: bool,
    export: Option<(String, String)>,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} <file> [--config <json>] [--json] [--export <subset> <out.csv|out.xlsx>]\n\
         Subsets: {}",
        program,
        SUBSET_NAMES.join(", ")
    )
}

fn parse_args(args: &[String]) -> Option<Options> {
    let mut input = None;
    let mut config = None;
    let mut json = false;
    let mut export = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config = Some(iter.next()?.clone()),
            "--json" => json = true,
            "--export" => {
                let subset = iter.next()?.clone();
                let out = iter.next()?.clone();
                export = Some((subset, out));
            }
            other if input.is_none() && !other.starts_with("--") => input = Some(other.to_string()),
            _ => return None,
        }
    }

    Some(Options {
        input: input?,
        config,
        json,
        export,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("dcu-dashboard");
    let Some(options) = parse_args(&args) else {
        eprintln!("{}", usage(program));
        return Ok(());
    };

    let config = match &options.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };

    let mut dashboard = Dashboard::new(config);
    let dataset = dashboard.ingest_file(&options.input)?;

    if let Some(summary) = dashboard.meter_summary() {
        if options.json {
            println!("{}", serde_json::to_string_pretty(summary.as_ref())?);
        } else {
            print_meter_summary(&summary);
        }
        return Ok(());
    }

    let Some(analysis) = dashboard.analysis() else {
        println!("No data loaded from {}", dataset.name);
        return Ok(());
    };

    if let Some((subset, out)) = &options.export {
        export(&analysis, subset, out)?;
        println!("Exported {} to {}", subset, out);
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(analysis.as_ref())?);
    } else {
        print_summary(&analysis);
    }

    Ok(())
}

fn export(analysis: &Analysis, subset: &str, out: &str) -> Result<(), Box<dyn std::error::Error>> {
    let selection = analysis
        .selection(subset)
        .ok_or_else(|| ExportError::UnknownSubset(subset.to_string()))?;
    let rows: Vec<&Row> = analysis.rows(&selection).collect();

    let is_xlsx = Path::new(out)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));

    if is_xlsx {
        fs::write(out, to_xlsx(&rows)?)?;
    } else {
        fs::write(out, to_csv(&rows)?)?;
    }
    Ok(())
}

fn print_summary(analysis: &Analysis) {
    let latest = analysis
        .latest_column
        .as_ref()
        .map_or("-", |c| c.token.as_str());

    println!("DCUs: {} (latest reading {})", analysis.total, latest);
    println!(
        "  Online: {}  Offline: {}  Not registered: {}",
        analysis.status.operational.len(),
        analysis.status.unreachable.len(),
        analysis.status.unregistered.len()
    );
    println!(
        "  Overloaded: {}  Underloaded: {}  No meters: {}  Online without meters: {}",
        analysis.load.overloaded.len(),
        analysis.load.underloaded.len(),
        analysis.load.no_reading.len(),
        analysis.load.operational_no_reading.len()
    );
    println!(
        "  Attention cases: {} ({:.1}%)  In study: {} ({}%)",
        analysis.attention.total,
        analysis.attention.share,
        analysis.in_study.all.len(),
        analysis.in_study.share
    );

    if let Some(rate) = &analysis.collection_rate {
        println!(
            "  Collection rate: <95%: {}  95-98%: {}  >=98%: {}",
            rate.below_low.len(),
            rate.between.len(),
            rate.at_least_high.len()
        );
    }

    if !analysis.top_deviations.is_empty() {
        println!("Largest deviations from average:");
        for entry in &analysis.top_deviations {
            println!(
                "  {:<16} latest {:>5}  avg {:>8.1}  deviation {:>8.1}",
                entry.id.as_deref().unwrap_or("?"),
                entry.latest,
                entry.average,
                entry.deviation
            );
        }
    }

    if !analysis.annotations.is_empty() {
        println!("Comments:");
        for group in &analysis.annotations {
            println!("  {:>4}  {}", group.count, group.name);
        }
    }
}

fn print_meter_summary(summary: &MeterStatusSummary) {
    println!(
        "Meters on {}: {} ({} without location)",
        summary.latest_date, summary.total_latest, summary.no_location
    );
    if let Some(previous) = &summary.previous_date {
        println!("Previous date {}: {}", previous, summary.total_previous);
    }
    for change in &summary.changes {
        let current = summary
            .latest
            .iter()
            .find(|c| c.status == change.status)
            .map_or(0, |c| c.count);
        println!("  {:<20} {:>8} ({:+})", change.status, current, change.change);
    }
}
