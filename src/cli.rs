use crate::api::{HealthStatus, PredictOutcome, Prediction};
use crate::app::App;
use crate::history::ScanRecord;

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;

const DISCLAIMER: &str = "This tool is NOT a substitute for professional medical advice, \
diagnosis, or treatment. Predictions are for educational purposes only.";

#[derive(Parser)]
#[command(name = "dermascan")]
#[command(about = "Skin lesion analysis client: classify images and keep a local scan history")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Submit an image to the prediction endpoint
    Predict(PredictArgs),

    /// List past scans, newest first
    History(HistoryArgs),

    /// Remove one scan from history by id
    Delete(DeleteArgs),

    /// Remove all scans from history
    Clear,

    /// Probe the prediction endpoint
    Health,
}

#[derive(Parser)]
pub struct PredictArgs {
    /// Path to the image to classify
    pub image: PathBuf,

    /// Save a successful result to history
    #[arg(long, default_value_t = false)]
    pub save: bool,

    /// Output the raw result envelope as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct HistoryArgs {
    /// Output as JSON instead of a listing
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct DeleteArgs {
    /// Id of the scan to remove
    pub id: String,
}

pub async fn run(cli: Cli, app: &App) -> anyhow::Result<()> {
    match cli.command {
        Command::Predict(args) => {
            let (outcome, saved) = app.analyze(&args.image, args.save).await?;

            if args.json {
                let envelope = match &outcome {
                    PredictOutcome::Success(prediction) => {
                        json!({ "success": true, "data": prediction })
                    }
                    PredictOutcome::Failure { error } => {
                        json!({ "success": false, "error": error })
                    }
                };
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            } else {
                match &outcome {
                    PredictOutcome::Success(prediction) => {
                        render_prediction(prediction, saved.as_ref())
                    }
                    PredictOutcome::Failure { error } => eprintln!("Analysis failed: {error}"),
                }
            }

            if matches!(outcome, PredictOutcome::Failure { .. }) {
                std::process::exit(1);
            }
        }
        Command::History(args) => {
            let records = app.history.get_history();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No scans in history.");
            } else {
                for record in &records {
                    render_record(record);
                }
            }
        }
        Command::Delete(args) => {
            app.history.delete_scan(&args.id)?;
            println!("Deleted.");
        }
        Command::Clear => {
            app.history.clear_history()?;
            println!("History cleared.");
        }
        Command::Health => match app.api.check_health().await {
            HealthStatus::Healthy(report) => match report.model_loaded {
                Some(loaded) => {
                    println!("Endpoint healthy: {} (model loaded: {})", report.status, loaded)
                }
                None => println!("Endpoint healthy: {}", report.status),
            },
            HealthStatus::Unreachable => println!("Endpoint unreachable."),
        },
    }

    Ok(())
}

fn render_prediction(prediction: &Prediction, saved: Option<&ScanRecord>) {
    let risk = prediction.predicted_class.risk();
    println!(
        "{}: {} ({:.1}% confidence, {} tier)",
        prediction.predicted_class,
        risk.headline(),
        prediction.confidence * 100.0,
        risk.color(),
    );
    println!();
    for (class, probability) in &prediction.all_probabilities {
        println!(
            "  {:<10} {:>5.1}%  {}",
            class.as_str(),
            probability * 100.0,
            confidence_bar(*probability)
        );
    }

    if let Some(advisory) = prediction.malignancy_advisory() {
        println!();
        println!("Medical attention recommended: {advisory}");
    }

    if let Some(record) = saved {
        println!();
        println!("Saved to history as {}.", record.id);
    }

    println!();
    println!("{DISCLAIMER}");
}

fn render_record(record: &ScanRecord) {
    println!(
        "{}  {}  {:<9} {:>5.1}%  {}",
        record.id,
        record.timestamp,
        record.predicted_class.as_str(),
        record.confidence * 100.0,
        record.image_uri,
    );
}

fn confidence_bar(probability: f64) -> String {
    let width = 20;
    let filled = (probability.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_spans_the_unit_interval() {
        assert_eq!(confidence_bar(0.0), format!("[{}]", "-".repeat(20)));
        assert_eq!(confidence_bar(1.0), format!("[{}]", "#".repeat(20)));
        assert_eq!(confidence_bar(0.5), format!("[{}{}]", "#".repeat(10), "-".repeat(10)));
    }

    #[test]
    fn bar_clamps_out_of_range_values() {
        assert_eq!(confidence_bar(1.7), format!("[{}]", "#".repeat(20)));
        assert_eq!(confidence_bar(-0.2), format!("[{}]", "-".repeat(20)));
    }
}
