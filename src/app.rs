use crate::api::{PredictOutcome, PredictionClient};
use crate::config::Config;
use crate::history::{HistoryStore, NewScan, ScanRecord};

use anyhow::Context;
use std::path::Path;

/// Service wiring: one prediction client and one history store, constructed
/// once at startup and handed to consumers.
pub struct App {
    pub api: PredictionClient,
    pub history: HistoryStore,
}

impl App {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let api = PredictionClient::new(&config.api)
            .context("failed to build the prediction client")?;

        let data_dir = config
            .storage
            .resolve_data_dir()
            .context("could not determine a data directory for scan history")?;
        let history = HistoryStore::new(&data_dir)
            .with_context(|| format!("failed to open history store in {}", data_dir.display()))?;

        Ok(Self { api, history })
    }

    /// Classify an image and, when requested and successful, persist the
    /// result. A failed prediction is returned in the envelope, never saved.
    pub async fn analyze(
        &self,
        image_path: &Path,
        save: bool,
    ) -> anyhow::Result<(PredictOutcome, Option<ScanRecord>)> {
        let outcome = self.api.predict(image_path).await;

        let saved = match (&outcome, save) {
            (PredictOutcome::Success(prediction), true) => {
                let scan =
                    NewScan::from_prediction(image_path.to_string_lossy(), prediction);
                let record = self
                    .history
                    .save_scan(scan)
                    .context("failed to save scan to history")?;
                Some(record)
            }
            _ => None,
        };

        Ok((outcome, saved))
    }
}
