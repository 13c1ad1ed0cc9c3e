//! Run summaries and file output.

use std::io::Write;
use std::path::Path;
use std::{fs::File, io::BufWriter};

use anyhow::Result;
use serde::Serialize;

use crate::fit::WedgeFit;
use crate::settings::Settings;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_serializes_without_fit() {
        let summary = RunSummary::new(1.0, 0.0, false, vec![1.5], vec![0.1, 0.2], 0.05);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"reflections\":[0.1,0.2]"));
        assert!(!json.contains("\"fit\""));
    }
}

/// Serializable record of one forward propagation, with an optional wedge
/// recovery attached.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated: String,
    pub ambient_refr_index: f64,
    pub incident: f64,
    pub exact: bool,
    pub refr_indices: Vec<f64>,
    pub reflections: Vec<f64>,
    pub transmission: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitSummary>,
}

/// Fit portion of the writeup.
#[derive(Debug, Clone, Serialize)]
pub struct FitSummary {
    /// (front, back) wedge per mirror, in stack order.
    pub wedges: Vec<(f64, f64)>,
    pub residual: f64,
    pub iterations: usize,
}

impl RunSummary {
    pub fn new(
        ambient_refr_index: f64,
        incident: f64,
        exact: bool,
        refr_indices: Vec<f64>,
        reflections: Vec<f64>,
        transmission: f64,
    ) -> Self {
        Self {
            generated: chrono::Local::now().to_rfc3339(),
            ambient_refr_index,
            incident,
            exact,
            refr_indices,
            reflections,
            transmission,
            fit: None,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        reflections: Vec<f64>,
        transmission: f64,
    ) -> Self {
        Self::new(
            settings.ambient_refr_index,
            settings.incident,
            settings.exact,
            settings.refr_indices(),
            reflections,
            transmission,
        )
    }

    pub fn attach_fit(&mut self, fit: &WedgeFit<f64>) {
        self.fit = Some(FitSummary {
            wedges: fit.mirrors.iter().map(|m| (m.front, m.back)).collect(),
            residual: fit.residual,
            iterations: fit.iterations,
        });
    }
}

/// Writes the summary as pretty-printed JSON.
pub fn writeup(summary: &RunSummary, path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writer.flush()?;
    Ok(())
}
