//! Step tables for the terminal.
//!
//! `StepTableRenderer` is the CLI's `StepRenderer`: each step view becomes a
//! row with its number, title, status and a one-line summary of its slice.

use comfy_table::{Cell, Color, ContentArrangement, Table, presets};

use phytodx_core::diagnosis::DiagnosisSlice;
use phytodx_core::soil::SoilSlice;
use phytodx_core::wizard::step::{StepRenderer, StepView};
use phytodx_types::diagnosis::{DetectionOutcome, DiagnosisStep};
use phytodx_types::soil::SoilStep;

pub struct StepTableRenderer {
    table: Table,
}

impl StepTableRenderer {
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("#").fg(Color::White),
            Cell::new("Step").fg(Color::White),
            Cell::new("Status").fg(Color::White),
            Cell::new("Details").fg(Color::White),
        ]);
        Self { table }
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    fn push_row<S, V>(&mut self, number: u8, view: &StepView<S, V>, details: String) {
        let (status, color) = step_status(view);
        let details = match &view.error {
            Some(error) => format!("{details}\n{error}"),
            None => details,
        };
        let title = if view.expanded {
            Cell::new(view.title).fg(Color::Cyan)
        } else {
            Cell::new(view.title)
        };
        self.table.add_row(vec![
            Cell::new(number),
            title,
            Cell::new(status).fg(color),
            Cell::new(details),
        ]);
    }
}

impl Default for StepTableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl StepRenderer<DiagnosisStep, DiagnosisSlice> for StepTableRenderer {
    fn render_step(&mut self, view: &StepView<DiagnosisStep, DiagnosisSlice>) {
        self.push_row(view.step.number(), view, describe_diagnosis(&view.slice));
    }
}

impl StepRenderer<SoilStep, SoilSlice> for StepTableRenderer {
    fn render_step(&mut self, view: &StepView<SoilStep, SoilSlice>) {
        self.push_row(view.step.number(), view, describe_soil(&view.slice));
    }
}

/// Status label for a step. Enabled steps before the expanded one are done.
fn step_status<S, V>(view: &StepView<S, V>) -> (&'static str, Color) {
    if view.pending {
        ("running", Color::Yellow)
    } else if view.error.is_some() {
        ("failed", Color::Red)
    } else if !view.enabled {
        ("locked", Color::DarkGrey)
    } else if view.expanded {
        ("current", Color::Cyan)
    } else {
        ("done", Color::Green)
    }
}

pub fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

pub fn describe_detection(detection: &DetectionOutcome) -> String {
    match detection {
        DetectionOutcome::Detected {
            disease_id,
            confidence_level,
        } => match confidence_level {
            Some(c) => format!("disease #{disease_id} ({} confidence)", percent(*c)),
            None => format!("disease #{disease_id}"),
        },
        DetectionOutcome::Inconclusive { .. } => {
            "inconclusive, deep analysis recommended".to_string()
        }
    }
}

fn describe_diagnosis(slice: &DiagnosisSlice) -> String {
    match slice {
        DiagnosisSlice::Category { category } => category
            .as_ref()
            .map(|c| format!("{} (#{})", c.label, c.id))
            .unwrap_or_default(),
        DiagnosisSlice::Upload { asset, asset_id } => match (asset, asset_id) {
            (Some(asset), Some(id)) => format!(
                "{} ({}) as {id}",
                asset.file_name,
                format_bytes(asset.size_bytes)
            ),
            (Some(asset), None) => {
                format!("{} ({})", asset.file_name, format_bytes(asset.size_bytes))
            }
            (None, _) => String::new(),
        },
        DiagnosisSlice::Inference {
            inference_id,
            validated,
        } => match inference_id {
            Some(id) if *validated => format!("{id} validated"),
            Some(id) => format!("{id} awaiting validation"),
            None => String::new(),
        },
        DiagnosisSlice::Detection {
            detection,
            attention_map_url,
            ..
        } => {
            let mut text = detection.as_ref().map(describe_detection).unwrap_or_default();
            if let Some(url) = attention_map_url {
                text.push_str(&format!("\nattention map: {url}"));
            }
            text
        }
        DiagnosisSlice::DeepAnalysis { requested, result } => match result {
            Some(result) => {
                let verdict = result
                    .disease_id
                    .map(|id| format!("disease #{id}"))
                    .unwrap_or_else(|| "no disease identified".to_string());
                format!("{verdict} ({} confidence)", percent(result.confidence_level))
            }
            None if *requested => "awaiting answers".to_string(),
            None => String::new(),
        },
    }
}

fn describe_soil(slice: &SoilSlice) -> String {
    match slice {
        SoilSlice::Target(target) => target
            .as_ref()
            .map(|t| format!("{}, {} ha", t.crop, t.area_hectares))
            .unwrap_or_default(),
        SoilSlice::Sample(sample) => sample
            .as_ref()
            .map(|s| {
                format!(
                    "pH {}, N {} / P {} / K {} mg/kg, OM {}%, moisture {}%",
                    s.ph,
                    s.nitrogen_mg_kg,
                    s.phosphorus_mg_kg,
                    s.potassium_mg_kg,
                    s.organic_matter_pct,
                    s.moisture_pct
                )
            })
            .unwrap_or_default(),
        SoilSlice::Assessment(assessment) => assessment
            .as_ref()
            .map(|a| match a.score {
                Some(score) => format!("{} (score {score:.0})", a.rating),
                None => a.rating.to_string(),
            })
            .unwrap_or_default(),
    }
}
