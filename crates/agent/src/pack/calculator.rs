//! Pack electrical values from per-cell values.
//!
//! ```text
//! packVoltage  = cellVoltage  · S
//! packCapacity = cellCapacity · P
//! packEnergy   = packVoltage  · packCapacity
//! totalCells   = S · P
//! ```

use super::notation::BatteryConfig;
use serde::{Deserialize, Serialize};

/// Per-cell nominal values feeding the calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellValues {
    pub voltage: f64,
    pub capacity_ah: f64,
}

/// Computed pack values plus the human-readable derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackResult {
    pub config: BatteryConfig,
    pub cell: CellValues,
    pub pack_voltage: f64,
    pub pack_capacity_ah: f64,
    pub pack_energy_wh: f64,
    pub total_cells: u32,
    pub derivation_steps: Vec<String>,
}

pub fn calculate(config: BatteryConfig, cell: CellValues) -> PackResult {
    let series = f64::from(config.series);
    let parallel = f64::from(config.parallel);

    let pack_voltage = cell.voltage * series;
    let pack_capacity_ah = cell.capacity_ah * parallel;
    let pack_energy_wh = pack_voltage * pack_capacity_ah;
    let total_cells = config.total_cells();

    let derivation_steps = vec![
        format!(
            "totalCells = {}S × {}P = {}",
            config.series, config.parallel, total_cells
        ),
        format!(
            "packVoltage = {}V × {} = {}V",
            format_number(cell.voltage),
            config.series,
            format_number(pack_voltage)
        ),
        format!(
            "packCapacity = {}Ah × {} = {}Ah",
            format_number(cell.capacity_ah),
            config.parallel,
            format_number(pack_capacity_ah)
        ),
        format!(
            "packEnergy = {}V × {}Ah = {}Wh",
            format_number(pack_voltage),
            format_number(pack_capacity_ah),
            format_number(pack_energy_wh)
        ),
    ];

    PackResult {
        config,
        cell,
        pack_voltage,
        pack_capacity_ah,
        pack_energy_wh,
        total_cells,
        derivation_steps,
    }
}

impl PackResult {
    /// Text of the calculation block placed in the prompt and returned to
    /// the caller. `source` names the document the cell values came from.
    pub fn render(&self, source: &str) -> String {
        let mut out = format!(
            "Configuration: {} ({} cells)\nCell values from '{}': {}V, {}Ah\n",
            self.config,
            self.total_cells,
            source,
            format_number(self.cell.voltage),
            format_number(self.cell.capacity_ah)
        );
        out.push_str(&self.derivation_steps.join("\n"));
        out
    }
}

/// Format with at most three decimals, trailing zeros removed.
pub fn format_number(value: f64) -> String {
    let text = format!("{value:.3}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}
