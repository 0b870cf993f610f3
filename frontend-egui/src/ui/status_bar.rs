//! Status bar component showing process counts.

use crate::ui::process_table::{ProcessGroup, RowStatus};
use eframe::egui;

pub struct StatusBar;

impl StatusBar {
    pub fn show(ui: &mut egui::Ui, groups: &[ProcessGroup], filtered_count: usize, status: &str) {
        ui.separator();
        ui.horizontal(|ui| {
            let instances: usize = groups.iter().map(|g| g.pids.len()).sum();
            ui.label(format!("Processes: {} ({} programs)", instances, groups.len()));

            if filtered_count != groups.len() {
                ui.separator();
                ui.label(format!("Filtered: {}", filtered_count));
            }

            ui.separator();
            let extra = groups.iter().filter(|g| g.status == RowStatus::Extra).count();
            ui.label(format!("Would close: {}", extra));

            ui.separator();
            let total_memory: u64 = groups.iter().map(|g| g.memory_kb).sum();
            ui.label(format!(
                "Total memory: {:.1} GB",
                total_memory as f64 / (1024.0 * 1024.0)
            ));

            if !status.is_empty() {
                ui.separator();
                ui.label(status);
            }
        });
    }
}
