//! Operation log shown under the table.

use eframe::egui;
use std::sync::{Arc, Mutex};

/// Append-only list of user-facing messages, shared with background tasks.
#[derive(Clone, Default)]
pub struct OperationLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl OperationLog {
    pub fn push(&self, line: impl Into<String>) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.into());
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn show(&self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Operation log").strong());
        egui::ScrollArea::vertical()
            .max_height(140.0)
            .stick_to_bottom(true)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                for line in self.lines() {
                    ui.label(egui::RichText::new(line).monospace());
                }
            });
    }
}
