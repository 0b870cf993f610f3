//! Header component with title, search, actions and menu.

use backend::KillMode;
use eframe::egui;

/// Something the user asked for this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderAction {
    Refresh,
    SaveList,
    EditList,
    CloseOthers(KillMode),
}

#[derive(Default)]
pub struct Header {
    pub search_text: String,
}

impl Header {
    /// Returns (search_changed, requested action).
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        process_table: &mut crate::ui::process_table::ProcessTable,
        busy: bool,
    ) -> (bool, Option<HeaderAction>) {
        let mut search_changed = false;
        let mut action = None;

        ui.horizontal(|ui| {
            ui.heading("OneKill");

            ui.add_space(20.0);
            ui.label("Search:");
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.search_text)
                    .hint_text("Filter processes...")
                    .desired_width(200.0),
            );
            if response.changed() {
                search_changed = true;
            }

            if !self.search_text.is_empty() && ui.button("Clear").clicked() {
                self.search_text.clear();
                search_changed = true;
            }

            ui.add_space(10.0);
            if ui.button("Refresh").clicked() {
                action = Some(HeaderAction::Refresh);
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.menu_button("Menu", |ui| {
                    ui.set_min_width(140.0);
                    ui.checkbox(&mut process_table.show_pids, "Show PIDs");
                });
            });
        });

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            ui.add_enabled_ui(!busy, |ui| {
                if ui
                    .add(egui::Button::new("Save current list").fill(egui::Color32::from_rgb(40, 167, 69)))
                    .on_hover_text("Remember every running program as one to keep")
                    .clicked()
                {
                    action = Some(HeaderAction::SaveList);
                }

                if ui
                    .button("Edit list")
                    .on_hover_text("Open the keep-list in a text editor")
                    .clicked()
                {
                    action = Some(HeaderAction::EditList);
                }

                ui.separator();

                if ui
                    .add(egui::Button::new(KillMode::Standard.label()).fill(egui::Color32::from_rgb(220, 53, 69)))
                    .clicked()
                {
                    action = Some(HeaderAction::CloseOthers(KillMode::Standard));
                }

                if ui
                    .add(egui::Button::new(KillMode::Force.label()).fill(egui::Color32::from_rgb(150, 20, 30)))
                    .on_hover_text("Also closes child processes, falls back to WMI, and keeps sweeping for restarted programs")
                    .clicked()
                {
                    action = Some(HeaderAction::CloseOthers(KillMode::Force));
                }
            });

            if busy {
                ui.spinner();
            }
        });

        (search_changed, action)
    }
}
