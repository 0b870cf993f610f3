//! Modal-style window asking whether a session may start.

use crate::gate::PendingPrompt;
use eframe::egui;

/// Draw the prompt. Returns the user's answer once a button is pressed.
pub fn show(ctx: &egui::Context, prompt: &PendingPrompt) -> Option<bool> {
    let mut answer = None;
    let request = &prompt.request;

    egui::Window::new(request.mode.label())
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(request.message());
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                if ui
                    .add(egui::Button::new("Yes").fill(egui::Color32::from_rgb(200, 40, 40)))
                    .clicked()
                {
                    answer = Some(true);
                }
                if ui.button("No").clicked() {
                    answer = Some(false);
                }
            });
        });

    answer
}
