//! Confirmation prompts routed from a running session to the UI thread.

use async_trait::async_trait;
use backend::{ConfirmRequest, ConfirmationGate};
use eframe::egui;
use std::sync::mpsc;
use tokio::sync::oneshot;

/// A question waiting for the user, plus where to send the answer.
pub struct PendingPrompt {
    pub request: ConfirmRequest,
    reply: oneshot::Sender<bool>,
}

impl PendingPrompt {
    pub fn answer(self, yes: bool) {
        // The session may have been dropped meanwhile; nothing to do then.
        let _ = self.reply.send(yes);
    }
}

/// Sends each prompt to the UI and waits for the button press.
pub struct UiGate {
    tx: mpsc::Sender<PendingPrompt>,
    ctx: egui::Context,
}

impl UiGate {
    pub fn new(tx: mpsc::Sender<PendingPrompt>, ctx: egui::Context) -> Self {
        Self { tx, ctx }
    }
}

#[async_trait]
impl ConfirmationGate for UiGate {
    async fn confirm(&self, request: &ConfirmRequest) -> bool {
        let (reply, answer) = oneshot::channel();
        let prompt = PendingPrompt {
            request: request.clone(),
            reply,
        };
        if self.tx.send(prompt).is_err() {
            return false;
        }
        self.ctx.request_repaint();
        // A dropped prompt (window closed) counts as "no".
        answer.await.unwrap_or(false)
    }
}
