use backend::{CancellationToken, Engine, KillMode, ProcessEntry, ProcessSet, Settings};
use eframe::{egui, App};
use gate::{PendingPrompt, UiGate};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use tracing::{info, warn};
use ui::header::{Header, HeaderAction};
use ui::log_panel::OperationLog;
use ui::process_table::{group_processes, ProcessTable};
use ui::status_bar::StatusBar;

mod editor;
mod gate;
mod logger;
mod summary;
mod ui;

const SETTINGS_FILE: &str = "onekill.yaml";

#[tokio::main]
async fn main() -> eframe::Result<()> {
    let (settings, settings_error) = match Settings::load(Path::new(SETTINGS_FILE)) {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    logger::init_logger(&settings.log_level);
    if let Some(e) = settings_error {
        warn!("Using default settings: {}", e);
    }
    info!("Keep-list file: {}", settings.baseline_path.display());

    let cancel = CancellationToken::new();
    let engine = Arc::new(Engine::from_settings(&settings));
    let baseline_path = settings.baseline_path.clone();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([760.0, 560.0])
            .with_always_on_top(),
        ..Default::default()
    };

    let app_cancel = cancel.clone();
    let result = eframe::run_native(
        "OneKill",
        native_options,
        Box::new(move |cc| {
            // Global black theme
            let mut visuals = egui::Visuals::dark();
            visuals.override_text_color = Some(egui::Color32::WHITE);
            visuals.panel_fill = egui::Color32::BLACK;
            visuals.window_fill = egui::Color32::BLACK;
            cc.egui_ctx.set_visuals(visuals);

            let mut style = (*cc.egui_ctx.style()).clone();
            style.spacing.item_spacing = egui::vec2(10.0, 8.0);
            style.spacing.button_padding = egui::vec2(12.0, 8.0);
            cc.egui_ctx.set_style(style);

            let app = OneKillApp::new(cc.egui_ctx.clone(), engine, baseline_path, app_cancel);
            app.refresh();
            Box::new(app)
        }),
    );

    // Let a running session stop between rounds instead of mid-way.
    cancel.cancel();
    result
}

/// State shared with background tasks.
#[derive(Clone)]
struct Shared {
    ctx: egui::Context,
    engine: Arc<Engine>,
    processes: Arc<Mutex<Vec<ProcessEntry>>>,
    kept: Arc<Mutex<Option<ProcessSet>>>,
    busy: Arc<AtomicBool>,
    status: Arc<Mutex<String>>,
    log: OperationLog,
}

impl Shared {
    fn set_status(&self, text: impl Into<String>) {
        let text = text.into();
        self.log.push(text.clone());
        if let Ok(mut status) = self.status.lock() {
            *status = text;
        }
        self.ctx.request_repaint();
    }

    /// Re-list processes and re-read the keep-list.
    async fn reload(&self) {
        match self.engine.list_processes().await {
            Ok(list) => {
                if let Ok(mut processes) = self.processes.lock() {
                    *processes = list;
                }
            }
            Err(e) => self.set_status(format!("Failed to refresh process list: {}", e)),
        }

        let kept = self.engine.load_baseline().ok();
        if let Ok(mut lock) = self.kept.lock() {
            *lock = kept;
        }
        self.ctx.request_repaint();
    }

    /// Run `task` in the background with the busy flag set.
    fn spawn_busy<F>(&self, task: impl FnOnce(Shared) -> F + Send + 'static)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if self.busy.swap(true, Ordering::SeqCst) {
            return;
        }
        let shared = self.clone();
        tokio::spawn(async move {
            task(shared.clone()).await;
            shared.busy.store(false, Ordering::SeqCst);
            shared.ctx.request_repaint();
        });
    }
}

struct OneKillApp {
    shared: Shared,
    baseline_path: PathBuf,
    cancel: CancellationToken,
    prompts_tx: mpsc::Sender<PendingPrompt>,
    prompts_rx: mpsc::Receiver<PendingPrompt>,
    pending: Option<PendingPrompt>,
    process_table: ProcessTable,
    header: Header,
}

impl OneKillApp {
    fn new(ctx: egui::Context, engine: Arc<Engine>, baseline_path: PathBuf, cancel: CancellationToken) -> Self {
        let (prompts_tx, prompts_rx) = mpsc::channel();
        Self {
            shared: Shared {
                ctx,
                engine,
                processes: Arc::new(Mutex::new(Vec::new())),
                kept: Arc::new(Mutex::new(None)),
                busy: Arc::new(AtomicBool::new(false)),
                status: Arc::new(Mutex::new(String::new())),
                log: OperationLog::default(),
            },
            baseline_path,
            cancel,
            prompts_tx,
            prompts_rx,
            pending: None,
            process_table: ProcessTable::default(),
            header: Header::default(),
        }
    }

    fn refresh(&self) {
        self.shared.spawn_busy(|shared| async move { shared.reload().await });
    }

    fn save_list(&self) {
        let path = self.baseline_path.clone();
        self.shared.spawn_busy(move |shared| async move {
            match shared.engine.save_baseline().await {
                Ok(count) => shared.set_status(format!("Saved {} processes to {}", count, path.display())),
                Err(e) => shared.set_status(format!("Saving the process list failed: {}", e)),
            }
            shared.reload().await;
        });
    }

    fn edit_list(&self) {
        match editor::open_in_editor(&self.baseline_path) {
            Ok(()) => self
                .shared
                .set_status(format!("Opened {} in the editor", self.baseline_path.display())),
            Err(e) => self.shared.set_status(format!("Cannot open the process list: {}", e)),
        }
    }

    fn close_others(&self, mode: KillMode) {
        let gate = UiGate::new(self.prompts_tx.clone(), self.shared.ctx.clone());
        let cancel = self.cancel.clone();
        self.shared.spawn_busy(move |shared| async move {
            shared.log.push(format!("{}...", mode.label()));
            match shared.engine.close_others(mode, &gate, &cancel).await {
                Ok(result) => shared.set_status(summary::describe(&result)),
                Err(e) => shared.set_status(format!("{}", e)),
            }
            shared.reload().await;
        });
    }

    fn handle(&mut self, action: HeaderAction) {
        match action {
            HeaderAction::Refresh => self.refresh(),
            HeaderAction::SaveList => self.save_list(),
            HeaderAction::EditList => self.edit_list(),
            HeaderAction::CloseOthers(mode) => self.close_others(mode),
        }
    }

    fn show_prompt(&mut self, ctx: &egui::Context) {
        if self.pending.is_none() {
            self.pending = self.prompts_rx.try_recv().ok();
        }

        let answer = match &self.pending {
            Some(prompt) => ui::confirm_dialog::show(ctx, prompt),
            None => None,
        };

        if let Some(yes) = answer {
            if let Some(prompt) = self.pending.take() {
                prompt.answer(yes);
            }
        }
    }
}

impl App for OneKillApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let busy = self.shared.busy.load(Ordering::SeqCst);

        let processes = self
            .shared
            .processes
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default();
        let kept = self.shared.kept.lock().ok().and_then(|k| k.clone());
        let groups = group_processes(&processes, kept.as_ref(), self.shared.engine.protected());
        let status = self
            .shared
            .status
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();

        egui::TopBottomPanel::bottom("log").show(ctx, |ui| {
            self.shared.log.show(ui);
        });

        let mut action = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            let (search_changed, requested) = self.header.show(ui, &mut self.process_table, busy);
            action = requested;
            ui.add_space(6.0);

            let filtered_count = self.process_table.show(ui, &groups, &self.header.search_text);

            ui.add_space(6.0);
            StatusBar::show(ui, &groups, filtered_count, &status);

            if search_changed {
                ctx.request_repaint();
            }
        });

        if let Some(action) = action {
            self.handle(action);
        }

        self.show_prompt(ctx);
    }
}
