use std::{fs, path::PathBuf, sync::Arc};

use client_core::{
    geometry::{CanvasBounds, PointerButton, PointerEvent},
    prepare, LibraryEntry, ResultsPanel, Workbench,
};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use egui::TextureHandle;
use shared::{
    domain::{Lane, LanePair, SignatureId},
    protocol::StageAction,
};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;

const MAX_CANVAS_HEIGHT: f32 = 420.0;
const ERROR_COLOR: egui::Color32 = egui::Color32::from_rgb(220, 70, 70);

/// A test-lane file. These stay on this machine and are never uploaded.
struct LocalSignature {
    name: String,
    bytes: Arc<[u8]>,
}

#[derive(Default)]
struct LaneTexture {
    revision: u64,
    handle: Option<TextureHandle>,
}

pub struct SigcheckApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    workbench: Workbench,
    library: Vec<LibraryEntry>,
    local: Vec<LocalSignature>,
    original_choice: Option<SignatureId>,
    test_choice: Option<usize>,
    textures: LanePair<LaneTexture>,
    stages_in_flight: usize,
    status: String,
    banner: Option<UiError>,
}

impl SigcheckApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        workbench: Workbench,
    ) -> Self {
        let mut app = Self {
            cmd_tx,
            ui_rx,
            workbench,
            library: Vec::new(),
            local: Vec::new(),
            original_choice: None,
            test_choice: None,
            textures: LanePair::default(),
            stages_in_flight: 0,
            status: "Starting".to_string(),
            banner: None,
        };
        app.queue(BackendCommand::RefreshLibrary);
        app
    }

    fn queue(&mut self, cmd: BackendCommand) {
        dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status);
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Info(message) => {
                    self.status = message;
                }
                UiEvent::Error(err) => {
                    tracing::warn!(context = ?err.context(), "{}", err.message());
                    self.banner = Some(err);
                }
                UiEvent::LibraryLoaded(entries) => {
                    self.status = format!("Loaded {} stored signatures", entries.len());
                    self.library = entries;
                    if let Some(id) = self.original_choice {
                        if !self.library.iter().any(|e| e.summary.id == id) {
                            self.original_choice = None;
                        }
                    }
                    self.banner = None;
                }
                UiEvent::SignatureDeleted(id) => {
                    self.library.retain(|entry| entry.summary.id != id);
                    if self.original_choice == Some(id) {
                        self.original_choice = None;
                    }
                    self.status = format!("Deleted signature {id}");
                }
                UiEvent::StageFinished { action, outcome } => {
                    self.stages_in_flight = self.stages_in_flight.saturating_sub(1);
                    let applied = outcome.and_then(|response| self.workbench.apply(response));
                    match applied {
                        Ok(()) => self.status = format!("{} done", action.label()),
                        Err(err) => {
                            self.status = format!("{} failed", action.label());
                            self.workbench.report_error(&err);
                        }
                    }
                }
            }
        }
    }

    fn run_stage(&mut self, action: StageAction) {
        match prepare(action, &self.workbench) {
            Ok(request) => {
                self.stages_in_flight += 1;
                self.status = format!("{}...", action.label());
                self.queue(BackendCommand::RunStage(request));
            }
            Err(err) => self.workbench.report_error(&err),
        }
    }

    fn select_library_signature(&mut self, id: SignatureId) {
        let Some(entry) = self.library.iter().find(|e| e.summary.id == id) else {
            return;
        };
        match self.workbench.select_source(
            Lane::Original,
            entry.summary.name.clone(),
            entry.bytes.as_slice(),
        ) {
            Ok(()) => self.original_choice = Some(id),
            Err(err) => {
                self.banner = Some(UiError::from_message(UiErrorContext::LocalFile, err.to_string()))
            }
        }
    }

    fn select_local_signature(&mut self, index: usize) {
        let Some(local) = self.local.get(index) else {
            return;
        };
        match self
            .workbench
            .select_source(Lane::Test, local.name.clone(), Arc::clone(&local.bytes))
        {
            Ok(()) => self.test_choice = Some(index),
            Err(err) => {
                self.banner = Some(UiError::from_message(UiErrorContext::LocalFile, err.to_string()))
            }
        }
    }

    fn add_local_files(&mut self, paths: Vec<PathBuf>) {
        for path in paths {
            match fs::read(&path) {
                Ok(bytes) => {
                    let name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    self.local.push(LocalSignature {
                        name,
                        bytes: bytes.into(),
                    });
                }
                Err(err) => {
                    self.banner = Some(UiError::from_message(
                        UiErrorContext::LocalFile,
                        format!("failed to read '{}': {err}", path.display()),
                    ));
                }
            }
        }
        if !self.local.is_empty() {
            self.select_local_signature(self.local.len() - 1);
        }
    }

    fn sync_texture(&mut self, ctx: &egui::Context, lane: Lane) {
        let canvas = self.workbench.canvas(lane);
        let slot = self.textures.get_mut(lane);
        if slot.revision == canvas.revision() {
            return;
        }
        slot.revision = canvas.revision();
        if canvas.width() == 0 || canvas.height() == 0 {
            slot.handle = None;
            return;
        }
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [canvas.width() as usize, canvas.height() as usize],
            canvas.pixels().as_raw(),
        );
        match &mut slot.handle {
            Some(handle) => handle.set(image, egui::TextureOptions::LINEAR),
            None => {
                slot.handle = Some(ctx.load_texture(
                    format!("lane-canvas:{lane}"),
                    image,
                    egui::TextureOptions::LINEAR,
                ))
            }
        }
    }

    fn show_action_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("action_bar").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                for action in StageAction::ALL {
                    if ui.button(action.label()).clicked() {
                        self.run_stage(action);
                    }
                }
                ui.separator();
                if ui.button("Refresh library").clicked() {
                    self.queue(BackendCommand::RefreshLibrary);
                }
                if self.stages_in_flight > 0 {
                    ui.spinner();
                }
            });
        });
    }

    fn show_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            if let Some(banner) = &self.banner {
                let mut dismiss = false;
                ui.horizontal(|ui| {
                    ui.colored_label(ERROR_COLOR, banner.banner());
                    dismiss = ui.small_button("Dismiss").clicked();
                });
                if dismiss {
                    self.banner = None;
                }
            }
            ui.horizontal(|ui| {
                ui.label(&self.status);
                ui.separator();
                let registry = self.workbench.registry();
                ui.weak(format!(
                    "{} images held ({} KiB)",
                    registry.live(),
                    registry.held_bytes().div_ceil(1024)
                ));
            });
        });
    }

    fn show_original_picker(&mut self, ui: &mut egui::Ui) {
        let selected_text = self
            .original_choice
            .and_then(|id| self.library.iter().find(|e| e.summary.id == id))
            .map(|e| e.summary.name.clone())
            .unwrap_or_else(|| "Choose a stored signature".to_string());
        let mut picked = None;
        ui.horizontal(|ui| {
            egui::ComboBox::from_id_salt("original_signature")
                .selected_text(selected_text)
                .show_ui(ui, |ui| {
                    for entry in &self.library {
                        let selected = self.original_choice == Some(entry.summary.id);
                        if ui.selectable_label(selected, &entry.summary.name).clicked() {
                            picked = Some(entry.summary.id);
                        }
                    }
                });
            if ui.button("Upload...").clicked() {
                if let Some(paths) = pick_images() {
                    self.queue(BackendCommand::AddSignatures { paths });
                }
            }
            if ui
                .add_enabled(self.original_choice.is_some(), egui::Button::new("Delete"))
                .clicked()
            {
                if let Some(id) = self.original_choice {
                    self.queue(BackendCommand::DeleteSignature { id });
                }
            }
        });
        if let Some(id) = picked {
            self.select_library_signature(id);
        }
    }

    fn show_test_picker(&mut self, ui: &mut egui::Ui) {
        let selected_text = self
            .test_choice
            .and_then(|index| self.local.get(index))
            .map(|local| local.name.clone())
            .unwrap_or_else(|| "Choose a test signature".to_string());
        let mut picked = None;
        ui.horizontal(|ui| {
            egui::ComboBox::from_id_salt("test_signature")
                .selected_text(selected_text)
                .show_ui(ui, |ui| {
                    for (index, local) in self.local.iter().enumerate() {
                        if ui
                            .selectable_label(self.test_choice == Some(index), &local.name)
                            .clicked()
                        {
                            picked = Some(index);
                        }
                    }
                });
            if ui.button("Add files...").clicked() {
                if let Some(paths) = pick_images() {
                    self.add_local_files(paths);
                }
            }
        });
        if let Some(index) = picked {
            self.select_local_signature(index);
        }
    }

    fn show_lane(&mut self, ui: &mut egui::Ui, lane: Lane) {
        ui.heading(lane.label());
        match lane {
            Lane::Original => self.show_original_picker(ui),
            Lane::Test => self.show_test_picker(ui),
        }
        if let Some(image) = self.workbench.lane(lane).current_image() {
            ui.weak(format!("{} ({}x{})", image.name(), image.width(), image.height()));
        }

        self.sync_texture(ui.ctx(), lane);
        let Some(texture_id) = self.textures.get(lane).handle.as_ref().map(|t| t.id()) else {
            ui.add_space(12.0);
            ui.weak("No image selected");
            return;
        };
        let canvas = self.workbench.canvas(lane);
        let (pixel_w, pixel_h) = (canvas.width() as f32, canvas.height() as f32);
        let size = fit_size(pixel_w, pixel_h, ui.available_width(), MAX_CANVAS_HEIGHT);
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click_and_drag());
        ui.painter().image(
            texture_id,
            rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        let bounds = CanvasBounds {
            left: f64::from(rect.left()),
            top: f64::from(rect.top()),
            display_width: f64::from(rect.width()),
            display_height: f64::from(rect.height()),
            pixel_width: f64::from(pixel_w),
            pixel_height: f64::from(pixel_h),
        };
        self.handle_pointer(ui, lane, rect, &response, bounds);
    }

    fn handle_pointer(
        &mut self,
        ui: &egui::Ui,
        lane: Lane,
        rect: egui::Rect,
        response: &egui::Response,
        bounds: CanvasBounds,
    ) {
        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.workbench
                    .pointer_down(lane, pointer_event(pos, PointerButton::Primary), bounds);
                self.workbench
                    .pointer_up(lane, pointer_event(pos, PointerButton::Primary), bounds);
            }
            return;
        }

        if response.drag_started() {
            let (origin, button) = ui.input(|i| {
                let button = if i.pointer.primary_down() {
                    PointerButton::Primary
                } else if i.pointer.secondary_down() {
                    PointerButton::Secondary
                } else {
                    PointerButton::Middle
                };
                (i.pointer.press_origin(), button)
            });
            if let Some(origin) = origin {
                self.workbench
                    .pointer_down(lane, pointer_event(origin, button), bounds);
            }
        }

        if !self.workbench.is_dragging(lane) {
            return;
        }
        let pos = response
            .interact_pointer_pos()
            .or_else(|| ui.input(|i| i.pointer.latest_pos()));
        match pos {
            Some(pos) if response.drag_stopped() => {
                self.workbench
                    .pointer_up(lane, pointer_event(pos, PointerButton::Primary), bounds);
            }
            Some(pos) if !rect.contains(pos) => {
                self.workbench.pointer_leave(lane, bounds);
            }
            Some(pos) => {
                self.workbench
                    .pointer_move(lane, pointer_event(pos, PointerButton::Primary), bounds);
            }
            None => {
                self.workbench.pointer_leave(lane, bounds);
            }
        }
    }

    fn show_results(&self, ui: &mut egui::Ui) {
        ui.heading("Results");
        match self.workbench.results() {
            ResultsPanel::Empty => {
                ui.weak("Run a stage to see results.");
            }
            ResultsPanel::Table(rows) => {
                egui::Grid::new("verdict_table")
                    .striped(true)
                    .num_columns(2)
                    .show(ui, |ui| {
                        ui.strong("Check");
                        ui.strong("Result");
                        ui.end_row();
                        for row in rows {
                            ui.label(&row.check);
                            ui.label(&row.value);
                            ui.end_row();
                        }
                    });
            }
            ResultsPanel::Message(err) => {
                ui.colored_label(ERROR_COLOR, &err.message);
            }
        }
    }
}

impl eframe::App for SigcheckApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        self.show_action_bar(ctx);
        self.show_status_bar(ctx);
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.columns(2, |columns| {
                    self.show_lane(&mut columns[0], Lane::Original);
                    self.show_lane(&mut columns[1], Lane::Test);
                });
                ui.separator();
                self.show_results(ui);
            });
        });

        let busy = self.stages_in_flight > 0
            || Lane::ALL.iter().any(|lane| self.workbench.is_dragging(*lane));
        if busy {
            ctx.request_repaint_after(std::time::Duration::from_millis(16));
        } else {
            ctx.request_repaint_after(std::time::Duration::from_millis(250));
        }
    }
}

fn pointer_event(pos: egui::Pos2, button: PointerButton) -> PointerEvent {
    PointerEvent {
        x: f64::from(pos.x),
        y: f64::from(pos.y),
        button,
    }
}

fn pick_images() -> Option<Vec<PathBuf>> {
    rfd::FileDialog::new()
        .add_filter("Images", &image_extensions())
        .pick_files()
}

fn image_extensions() -> Vec<&'static str> {
    image::ImageFormat::all()
        .filter(|format| format.reading_enabled())
        .flat_map(|format| format.extensions_str().iter().copied())
        .collect()
}

/// Largest size with the canvas's aspect ratio that fits the box, never
/// enlarging.
fn fit_size(width: f32, height: f32, max_width: f32, max_height: f32) -> egui::Vec2 {
    if width <= 0.0 || height <= 0.0 {
        return egui::Vec2::ZERO;
    }
    let scale = (max_width / width).min(max_height / height).min(1.0).max(0.0);
    egui::vec2(width * scale, height * scale)
}
