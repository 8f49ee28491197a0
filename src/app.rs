// src/app.rs - Try-on window: camera view, ring overlay and product list
use std::path::PathBuf;
use std::time::Instant;

use eframe::egui;
use egui_extras::{Column, TableBuilder};
use ring_tryon::catalog::Catalog;
use ring_tryon::config::AppConfig;
use ring_tryon::detection::DetectionState;
use ring_tryon::mediapipe_bridge::MediaPipeLandmarker;
use ring_tryon::session::TryOnSession;
use ring_tryon::tracking::{ScanMode, TickOutcome};
use ring_tryon::video::CameraProvider;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::ui::{UIComponents, VideoWidget};

enum LandmarkerInit {
    /// Simulated scanning needs no detector.
    NotNeeded,
    Loading(oneshot::Receiver<ring_tryon::Result<MediaPipeLandmarker>>),
    Ready,
    Failed(String),
}

pub struct RingTryOnApp {
    config: AppConfig,
    config_path: PathBuf,
    runtime: Runtime,
    session: TryOnSession<CameraProvider>,
    landmarker: LandmarkerInit,

    catalog: Catalog,
    catalog_error: Option<String>,
    selected_at: Instant,

    clock: Instant,
    measurement: bool,
    show_session_info: bool,

    ui_components: UIComponents,
    video_widget: VideoWidget,
}

impl RingTryOnApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: AppConfig, config_path: PathBuf, runtime: Runtime) -> Self {
        let provider = CameraProvider::new(config.camera.clone());
        let session = TryOnSession::new(provider, config.camera.initial_facing, config.tracking.clone());

        let (catalog, catalog_error) = match &config.catalog_path {
            Some(path) => match Catalog::load(path) {
                Ok(catalog) => (catalog, None),
                Err(e) => {
                    warn!("{}", e);
                    (Catalog::default(), Some(e.to_string()))
                }
            },
            None => (Catalog::default(), None),
        };

        // Product images are URLs or local files
        egui_extras::install_image_loaders(&cc.egui_ctx);

        let mut app = Self {
            config,
            config_path,
            runtime,
            session,
            landmarker: LandmarkerInit::NotNeeded,
            catalog,
            catalog_error,
            selected_at: Instant::now(),
            clock: Instant::now(),
            measurement: false,
            show_session_info: false,
            ui_components: UIComponents::new(&cc.egui_ctx),
            video_widget: VideoWidget::new(),
        };
        if app.config.tracking.mode == ScanMode::Live {
            app.start_landmarker_init();
        }
        app
    }

    fn start_landmarker_init(&mut self) {
        let options = self.config.landmarker.options();
        let (tx, rx) = oneshot::channel();
        self.runtime.spawn(async move {
            let result = MediaPipeLandmarker::initialize(options).await;
            let _ = tx.send(result);
        });
        self.landmarker = LandmarkerInit::Loading(rx);
    }

    fn poll_landmarker(&mut self) {
        let LandmarkerInit::Loading(rx) = &mut self.landmarker else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(landmarker)) => {
                self.session.attach_source(Box::new(landmarker));
                self.landmarker = LandmarkerInit::Ready;
            }
            Ok(Err(e)) => {
                error!("Hand landmarker failed to load: {}", e);
                self.landmarker = LandmarkerInit::Failed(e.to_string());
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => {
                self.landmarker = LandmarkerInit::Failed("initializer exited without a result".into());
            }
        }
    }

    fn switch_camera(&mut self) {
        self.video_widget.clear();
        if let Err(e) = self.session.switch_camera() {
            warn!("Camera switch failed: {}", e);
        }
    }

    fn open_catalog(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .set_title("Open product catalog")
            .add_filter("JSON", &["json"])
            .pick_file()
        else {
            return;
        };

        match Catalog::load(&path) {
            Ok(catalog) => {
                self.catalog = catalog;
                self.catalog_error = None;
                self.selected_at = Instant::now();
                self.config.catalog_path = Some(path);
                if let Err(e) = self.config.save(&self.config_path) {
                    warn!("Could not save configuration: {}", e);
                }
            }
            Err(e) => {
                warn!("{}", e);
                self.catalog_error = Some(e.to_string());
            }
        }
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(10.0);
            egui::menu::bar(ui, |ui| {
                ui.heading("Virtual Ring Try-On");

                ui.separator();

                let facing = self.session.facing();
                if ui
                    .button(format!("🔄 {}", facing.opposite().label()))
                    .on_hover_text(format!("Currently using the {}", facing.label().to_lowercase()))
                    .clicked()
                {
                    self.switch_camera();
                }

                ui.toggle_value(&mut self.measurement, "📏 Measurement");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("ℹ Session").clicked() {
                        self.show_session_info = !self.show_session_info;
                    }
                    if ui.button("📂 Open catalog…").clicked() {
                        self.open_catalog();
                    }
                });
            });
            ui.add_space(10.0);
        });
    }

    fn render_product_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("products")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| {
                ui.heading("Products");
                ui.add_space(6.0);

                if let Some(e) = &self.catalog_error {
                    ui.colored_label(self.ui_components.theme.error, e);
                }
                if self.catalog.products().is_empty() {
                    ui.label("No catalog loaded.");
                }

                let selected = self.catalog.selected_index();
                let mut clicked = None;
                TableBuilder::new(ui)
                    .striped(true)
                    .column(Column::remainder())
                    .column(Column::auto())
                    .header(20.0, |mut header| {
                        header.col(|ui| {
                            ui.strong("Name");
                        });
                        header.col(|ui| {
                            ui.strong("Price");
                        });
                    })
                    .body(|mut body| {
                        for (index, product) in self.catalog.products().iter().enumerate() {
                            body.row(24.0, |mut row| {
                                row.col(|ui| {
                                    if ui.selectable_label(selected == Some(index), &product.name).clicked() {
                                        clicked = Some(index);
                                    }
                                });
                                row.col(|ui| {
                                    ui.label(&product.price);
                                });
                            });
                        }
                    });

                if let Some(index) = clicked {
                    if self.catalog.select(index) {
                        self.selected_at = Instant::now();
                    }
                }

                if self.measurement {
                    ui.add_space(12.0);
                    match &self.session.snapshot().ring_size {
                        Some(size) => self.ui_components.draw_ring_size(ui, size),
                        None => {
                            ui.label("Complete a scan to see your ring size.");
                        }
                    }
                }
            });
    }

    fn render_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let snapshot = self.session.snapshot();
                let state_color = match snapshot.state {
                    DetectionState::Detected => self.ui_components.theme.success,
                    DetectionState::Lost => self.ui_components.theme.error,
                    DetectionState::Scanning => self.ui_components.theme.text_secondary,
                };
                ui.colored_label(state_color, snapshot.state.as_str());
                ui.separator();

                match &self.landmarker {
                    LandmarkerInit::NotNeeded => {
                        ui.label("Simulated scan");
                    }
                    LandmarkerInit::Loading(_) => {
                        ui.spinner();
                        ui.label("Loading hand model…");
                    }
                    LandmarkerInit::Ready => {
                        ui.label("Hand model ready");
                    }
                    LandmarkerInit::Failed(_) => {
                        ui.colored_label(self.ui_components.theme.error, "Hand model unavailable");
                    }
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.colored_label(
                        self.ui_components.theme.accent,
                        format!(
                            "Session {} · {}",
                            &self.session.id().to_string()[..8],
                            self.session.started_at().format("%H:%M:%S")
                        ),
                    );
                });
            });
        });
    }

    fn render_main_content(&mut self, ctx: &egui::Context) {
        let frame = egui::Frame::central_panel(&ctx.style()).fill(self.ui_components.theme.background);
        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            if let Some(e) = self.session.camera_error().map(str::to_owned) {
                ui.vertical_centered(|ui| {
                    ui.add_space(40.0);
                    ui.colored_label(self.ui_components.theme.error, e);
                    if ui.button("Try again").clicked() {
                        self.session.reopen_camera();
                    }
                });
                return;
            }

            if let LandmarkerInit::Failed(e) = &self.landmarker {
                let message = format!("Hand tracking could not start: {}", e);
                let mut retry = false;
                ui.horizontal(|ui| {
                    ui.colored_label(self.ui_components.theme.error, message);
                    retry = ui.button("Retry").clicked();
                });
                if retry {
                    info!("Retrying hand landmarker initialization");
                    self.start_landmarker_init();
                }
            }

            let snapshot = self.session.snapshot();
            let product = self.catalog.selected();
            let image = self.catalog.selected_image_uri(self.selected_at.elapsed());
            let sprite = self.ui_components.ring_sprite(ctx, image.as_deref());
            let caption = product.map(|p| p.name.as_str());

            let rect = self.video_widget.show(ui, &snapshot, sprite, caption);
            if snapshot.state == DetectionState::Detected {
                self.ui_components.draw_detected_badge(ui, rect);
            } else {
                self.ui_components.draw_scanning_indicator(ui, rect, &snapshot);
            }
        });
    }

    fn render_session_window(&mut self, ctx: &egui::Context) {
        let stats = self.session.tracking().stats();
        egui::Window::new("Session")
            .open(&mut self.show_session_info)
            .resizable(false)
            .default_size([320.0, 200.0])
            .show(ctx, |ui| {
                egui::Grid::new("session_grid").num_columns(2).show(ui, |ui| {
                    ui.label("Id");
                    ui.label(self.session.id().to_string());
                    ui.end_row();
                    ui.label("Started");
                    ui.label(self.session.started_at().format("%Y-%m-%d %H:%M:%S").to_string());
                    ui.end_row();
                    ui.label("Camera");
                    ui.label(self.session.facing().label());
                    ui.end_row();
                    ui.label("Ticks");
                    ui.label(stats.ticks.to_string());
                    ui.end_row();
                    ui.label("Detector calls");
                    ui.label(stats.detector_calls.to_string());
                    ui.end_row();
                    ui.label("Skipped frames");
                    ui.label(stats.skipped.to_string());
                    ui.end_row();
                    ui.label("Detector failures");
                    ui.label(stats.failures.to_string());
                    ui.end_row();
                });
                ui.add_space(6.0);
                ui.label(format!("Config: {}", self.config_path.display()));
            });
    }
}

impl eframe::App for RingTryOnApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_landmarker();

        let now_ms = self.clock.elapsed().as_secs_f64() * 1000.0;
        if let TickOutcome::Detected(placement) = self.session.pump(now_ms) {
            tracing::trace!("Ring at ({:.0}, {:.0})", placement.center_x, placement.center_y);
        }
        if let Some(frame) = self.session.display_frame() {
            self.video_widget.update_frame(ctx, &frame);
        }

        self.render_header(ctx);
        self.render_status_bar(ctx);
        self.render_product_panel(ctx);

        if self.show_session_info {
            self.render_session_window(ctx);
        }

        self.render_main_content(ctx);

        // Each repaint is one display frame for the tracking loop
        ctx.request_repaint();
    }
}

impl Drop for RingTryOnApp {
    fn drop(&mut self) {
        self.session.teardown();
    }
}
