// src/main.rs
mod app;
mod ui;

use anyhow::Context;
use eframe::egui;
use ring_tryon::config::AppConfig;
use ring_tryon::video;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    if let Ok(p) = std::env::current_exe() {
        info!("Running from: {}", p.display());
    }

    match video::list_cameras() {
        Ok(cameras) => {
            info!("Found {} camera(s)", cameras.len());
            for camera in &cameras {
                info!("  {}", camera);
            }
        }
        Err(e) => warn!("Failed to query cameras: {}", e),
    }

    let config_path = AppConfig::default_path();
    let config = AppConfig::load_or_default(&config_path)
        .with_context(|| format!("invalid configuration at {}", config_path.display()))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([960.0, 640.0]),
        centered: true,
        ..Default::default()
    };

    eframe::run_native(
        "Virtual Ring Try-On",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(create_visuals());
            Box::new(app::RingTryOnApp::new(cc, config, config_path, runtime))
        }),
    )
    .map_err(|e| anyhow::anyhow!("error running application: {}", e))
}

fn create_visuals() -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();

    visuals.widgets.noninteractive.bg_fill = egui::Color32::from_rgb(30, 30, 35);
    visuals.widgets.inactive.bg_fill = egui::Color32::from_rgb(45, 45, 52);
    visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(55, 55, 65);
    visuals.widgets.active.bg_fill = egui::Color32::from_rgb(201, 162, 39);
    visuals.selection.bg_fill = egui::Color32::from_rgb(150, 120, 30);

    visuals.widgets.noninteractive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.inactive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.hovered.rounding = egui::Rounding::same(8.0);
    visuals.widgets.active.rounding = egui::Rounding::same(8.0);

    visuals.window_rounding = egui::Rounding::same(12.0);
    visuals.menu_rounding = egui::Rounding::same(8.0);

    visuals
}
