// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod drivers;
mod engine;
mod error;
mod filter;
mod gui;
mod recorder;
mod types;
use config::SessionConfig;
use eframe::egui;
use std::path::PathBuf;
// 入口函数：可选参数为会话配置 JSON
fn main() -> eframe::Result<()> {
    env_logger::init();
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => SessionConfig::load(path).unwrap_or_else(|e| {
            log::error!("{e}");
            SessionConfig::default()
        }),
        None => SessionConfig::default(),
    };
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1200.0, 760.0])
        .with_min_inner_size([900.0, 560.0])
        .with_title("DacDAQ");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "DacDAQ",
        options,
        Box::new(move |_cc| Box::new(gui::DacDaqApp::new(config, config_path))),
    )
}
