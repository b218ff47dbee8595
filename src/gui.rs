// src/gui.rs
use eframe::egui;
use egui::Color32;
use egui_plot::{Legend, Line, Plot, PlotPoints};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};

use crate::config::SessionConfig;
use crate::drivers;
use crate::engine::{AcquisitionSession, SessionHandle};
use crate::types::*;

const PLOT_HISTORY: usize = 500;
const LOG_LINES: usize = 8;

pub struct DacDaqApp {
    // 会话配置
    config: SessionConfig,
    output_path: String,
    config_path: String,

    // 当前会话
    session: Option<SessionHandle>,
    rx: Option<Receiver<SessionEvent>>,

    // 数据流
    sample_index: f64,
    raw_points: Vec<[f64; 2]>,
    filtered_points: Vec<[f64; 2]>,
    last_raw: Option<f64>,
    last_filtered: Option<f64>,

    comment: String,
    log_messages: Vec<String>,
}

impl DacDaqApp {
    pub fn new(config: SessionConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            output_path: config.output_file.display().to_string(),
            config_path: config_path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "dacdaq_config.json".to_owned()),
            config,
            session: None,
            rx: None,
            sample_index: 0.0,
            raw_points: Vec::new(),
            filtered_points: Vec::new(),
            last_raw: None,
            last_filtered: None,
            comment: String::new(),
            log_messages: vec!["DacDAQ ready.".to_owned()],
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > LOG_LINES {
            self.log_messages.remove(0);
        }
    }

    fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(SessionHandle::state)
            .unwrap_or(SessionState::Idle)
    }

    fn push_point(buf: &mut Vec<[f64; 2]>, x: f64, y: f64) {
        buf.push([x, y]);
        if buf.len() > PLOT_HISTORY {
            buf.remove(0);
        }
    }

    fn start_session(&mut self) {
        self.config.output_file = PathBuf::from(self.output_path.trim());
        if self.config.output_file.as_os_str().is_empty() {
            self.log("Choose an output file first.");
            return;
        }
        let entry = match self.config.resolve_instrument() {
            Ok(entry) => entry,
            Err(e) => {
                self.log(&e.to_string());
                return;
            }
        };
        let (tx, rx) = channel();
        let session = AcquisitionSession::new(self.config.clone(), entry.build(&self.config), tx);
        let handle = session.handle();
        match session.start() {
            Ok(_) => {
                self.raw_points.clear();
                self.filtered_points.clear();
                self.sample_index = 0.0;
                self.session = Some(handle);
                self.rx = Some(rx);
                self.log(&format!("Started {}", entry.name));
            }
            Err(e) => self.log(&format!("Cannot spawn acquisition thread: {e}")),
        }
    }

    fn stop_session(&mut self) {
        if let Some(handle) = &self.session {
            handle.request_stop();
        }
    }

    fn add_comment(&mut self) {
        let text = self.comment.trim().to_owned();
        if text.is_empty() {
            return;
        }
        if let Some(handle) = &self.session {
            handle.annotate(&text);
            self.log(&format!("Comment: {text}"));
            self.comment.clear();
        }
    }

    fn drain_events(&mut self) {
        let Some(rx) = &self.rx else { return };
        let events: Vec<SessionEvent> = rx.try_iter().collect();
        for event in events {
            match event {
                SessionEvent::RawSample(v) => {
                    self.sample_index += 1.0;
                    self.last_raw = Some(v);
                    Self::push_point(&mut self.raw_points, self.sample_index, v);
                }
                SessionEvent::FilteredSample(v) => {
                    self.last_filtered = Some(v);
                    Self::push_point(&mut self.filtered_points, self.sample_index, v);
                }
                SessionEvent::Error(msg) => self.log(&format!("ERROR: {msg}")),
                SessionEvent::Finished => {
                    self.log("Acquisition finished.");
                    self.rx = None;
                }
            }
        }
    }

    fn config_panel(&mut self, ui: &mut egui::Ui, editable: bool) {
        ui.add_enabled_ui(editable, |ui| {
            ui.horizontal(|ui| {
                ui.text_edit_singleline(&mut self.config_path);
                if ui.button("Load Config").clicked() {
                    match SessionConfig::load(PathBuf::from(&self.config_path).as_path()) {
                        Ok(config) => {
                            self.output_path = config.output_file.display().to_string();
                            self.config = config;
                            self.log("Configuration loaded.");
                        }
                        Err(e) => self.log(&e.to_string()),
                    }
                }
                if ui.button("Save Config").clicked() {
                    self.config.output_file = PathBuf::from(self.output_path.trim());
                    match self.config.save(PathBuf::from(&self.config_path).as_path()) {
                        Ok(()) => self.log("Configuration saved."),
                        Err(e) => self.log(&e.to_string()),
                    }
                }
            });
            ui.separator();

            egui::ComboBox::from_label("Instrument")
                .selected_text(self.config.instrument_name.clone().unwrap_or_default())
                .show_ui(ui, |ui| {
                    for entry in drivers::INSTRUMENTS {
                        let selected = self.config.instrument_class == entry.selector;
                        if ui.selectable_label(selected, entry.name).clicked() {
                            self.config.instrument_class = entry.selector.to_owned();
                            self.config.instrument_name = Some(entry.name.to_owned());
                        }
                    }
                });
            ui.horizontal(|ui| {
                ui.label("Output file (CSV):");
                ui.text_edit_singleline(&mut self.output_path);
            });
            ui.horizontal(|ui| {
                ui.label("Filter window:");
                ui.add(egui::DragValue::new(&mut self.config.filter_window).clamp_range(1..=1000));
            });
            ui.label("Comments:");
            ui.text_edit_multiline(&mut self.config.comments);
        });
    }
}

impl Drop for DacDaqApp {
    fn drop(&mut self) {
        self.stop_session();
    }
}

impl eframe::App for DacDaqApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        let state = self.state();
        if state.is_active() {
            ctx.request_repaint();
        }

        egui::SidePanel::left("controls").min_width(320.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("DacDAQ");
            ui.label(format!("State: {}", state.label()));
            ui.separator();

            self.config_panel(ui, !state.is_active());
            ui.separator();

            ui.horizontal(|ui| {
                if ui.add_enabled(!state.is_active(), egui::Button::new("START")).clicked() {
                    self.start_session();
                }
                let pause_txt = if state == SessionState::Paused { "RESUME" } else { "PAUSE" };
                let can_pause = matches!(state, SessionState::Running | SessionState::Paused);
                if ui.add_enabled(can_pause, egui::Button::new(pause_txt)).clicked() {
                    if let Some(handle) = &self.session {
                        if state == SessionState::Paused {
                            handle.request_resume();
                        } else {
                            handle.request_pause();
                        }
                    }
                }
                if ui.add_enabled(state.is_active(), egui::Button::new("STOP")).clicked() {
                    self.stop_session();
                }
            });

            ui.add_space(10.0);
            ui.label("EVENT COMMENT");
            ui.horizontal(|ui| {
                let edit = ui.text_edit_singleline(&mut self.comment);
                let submitted = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                let can_comment = matches!(state, SessionState::Running | SessionState::Paused);
                if ui.add_enabled(can_comment, egui::Button::new("Add")).clicked()
                    || (submitted && can_comment)
                {
                    self.add_comment();
                }
            });

            ui.add_space(10.0);
            egui::ScrollArea::vertical().max_height(140.0).show(ui, |ui| {
                for m in &self.log_messages {
                    ui.monospace(m);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                let fmt = |v: Option<f64>| v.map(|v| format!("{v:.6} V")).unwrap_or_else(|| "--".to_owned());
                ui.label(egui::RichText::new(format!("Raw: {}", fmt(self.last_raw))).strong());
                ui.label(
                    egui::RichText::new(format!("Filtered: {}", fmt(self.last_filtered)))
                        .strong()
                        .color(Color32::YELLOW),
                );
            });
            Plot::new("voltage_plot")
                .legend(Legend::default())
                .auto_bounds_x()
                .auto_bounds_y()
                .show(ui, |plot_ui| {
                    if !self.raw_points.is_empty() {
                        plot_ui.line(
                            Line::new(PlotPoints::new(self.raw_points.clone()))
                                .name("Raw")
                                .color(Color32::from_rgb(0, 200, 255)),
                        );
                    }
                    if !self.filtered_points.is_empty() {
                        plot_ui.line(
                            Line::new(PlotPoints::new(self.filtered_points.clone()))
                                .name("Filtered")
                                .color(Color32::YELLOW),
                        );
                    }
                });
        });
    }
}
