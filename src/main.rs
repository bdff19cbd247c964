// src/main.rs
//
// V/I DATA ACQUISITION UNIT - Rust GUI
//
// Top:     title bar
// Left:    SidePanel "Experiment Setup": port / readings / stabilization + Start, table, export
// Center:  "Graph Configuration": X/Y axis selection + plot
// Bottom:  Event Log

mod config;
mod error;
mod export;
mod protocol;
mod render;
mod runner;
mod serial;
mod session;
mod store;

use crate::config::{AppConfig, RunForm};
use crate::render::{Axis, PlotView};
use crate::runner::{RunState, RunUpdate, Runner, StartOutcome};
use crate::serial::SerialConnector;
use crate::session::Phase;
use crate::store::SampleStore;
use chrono::Local;
use eframe::{egui, NativeOptions};
use egui::{Align, Color32, FontFamily, FontId, Layout, TextStyle};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

const NO_PORTS: &str = "No ports found";

// ================= GUI state =================

struct Status {
    text: String,
    color: Color32,
}

impl Status {
    fn new(text: impl Into<String>, color: Color32) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }

    fn idle() -> Self {
        Self::new("Status: Idle", Color32::GRAY)
    }

    fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Connecting => Self::new("Status: Connecting...", Color32::YELLOW),
            Phase::Stabilizing(d) => Self::new(
                format!("Status: Stabilizing for {}s...", d.as_secs_f64()),
                Color32::from_rgb(0, 200, 220),
            ),
            Phase::Reading { index, total } => Self::new(
                format!("Status: Taking reading {}/{}...", index, total),
                Color32::from_rgb(60, 200, 90),
            ),
        }
    }

    fn error(message: String) -> Self {
        Self::new(message, Color32::from_rgb(230, 70, 70))
    }
}

struct DaqApp {
    cfg: AppConfig,
    runner: Runner,
    store: SampleStore,

    ports: Vec<String>,
    form: RunForm,
    x_axis: Axis,
    y_axis: Axis,

    // rebuilt on new samples, run completion and axis changes
    plot: Option<PlotView>,
    status: Status,
    show_table: bool,

    log_lines: Vec<String>,
    max_log_lines: usize,
}

impl DaqApp {
    fn new(cc: &eframe::CreationContext<'_>, cfg: AppConfig) -> Self {
        let ctx = &cc.egui_ctx;
        ctx.set_visuals(egui::Visuals::dark());

        let mut style = (*ctx.style()).clone();
        style
            .text_styles
            .insert(TextStyle::Body, FontId::new(15.0, FontFamily::Proportional));
        style
            .text_styles
            .insert(TextStyle::Heading, FontId::new(22.0, FontFamily::Proportional));
        ctx.set_style(style);

        let ports = serial::available_ports();
        let port = if ports.contains(&cfg.port_name) || ports.is_empty() {
            cfg.port_name.clone()
        } else {
            ports[0].clone()
        };

        Self {
            form: RunForm {
                port,
                readings: cfg.default_readings.to_string(),
                stabilization: cfg.default_stabilization_s.to_string(),
            },
            cfg,
            runner: Runner::new(),
            store: SampleStore::new(),
            ports,
            x_axis: Axis::ReadingNumber,
            y_axis: Axis::Voltage,
            plot: None,
            status: Status::idle(),
            show_table: false,
            log_lines: Vec::new(),
            max_log_lines: 1000,
        }
    }

    fn push_log(&mut self, line: impl Into<String>) {
        let ts = Local::now().format("%H:%M:%S");
        self.log_lines.push(format!("[{}] {}", ts, line.into()));
        if self.log_lines.len() > self.max_log_lines {
            let overflow = self.log_lines.len() - self.max_log_lines;
            self.log_lines.drain(0..overflow);
        }
    }

    fn refresh_ports(&mut self) {
        self.ports = serial::available_ports();
        if let Some(first) = self.ports.first() {
            if !self.ports.contains(&self.form.port) {
                self.form.port = first.clone();
            }
        }
        self.push_log(format!("Ports: {}", self.ports.join(", ")));
    }

    fn start_run(&mut self) {
        let connector = SerialConnector {
            baud_rate: self.cfg.baud_rate,
            read_timeout: self.cfg.read_timeout(),
        };

        match self.runner.start(
            connector,
            &self.form,
            self.cfg.session_settings(),
            &mut self.store,
        ) {
            Ok(StartOutcome::Started) => {
                self.show_table = false;
                self.plot = None;
                self.push_log(format!(
                    "===== RUN START {} x{} =====",
                    self.form.port.trim(),
                    self.form.readings.trim()
                ));
            }
            Ok(StartOutcome::AlreadyRunning) => {}
            Err(e) => {
                self.push_log(format!("[ERROR] {}", e));
                self.status = Status::error(e.status_message());
            }
        }
    }

    fn rebuild_plot(&mut self) {
        self.plot = Some(render::plot_view(&self.store, self.x_axis, self.y_axis));
    }

    fn handle_updates(&mut self) {
        let updates = self.runner.poll(&mut self.store);
        if updates.is_empty() {
            return;
        }

        let mut samples_changed = false;
        for update in updates {
            match update {
                RunUpdate::Phase(p) => self.status = Status::for_phase(p),
                RunUpdate::Line(l) => self.push_log(l),
                RunUpdate::SampleAdded { index } => {
                    log::debug!("sample {} stored", index);
                    samples_changed = true;
                }
                RunUpdate::Finished { samples } => {
                    self.status =
                        Status::new("Status: Experiment Complete!", Color32::from_rgb(50, 230, 50));
                    self.push_log(format!("===== RUN COMPLETE: {} samples =====", samples));
                    samples_changed = true;
                }
                RunUpdate::Failed(e) => {
                    self.status = Status::error(e.status_message());
                    self.push_log(format!("[ERROR] {}", e));
                    samples_changed = true;
                }
            }
        }

        if samples_changed {
            self.rebuild_plot();
        }
    }

    fn export_csv(&mut self) {
        match export::write_csv(&self.store, Path::new(&self.cfg.export_folder)) {
            Ok(path) => self.push_log(format!("Exported {}", path.display())),
            Err(e) => {
                self.push_log(format!("[ERROR] export failed: {:#}", e));
                self.status = Status::error(format!("Error: {}", e));
            }
        }
    }

    fn open_export_folder(&self) {
        let folder = self.cfg.export_folder.clone();
        if let Err(e) = std::fs::create_dir_all(&folder) {
            log::warn!("creating {} failed: {}", folder, e);
        }

        #[cfg(target_os = "windows")]
        {
            let _ = Command::new("explorer").arg(folder).spawn();
        }
        #[cfg(target_os = "linux")]
        {
            let _ = Command::new("xdg-open").arg(folder).spawn();
        }
        #[cfg(target_os = "macos")]
        {
            let _ = Command::new("open").arg(folder).spawn();
        }
    }

    fn data_available(&self) -> bool {
        self.runner.state() == RunState::Complete && !self.store.is_empty()
    }

    // left panel
    fn ui_setup_panel(&mut self, ui: &mut egui::Ui) {
        let running = self.runner.is_running();

        ui.add_space(6.0);
        ui.vertical_centered(|ui| {
            ui.label(egui::RichText::new("Experiment Setup").size(17.0).strong());
        });
        ui.add(egui::Separator::default());
        ui.add_space(6.0);

        ui.add_enabled_ui(!running, |ui| {
            ui.label(egui::RichText::new("COM Port:").strong());
            let selected = if self.form.port.is_empty() {
                NO_PORTS.to_string()
            } else {
                self.form.port.clone()
            };
            egui::ComboBox::from_id_salt("port_combo")
                .selected_text(selected)
                .width(180.0)
                .show_ui(ui, |ui| {
                    if self.ports.is_empty() {
                        ui.label(NO_PORTS);
                    }
                    for p in &self.ports {
                        ui.selectable_value(&mut self.form.port, p.clone(), p.as_str());
                    }
                });
            if ui.button("Refresh Ports").clicked() {
                self.refresh_ports();
            }

            ui.add_space(12.0);
            ui.label(egui::RichText::new("Number of Readings:").strong());
            ui.add(
                egui::TextEdit::singleline(&mut self.form.readings)
                    .hint_text("e.g., 10")
                    .desired_width(180.0),
            );

            ui.add_space(12.0);
            ui.label(egui::RichText::new("Stabilization Time (s):").strong());
            ui.add(
                egui::TextEdit::singleline(&mut self.form.stabilization)
                    .hint_text("e.g., 5.0")
                    .desired_width(180.0),
            );
        });

        ui.add_space(18.0);

        let (start_text, start_color) = if running {
            ("Running...", Color32::from_gray(90))
        } else {
            ("Start Experiment", Color32::from_rgb(80, 200, 120))
        };
        let start_btn = egui::Button::new(
            egui::RichText::new(start_text)
                .strong()
                .color(Color32::BLACK),
        )
        .fill(start_color)
        .min_size(egui::vec2(180.0, 30.0));
        if ui.add_enabled(!running, start_btn).clicked() {
            self.start_run();
        }

        ui.add_space(10.0);
        let has_data = self.data_available();
        if ui
            .add_enabled(has_data, egui::Button::new("Show Data Table"))
            .clicked()
        {
            self.show_table = true;
        }
        ui.horizontal(|ui| {
            if ui
                .add_enabled(has_data, egui::Button::new("Export CSV"))
                .clicked()
            {
                self.export_csv();
            }
            if ui.button("Open Folder").clicked() {
                self.open_export_folder();
            }
        });

        ui.with_layout(Layout::bottom_up(Align::Min), |ui| {
            ui.add_space(8.0);
            ui.colored_label(self.status.color, self.status.text.as_str());
        });
    }

    fn axis_combo(ui: &mut egui::Ui, id: &str, axis: &mut Axis) -> bool {
        let before = *axis;
        egui::ComboBox::from_id_salt(id)
            .selected_text(axis.name())
            .width(180.0)
            .show_ui(ui, |ui| {
                for a in Axis::ALL {
                    ui.selectable_value(axis, a, a.name());
                }
            });
        *axis != before
    }

    // center panel
    fn ui_graph_panel(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.heading("Graph Configuration");
        });
        ui.add_space(8.0);

        let mut changed = false;
        egui::Grid::new("axis_grid")
            .num_columns(2)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                ui.label(egui::RichText::new("X-Axis:").strong());
                changed |= Self::axis_combo(ui, "x_axis_combo", &mut self.x_axis);
                ui.end_row();

                ui.label(egui::RichText::new("Y-Axis:").strong());
                changed |= Self::axis_combo(ui, "y_axis_combo", &mut self.y_axis);
                ui.end_row();
            });

        if changed {
            log::debug!(
                "axes changed: X={} Y={}",
                self.x_axis.name(),
                self.y_axis.name()
            );
            if self.plot.is_some() {
                self.rebuild_plot();
            }
        }

        ui.add_space(8.0);

        match &self.plot {
            Some(view) => render::show(ui, view),
            None => {
                ui.centered_and_justified(|ui| {
                    ui.label(
                        egui::RichText::new(
                            "Graph will appear here after experiment\n\n\
                             Select X and Y axis options above\n\
                             and run an experiment to see data visualization",
                        )
                        .size(16.0)
                        .color(Color32::GRAY),
                    );
                });
            }
        }
    }

    fn ui_table_window(&mut self, ctx: &egui::Context) {
        if !self.show_table {
            return;
        }
        let Some(table) = self.store.table() else {
            self.show_table = false;
            return;
        };

        let mut open = self.show_table;
        egui::Window::new("Collected Data")
            .open(&mut open)
            .default_size([500.0, 400.0])
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .auto_shrink([false; 2])
                    .show(ui, |ui| {
                        ui.label(egui::RichText::new(table).monospace());
                    });
            });
        self.show_table = open;
    }
}

impl eframe::App for DaqApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. worker events first
        self.handle_updates();
        ctx.request_repaint_after(Duration::from_millis(50));

        // 2. title bar
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(8.0);
                ui.label(
                    egui::RichText::new("V/I (Voltage/Current) Data Acquisition Unit")
                        .size(26.0)
                        .strong(),
                );
                ui.add_space(8.0);
            });
        });

        // 3. Event Log
        egui::TopBottomPanel::bottom("log_panel")
            .resizable(false)
            .default_height(150.0)
            .min_height(110.0)
            .show(ctx, |ui| {
                ui.add_space(4.0);
                ui.label(egui::RichText::new("Event Log").strong());
                ui.add_space(4.0);

                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .auto_shrink([false; 2])
                    .show(ui, |ui| {
                        for line in &self.log_lines {
                            let color = if line.contains("ERROR") {
                                Color32::from_rgb(220, 60, 60)
                            } else if line.contains("=====") {
                                Color32::from_rgb(120, 180, 255)
                            } else {
                                Color32::from_gray(190)
                            };
                            ui.label(egui::RichText::new(line).monospace().color(color));
                        }
                    });
            });

        // 4. setup panel
        egui::SidePanel::left("setup_panel")
            .resizable(false)
            .min_width(240.0)
            .max_width(260.0)
            .show(ctx, |ui| {
                self.ui_setup_panel(ui);
            });

        // 5. graph
        egui::CentralPanel::default().show(ctx, |ui| {
            self.ui_graph_panel(ui);
        });

        self.ui_table_window(ctx);
    }
}

// ================= main =================

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = AppConfig::load();

    let native_options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(egui::vec2(1000.0, 650.0))
            .with_min_inner_size(egui::vec2(800.0, 560.0))
            .with_title("V/I Data Acquisition Unit - v2.0"),
        ..Default::default()
    };

    eframe::run_native(
        "vi_daq_gui",
        native_options,
        Box::new(move |cc| Ok(Box::new(DaqApp::new(cc, cfg)))),
    )
}
