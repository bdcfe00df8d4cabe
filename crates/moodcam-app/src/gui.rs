//! eframe desktop window: live video, current emotion, running counts.
//!
//! Detection runs inside `update` whenever the configured interval has
//! elapsed, so camera, locator and scorer never leave the GUI thread.

use crate::screenshot;
use crate::session::{FaceResult, Session};
use crate::settings::{
    SettingValue, Settings, SettingsStore, Theme, CAMERA_INDEX_RANGE, DETECTION_INTERVAL_RANGE,
    MIN_FACE_SIZE_RANGE,
};
use eframe::egui;
use moodcam_core::{DetectionQuality, Emotion};
use moodcam_hw::Frame;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const WINDOW_TITLE: &str = "Real-time Emotion Detection";
const STATUS_TTL: Duration = Duration::from_secs(3);
/// Order of rows in the statistics panel.
const STATS_ORDER: [Emotion; Emotion::COUNT] = [
    Emotion::Happy,
    Emotion::Sad,
    Emotion::Angry,
    Emotion::Surprise,
    Emotion::Fear,
    Emotion::Disgust,
    Emotion::Neutral,
];
const SHORTCUTS: [(&str, &str); 4] = [
    ("Space", "Start/Stop detection"),
    ("Ctrl+S", "Capture screenshot"),
    ("Ctrl+,", "Open settings"),
    ("Ctrl+Q", "Exit application"),
];

/// Launch the window and block until it closes.
pub fn run(app: MoodcamApp) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(WINDOW_TITLE, options, Box::new(|_cc| Ok(Box::new(app))))
}

/// Status bar text with an optional expiry.
#[derive(Debug, Clone)]
struct StatusLine {
    message: String,
    expires: Option<Instant>,
}

impl StatusLine {
    const IDLE: &'static str = "Ready";

    fn new() -> Self {
        Self {
            message: Self::IDLE.to_string(),
            expires: None,
        }
    }

    fn show_for(&mut self, message: impl Into<String>, ttl: Duration, now: Instant) {
        self.message = message.into();
        self.expires = Some(now + ttl);
    }

    fn text(&self, now: Instant) -> &str {
        match self.expires {
            Some(at) if now >= at => Self::IDLE,
            _ => &self.message,
        }
    }
}

/// Largest size with the image's aspect ratio that fits in `available`.
fn fit_size(available: egui::Vec2, image: egui::Vec2) -> egui::Vec2 {
    if image.x <= 0.0 || image.y <= 0.0 {
        return egui::Vec2::ZERO;
    }
    let scale = (available.x / image.x).min(available.y / image.y).max(0.0);
    image * scale
}

fn title_case(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn color32([r, g, b]: [u8; 3]) -> egui::Color32 {
    egui::Color32::from_rgb(r, g, b)
}

enum DialogAction {
    Save,
    Cancel,
    Reset,
}

pub struct MoodcamApp {
    session: Session,
    settings: SettingsStore,
    screenshot_dir: PathBuf,
    running: bool,
    last_tick: Option<Instant>,
    /// Last annotated frame, kept for screenshots.
    last_frame: Option<Frame>,
    faces: Vec<FaceResult>,
    fps: Option<f32>,
    texture: Option<egui::TextureHandle>,
    status: StatusLine,
    applied_theme: Option<Theme>,
    settings_draft: Option<Settings>,
    show_about: bool,
    show_shortcuts: bool,
    confirm_exit: bool,
    exit_confirmed: bool,
}

impl MoodcamApp {
    pub fn new(session: Session, settings: SettingsStore, screenshot_dir: PathBuf) -> Self {
        Self {
            session,
            settings,
            screenshot_dir,
            running: false,
            last_tick: None,
            last_frame: None,
            faces: Vec::new(),
            fps: None,
            texture: None,
            status: StatusLine::new(),
            applied_theme: None,
            settings_draft: None,
            show_about: false,
            show_shortcuts: false,
            confirm_exit: false,
            exit_confirmed: false,
        }
    }

    fn notify(&mut self, message: impl Into<String>) {
        self.status.show_for(message, STATUS_TTL, Instant::now());
    }

    /// Push new settings into the session and the visuals.
    fn sync_settings(&mut self, ctx: &egui::Context) {
        let revision = self.settings.revision();
        if let Err(e) = self.session.apply_settings(self.settings.settings(), revision) {
            tracing::warn!(error = %e, "failed to apply settings");
            self.notify(e.status_message());
        }

        let theme = self.settings.settings().theme;
        if self.applied_theme != Some(theme) {
            ctx.set_visuals(match theme {
                Theme::Dark => egui::Visuals::dark(),
                Theme::Light => egui::Visuals::light(),
            });
            self.applied_theme = Some(theme);
        }
    }

    fn toggle_detection(&mut self) {
        self.running = !self.running;
        if self.running {
            self.session.restart();
            self.last_tick = None;
            self.notify("Detection started - Analyzing emotions...");
        } else {
            self.notify("Detection stopped");
        }
        tracing::info!(running = self.running, "detection toggled");
    }

    fn capture_screenshot(&mut self) {
        if !self.settings.settings().save_screenshots {
            self.notify("Screenshots are disabled in settings");
            return;
        }
        match screenshot::save(self.last_frame.as_ref(), &self.screenshot_dir) {
            Ok(path) => self.notify(format!("Screenshot saved: {}", path.display())),
            Err(screenshot::ScreenshotError::NoFrame) => {
                self.notify("Error: No video feed available")
            }
            Err(e) => {
                tracing::warn!(error = %e, "screenshot failed");
                self.notify(format!("Error: {e}"));
            }
        }
    }

    fn set_theme(&mut self, theme: Theme) {
        let value = SettingValue::Text(theme.as_str().to_string());
        if let Err(e) = self.settings.set("theme", value) {
            self.notify(format!("Error: {e}"));
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        use egui::{Key, Modifiers};

        let (space, save, settings, quit) = ctx.input_mut(|i| {
            (
                i.consume_key(Modifiers::NONE, Key::Space),
                i.consume_key(Modifiers::COMMAND, Key::S),
                i.consume_key(Modifiers::COMMAND, Key::Comma),
                i.consume_key(Modifiers::COMMAND, Key::Q),
            )
        });

        if space {
            self.toggle_detection();
        }
        if save {
            self.capture_screenshot();
        }
        if settings {
            self.open_settings();
        }
        if quit {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn open_settings(&mut self) {
        self.settings_draft = Some(self.settings.settings().clone());
    }

    /// Run a detection tick if the interval has elapsed.
    fn maybe_tick(&mut self, ctx: &egui::Context) {
        if !self.running {
            return;
        }
        let interval = self.settings.settings().interval();
        let now = Instant::now();
        if self.last_tick.is_some_and(|t| now.duration_since(t) < interval) {
            ctx.request_repaint_after(interval);
            return;
        }
        self.last_tick = Some(now);

        match self.session.tick() {
            Ok(out) => {
                let image = egui::ColorImage::from_rgb(
                    [out.frame.width as usize, out.frame.height as usize],
                    &out.frame.data,
                );
                self.texture = Some(ctx.load_texture("camera", image, egui::TextureOptions::LINEAR));
                self.faces = out.faces;
                self.fps = out.fps;
                self.last_frame = Some(out.frame);
            }
            Err(e) => self.notify(e.status_message()),
        }
        ctx.request_repaint_after(interval);
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Settings").clicked() {
                        self.open_settings();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Exit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        ui.close_menu();
                    }
                });
                ui.menu_button("View", |ui| {
                    ui.menu_button("Theme", |ui| {
                        if ui.button("Dark").clicked() {
                            self.set_theme(Theme::Dark);
                            ui.close_menu();
                        }
                        if ui.button("Light").clicked() {
                            self.set_theme(Theme::Light);
                            ui.close_menu();
                        }
                    });
                });
                ui.menu_button("Help", |ui| {
                    if ui.button("About").clicked() {
                        self.show_about = true;
                        ui.close_menu();
                    }
                    if ui.button("Keyboard Shortcuts").clicked() {
                        self.show_shortcuts = true;
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(self.status.text(Instant::now()));
        });
    }

    fn emotion_panel(&self, ctx: &egui::Context) {
        egui::SidePanel::right("emotion")
            .min_width(300.0)
            .resizable(false)
            .show(ctx, |ui| {
                let current = self.session.current();
                let color = color32(current.emotion.color());

                ui.vertical_centered(|ui| {
                    ui.add_space(16.0);
                    ui.label(egui::RichText::new(current.emotion.emoji()).size(72.0));
                    ui.label(
                        egui::RichText::new(current.emotion.as_str().to_uppercase())
                            .size(24.0)
                            .strong()
                            .color(color),
                    );
                    ui.label(
                        egui::RichText::new(current.emotion.describe(current.confidence))
                            .size(14.0),
                    );
                });

                ui.add_space(24.0);
                ui.separator();
                ui.heading("Statistics");

                egui::Grid::new("stats")
                    .num_columns(3)
                    .spacing([24.0, 8.0])
                    .show(ui, |ui| {
                        for emotion in STATS_ORDER {
                            ui.label(egui::RichText::new(emotion.emoji()).size(20.0));
                            ui.label(egui::RichText::new(title_case(emotion.as_str())).strong());
                            ui.label(self.session.stats().count(emotion).to_string());
                            ui.end_row();
                        }
                    });
            });
    }

    fn video_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let controls_height = 40.0;
            let available =
                (ui.available_size() - egui::vec2(0.0, controls_height)).max(egui::Vec2::ZERO);

            match &self.texture {
                Some(texture) => {
                    let size = fit_size(available, texture.size_vec2());
                    ui.vertical_centered(|ui| {
                        let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
                        let painter = ui.painter_at(rect);
                        painter.image(
                            texture.id(),
                            rect,
                            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                            egui::Color32::WHITE,
                        );
                        self.paint_labels(&painter, rect, texture.size_vec2());
                    });
                }
                None => {
                    let (rect, _) = ui.allocate_exact_size(available, egui::Sense::hover());
                    ui.painter().rect_filled(rect, 10.0, egui::Color32::from_gray(26));
                    ui.painter().text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        "Press Space to start detection",
                        egui::FontId::proportional(18.0),
                        egui::Color32::GRAY,
                    );
                }
            }

            ui.horizontal(|ui| {
                let label = if self.running { "Stop Detection" } else { "Start Detection" };
                if ui.button(label).clicked() {
                    self.toggle_detection();
                }
                if ui.button("Capture Screenshot").clicked() {
                    self.capture_screenshot();
                }
            });
        });
    }

    /// Emotion labels, emoji and FPS over the video, in display coordinates.
    fn paint_labels(&self, painter: &egui::Painter, rect: egui::Rect, image: egui::Vec2) {
        let scale = rect.width() / image.x.max(1.0);
        let to_screen = |x: f32, y: f32| rect.min + egui::vec2(x * scale, y * scale);

        for result in &self.faces {
            let face = result.face;
            let emotion = result.assessment.emotion;
            let color = color32(emotion.color());

            painter.text(
                to_screen(face.x as f32, face.y as f32 - 10.0),
                egui::Align2::LEFT_BOTTOM,
                format!(
                    "{} ({}%)",
                    emotion.as_str().to_uppercase(),
                    result.assessment.confidence_percent()
                ),
                egui::FontId::proportional(18.0),
                color,
            );
            painter.text(
                to_screen((face.x + face.width as i32 + 10) as f32, face.y as f32 + 30.0),
                egui::Align2::LEFT_CENTER,
                emotion.emoji(),
                egui::FontId::proportional(28.0),
                color,
            );
        }

        if self.settings.settings().show_fps {
            if let Some(fps) = self.fps {
                painter.text(
                    rect.min + egui::vec2(10.0, 10.0),
                    egui::Align2::LEFT_TOP,
                    format!("FPS: {fps:.1}"),
                    egui::FontId::proportional(22.0),
                    egui::Color32::GREEN,
                );
            }
        }
    }

    fn settings_window(&mut self, ctx: &egui::Context) {
        let Some(draft) = self.settings_draft.as_mut() else {
            return;
        };
        let mut action = None;

        egui::Window::new("Settings")
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.heading("Appearance");
                egui::ComboBox::from_label("Theme")
                    .selected_text(draft.theme.as_str())
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut draft.theme, Theme::Dark, "dark");
                        ui.selectable_value(&mut draft.theme, Theme::Light, "light");
                    });

                ui.separator();
                ui.heading("Camera");
                ui.add(egui::Slider::new(&mut draft.camera_index, CAMERA_INDEX_RANGE).text("Camera Index"));

                ui.separator();
                ui.heading("Detection");
                egui::ComboBox::from_label("Detection Quality")
                    .selected_text(draft.detection_quality.as_str())
                    .show_ui(ui, |ui| {
                        for quality in DetectionQuality::ALL {
                            ui.selectable_value(&mut draft.detection_quality, quality, quality.as_str());
                        }
                    });
                ui.add(
                    egui::Slider::new(&mut draft.detection_interval, DETECTION_INTERVAL_RANGE)
                        .text("Detection Interval (ms)"),
                );
                ui.add(
                    egui::Slider::new(&mut draft.min_face_size, MIN_FACE_SIZE_RANGE)
                        .text("Min Face Size (px)"),
                );
                ui.checkbox(&mut draft.show_fps, "Show FPS");
                ui.checkbox(&mut draft.save_screenshots, "Allow screenshots");

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        action = Some(DialogAction::Save);
                    }
                    if ui.button("Cancel").clicked() {
                        action = Some(DialogAction::Cancel);
                    }
                    if ui.button("Reset to Defaults").clicked() {
                        action = Some(DialogAction::Reset);
                    }
                });
            });

        match action {
            Some(DialogAction::Save) => {
                if let Some(draft) = self.settings_draft.take() {
                    match self.settings.replace(draft) {
                        Ok(()) => self.notify("Settings saved"),
                        Err(e) => self.notify(format!("Error: {e}")),
                    }
                }
            }
            Some(DialogAction::Cancel) => self.settings_draft = None,
            Some(DialogAction::Reset) => match self.settings.reset() {
                Ok(()) => self.settings_draft = Some(Settings::default()),
                Err(e) => self.notify(format!("Error: {e}")),
            },
            None => {}
        }
    }

    fn dialogs(&mut self, ctx: &egui::Context) {
        if self.show_about {
            egui::Window::new("About Emotion Detection")
                .collapsible(false)
                .resizable(false)
                .open(&mut self.show_about)
                .show(ctx, |ui| {
                    ui.label("Real-time Face and Mood Detection System");
                    ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                    ui.add_space(8.0);
                    ui.label("Real-time emotion analysis using computer vision and deep learning.");
                });
        }

        if self.show_shortcuts {
            egui::Window::new("Keyboard Shortcuts")
                .collapsible(false)
                .resizable(false)
                .open(&mut self.show_shortcuts)
                .show(ctx, |ui| {
                    egui::Grid::new("shortcuts").num_columns(2).show(ui, |ui| {
                        for (key, what) in SHORTCUTS {
                            ui.label(egui::RichText::new(key).strong());
                            ui.label(what);
                            ui.end_row();
                        }
                    });
                });
        }

        if ctx.input(|i| i.viewport().close_requested()) && !self.exit_confirmed {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.confirm_exit = true;
        }

        if self.confirm_exit {
            egui::Window::new("Confirm Exit")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label("Are you sure you want to exit?");
                    ui.horizontal(|ui| {
                        if ui.button("Yes").clicked() {
                            self.exit_confirmed = true;
                            self.confirm_exit = false;
                            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        }
                        if ui.button("No").clicked() {
                            self.confirm_exit = false;
                        }
                    });
                });
        }
    }
}

impl eframe::App for MoodcamApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.sync_settings(ctx);
        self.handle_shortcuts(ctx);
        self.maybe_tick(ctx);

        self.menu_bar(ctx);
        self.status_bar(ctx);
        self.emotion_panel(ctx);
        self.video_panel(ctx);
        self.settings_window(ctx);
        self.dialogs(ctx);

        // Keep the status bar expiry ticking while idle.
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_expires() {
        let now = Instant::now();
        let mut status = StatusLine::new();
        assert_eq!(status.text(now), "Ready");

        status.show_for("Detection stopped", STATUS_TTL, now);
        assert_eq!(status.text(now + Duration::from_secs(1)), "Detection stopped");
        assert_eq!(status.text(now + STATUS_TTL), "Ready");
    }

    #[test]
    fn test_fit_size_keeps_aspect() {
        let fitted = fit_size(egui::vec2(800.0, 800.0), egui::vec2(640.0, 480.0));
        assert!((fitted.x - 800.0).abs() < 1e-3);
        assert!((fitted.y - 600.0).abs() < 1e-3);

        let tall = fit_size(egui::vec2(1000.0, 300.0), egui::vec2(640.0, 480.0));
        assert!((tall.y - 300.0).abs() < 1e-3);
        assert!((tall.x - 400.0).abs() < 1e-3);

        assert_eq!(fit_size(egui::vec2(100.0, 100.0), egui::Vec2::ZERO), egui::Vec2::ZERO);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("surprise"), "Surprise");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_slider_ranges_hold_every_valid_setting() {
        // Sliders clamp their value, so a valid persisted setting outside the
        // slider range would be rewritten by Save.
        for value in ["0", "5", "500", "1024"] {
            let mut settings = Settings::default();
            settings.set_from_str("min_face_size", value).unwrap();
            assert!(MIN_FACE_SIZE_RANGE.contains(&settings.min_face_size));
        }
        let mut settings = Settings::default();
        settings.set_from_str("camera_index", "10").unwrap();
        assert!(CAMERA_INDEX_RANGE.contains(&settings.camera_index));
        settings.set_from_str("detection_interval", "100").unwrap();
        assert!(DETECTION_INTERVAL_RANGE.contains(&settings.detection_interval));
    }

    #[test]
    fn test_stats_order_covers_every_class() {
        for emotion in Emotion::ALL {
            assert!(STATS_ORDER.contains(&emotion));
        }
    }
}
