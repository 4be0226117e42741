use ab_glyph::FontArc;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::canvas::{PixelSurface, WHITE};
use crate::error::{SurfaceResult, TransformError};
use crate::io::{self, ImageFormat};
use crate::ops::draw::{DrawSession, PressOutcome, ToolSettings};
use crate::ops::shapes::Point;
use crate::ops::text::{TextAlign, TextAnnotation, resolve_font};
use crate::plugins::{CancelToken, ProgressSink, Transform, TransformRunner};
use crate::settings::Settings;

// ============================================================================
// ZOOM
// ============================================================================

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 4.0;
pub const ZOOM_STEP: f32 = 0.2;

/// Display scale of one canvas window. Pointer positions arrive in view
/// coordinates and are divided back into surface coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Zoom {
    scale: f32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl Zoom {
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn zoom_in(&mut self) {
        self.scale = (self.scale + ZOOM_STEP).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.scale = (self.scale - ZOOM_STEP).max(MIN_ZOOM);
    }

    pub fn reset(&mut self) {
        self.scale = 1.0;
    }

    /// On-screen size of a surface at this zoom.
    pub fn view_size(&self, surface: &PixelSurface) -> (f32, f32) {
        (
            surface.width() as f32 * self.scale,
            surface.height() as f32 * self.scale,
        )
    }

    pub fn to_surface(&self, view: Point) -> Point {
        (view.0 / self.scale, view.1 / self.scale)
    }
}

// ============================================================================
// CANVAS WINDOW - one open document
// ============================================================================

pub struct CanvasWindow {
    pub id: Uuid,
    /// Display name (file name or "Untitled-N").
    pub name: String,
    /// `None` until the document is saved or when created blank.
    pub path: Option<PathBuf>,
    pub session: DrawSession,
    pub zoom: Zoom,
    pub dirty: bool,
    surface: PixelSurface,
    annotations: Vec<TextAnnotation>,
    font: Option<FontArc>,
    flatten_on_save: bool,
    jpeg_quality: u8,
}

impl CanvasWindow {
    fn with_surface(name: String, surface: PixelSurface, settings: &Settings, font: Option<FontArc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            path: None,
            session: DrawSession::new(settings.tool_settings()),
            zoom: Zoom::default(),
            dirty: false,
            surface,
            annotations: Vec::new(),
            font,
            flatten_on_save: settings.flatten_on_save,
            jpeg_quality: settings.jpeg_quality,
        }
    }

    pub fn new_untitled(
        counter: usize,
        width: u32,
        height: u32,
        settings: &Settings,
        font: Option<FontArc>,
    ) -> SurfaceResult<Self> {
        let surface = PixelSurface::new(width, height)?;
        Ok(Self::with_surface(format!("Untitled-{}", counter), surface, settings, font))
    }

    pub fn from_file(path: &Path, settings: &Settings, font: Option<FontArc>) -> SurfaceResult<Self> {
        let surface = io::load(path)?;
        let mut window = Self::with_surface(file_name(path), surface, settings, font);
        window.path = Some(path.to_path_buf());
        Ok(window)
    }

    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    /// The preview while a shape is being dragged, otherwise the surface.
    pub fn display(&self) -> &PixelSurface {
        self.session.display(&self.surface)
    }

    pub fn annotations(&self) -> &[TextAnnotation] {
        &self.annotations
    }

    /// Name with a trailing `*` when there are unsaved changes.
    pub fn display_title(&self) -> String {
        if self.dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }

    // ========================================================================
    // POINTER INPUT (view coordinates)
    // ========================================================================

    pub fn pointer_pressed(&mut self, view: Point) -> PressOutcome {
        let pos = self.zoom.to_surface(view);
        let outcome = self.session.press(&mut self.surface, pos);
        if matches!(outcome, PressOutcome::Drawing | PressOutcome::Filled { .. }) {
            self.dirty = true;
        }
        outcome
    }

    pub fn pointer_moved(&mut self, view: Point) {
        let pos = self.zoom.to_surface(view);
        self.session.move_to(&mut self.surface, pos);
    }

    pub fn pointer_released(&mut self, view: Point) {
        let pos = self.zoom.to_surface(view);
        self.session.release(&mut self.surface, pos);
    }

    /// Stamp `text` centred on `anchor` (surface coordinates) with the
    /// session's colour, sized by the brush. Returns false when no font is
    /// available or the text is empty.
    pub fn add_text(&mut self, text: &str, anchor: Point) -> bool {
        if text.is_empty() {
            return false;
        }
        let Some(font) = self.font.clone() else {
            warn!(window = %self.name, "text tool used without a font");
            return false;
        };
        let annotation = TextAnnotation {
            text: text.to_string(),
            position: anchor,
            color: self.session.color,
            size: self.session.brush_size,
            align: TextAlign::Center,
            font,
        };
        annotation.draw(&mut self.surface, self.session.anti_alias);
        self.annotations.push(annotation);
        self.dirty = true;
        true
    }

    /// Replace the buffer with `base` and repaint every text annotation on it.
    pub fn rebuild(&mut self, base: PixelSurface) {
        self.session.reset();
        self.surface = base;
        for annotation in &self.annotations {
            annotation.draw(&mut self.surface, self.session.anti_alias);
        }
    }

    // ========================================================================
    // FILES
    // ========================================================================

    /// Replace the document with an image file. The old buffer and any text
    /// annotations are dropped.
    pub fn load(&mut self, path: &Path) -> SurfaceResult<()> {
        let surface = io::load(path)?;
        info!(path = %path.display(), width = surface.width(), height = surface.height(), "image loaded");
        self.session.reset();
        // Stamps belong to the old image; a rebuild must not repaint them here.
        self.annotations.clear();
        self.surface = surface;
        self.path = Some(path.to_path_buf());
        self.name = file_name(path);
        self.dirty = false;
        Ok(())
    }

    /// Save to `path`; the format comes from the extension.
    pub fn save(&mut self, path: &Path) -> SurfaceResult<()> {
        let format = ImageFormat::from_path(path)?.with_quality(self.jpeg_quality);
        if self.flatten_on_save {
            io::save(&self.surface.flatten_onto(WHITE), path, format)?;
        } else {
            io::save(&self.surface, path, format)?;
        }
        info!(path = %path.display(), "image saved");
        self.path = Some(path.to_path_buf());
        self.name = file_name(path);
        self.dirty = false;
        Ok(())
    }

    /// Save to the current path. Returns `Ok(false)` when the document has
    /// never been saved and the caller must pick a path.
    pub fn save_as_current(&mut self) -> SurfaceResult<bool> {
        match self.path.clone() {
            Some(path) => self.save(&path).map(|()| true),
            None => Ok(false),
        }
    }

    /// Run a transform on this window's surface in place. Any shape being
    /// dragged is abandoned first.
    pub fn apply_transform(
        &mut self,
        transform: &dyn Transform,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<(), TransformError> {
        self.session.reset();
        TransformRunner::run(transform, &mut self.surface, progress, cancel)?;
        self.dirty = true;
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

// ============================================================================
// WORKSPACE - every open canvas window
// ============================================================================

/// Owns the open windows. There is no notion of a focused window: every
/// operation names the window it acts on.
pub struct Workspace {
    settings: Settings,
    windows: Vec<CanvasWindow>,
    untitled_counter: usize,
    font: Option<FontArc>,
}

impl Workspace {
    pub fn new(settings: Settings) -> Self {
        let font = resolve_font(settings.font_path.as_deref());
        Self::with_font(settings, font)
    }

    pub fn with_font(settings: Settings, font: Option<FontArc>) -> Self {
        Self {
            settings,
            windows: Vec::new(),
            untitled_counter: 0,
            font,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Open a blank, transparent canvas.
    pub fn new_canvas(&mut self, width: u32, height: u32) -> SurfaceResult<Uuid> {
        let window = CanvasWindow::new_untitled(
            self.untitled_counter + 1,
            width,
            height,
            &self.settings,
            self.font.clone(),
        )?;
        self.untitled_counter += 1;
        info!(name = %window.name, width, height, "canvas created");
        Ok(self.insert(window))
    }

    pub fn open(&mut self, path: &Path) -> SurfaceResult<Uuid> {
        let window = CanvasWindow::from_file(path, &self.settings, self.font.clone())?;
        info!(path = %path.display(), "canvas opened");
        Ok(self.insert(window))
    }

    fn insert(&mut self, window: CanvasWindow) -> Uuid {
        let id = window.id;
        self.windows.push(window);
        id
    }

    pub fn close(&mut self, id: Uuid) -> Option<CanvasWindow> {
        let idx = self.windows.iter().position(|w| w.id == id)?;
        Some(self.windows.remove(idx))
    }

    pub fn get(&self, id: Uuid) -> Option<&CanvasWindow> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut CanvasWindow> {
        self.windows.iter_mut().find(|w| w.id == id)
    }

    /// Windows in the order they were opened.
    pub fn windows(&self) -> impl Iterator<Item = &CanvasWindow> {
        self.windows.iter()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Push tool, colour, size and fill mode to every open window.
    pub fn apply_tool_settings(&mut self, tools: ToolSettings) {
        self.settings.tool = tools.tool;
        self.settings.fill_shapes = tools.fill;
        self.settings.brush_size = tools.brush_size;
        self.settings.color = tools.color;
        self.settings.anti_alias = tools.anti_alias;
        self.settings.fill_tolerance = tools.fill_tolerance;
        for window in &mut self.windows {
            window.session.apply(&tools);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{BLACK, TRANSPARENT};
    use crate::ops::draw::Tool;
    use image::Rgba;

    fn workspace() -> Workspace {
        let settings = Settings {
            brush_size: 6.0,
            ..Settings::default()
        };
        Workspace::with_font(settings, None)
    }

    #[test]
    fn zoom_is_clamped() {
        let mut z = Zoom::default();
        for _ in 0..30 {
            z.zoom_in();
        }
        assert_eq!(z.scale(), MAX_ZOOM);
        for _ in 0..30 {
            z.zoom_out();
        }
        assert_eq!(z.scale(), MIN_ZOOM);
        z.reset();
        assert_eq!(z.scale(), 1.0);
    }

    #[test]
    fn zoom_maps_view_to_surface() {
        let mut z = Zoom::default();
        z.zoom_in();
        z.zoom_in();
        z.zoom_in();
        z.zoom_in();
        z.zoom_in();
        assert!((z.scale() - 2.0).abs() < 1e-4);
        let (x, y) = z.to_surface((40.0, 10.0));
        assert!((x - 20.0).abs() < 1e-3 && (y - 5.0).abs() < 1e-3);
        let s = PixelSurface::new(10, 4).unwrap();
        let (w, h) = z.view_size(&s);
        assert!((w - 20.0).abs() < 1e-3 && (h - 8.0).abs() < 1e-3);
    }

    #[test]
    fn untitled_windows_are_numbered() {
        let mut ws = workspace();
        let a = ws.new_canvas(10, 10).unwrap();
        let b = ws.new_canvas(20, 5).unwrap();
        assert_eq!(ws.get(a).unwrap().name, "Untitled-1");
        assert_eq!(ws.get(b).unwrap().name, "Untitled-2");
        assert_eq!(ws.get(b).unwrap().surface().get(0, 0).unwrap(), TRANSPARENT);
        assert!(ws.new_canvas(0, 5).is_err());
        assert_eq!(ws.len(), 2);
        assert!(ws.close(a).is_some());
        assert!(ws.get(a).is_none());
        assert!(ws.close(a).is_none());
    }

    #[test]
    fn windows_draw_independently() {
        let mut ws = workspace();
        let a = ws.new_canvas(20, 20).unwrap();
        let b = ws.new_canvas(20, 20).unwrap();
        let wa = ws.get_mut(a).unwrap();
        wa.pointer_pressed((5.0, 5.0));
        wa.pointer_released((5.0, 5.0));
        assert!(wa.dirty);
        assert_eq!(wa.display_title(), "Untitled-1*");
        assert_eq!(ws.get(a).unwrap().surface().get(4, 4).unwrap(), BLACK);
        assert_eq!(ws.get(b).unwrap().surface().get(4, 4).unwrap(), TRANSPARENT);
    }

    #[test]
    fn pointer_input_goes_through_the_zoom() {
        let mut ws = workspace();
        let id = ws.new_canvas(20, 20).unwrap();
        let w = ws.get_mut(id).unwrap();
        w.zoom.zoom_out();
        w.zoom.zoom_out();
        w.zoom.zoom_out();
        w.zoom.zoom_out();
        w.zoom.zoom_out();
        // scale 0.0 clamps to 0.1: view (1, 1) is surface (10, 10)
        w.pointer_pressed((1.0, 1.0));
        w.pointer_released((1.0, 1.0));
        assert_eq!(w.surface().get(9, 9).unwrap(), BLACK);
    }

    #[test]
    fn tool_settings_are_broadcast() {
        let mut ws = workspace();
        let a = ws.new_canvas(4, 4).unwrap();
        let b = ws.new_canvas(4, 4).unwrap();
        let tools = ToolSettings {
            tool: Tool::BucketFill,
            color: Rgba([1, 2, 3, 255]),
            brush_size: 9.0,
            ..ToolSettings::default()
        };
        ws.apply_tool_settings(tools);
        for id in [a, b] {
            let s = ws.get(id).unwrap().session.settings();
            assert_eq!(s.tool, Tool::BucketFill);
            assert_eq!(s.color, Rgba([1, 2, 3, 255]));
            assert_eq!(s.brush_size, 9.0);
        }
        assert_eq!(ws.settings().tool, Tool::BucketFill);
        let c = ws.new_canvas(4, 4).unwrap();
        assert_eq!(ws.get(c).unwrap().session.tool, Tool::BucketFill);
    }

    #[test]
    fn text_without_a_font_is_refused() {
        let mut ws = workspace();
        let id = ws.new_canvas(10, 10).unwrap();
        let w = ws.get_mut(id).unwrap();
        assert!(!w.add_text("hi", (5.0, 5.0)));
        assert!(w.annotations().is_empty());
    }

    #[test]
    fn save_flattens_onto_white_and_load_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drawing.png");
        let mut ws = workspace();
        let id = ws.new_canvas(8, 8).unwrap();
        let w = ws.get_mut(id).unwrap();
        assert!(!w.save_as_current().unwrap());
        w.pointer_pressed((2.0, 2.0));
        w.pointer_released((2.0, 2.0));
        w.save(&path).unwrap();
        assert_eq!(w.name, "drawing.png");
        assert!(!w.dirty);

        let reopened = ws.open(&path).unwrap();
        let r = ws.get(reopened).unwrap();
        assert_eq!(r.surface().get(7, 7).unwrap(), WHITE);
        assert_eq!(r.surface().get(1, 1).unwrap(), BLACK);

        let other = dir.path().join("small.png");
        io::save(&PixelSurface::new_filled(3, 2, BLACK).unwrap(), &other, ImageFormat::Png).unwrap();
        let w = ws.get_mut(id).unwrap();
        w.load(&other).unwrap();
        assert_eq!((w.surface().width(), w.surface().height()), (3, 2));
        assert_eq!(w.name, "small.png");
    }
}
