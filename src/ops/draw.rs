// ============================================================================
// DRAW SESSION - pointer events to surface mutations
// ============================================================================
//
// Freehand and eraser strokes are committed to the surface as the pointer
// moves. Ellipse, line and arrow are dragged on a preview buffer rebuilt from
// the committed surface on every move, and promoted exactly once on release.

use tracing::debug;

use crate::canvas::{BLACK, Color, PixelSurface};
use crate::ops::fill::flood_fill;
use crate::ops::shapes::{self, Paint, PaintStyle, Point};

/// Eraser diameter as a multiple of the brush size.
pub const ERASER_SCALE: f32 = 3.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Freehand,
    Ellipse,
    Line,
    Eraser,
    Arrow,
    Text,
    BucketFill,
}

impl Tool {
    pub const ALL: [Tool; 7] = [
        Tool::Freehand,
        Tool::Ellipse,
        Tool::Line,
        Tool::Eraser,
        Tool::Arrow,
        Tool::Text,
        Tool::BucketFill,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Tool::Freehand => "freehand",
            Tool::Ellipse => "ellipse",
            Tool::Line => "line",
            Tool::Eraser => "eraser",
            Tool::Arrow => "arrow",
            Tool::Text => "text",
            Tool::BucketFill => "bucket",
        }
    }

    pub fn from_label(s: &str) -> Option<Tool> {
        Tool::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s.trim()))
    }

    /// Shapes dragged on the preview buffer before promotion.
    pub fn uses_preview(&self) -> bool {
        matches!(self, Tool::Ellipse | Tool::Line | Tool::Arrow)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawState {
    Idle,
    Drawing { tool: Tool, anchor: Point },
}

/// What a press did, for the owner of the session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PressOutcome {
    /// A drag has begun.
    Drawing,
    /// The bucket fill ran to completion.
    Filled { pixels: usize },
    /// The text tool wants a string to stamp at `anchor`.
    TextRequested { anchor: Point },
    /// Nothing happened (e.g. bucket fill outside the surface).
    Ignored,
}

/// Tool configuration shared by every window of a workspace.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolSettings {
    pub tool: Tool,
    pub fill: bool,
    pub brush_size: f32,
    pub color: Color,
    pub anti_alias: bool,
    pub fill_tolerance: u8,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: Tool::Freehand,
            fill: false,
            brush_size: 2.0,
            color: BLACK,
            anti_alias: true,
            fill_tolerance: 10,
        }
    }
}

pub struct DrawSession {
    pub tool: Tool,
    pub fill: bool,
    pub brush_size: f32,
    pub color: Color,
    pub anti_alias: bool,
    pub fill_tolerance: u8,
    state: DrawState,
    last: Point,
    points: Vec<Point>,
    preview: Option<PixelSurface>,
}

impl Default for DrawSession {
    fn default() -> Self {
        Self::new(ToolSettings::default())
    }
}

impl DrawSession {
    pub fn new(settings: ToolSettings) -> Self {
        let mut session = Self {
            tool: settings.tool,
            fill: settings.fill,
            brush_size: settings.brush_size,
            color: settings.color,
            anti_alias: settings.anti_alias,
            fill_tolerance: settings.fill_tolerance,
            state: DrawState::Idle,
            last: (0.0, 0.0),
            points: Vec::new(),
            preview: None,
        };
        session.apply(&settings);
        session
    }

    /// Adopt new tool settings. An unfinished drag is abandoned.
    pub fn apply(&mut self, settings: &ToolSettings) {
        self.tool = settings.tool;
        self.fill = settings.fill;
        self.brush_size = settings.brush_size.max(1.0);
        self.color = settings.color;
        self.anti_alias = settings.anti_alias;
        self.fill_tolerance = settings.fill_tolerance;
        self.reset();
    }

    pub fn settings(&self) -> ToolSettings {
        ToolSettings {
            tool: self.tool,
            fill: self.fill,
            brush_size: self.brush_size,
            color: self.color,
            anti_alias: self.anti_alias,
            fill_tolerance: self.fill_tolerance,
        }
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, DrawState::Drawing { .. })
    }

    /// Points of the freehand stroke in progress.
    pub fn stroke_points(&self) -> &[Point] {
        &self.points
    }

    pub fn preview(&self) -> Option<&PixelSurface> {
        self.preview.as_ref()
    }

    /// What should be shown for this window right now.
    pub fn display<'a>(&'a self, committed: &'a PixelSurface) -> &'a PixelSurface {
        self.preview.as_ref().unwrap_or(committed)
    }

    /// Drop any drag in progress without touching the surface.
    pub fn reset(&mut self) {
        self.state = DrawState::Idle;
        self.points.clear();
        self.preview = None;
    }

    fn stroke_paint(&self) -> Paint {
        Paint {
            anti_alias: self.anti_alias,
            ..Paint::stroke(self.color, self.brush_size)
        }
    }

    fn shape_paint(&self) -> Paint {
        let mut paint = self.stroke_paint();
        if self.fill && self.tool == Tool::Ellipse {
            paint.style = PaintStyle::Fill;
        }
        paint
    }

    /// The eraser clears a wider swath than the brush paints.
    fn eraser_diameter(&self) -> f32 {
        self.brush_size * ERASER_SCALE
    }

    // ========================================================================
    // POINTER EVENTS
    // ========================================================================

    pub fn press(&mut self, surface: &mut PixelSurface, pos: Point) -> PressOutcome {
        if self.is_drawing() {
            debug!("press while drawing; restarting the stroke");
            self.reset();
        }
        match self.tool {
            Tool::BucketFill => {
                if !surface.contains(pos.0.floor() as i64, pos.1.floor() as i64) {
                    return PressOutcome::Ignored;
                }
                let seed = (pos.0.floor() as u32, pos.1.floor() as u32);
                match flood_fill(surface, seed, self.color, self.fill_tolerance) {
                    Ok(pixels) => PressOutcome::Filled { pixels },
                    Err(e) => {
                        debug!(error = %e, "bucket fill skipped");
                        PressOutcome::Ignored
                    }
                }
            }
            Tool::Text => PressOutcome::TextRequested { anchor: pos },
            tool => {
                self.state = DrawState::Drawing { tool, anchor: pos };
                self.last = pos;
                self.points.clear();
                match tool {
                    Tool::Freehand => {
                        self.points.push(pos);
                        shapes::stroke_segment(surface, pos, pos, &self.stroke_paint());
                    }
                    Tool::Eraser => {
                        shapes::erase_disc(surface, pos, self.eraser_diameter(), self.anti_alias);
                    }
                    _ => {}
                }
                PressOutcome::Drawing
            }
        }
    }

    pub fn move_to(&mut self, surface: &mut PixelSurface, pos: Point) {
        let DrawState::Drawing { tool, anchor } = self.state else {
            return;
        };
        match tool {
            Tool::Freehand => {
                shapes::stroke_segment(surface, self.last, pos, &self.stroke_paint());
                self.points.push(pos);
            }
            Tool::Eraser => {
                shapes::erase_segment(surface, self.last, pos, self.eraser_diameter(), self.anti_alias);
            }
            _ => self.rebuild_preview(surface, tool, anchor, pos),
        }
        self.last = pos;
    }

    pub fn release(&mut self, surface: &mut PixelSurface, pos: Point) {
        let DrawState::Drawing { tool, anchor } = self.state else {
            return;
        };
        match tool {
            Tool::Freehand | Tool::Eraser => {
                if pos != self.last {
                    self.move_to(surface, pos);
                }
            }
            _ => {
                self.last = pos;
                self.draw_shape(surface, tool, anchor, pos);
            }
        }
        self.reset();
    }

    fn rebuild_preview(&mut self, committed: &PixelSurface, tool: Tool, anchor: Point, pos: Point) {
        let mut preview = match self.preview.take() {
            Some(mut p) => {
                if p.copy_from(committed).is_err() {
                    p = committed.clone();
                }
                p
            }
            None => committed.clone(),
        };
        self.draw_shape(&mut preview, tool, anchor, pos);
        self.preview = Some(preview);
    }

    fn draw_shape(&self, surface: &mut PixelSurface, tool: Tool, anchor: Point, pos: Point) {
        let paint = self.shape_paint();
        let drawn = match tool {
            Tool::Ellipse => shapes::draw_ellipse(surface, anchor, pos, &paint),
            Tool::Line => {
                shapes::stroke_segment(surface, anchor, pos, &paint);
                true
            }
            Tool::Arrow => shapes::draw_arrow(surface, anchor, pos, &paint),
            _ => true,
        };
        if !drawn {
            debug!(tool = tool.label(), "degenerate shape skipped");
        }
    }
}
