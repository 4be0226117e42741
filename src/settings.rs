use image::Rgba;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::canvas::{BLACK, Color};
use crate::error::SettingsError;
use crate::io::DEFAULT_JPEG_QUALITY;
use crate::ops::draw::{Tool, ToolSettings};
use crate::plugins::geolocation::{DEFAULT_GEOLOCATION_TIMEOUT, DEFAULT_GEOLOCATION_URL};

/// Editor-wide configuration. Built from defaults and adjusted with
/// `key=value` overrides.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub tool: Tool,
    pub brush_size: f32,
    pub color: Color,
    pub fill_shapes: bool,
    /// Flood fill tolerance, per channel.
    pub fill_tolerance: u8,
    pub anti_alias: bool,
    /// Font used by the text tool and the metadata overlay. System fonts are
    /// searched when unset or unreadable.
    pub font_path: Option<PathBuf>,
    pub geolocation_url: String,
    pub geolocation_timeout: Duration,
    /// Composite onto white before saving, so erased areas come out white.
    pub flatten_on_save: bool,
    pub jpeg_quality: u8,
    /// Transform name -> enabled. Names not listed are enabled.
    pub transforms: BTreeMap<String, bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tool: Tool::Freehand,
            brush_size: 2.0,
            color: BLACK,
            fill_shapes: false,
            fill_tolerance: 10,
            anti_alias: true,
            font_path: None,
            geolocation_url: DEFAULT_GEOLOCATION_URL.to_string(),
            geolocation_timeout: DEFAULT_GEOLOCATION_TIMEOUT,
            flatten_on_save: true,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            transforms: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Apply one `key=value` override. `transform.<name>=true|false` toggles a
    /// transform by name.
    pub fn apply_override(&mut self, entry: &str) -> Result<(), SettingsError> {
        let Some((key, val)) = entry.split_once('=') else {
            return Err(SettingsError::Malformed(entry.to_string()));
        };
        let key = key.trim();
        let val = val.trim();
        let invalid = |reason: &str| SettingsError::InvalidValue {
            key: key.to_string(),
            value: val.to_string(),
            reason: reason.to_string(),
        };

        match key {
            "tool" => {
                self.tool = Tool::from_label(val).ok_or_else(|| invalid("unknown tool"))?;
            }
            "brush_size" => {
                let size: f32 = val.parse().map_err(|_| invalid("not a number"))?;
                if !(size.is_finite() && size >= 1.0) {
                    return Err(invalid("must be at least 1"));
                }
                self.brush_size = size;
            }
            "color" => {
                self.color = parse_color(val).ok_or_else(|| invalid("expected #RRGGBB[AA]"))?;
            }
            "fill_shapes" => self.fill_shapes = parse_bool(val).ok_or_else(|| invalid("expected true/false"))?,
            "fill_tolerance" => {
                self.fill_tolerance = val.parse().map_err(|_| invalid("expected 0-255"))?;
            }
            "anti_alias" => self.anti_alias = parse_bool(val).ok_or_else(|| invalid("expected true/false"))?,
            "font_path" => {
                self.font_path = if val.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(val))
                };
            }
            "geolocation_url" => {
                if !(val.starts_with("http://") || val.starts_with("https://")) {
                    return Err(invalid("expected an http(s) URL"));
                }
                self.geolocation_url = val.to_string();
            }
            "geolocation_timeout_ms" => {
                let ms: u64 = val.parse().map_err(|_| invalid("expected milliseconds"))?;
                self.geolocation_timeout = Duration::from_millis(ms);
            }
            "flatten_on_save" => {
                self.flatten_on_save = parse_bool(val).ok_or_else(|| invalid("expected true/false"))?
            }
            "jpeg_quality" => {
                let q: u8 = val.parse().map_err(|_| invalid("expected 1-100"))?;
                if !(1..=100).contains(&q) {
                    return Err(invalid("expected 1-100"));
                }
                self.jpeg_quality = q;
            }
            _ => {
                let Some(name) = key.strip_prefix("transform.") else {
                    return Err(SettingsError::UnknownKey(key.to_string()));
                };
                let enabled = parse_bool(val).ok_or_else(|| invalid("expected true/false"))?;
                self.transforms.insert(name.to_string(), enabled);
            }
        }
        Ok(())
    }

    pub fn is_transform_enabled(&self, name: &str) -> bool {
        self.transforms.get(name).copied().unwrap_or(true)
    }

    /// Tool defaults for a new drawing session.
    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            tool: self.tool,
            fill: self.fill_shapes,
            brush_size: self.brush_size,
            color: self.color,
            anti_alias: self.anti_alias,
            fill_tolerance: self.fill_tolerance,
        }
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `#RRGGBB` or `#RRGGBBAA`, leading `#` optional.
pub fn parse_color(val: &str) -> Option<Color> {
    let hex = val.trim().trim_start_matches('#');
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let a = if hex.len() == 8 { byte(6)? } else { 255 };
    Some(Rgba([byte(0)?, byte(2)?, byte(4)?, a]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_editor() {
        let s = Settings::default();
        assert_eq!(s.fill_tolerance, 10);
        assert_eq!(s.geolocation_timeout, Duration::from_secs(2));
        assert_eq!(s.geolocation_url, "http://ip-api.com/json/");
        assert!(s.flatten_on_save);
        assert!(s.is_transform_enabled("MatrixMedian"));
    }

    #[test]
    fn overrides_are_applied() {
        let mut s = Settings::default();
        s.apply_override("tool = ellipse").unwrap();
        s.apply_override("color=#ff8000").unwrap();
        s.apply_override("brush_size=5.5").unwrap();
        s.apply_override("fill_shapes=yes").unwrap();
        s.apply_override("transform.MatrixMedian=false").unwrap();
        s.apply_override("geolocation_timeout_ms=250").unwrap();
        assert_eq!(s.tool, Tool::Ellipse);
        assert_eq!(s.color, Rgba([255, 128, 0, 255]));
        assert!(!s.is_transform_enabled("MatrixMedian"));
        assert_eq!(s.geolocation_timeout, Duration::from_millis(250));

        let tools = s.tool_settings();
        assert!(tools.fill);
        assert_eq!(tools.brush_size, 5.5);
    }

    #[test]
    fn bad_overrides_are_rejected() {
        let mut s = Settings::default();
        assert_eq!(
            s.apply_override("brush_size"),
            Err(SettingsError::Malformed("brush_size".into()))
        );
        assert_eq!(
            s.apply_override("zoom=2"),
            Err(SettingsError::UnknownKey("zoom".into()))
        );
        assert!(matches!(
            s.apply_override("jpeg_quality=0"),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            s.apply_override("color=purple"),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn colors_with_alpha() {
        assert_eq!(parse_color("00000080"), Some(Rgba([0, 0, 0, 128])));
        assert_eq!(parse_color("#12345"), None);
    }
}
