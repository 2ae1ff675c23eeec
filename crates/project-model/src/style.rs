//! Presentation attributes for the primary and secondary text layers.

use serde::{Deserialize, Serialize};

/// Largest accepted text layer size, in pixels.
pub const MAX_FONT_SIZE_PX: f32 = 512.0;

/// Largest accepted shadow blur radius, in pixels.
pub const MAX_SHADOW_BLUR: f32 = 64.0;

/// Which frame edge a layer's vertical offset is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAnchor {
    Top,
    #[default]
    Bottom,
}

/// Style of a single text layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLayerStyle {
    /// Font size in output pixels.
    pub font_size: f32,

    /// Fill color as hex string (`#RGB`, `#RRGGBB`, or `#RRGGBBAA`).
    pub color: String,

    /// Baseline distance from the anchor edge, in percent of frame height.
    pub offset_pct: f32,

    #[serde(default)]
    pub anchor: VerticalAnchor,
}

/// Drop shadow drawn under both text layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowStyle {
    pub enabled: bool,
    pub color: String,

    /// Blur radius in pixels, as in a canvas `shadowBlur`.
    pub blur: f32,
    pub offset_x: i32,
    pub offset_y: i32,
}

/// Style configuration owned by the caller of the compositor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub primary: TextLayerStyle,
    pub secondary: TextLayerStyle,

    /// CSS-like family list, e.g. `"Inter, sans-serif"`.
    pub font_family: String,

    /// Fill used when no visual frame is available.
    pub placeholder: String,

    pub shadow: ShadowStyle,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            primary: TextLayerStyle {
                font_size: 48.0,
                color: "#FFFFFF".to_string(),
                offset_pct: 15.0,
                anchor: VerticalAnchor::Bottom,
            },
            secondary: TextLayerStyle {
                font_size: 24.0,
                color: "#FACC15".to_string(),
                offset_pct: 10.0,
                anchor: VerticalAnchor::Bottom,
            },
            font_family: "Inter, sans-serif".to_string(),
            placeholder: "#000000".to_string(),
            shadow: ShadowStyle::default(),
        }
    }
}

impl Default for ShadowStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            color: "#000000CC".to_string(),
            blur: 8.0,
            offset_x: 2,
            offset_y: 2,
        }
    }
}

impl StyleConfig {
    /// Check that every color parses, every number is finite, and sizes
    /// stay within what the rasterizer can allocate.
    pub fn validate(&self) -> Result<(), StyleError> {
        for (field, value) in [
            ("primary.color", &self.primary.color),
            ("secondary.color", &self.secondary.color),
            ("placeholder", &self.placeholder),
            ("shadow.color", &self.shadow.color),
        ] {
            parse_hex_color(value).map_err(|_| StyleError::Color {
                field,
                value: value.clone(),
            })?;
        }
        for (field, value) in [
            ("primary.font_size", self.primary.font_size),
            ("primary.offset_pct", self.primary.offset_pct),
            ("secondary.font_size", self.secondary.font_size),
            ("secondary.offset_pct", self.secondary.offset_pct),
            ("shadow.blur", self.shadow.blur),
        ] {
            if !value.is_finite() {
                return Err(StyleError::NonFinite { field });
            }
        }
        for (field, value, max) in [
            ("primary.font_size", self.primary.font_size, MAX_FONT_SIZE_PX),
            ("secondary.font_size", self.secondary.font_size, MAX_FONT_SIZE_PX),
            ("shadow.blur", self.shadow.blur, MAX_SHADOW_BLUR),
        ] {
            if !(0.0..=max).contains(&value) {
                return Err(StyleError::OutOfRange { field, value, max });
            }
        }
        Ok(())
    }
}

/// Style validation failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StyleError {
    #[error("Invalid color for {field}: {value:?}")]
    Color { field: &'static str, value: String },

    #[error("{field} must be finite")]
    NonFinite { field: &'static str },

    #[error("{field} is {value}, expected 0..={max}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        max: f32,
    },
}

/// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA` into RGBA bytes.
pub fn parse_hex_color(value: &str) -> Result<[u8; 4], StyleError> {
    let invalid = || StyleError::Color {
        field: "color",
        value: value.to_string(),
    };
    let hex = value.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    match hex.len() {
        3 => {
            let mut rgba = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let nibble = c.to_digit(16).ok_or_else(invalid)? as u8;
                rgba[i] = nibble * 17;
            }
            Ok(rgba)
        }
        6 => Ok([byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?, 255]),
        8 => Ok([
            byte(&hex[0..2])?,
            byte(&hex[2..4])?,
            byte(&hex[4..6])?,
            byte(&hex[6..8])?,
        ]),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FFFFFF").unwrap(), [255, 255, 255, 255]);
        assert_eq!(parse_hex_color("#facc15").unwrap(), [0xFA, 0xCC, 0x15, 255]);
        assert_eq!(parse_hex_color("#000").unwrap(), [0, 0, 0, 255]);
        assert_eq!(parse_hex_color("#000000CC").unwrap(), [0, 0, 0, 204]);
        assert!(parse_hex_color("FFFFFF").is_err());
        assert!(parse_hex_color("#GGGGGG").is_err());
        assert!(parse_hex_color("#12345").is_err());
    }

    #[test]
    fn test_default_style_validates() {
        assert!(StyleConfig::default().validate().is_ok());

        let mut broken = StyleConfig::default();
        broken.secondary.color = "yellow".to_string();
        assert_eq!(
            broken.validate(),
            Err(StyleError::Color {
                field: "secondary.color",
                value: "yellow".to_string()
            })
        );
    }

    #[test]
    fn test_oversized_text_and_blur_are_rejected() {
        let mut huge = StyleConfig::default();
        huge.primary.font_size = 100_000.0;
        assert_eq!(
            huge.validate(),
            Err(StyleError::OutOfRange {
                field: "primary.font_size",
                value: 100_000.0,
                max: MAX_FONT_SIZE_PX,
            })
        );

        let mut blurry = StyleConfig::default();
        blurry.shadow.blur = 1.0e9;
        assert!(matches!(
            blurry.validate(),
            Err(StyleError::OutOfRange { field: "shadow.blur", .. })
        ));

        let mut negative = StyleConfig::default();
        negative.secondary.font_size = -4.0;
        assert!(negative.validate().is_err());

        let mut edge = StyleConfig::default();
        edge.primary.font_size = MAX_FONT_SIZE_PX;
        edge.shadow.blur = MAX_SHADOW_BLUR;
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_partial_style_deserializes_with_defaults() {
        let style: StyleConfig = serde_json::from_str(r##"{ "placeholder": "#111111" }"##).unwrap();
        assert_eq!(style.placeholder, "#111111");
        assert_eq!(style.primary.font_size, 48.0);
        assert!(style.shadow.enabled);
    }
}
