//! Frame compositor: visual frame plus up to two subtitle lines.
//!
//! Compositing is split in two. [`plan_frame`] is pure geometry: where the
//! visual frame lands ("cover" scaling) and where each text layer sits.
//! [`Compositor::render`] turns a plan into pixels.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use lyricut_common::error::{LyricutError, LyricutResult};
use lyricut_project_model::{
    parse_hex_color, Cue, StyleConfig, StyleError, VerticalAnchor, MAX_FONT_SIZE_PX,
    MAX_SHADOW_BLUR,
};

use crate::text::{FontSpec, TextRasterizer};

/// Share of the frame width a text line may occupy.
pub const MAX_TEXT_WIDTH_RATIO: f32 = 0.9;

/// Output frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
}

impl OutputSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Where a source frame is drawn so that it covers the whole output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverPlacement {
    pub source_width: u32,
    pub source_height: u32,

    /// Uniform scale, `max(W / w, H / h)`.
    pub scale: f64,
    pub draw_width: f64,
    pub draw_height: f64,

    /// Top-left of the scaled frame; zero or negative (overflow is centered).
    pub offset_x: f64,
    pub offset_y: f64,
}

impl CoverPlacement {
    /// `None` for degenerate sources or outputs.
    pub fn compute(source_width: u32, source_height: u32, output: OutputSize) -> Option<Self> {
        if source_width == 0 || source_height == 0 || output.width == 0 || output.height == 0 {
            return None;
        }
        let (w, h) = (source_width as f64, source_height as f64);
        let (out_w, out_h) = (output.width as f64, output.height as f64);
        let scale = (out_w / w).max(out_h / h);
        let draw_width = w * scale;
        let draw_height = h * scale;
        Some(Self {
            source_width,
            source_height,
            scale,
            draw_width,
            draw_height,
            offset_x: (out_w - draw_width) / 2.0,
            offset_y: (out_h - draw_height) / 2.0,
        })
    }

    /// Source rectangle `(x, y, width, height)` that ends up visible.
    pub fn visible_source_rect(&self) -> (u32, u32, u32, u32) {
        let crop_w = ((self.draw_width + 2.0 * self.offset_x) / self.scale)
            .round()
            .clamp(1.0, self.source_width as f64) as u32;
        let crop_h = ((self.draw_height + 2.0 * self.offset_y) / self.scale)
            .round()
            .clamp(1.0, self.source_height as f64) as u32;
        let x = (self.source_width - crop_w) / 2;
        let y = (self.source_height - crop_h) / 2;
        (x, y, crop_w, crop_h)
    }
}

/// What fills the frame behind the text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    Visual(CoverPlacement),
    Placeholder([u8; 4]),
}

/// One line of subtitle text, centered on `center_x`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayer {
    pub text: String,
    pub family: String,
    pub size_px: f32,
    pub bold: bool,
    pub color: [u8; 4],
    pub center_x: f32,
    pub baseline_y: f32,
    pub max_width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSpec {
    pub color: [u8; 4],
    pub blur: f32,
    pub offset_x: i32,
    pub offset_y: i32,
}

/// Geometry of one output frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub size: OutputSize,
    pub background: Background,
    pub shadow: Option<ShadowSpec>,

    /// Primary first, then secondary. Empty lines are omitted.
    pub layers: Vec<TextLayer>,
}

/// Plan a frame from the visual's native size (if a frame is available),
/// the active cue, and the style.
pub fn plan_frame(
    visual_size: Option<(u32, u32)>,
    cue: Option<&Cue>,
    style: &StyleConfig,
    size: OutputSize,
) -> Result<FramePlan, StyleError> {
    let background = match visual_size.and_then(|(w, h)| CoverPlacement::compute(w, h, size)) {
        Some(placement) => Background::Visual(placement),
        None => Background::Placeholder(color(&style.placeholder, "placeholder")?),
    };

    let shadow = if style.shadow.enabled {
        Some(ShadowSpec {
            color: color(&style.shadow.color, "shadow.color")?,
            blur: style.shadow.blur.clamp(0.0, MAX_SHADOW_BLUR),
            offset_x: style.shadow.offset_x,
            offset_y: style.shadow.offset_y,
        })
    } else {
        None
    };

    let mut layers = Vec::with_capacity(2);
    if let Some(cue) = cue {
        let height = size.height as f32;
        let lines = [
            (&cue.primary, &style.primary, true, "primary.color"),
            (&cue.secondary, &style.secondary, false, "secondary.color"),
        ];
        for (text, layer_style, bold, field) in lines {
            if text.trim().is_empty() {
                continue;
            }
            let offset = height * layer_style.offset_pct / 100.0;
            let baseline_y = match layer_style.anchor {
                VerticalAnchor::Bottom => height - offset,
                VerticalAnchor::Top => offset,
            };
            layers.push(TextLayer {
                text: text.clone(),
                family: style.font_family.clone(),
                size_px: layer_style.font_size.clamp(0.0, MAX_FONT_SIZE_PX),
                bold,
                color: color(&layer_style.color, field)?,
                center_x: size.width as f32 / 2.0,
                baseline_y,
                max_width: size.width as f32 * MAX_TEXT_WIDTH_RATIO,
            });
        }
    }

    Ok(FramePlan {
        size,
        background,
        shadow,
        layers,
    })
}

fn color(value: &str, field: &'static str) -> Result<[u8; 4], StyleError> {
    parse_hex_color(value).map_err(|_| StyleError::Color {
        field,
        value: value.to_string(),
    })
}

/// Renders frame plans into RGBA buffers.
pub struct Compositor {
    rasterizer: Box<dyn TextRasterizer>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor").finish_non_exhaustive()
    }
}

impl Compositor {
    pub fn new(rasterizer: Box<dyn TextRasterizer>) -> Self {
        Self { rasterizer }
    }

    /// Composite one output frame.
    ///
    /// `visual` is the active clip's current frame, or `None` when no clip
    /// is active or its source is not ready.
    pub fn composite(
        &self,
        visual: Option<&RgbaImage>,
        cue: Option<&Cue>,
        style: &StyleConfig,
        size: OutputSize,
    ) -> LyricutResult<RgbaImage> {
        let plan = plan_frame(visual.map(|v| v.dimensions()), cue, style, size)
            .map_err(|e| LyricutError::render(e.to_string()))?;
        Ok(self.render(&plan, visual))
    }

    /// Rasterize a plan.
    pub fn render(&self, plan: &FramePlan, visual: Option<&RgbaImage>) -> RgbaImage {
        let OutputSize { width, height } = plan.size;
        let mut frame = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));

        match (plan.background, visual) {
            (Background::Visual(placement), Some(source))
                if source.dimensions() == (placement.source_width, placement.source_height) =>
            {
                draw_cover(&mut frame, source, &placement);
            }
            (Background::Placeholder(fill), _) => {
                frame = RgbaImage::from_pixel(width, height, Rgba(fill));
            }
            _ => {
                tracing::warn!("Frame plan does not match the supplied visual; drawing black");
            }
        }

        for layer in &plan.layers {
            self.draw_text(&mut frame, layer, plan.shadow.as_ref());
        }

        frame
    }

    fn draw_text(&self, frame: &mut RgbaImage, layer: &TextLayer, shadow: Option<&ShadowSpec>) {
        let spec = FontSpec {
            family: &layer.family,
            size_px: layer.size_px,
            bold: layer.bold,
        };
        let Some(measured) = self.rasterizer.measure(&layer.text, &spec) else {
            return;
        };
        let horizontal_scale = if measured > layer.max_width && measured > 0.0 {
            layer.max_width / measured
        } else {
            1.0
        };
        let Some(mask) = self.rasterizer.rasterize(&layer.text, &spec, horizontal_scale) else {
            return;
        };

        let pen_x = layer.center_x - mask.advance / 2.0;
        let left = (pen_x.round() as i64) + mask.origin_x as i64;
        let top = layer.baseline_y.round() as i64 - mask.baseline as i64;

        if let Some(shadow) = shadow {
            let sigma = shadow.blur / 2.0;
            let pad = (sigma * 3.0).ceil() as u32;
            let mut tile = RgbaImage::new(mask.width + 2 * pad, mask.height + 2 * pad);
            for y in 0..mask.height {
                for x in 0..mask.width {
                    let alpha = mask.coverage_at(x, y) * shadow.color[3] as f32;
                    let [r, g, b, _] = shadow.color;
                    tile.put_pixel(x + pad, y + pad, Rgba([r, g, b, alpha.round() as u8]));
                }
            }
            if sigma > 0.0 {
                tile = imageops::blur(&tile, sigma);
            }
            imageops::overlay(
                frame,
                &tile,
                left + shadow.offset_x as i64 - pad as i64,
                top + shadow.offset_y as i64 - pad as i64,
            );
        }

        let mut fill = RgbaImage::new(mask.width, mask.height);
        let [r, g, b, a] = layer.color;
        for (x, y, pixel) in fill.enumerate_pixels_mut() {
            let alpha = mask.coverage_at(x, y) * a as f32;
            *pixel = Rgba([r, g, b, alpha.round() as u8]);
        }
        imageops::overlay(frame, &fill, left, top);
    }
}

fn draw_cover(frame: &mut RgbaImage, source: &RgbaImage, placement: &CoverPlacement) {
    let (x, y, w, h) = placement.visible_source_rect();
    let (out_w, out_h) = frame.dimensions();
    let visible = imageops::crop_imm(source, x, y, w, h).to_image();
    let scaled = if (w, h) == (out_w, out_h) {
        visible
    } else {
        imageops::resize(&visible, out_w, out_h, FilterType::Triangle)
    };
    imageops::overlay(frame, &scaled, 0, 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::GlyphMask;
    use lyricut_project_model::CueId;

    /// Every glyph is a solid box `size/2` wide and `size * 0.7` tall.
    struct BoxRasterizer;

    impl TextRasterizer for BoxRasterizer {
        fn measure(&self, text: &str, font: &FontSpec<'_>) -> Option<f32> {
            Some(text.chars().count() as f32 * font.size_px / 2.0)
        }

        fn rasterize(&self, text: &str, font: &FontSpec<'_>, scale: f32) -> Option<GlyphMask> {
            let advance = self.measure(text, font)? * scale;
            let width = advance.round() as u32;
            let height = (font.size_px * 0.7).round() as u32;
            Some(GlyphMask {
                width,
                height,
                origin_x: 0,
                baseline: height as i32,
                advance,
                coverage: vec![1.0; (width * height) as usize],
            })
        }
    }

    fn compositor() -> Compositor {
        Compositor::new(Box::new(BoxRasterizer))
    }

    fn no_shadow() -> StyleConfig {
        let mut style = StyleConfig::default();
        style.shadow.enabled = false;
        style
    }

    #[test]
    fn test_cover_placement_wider_output() {
        let placement = CoverPlacement::compute(800, 800, OutputSize::new(1600, 900)).unwrap();
        assert!((placement.scale - 2.0).abs() < 1e-9);
        assert!((placement.offset_x - 0.0).abs() < 1e-9);
        assert!((placement.offset_y - (-350.0)).abs() < 1e-9);
        assert_eq!(placement.visible_source_rect(), (0, 175, 800, 450));
    }

    #[test]
    fn test_cover_placement_same_aspect() {
        let placement = CoverPlacement::compute(1280, 720, OutputSize::new(1920, 1080)).unwrap();
        assert!((placement.scale - 1.5).abs() < 1e-9);
        assert_eq!(placement.visible_source_rect(), (0, 0, 1280, 720));
        assert!(CoverPlacement::compute(0, 720, OutputSize::new(1920, 1080)).is_none());
    }

    #[test]
    fn test_plan_positions_text_layers() {
        let cue = Cue::new(CueId(0), 0.0, Some(2.0), "안녕", "Hello");
        let plan = plan_frame(
            Some((1280, 720)),
            Some(&cue),
            &StyleConfig::default(),
            OutputSize::new(1920, 1080),
        )
        .unwrap();

        assert!(matches!(plan.background, Background::Visual(_)));
        assert_eq!(plan.layers.len(), 2);
        let primary = &plan.layers[0];
        assert_eq!(primary.text, "안녕");
        assert!(primary.bold);
        assert!((primary.baseline_y - 918.0).abs() < 1e-3);
        assert!((primary.center_x - 960.0).abs() < 1e-3);
        assert!((primary.max_width - 1728.0).abs() < 1e-3);
        assert_eq!(primary.color, [255, 255, 255, 255]);

        let secondary = &plan.layers[1];
        assert!((secondary.baseline_y - 972.0).abs() < 1e-3);
        assert_eq!(secondary.color, [0xFA, 0xCC, 0x15, 255]);
        assert!(plan.shadow.is_some());
    }

    #[test]
    fn test_plan_top_anchor_and_empty_lines() {
        let mut style = StyleConfig::default();
        style.primary.anchor = VerticalAnchor::Top;
        let cue = Cue::new(CueId(0), 0.0, None, "위", "  ");
        let plan = plan_frame(None, Some(&cue), &style, OutputSize::new(1000, 1000)).unwrap();
        assert_eq!(plan.layers.len(), 1);
        assert!((plan.layers[0].baseline_y - 150.0).abs() < 1e-3);
        assert_eq!(plan.background, Background::Placeholder([0, 0, 0, 255]));
    }

    #[test]
    fn test_plan_clamps_unvalidated_sizes() {
        let mut style = StyleConfig::default();
        style.primary.font_size = 1.0e7;
        style.shadow.blur = 1.0e7;
        let cue = Cue::new(CueId(0), 0.0, None, "크게", "");
        let plan = plan_frame(None, Some(&cue), &style, OutputSize::new(100, 100)).unwrap();
        assert_eq!(plan.layers[0].size_px, MAX_FONT_SIZE_PX);
        assert_eq!(plan.shadow.unwrap().blur, MAX_SHADOW_BLUR);
    }

    #[test]
    fn test_plan_rejects_bad_color() {
        let mut style = StyleConfig::default();
        style.placeholder = "black".to_string();
        assert!(plan_frame(None, None, &style, OutputSize::new(10, 10)).is_err());
    }

    #[test]
    fn test_placeholder_only_without_visual_or_cue() {
        let mut style = no_shadow();
        style.placeholder = "#102030".to_string();
        let frame = compositor()
            .composite(None, None, &style, OutputSize::new(64, 36))
            .unwrap();
        assert_eq!(frame.dimensions(), (64, 36));
        assert!(frame.pixels().all(|p| p.0 == [0x10, 0x20, 0x30, 255]));
    }

    #[test]
    fn test_cover_crops_centered_overflow() {
        // Left half red, right half blue; a square output keeps the middle.
        let source = RgbaImage::from_fn(200, 100, |x, _| {
            if x < 100 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let frame = compositor()
            .composite(Some(&source), None, &no_shadow(), OutputSize::new(100, 100))
            .unwrap();
        assert_eq!(frame.get_pixel(20, 50).0, [255, 0, 0, 255]);
        assert_eq!(frame.get_pixel(80, 50).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_text_is_drawn_centered_on_baseline() {
        let mut style = no_shadow();
        style.primary.font_size = 20.0;
        style.primary.offset_pct = 50.0;
        let cue = Cue::new(CueId(0), 0.0, None, "abcd", "");
        let frame = compositor()
            .composite(None, Some(&cue), &style, OutputSize::new(200, 100))
            .unwrap();

        // 4 glyphs * 10px = 40px wide, centered on x=100; 14px tall above y=50.
        assert_eq!(frame.get_pixel(100, 45).0, [255, 255, 255, 255]);
        assert_eq!(frame.get_pixel(81, 45).0, [255, 255, 255, 255]);
        assert_eq!(frame.get_pixel(78, 45).0, [0, 0, 0, 255]);
        assert_eq!(frame.get_pixel(100, 52).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_long_text_is_condensed_to_max_width() {
        let mut style = no_shadow();
        style.primary.font_size = 20.0;
        let text = "x".repeat(40); // 400px natural width
        let cue = Cue::new(CueId(0), 0.0, None, text, "");
        let frame = compositor()
            .composite(None, Some(&cue), &style, OutputSize::new(200, 100))
            .unwrap();

        let lit: Vec<u32> = (0..200)
            .filter(|&x| frame.get_pixel(x, 80).0 == [255, 255, 255, 255])
            .collect();
        assert!(!lit.is_empty());
        assert!(*lit.first().unwrap() >= 10);
        assert!(*lit.last().unwrap() < 190);
    }

    #[test]
    fn test_shadow_is_drawn_under_text() {
        let mut style = StyleConfig::default();
        style.shadow.blur = 0.0;
        style.shadow.color = "#FF0000".to_string();
        style.shadow.offset_x = 3;
        style.shadow.offset_y = 3;
        style.primary.font_size = 20.0;
        style.primary.offset_pct = 50.0;
        let cue = Cue::new(CueId(0), 0.0, None, "ab", "");
        let frame = compositor()
            .composite(None, Some(&cue), &style, OutputSize::new(100, 100))
            .unwrap();

        // Text spans x 40..60, y 36..50; shadow spans x 43..63, y 39..53.
        assert_eq!(frame.get_pixel(50, 45).0, [255, 255, 255, 255]);
        assert_eq!(frame.get_pixel(61, 51).0, [255, 0, 0, 255]);
        assert_eq!(frame.get_pixel(41, 37).0, [255, 255, 255, 255]);
    }
}
