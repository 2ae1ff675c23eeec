//! Glyph rasterization for subtitle text.
//!
//! The compositor only needs two things from a font backend: how wide a
//! string is, and a coverage mask for it at a given (possibly condensed)
//! scale. [`FontBook`] provides both through `rusttype`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use lyricut_common::config::FontFace;
use rusttype::{point, Font, Scale};

/// Font selection for one text layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec<'a> {
    /// CSS-like family list, e.g. `"Inter, sans-serif"`.
    pub family: &'a str,
    pub size_px: f32,
    pub bold: bool,
}

/// Anti-aliased coverage of a laid-out string.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphMask {
    pub width: u32,
    pub height: u32,

    /// Horizontal distance from the pen origin to the mask's left edge.
    pub origin_x: i32,

    /// Distance from the mask's top edge down to the baseline.
    pub baseline: i32,

    /// Pen advance of the whole string.
    pub advance: f32,

    /// Row-major coverage in `[0, 1]`.
    pub coverage: Vec<f32>,
}

impl GlyphMask {
    pub fn coverage_at(&self, x: u32, y: u32) -> f32 {
        self.coverage[y as usize * self.width as usize + x as usize]
    }
}

/// Text backend used by the compositor.
pub trait TextRasterizer: Send + Sync {
    /// Advance width of `text`, or `None` when no font can draw it.
    fn measure(&self, text: &str, font: &FontSpec<'_>) -> Option<f32>;

    /// Coverage mask with the horizontal axis scaled by `horizontal_scale`.
    fn rasterize(&self, text: &str, font: &FontSpec<'_>, horizontal_scale: f32)
        -> Option<GlyphMask>;
}

/// Families that match whatever face is loaded first.
const GENERIC_FAMILIES: &[&str] = &["sans-serif", "serif", "monospace", "system-ui", "cursive"];

/// Fonts tried when the configuration lists none.
const SYSTEM_FONT_CANDIDATES: &[(&str, &str, bool)] = &[
    ("DejaVu Sans", "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf", false),
    ("DejaVu Sans", "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf", true),
    ("Noto Sans CJK", "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc", false),
    ("Noto Sans CJK", "/usr/share/fonts/opentype/noto/NotoSansCJK-Bold.ttc", true),
    ("Arial", "/Library/Fonts/Arial.ttf", false),
    ("Arial", "C:\\Windows\\Fonts\\arial.ttf", false),
    ("Arial", "C:\\Windows\\Fonts\\arialbd.ttf", true),
];

struct LoadedFace {
    family: String,
    bold: bool,
    font: Font<'static>,
}

/// Fonts loaded from disk, looked up by family name.
pub struct FontBook {
    faces: Vec<LoadedFace>,
    warned_missing: AtomicBool,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field(
                "faces",
                &self
                    .faces
                    .iter()
                    .map(|face| (face.family.as_str(), face.bold))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl FontBook {
    /// A book without any fonts. Text is skipped.
    pub fn empty() -> Self {
        Self {
            faces: Vec::new(),
            warned_missing: AtomicBool::new(false),
        }
    }

    /// Load configured faces; unreadable files are skipped with a warning.
    pub fn load(faces: &[FontFace]) -> Self {
        let mut book = Self::empty();
        for face in faces {
            book.add_file(&face.family, &face.path, face.bold);
        }
        book
    }

    /// Load configured faces, or well-known system fonts when none are
    /// configured.
    pub fn load_or_system(faces: &[FontFace]) -> Self {
        if !faces.is_empty() {
            return Self::load(faces);
        }
        let mut book = Self::empty();
        for (family, path, bold) in SYSTEM_FONT_CANDIDATES {
            let path = PathBuf::from(path);
            if path.exists() {
                book.add_file(family, &path, *bold);
            }
        }
        tracing::debug!(faces = book.len(), "Loaded system fonts");
        book
    }

    fn add_file(&mut self, family: &str, path: &Path, bold: bool) {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(family, path = %path.display(), error = %e, "Cannot read font file");
                return;
            }
        };
        match Font::try_from_vec(bytes) {
            Some(font) => self.faces.push(LoadedFace {
                family: family.to_string(),
                bold,
                font,
            }),
            None => {
                tracing::warn!(family, path = %path.display(), "Not a usable font file");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// First face matching the family list, preferring the requested weight.
    fn resolve(&self, spec: &FontSpec<'_>) -> Option<&Font<'static>> {
        let families = spec
            .family
            .split(',')
            .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\''))
            .filter(|f| !f.is_empty());

        for family in families {
            let generic = GENERIC_FAMILIES
                .iter()
                .any(|g| g.eq_ignore_ascii_case(family));
            let mut candidates = self
                .faces
                .iter()
                .filter(|face| generic || face.family.eq_ignore_ascii_case(family));
            let first = candidates.clone().next();
            if let Some(face) = candidates.find(|face| face.bold == spec.bold).or(first) {
                return Some(&face.font);
            }
        }

        if !self.warned_missing.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                family = spec.family,
                loaded = self.faces.len(),
                "No font matches the requested family; subtitle text will not be drawn"
            );
        }
        None
    }
}

fn advance_width(font: &Font<'static>, text: &str, scale: Scale) -> f32 {
    font.layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}

impl TextRasterizer for FontBook {
    fn measure(&self, text: &str, spec: &FontSpec<'_>) -> Option<f32> {
        let font = self.resolve(spec)?;
        Some(advance_width(font, text, Scale::uniform(spec.size_px)))
    }

    fn rasterize(
        &self,
        text: &str,
        spec: &FontSpec<'_>,
        horizontal_scale: f32,
    ) -> Option<GlyphMask> {
        let font = self.resolve(spec)?;
        let scale = Scale {
            x: spec.size_px * horizontal_scale,
            y: spec.size_px,
        };
        let glyphs: Vec<_> = font.layout(text, scale, point(0.0, 0.0)).collect();

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
        for bb in glyphs.iter().filter_map(|g| g.pixel_bounding_box()) {
            min_x = min_x.min(bb.min.x);
            min_y = min_y.min(bb.min.y);
            max_x = max_x.max(bb.max.x);
            max_y = max_y.max(bb.max.y);
        }
        if min_x >= max_x || min_y >= max_y {
            // Whitespace only.
            return None;
        }

        let width = (max_x - min_x) as u32;
        let height = (max_y - min_y) as u32;
        let mut coverage = vec![0.0f32; width as usize * height as usize];
        for glyph in &glyphs {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|x, y, v| {
                let px = x as i32 + bb.min.x - min_x;
                let py = y as i32 + bb.min.y - min_y;
                if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                    let cell = &mut coverage[py as usize * width as usize + px as usize];
                    *cell = cell.max(v);
                }
            });
        }

        Some(GlyphMask {
            width,
            height,
            origin_x: min_x,
            baseline: -min_y,
            advance: advance_width(font, text, scale),
            coverage,
        })
    }
}
