use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use resvg::usvg;

use crate::error::LoadError;

/// Unit the intrinsic image size is reported in.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Units {
    #[default]
    Px,
    Pt,
    Pc,
    Mm,
    Cm,
    In,
}

impl Units {
    /// Converts a length in CSS pixels at `dpi` into this unit.
    pub fn from_px(self, px: f32, dpi: f32) -> f32 {
        match self {
            Units::Px => px,
            Units::Pt => px * 72.0 / dpi,
            Units::Pc => px * 6.0 / dpi,
            Units::Mm => px * 25.4 / dpi,
            Units::Cm => px * 2.54 / dpi,
            Units::In => px / dpi,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Units::Px => "px",
            Units::Pt => "pt",
            Units::Pc => "pc",
            Units::Mm => "mm",
            Units::Cm => "cm",
            Units::In => "in",
        }
    }
}

impl FromStr for Units {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "px" => Ok(Units::Px),
            "pt" => Ok(Units::Pt),
            "pc" => Ok(Units::Pc),
            "mm" => Ok(Units::Mm),
            "cm" => Ok(Units::Cm),
            "in" => Ok(Units::In),
            _ => Err(LoadError::InvalidUnits(s.to_owned())),
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a document is parsed and measured.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LoadOptions {
    pub units: Units,
    /// Resolution used for absolute units (`pt`, `mm`, ...).
    pub dpi: f32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            units: Units::Px,
            dpi: 96.0,
        }
    }
}

impl LoadOptions {
    pub fn new(units: Units, dpi: f32) -> Self {
        Self { units, dpi }
    }

    fn validate(&self) -> Result<(), LoadError> {
        if self.dpi.is_finite() && self.dpi > 0.0 {
            Ok(())
        } else {
            Err(LoadError::InvalidDpi(self.dpi))
        }
    }
}

/// Straight-alpha RGBA pixels of an embedded raster image.
#[derive(Debug, Clone)]
pub(crate) struct Raster {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

static NEXT_IMAGE_KEY: AtomicU64 = AtomicU64::new(1);

/// A parsed SVG document, ready to be drawn by any renderer.
///
/// Parsing happens entirely on the CPU; no device object is touched.
pub struct SvgImage {
    tree: usvg::Tree,
    /// Decoded `<image>` nodes in document order; `None` when undecodable.
    rasters: Vec<Option<Raster>>,
    options: LoadOptions,
    key: u64,
    /// Renderers hold weak references to notice when the image is gone.
    alive: Arc<()>,
}

impl SvgImage {
    pub fn from_file(path: impl AsRef<Path>, options: LoadOptions) -> Result<Self, LoadError> {
        let path = path.as_ref();
        options.validate()?;
        let data = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tree = parse(&data, &options).map_err(|source| LoadError::SvgFile {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded {}", path.display());
        Ok(Self::from_tree(tree, options))
    }

    pub fn from_data(data: &[u8], options: LoadOptions) -> Result<Self, LoadError> {
        options.validate()?;
        let tree = parse(data, &options)?;
        Ok(Self::from_tree(tree, options))
    }

    fn from_tree(tree: usvg::Tree, options: LoadOptions) -> Self {
        let mut rasters = Vec::new();
        collect_rasters(tree.root(), &mut rasters);
        Self {
            tree,
            rasters,
            options,
            key: NEXT_IMAGE_KEY.fetch_add(1, Ordering::Relaxed),
            alive: Arc::new(()),
        }
    }

    /// Intrinsic width in [`LoadOptions::units`].
    pub fn width(&self) -> f32 {
        self.options.units.from_px(self.tree.size().width(), self.options.dpi)
    }

    /// Intrinsic height in [`LoadOptions::units`].
    pub fn height(&self) -> f32 {
        self.options.units.from_px(self.tree.size().height(), self.options.dpi)
    }

    /// Intrinsic size in CSS pixels, the space paths are expressed in.
    pub fn size_px(&self) -> (f32, f32) {
        let size = self.tree.size();
        (size.width(), size.height())
    }

    pub fn options(&self) -> LoadOptions {
        self.options
    }

    pub(crate) fn tree(&self) -> &usvg::Tree {
        &self.tree
    }

    pub(crate) fn raster(&self, index: usize) -> Option<&Raster> {
        self.rasters.get(index).and_then(Option::as_ref)
    }

    /// Process-unique identity, used to key per-renderer texture caches.
    pub(crate) fn key(&self) -> u64 {
        self.key
    }

    pub(crate) fn liveness(&self) -> Weak<()> {
        Arc::downgrade(&self.alive)
    }
}

impl fmt::Debug for SvgImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SvgImage")
            .field("size_px", &self.size_px())
            .field("rasters", &self.rasters.len())
            .field("options", &self.options)
            .finish()
    }
}

fn parse(data: &[u8], options: &LoadOptions) -> Result<usvg::Tree, usvg::Error> {
    let opt = usvg::Options {
        dpi: options.dpi,
        ..usvg::Options::default()
    };
    usvg::Tree::from_data(data, &opt)
}

/// Visits `<image>` nodes in the same order the drawing walk does.
pub(crate) fn for_each_image<'a>(group: &'a usvg::Group, f: &mut impl FnMut(&'a usvg::Image)) {
    for node in group.children() {
        match node {
            usvg::Node::Group(g) => for_each_image(g, f),
            usvg::Node::Image(img) => f(img),
            usvg::Node::Path(_) | usvg::Node::Text(_) => {}
        }
    }
}

fn collect_rasters(root: &usvg::Group, out: &mut Vec<Option<Raster>>) {
    for_each_image(root, &mut |img| out.push(decode(img.kind())));
}

fn decode(kind: &usvg::ImageKind) -> Option<Raster> {
    let data = match kind {
        usvg::ImageKind::PNG(d)
        | usvg::ImageKind::JPEG(d)
        | usvg::ImageKind::GIF(d)
        | usvg::ImageKind::WEBP(d) => d,
        usvg::ImageKind::SVG(_) => {
            log::warn!("nested SVG images are not drawn");
            return None;
        }
    };
    match image::load_from_memory(data) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            Some(Raster {
                width: rgba.width(),
                height: rgba.height(),
                rgba: rgba.into_raw(),
            })
        }
        Err(e) => {
            log::warn!("skipping undecodable raster image: {e}");
            None
        }
    }
}
