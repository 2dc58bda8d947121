//! On-disk drawing dataset
//!
//! One newline-delimited JSON file per category (`dog.ndjson`), one drawing
//! per line in the QuickDraw simplified format:
//!
//! ```json
//! {"word": "dog", "drawing": [[[x0, x1, ...], [y0, y1, ...]], ...]}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// File extension of category files
pub const CATEGORY_EXTENSION: &str = "ndjson";

/// A single pen stroke
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    /// Polyline points in drawing space (0..=255 for QuickDraw)
    pub points: Vec<(f32, f32)>,
}

/// A decoded sketch
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    /// Category recorded in the asset, if any
    pub word: Option<String>,
    /// Strokes in drawing order
    pub strokes: Vec<Stroke>,
}

impl Drawing {
    /// Bounding box of all points as `(min_x, min_y, max_x, max_y)`
    #[must_use]
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let mut points = self.strokes.iter().flat_map(|s| s.points.iter());
        let &(x, y) = points.next()?;
        Some(points.fold((x, y, x, y), |(x0, y0, x1, y1), &(px, py)| {
            (x0.min(px), y0.min(py), x1.max(px), y1.max(py))
        }))
    }
}

#[derive(Deserialize)]
struct RawDrawing {
    #[serde(default)]
    word: Option<String>,
    drawing: Vec<(Vec<f32>, Vec<f32>)>,
}

impl From<RawDrawing> for Drawing {
    fn from(raw: RawDrawing) -> Self {
        let strokes = raw
            .drawing
            .into_iter()
            .map(|(xs, ys)| Stroke {
                points: xs.into_iter().zip(ys).collect(),
            })
            .collect();

        Self {
            word: raw.word,
            strokes,
        }
    }
}

/// Directory-backed asset store
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Dataset directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enumerate category names present on disk, sorted
    ///
    /// # Errors
    ///
    /// Returns error if the dataset directory cannot be read
    pub fn discover_categories(&self) -> Result<Vec<String>> {
        let mut categories: Vec<String> = std::fs::read_dir(&self.root)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == CATEGORY_EXTENSION)
            })
            .filter_map(|path| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .collect();

        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    /// Decode drawing `index` of `category`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the category file or the requested line is
    /// missing, and a serialization error if the line is not a drawing
    pub fn load(&self, category: &str, index: usize) -> Result<Drawing> {
        if category.is_empty() || category.contains(['/', '\\']) || category.starts_with('.') {
            return Err(Error::NotFound(format!("no asset for category {category:?}")));
        }

        let path = self
            .root
            .join(format!("{category}.{CATEGORY_EXTENSION}"));
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "no asset for category {category:?} in {}",
                    self.root.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let line = BufReader::new(file)
            .lines()
            .nth(index)
            .ok_or_else(|| {
                Error::NotFound(format!("category {category:?} has no drawing {index}"))
            })??;

        let raw: RawDrawing = serde_json::from_str(&line)?;
        tracing::trace!(category, index, "decoded drawing");
        Ok(raw.into())
    }
}
