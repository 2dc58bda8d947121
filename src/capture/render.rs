//! Print image rendering

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_line_segment_mut;

use super::detector::BoundingBox;
use crate::drawing::Drawing;

const PAPER: Luma<u8> = Luma([255]);
const INK: Luma<u8> = Luma([0]);

/// Edge-print parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeSettings {
    /// Canny low threshold
    pub low_threshold: f32,
    /// Canny high threshold
    pub high_threshold: f32,
    /// 3x3 dilation passes
    pub dilation_iterations: u32,
}

impl Default for EdgeSettings {
    fn default() -> Self {
        Self {
            low_threshold: 50.0,
            high_threshold: 150.0,
            dilation_iterations: 1,
        }
    }
}

/// Draw each sketch inside its box on a blank canvas
///
/// Sketches are scaled uniformly to fit and centered; overlapping boxes are
/// drawn in order, later ones on top.
#[must_use]
pub fn compose_scene(width: u32, height: u32, items: &[(BoundingBox, Drawing)]) -> GrayImage {
    let mut canvas = GrayImage::from_pixel(width, height, PAPER);

    for (bbox, drawing) in items {
        let Some((dx0, dy0, dx1, dy1)) = drawing.bounds() else {
            continue;
        };
        let (bx0, by0, bx1, by1) = bbox.to_pixels(width, height);

        let (dw, dh) = ((dx1 - dx0).max(1.0), (dy1 - dy0).max(1.0));
        let (bw, bh) = (bx1 - bx0, by1 - by0);
        if bw <= 0.0 || bh <= 0.0 {
            continue;
        }

        let scale = (bw / dw).min(bh / dh);
        let ox = bx0 + (bw - dw * scale) / 2.0;
        let oy = by0 + (bh - dh * scale) / 2.0;
        let map = |(x, y): (f32, f32)| (ox + (x - dx0) * scale, oy + (y - dy0) * scale);

        for stroke in &drawing.strokes {
            match stroke.points.as_slice() {
                [] => {}
                [point] => {
                    let p = map(*point);
                    draw_line_segment_mut(&mut canvas, p, p, INK);
                }
                points => {
                    for pair in points.windows(2) {
                        draw_line_segment_mut(&mut canvas, map(pair[0]), map(pair[1]), INK);
                    }
                }
            }
        }
    }

    canvas
}

/// Dark-on-light outline of a camera frame
#[must_use]
pub fn edge_image(frame: &RgbImage, settings: &EdgeSettings) -> GrayImage {
    let gray = imageops::grayscale(frame);
    let mut edges = imageproc::edges::canny(&gray, settings.low_threshold, settings.high_threshold);

    for _ in 0..settings.dilation_iterations {
        edges = imageproc::morphology::dilate(&edges, Norm::LInf, 1);
    }

    imageops::invert(&mut edges);
    edges
}

/// Scale `image` to `width` pixels wide, keeping the aspect ratio
#[must_use]
pub fn fit_width(image: &GrayImage, width: u32) -> GrayImage {
    if image.width() == width || image.width() == 0 {
        return image.clone();
    }

    let height = (u64::from(image.height()) * u64::from(width) / u64::from(image.width())).max(1);
    let height = u32::try_from(height).unwrap_or(u32::MAX);
    imageops::resize(image, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::Stroke;

    fn square() -> Drawing {
        Drawing {
            word: Some("square".to_string()),
            strokes: vec![Stroke {
                points: vec![(0.0, 0.0), (255.0, 0.0), (255.0, 255.0), (0.0, 255.0), (0.0, 0.0)],
            }],
        }
    }

    fn ink_pixels(image: &GrayImage) -> usize {
        image.pixels().filter(|p| p.0[0] < 128).count()
    }

    #[test]
    fn test_scene_stays_inside_box() {
        let bbox = BoundingBox::from([0.5, 0.5, 1.0, 1.0]);
        let scene = compose_scene(100, 100, &[(bbox, square())]);

        assert!(ink_pixels(&scene) > 0);
        for (x, y, p) in scene.enumerate_pixels() {
            if p.0[0] < 128 {
                assert!(x >= 49 && y >= 49, "ink outside box at ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_empty_scene_is_blank() {
        let scene = compose_scene(20, 10, &[]);
        assert_eq!(scene.dimensions(), (20, 10));
        assert_eq!(ink_pixels(&scene), 0);
    }

    #[test]
    fn test_edge_image_outlines_shape() {
        let mut frame = RgbImage::from_pixel(40, 40, image::Rgb([0, 0, 0]));
        for y in 10..30 {
            for x in 10..30 {
                frame.put_pixel(x, y, image::Rgb([255, 255, 255]));
            }
        }

        let edges = edge_image(&frame, &EdgeSettings::default());

        // Background and interior stay paper, the border becomes ink
        assert_eq!(edges.get_pixel(0, 0).0[0], 255);
        assert_eq!(edges.get_pixel(20, 20).0[0], 255);
        assert!(ink_pixels(&edges) > 0);
    }

    #[test]
    fn test_dilation_thickens_edges() {
        let mut frame = RgbImage::from_pixel(40, 40, image::Rgb([0, 0, 0]));
        for y in 10..30 {
            for x in 10..30 {
                frame.put_pixel(x, y, image::Rgb([255, 255, 255]));
            }
        }

        let thin = edge_image(
            &frame,
            &EdgeSettings {
                dilation_iterations: 0,
                ..EdgeSettings::default()
            },
        );
        let thick = edge_image(&frame, &EdgeSettings::default());

        assert!(ink_pixels(&thick) > ink_pixels(&thin));
    }

    #[test]
    fn test_fit_width_keeps_aspect() {
        let image = GrayImage::new(200, 100);
        assert_eq!(fit_width(&image, 100).dimensions(), (100, 50));
        assert_eq!(fit_width(&image, 200).dimensions(), (200, 100));
    }
}
