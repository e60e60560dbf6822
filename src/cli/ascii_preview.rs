use image::DynamicImage;
use crossterm::terminal;

const ASCII_RAMP: &str = " .·:;+=xX#@";
const DEFAULT_WIDTH: usize = 80;
const DEFAULT_HEIGHT: usize = 30;

/// Downsamples camera frames into text for the terminal screen.
pub struct AsciiRenderer {
    width: usize,
    height: usize,
}

impl AsciiRenderer {
    pub fn new(width: Option<usize>, height: Option<usize>) -> Self {
        let (term_width, term_height) = terminal::size()
            .map(|(w, h)| (w as usize, h as usize))
            .unwrap_or((DEFAULT_WIDTH, DEFAULT_HEIGHT));

        // Leave room for the status and result panel below the preview.
        Self {
            width: width.unwrap_or((term_width / 2).min(DEFAULT_WIDTH / 2)).max(1),
            height: height.unwrap_or((term_height.saturating_sub(14) / 2).min(DEFAULT_HEIGHT / 2)).max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Renders the frame with `banner` centred on the top row.
    pub fn render(&self, image: &DynamicImage, banner: Option<&str>) -> Vec<String> {
        let mut grid = self.image_to_ascii(image);
        if let Some(text) = banner {
            self.overlay_text(&mut grid, text, self.width / 2, 0);
        }
        self.grid_to_lines(&grid)
    }

    fn image_to_ascii(&self, image: &DynamicImage) -> Vec<Vec<char>> {
        let mut grid = vec![vec![' '; self.width]; self.height];
        let ramp: Vec<char> = ASCII_RAMP.chars().collect();

        let gray = image.to_luma8();
        let (img_width, img_height) = gray.dimensions();
        if img_width == 0 || img_height == 0 {
            return grid;
        }

        // Terminal cells are roughly twice as tall as wide, so rows and
        // columns are sampled independently.
        for term_y in 0..self.height {
            for term_x in 0..self.width {
                let img_x = (term_x as f32 / self.width as f32 * img_width as f32) as u32;
                let img_y = (term_y as f32 / self.height as f32 * img_height as f32) as u32;

                if img_x < img_width && img_y < img_height {
                    let brightness = gray.get_pixel(img_x, img_y)[0] as usize;
                    grid[term_y][term_x] = ramp[brightness * (ramp.len() - 1) / 255];
                }
            }
        }

        grid
    }

    fn overlay_text(&self, grid: &mut [Vec<char>], text: &str, center_x: usize, y: usize) {
        if y >= self.height {
            return;
        }

        let text_len = text.chars().count();
        let start_x = center_x.saturating_sub(text_len / 2);

        for (i, ch) in text.chars().enumerate() {
            let x = start_x + i;
            if x < self.width {
                grid[y][x] = ch;
            }
        }
    }

    fn grid_to_lines(&self, grid: &[Vec<char>]) -> Vec<String> {
        grid.iter()
            .map(|row| row.iter().take(self.width).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, GrayImage};

    #[test]
    fn black_and_white_map_to_ramp_ends() {
        let renderer = AsciiRenderer::new(Some(4), Some(2));
        let mut img = GrayImage::new(4, 2);
        for x in 0..4 {
            img.put_pixel(x, 0, Luma([0]));
            img.put_pixel(x, 1, Luma([255]));
        }

        let lines = renderer.render(&DynamicImage::ImageLuma8(img), None);
        assert_eq!(lines, vec!["    ".to_string(), "@@@@".to_string()]);
    }

    #[test]
    fn banner_is_centred_on_first_row() {
        let renderer = AsciiRenderer::new(Some(10), Some(3));
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 3, Luma([255])));

        let lines = renderer.render(&img, Some("OK"));
        assert_eq!(lines[0], "@@@@OK@@@@");
        assert_eq!(lines.len(), 3);
    }
}
