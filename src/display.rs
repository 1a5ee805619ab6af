use crate::tube::{h_pos, v_pos, Frame, PhosphorDot, TUBE_HEIGHT, TUBE_WIDTH};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use std::io;
use tui::backend::CrosstermBackend;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

/// Display is used to put snapshots of the tube on a screen. It should
/// abstract the implementation details, so a variety of kinds of screen would
/// work.
pub trait Display {
    /// draw every dot in `frame`; `info` is a one-line status to show with it
    fn draw(&mut self, frame: &Frame, info: &str) -> Result<(), io::Error>;
}

/// brightness bands, dimmest first; each is drawn in one colour
const BANDS: [(f64, Color); 3] = [
    (0.0, Color::DarkGray),
    (0.45, Color::Gray),
    (0.75, Color::White),
];

/// Sorts dots into brightness bands and maps deflection to positions on the
/// tube face, in metres. Dots at or below the black level aren't drawn at all.
struct Bands {
    black_level: f64,
}

impl Bands {
    fn x_bounds(&self) -> [f64; 2] {
        [-TUBE_WIDTH / 2.0, TUBE_WIDTH / 2.0]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-TUBE_HEIGHT / 2.0, TUBE_HEIGHT / 2.0]
    }

    /// which band a brightness falls into, if any
    fn band_of(&self, brightness: f64) -> Option<usize> {
        if brightness <= self.black_level {
            return None;
        }
        let level = (brightness - self.black_level) / (1.0 - self.black_level);
        BANDS.iter().rposition(|(floor, _)| level >= *floor)
    }

    fn band_from_dots<'a>(
        &'a self,
        dots: impl Iterator<Item = &'a PhosphorDot> + 'a,
        band: usize,
    ) -> impl Iterator<Item = (f64, f64)> + 'a {
        // vertical deflection sweeps top to bottom
        dots.filter(move |d| self.band_of(d.brightness) == Some(band))
            .map(|d| (h_pos(d.h), -v_pos(d.v)))
    }
}

/// the tube rendered into a terminal with TUI and crossterm
pub struct TermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    bands: Bands,
    title: String,
}

impl TermDisplay {
    pub fn new(title: &str, black_level: f64) -> Result<TermDisplay, io::Error> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.hide_cursor()?;
        Ok(TermDisplay {
            terminal,
            bands: Bands { black_level },
            title: title.to_string(),
        })
    }
}

impl Drop for TermDisplay {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

impl Display for TermDisplay {
    fn draw(&mut self, frame: &Frame, info: &str) -> Result<(), io::Error> {
        let bands = &self.bands;
        let title = format!("{} - {}", self.title, info);
        // collect up front; the paint closure may be called more than once
        let points: Vec<Vec<(f64, f64)>> = (0..BANDS.len())
            .map(|band| bands.band_from_dots(frame.dots(), band).collect())
            .collect();
        self.terminal.draw(|f| {
            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title(title.as_str())
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds(bands.x_bounds())
                .y_bounds(bands.y_bounds())
                .marker(Marker::Braille)
                .paint(|ctx| {
                    // dimmest first so brighter dots win shared cells
                    for (coords, (_, color)) in points.iter().zip(BANDS.iter()) {
                        ctx.draw(&Points {
                            coords: coords.as_slice(),
                            color: *color,
                        });
                    }
                });
            f.render_widget(canvas, f.size());
        })?;
        Ok(())
    }
}

/// useful for testing non-display routines
#[derive(Debug, Default)]
pub struct DummyDisplay {
    pub draws: usize,
    pub last_dot_count: usize,
}

impl DummyDisplay {
    pub fn new() -> DummyDisplay {
        DummyDisplay::default()
    }
}

impl Display for DummyDisplay {
    #[allow(unused)]
    fn draw(&mut self, frame: &Frame, info: &str) -> Result<(), io::Error> {
        self.draws += 1;
        self.last_dot_count = frame.dot_count();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tube::FrameSection;
    use approx::assert_abs_diff_eq;

    fn dot(h: f64, v: f64, brightness: f64) -> PhosphorDot {
        PhosphorDot {
            time: 0.0,
            h,
            v,
            brightness,
        }
    }

    #[test]
    fn test_bounds() {
        let b = Bands { black_level: 0.3 };
        assert_eq!(b.x_bounds(), [-0.2, 0.2]);
        assert_eq!(b.y_bounds(), [-0.17, 0.17]);
    }

    #[test]
    fn test_black_and_sync_not_drawn() {
        let b = Bands { black_level: 0.3 };
        assert_eq!(b.band_of(0.0), None);
        assert_eq!(b.band_of(0.3), None);
    }

    #[test]
    fn test_band_thresholds() {
        let b = Bands { black_level: 0.0 };
        assert_eq!(b.band_of(0.1), Some(0));
        assert_eq!(b.band_of(0.5), Some(1));
        assert_eq!(b.band_of(0.9), Some(2));
        assert_eq!(b.band_of(1.0), Some(2));
    }

    #[test]
    fn test_band_flips_vertical() {
        let b = Bands { black_level: 0.3 };
        let dots = [dot(-0.5, -1.0, 1.0), dot(0.5, 0.5, 0.4)];
        let bright: Vec<_> = b.band_from_dots(dots.iter(), 2).collect();
        assert_eq!(bright.len(), 1);
        assert_abs_diff_eq!(bright[0].0, -0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(bright[0].1, 0.17, epsilon = 1e-12);
        let dim: Vec<_> = b.band_from_dots(dots.iter(), 0).collect();
        assert_eq!(dim.len(), 1);
        assert_abs_diff_eq!(dim[0].0, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(dim[0].1, -0.085, epsilon = 1e-12);
    }

    #[test]
    fn test_full_deflection_reaches_tube_edges() {
        let b = Bands { black_level: 0.0 };
        let dots = [dot(-1.0, -1.0, 1.0), dot(1.0, 1.0, 1.0)];
        let points: Vec<_> = b.band_from_dots(dots.iter(), 2).collect();
        assert_abs_diff_eq!(points[0].0, b.x_bounds()[0], epsilon = 1e-12);
        assert_abs_diff_eq!(points[0].1, b.y_bounds()[1], epsilon = 1e-12);
        assert_abs_diff_eq!(points[1].0, b.x_bounds()[1], epsilon = 1e-12);
        assert_abs_diff_eq!(points[1].1, b.y_bounds()[0], epsilon = 1e-12);
    }

    #[test]
    fn test_dummy_display_counts() -> Result<(), io::Error> {
        let mut d = DummyDisplay::new();
        let frame = Frame {
            time: 1.0,
            sections: vec![FrameSection::from_dots(vec![dot(0.0, 0.0, 1.0)]).unwrap()],
        };
        d.draw(&frame, "test")?;
        d.draw(&Frame::default(), "test")?;
        assert_eq!(d.draws, 2);
        assert_eq!(d.last_dot_count, 0);
        Ok(())
    }

    #[test]
    #[ignore]
    // NB. needs a real terminal
    fn test_draw_to_terminal() -> Result<(), io::Error> {
        let mut d = TermDisplay::new("test", 0.3)?;
        d.draw(&Frame::default(), "empty")
    }
}
