//! Watermark placement settings for add mode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const MIN_OPACITY: f64 = 0.0;
pub const MAX_OPACITY: f64 = 1.0;
/// Watermark width bounds, in percent of the frame width.
pub const MIN_SIZE: u8 = 5;
pub const MAX_SIZE: u8 = 50;

/// Margin between the watermark and the frame border, in percent of the
/// frame width.
pub const EDGE_MARGIN: f64 = 2.0;

/// One of nine anchor points a watermark can be pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl WatermarkPosition {
    pub const ALL: [WatermarkPosition; 9] = [
        WatermarkPosition::TopLeft,
        WatermarkPosition::TopCenter,
        WatermarkPosition::TopRight,
        WatermarkPosition::CenterLeft,
        WatermarkPosition::Center,
        WatermarkPosition::CenterRight,
        WatermarkPosition::BottomLeft,
        WatermarkPosition::BottomCenter,
        WatermarkPosition::BottomRight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WatermarkPosition::TopLeft => "top-left",
            WatermarkPosition::TopCenter => "top-center",
            WatermarkPosition::TopRight => "top-right",
            WatermarkPosition::CenterLeft => "center-left",
            WatermarkPosition::Center => "center",
            WatermarkPosition::CenterRight => "center-right",
            WatermarkPosition::BottomLeft => "bottom-left",
            WatermarkPosition::BottomCenter => "bottom-center",
            WatermarkPosition::BottomRight => "bottom-right",
        }
    }

    /// Horizontal and vertical alignment as fractions: 0 start, 0.5 centre,
    /// 1 end.
    fn alignment(self) -> (f64, f64) {
        let column = match self {
            WatermarkPosition::TopLeft
            | WatermarkPosition::CenterLeft
            | WatermarkPosition::BottomLeft => 0.0,
            WatermarkPosition::TopCenter
            | WatermarkPosition::Center
            | WatermarkPosition::BottomCenter => 0.5,
            _ => 1.0,
        };
        let row = match self {
            WatermarkPosition::TopLeft
            | WatermarkPosition::TopCenter
            | WatermarkPosition::TopRight => 0.0,
            WatermarkPosition::CenterLeft
            | WatermarkPosition::Center
            | WatermarkPosition::CenterRight => 0.5,
            _ => 1.0,
        };
        (column, row)
    }
}

impl fmt::Display for WatermarkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WatermarkPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WatermarkPosition::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown watermark position `{}`", s))
    }
}

/// Settings chosen in the editor step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkConfig {
    /// Image to stamp onto the video, if one was picked.
    pub image: Option<PathBuf>,
    pub position: WatermarkPosition,
    opacity: f64,
    size: u8,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            image: None,
            position: WatermarkPosition::BottomRight,
            opacity: 0.8,
            size: 20,
        }
    }
}

impl WatermarkConfig {
    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Width of the watermark in percent of the frame width.
    pub fn size(&self) -> u8 {
        self.size
    }

    pub fn set_image(&mut self, image: Option<PathBuf>) {
        self.image = image;
    }

    pub fn set_position(&mut self, position: WatermarkPosition) {
        self.position = position;
    }

    /// Sets the opacity, clamped to `[0, 1]`. NaN is ignored.
    pub fn set_opacity(&mut self, opacity: f64) {
        if !opacity.is_nan() {
            self.opacity = opacity.clamp(MIN_OPACITY, MAX_OPACITY);
        }
    }

    /// Sets the size, clamped to `[5, 50]`.
    pub fn set_size(&mut self, size: u8) {
        self.size = size.clamp(MIN_SIZE, MAX_SIZE);
    }

    /// Pixel size and top-left offset of a `mark_w`x`mark_h` watermark
    /// scaled onto a `frame_w`x`frame_h` frame.
    ///
    /// Returns `(x, y, width, height)`.
    pub fn placement(&self, frame_w: u32, frame_h: u32, mark_w: u32, mark_h: u32) -> (u32, u32, u32, u32) {
        let fw = f64::from(frame_w);
        let fh = f64::from(frame_h);
        let width = (fw * f64::from(self.size) / 100.0).round().max(1.0);
        let aspect = if mark_w == 0 {
            1.0
        } else {
            f64::from(mark_h) / f64::from(mark_w)
        };
        let height = (width * aspect).round().max(1.0).min(fh);

        let margin = fw * EDGE_MARGIN / 100.0;
        let (col, row) = self.position.alignment();
        let free_x = (fw - width - 2.0 * margin).max(0.0);
        let free_y = (fh - height - 2.0 * margin).max(0.0);
        let x = (margin + free_x * col).round().min((fw - width).max(0.0));
        let y = (margin + free_y * row).round().min((fh - height).max(0.0));

        (x as u32, y as u32, width as u32, height as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_clamp() {
        let mut config = WatermarkConfig::default();
        config.set_opacity(1.7);
        assert_eq!(config.opacity(), 1.0);
        config.set_opacity(-0.2);
        assert_eq!(config.opacity(), 0.0);
        config.set_opacity(f64::NAN);
        assert_eq!(config.opacity(), 0.0);
        config.set_size(2);
        assert_eq!(config.size(), 5);
        config.set_size(90);
        assert_eq!(config.size(), 50);
    }

    #[test]
    fn positions_parse_by_name() {
        for position in WatermarkPosition::ALL {
            assert_eq!(position.name().parse::<WatermarkPosition>(), Ok(position));
        }
        assert!("middle".parse::<WatermarkPosition>().is_err());
    }

    #[test]
    fn bottom_right_sits_inside_the_margin() {
        let config = WatermarkConfig::default();
        // 20% of 1000 = 200 wide, square mark, 20px margin.
        assert_eq!(config.placement(1000, 500, 64, 64), (780, 280, 200, 200));
    }

    #[test]
    fn centered_mark_keeps_aspect_ratio() {
        let mut config = WatermarkConfig::default();
        config.set_position(WatermarkPosition::Center);
        config.set_size(10);
        assert_eq!(config.placement(1000, 1000, 200, 100), (450, 475, 100, 50));
    }
}
