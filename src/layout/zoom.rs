//! Height-based rescale for handheld screens. Every layout is scaled
//! relative to the mixer's height.

const BASE_HEIGHT: f64 = 540.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Zoom {
    /// Viewport shorter than the base height; content keeps its size and scrolls.
    None,
    Scaled {
        scale: f64,
        /// Content width before scaling, so the scaled result fills the window.
        width: f64,
        height: f64,
    },
}

pub fn zoom_for(window_width: f64, window_height: f64) -> Zoom {
    let dv = window_height - BASE_HEIGHT;
    if dv > 0.0 {
        let scale = 1.0 + dv / BASE_HEIGHT;
        Zoom::Scaled {
            scale,
            width: window_width / scale,
            height: BASE_HEIGHT,
        }
    } else {
        Zoom::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tall_windows_scale_up() {
        assert_eq!(
            zoom_for(2160.0, 1080.0),
            Zoom::Scaled {
                scale: 2.0,
                width: 1080.0,
                height: 540.0
            }
        );
    }

    #[test]
    fn short_windows_do_not_zoom() {
        assert_eq!(zoom_for(400.0, 540.0), Zoom::None);
        assert_eq!(zoom_for(400.0, 300.0), Zoom::None);
    }
}
