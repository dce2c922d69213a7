//! Frame capture probes and sources.
//!
//! The client never assumes a camera is present. At startup a
//! [`CaptureChain`] walks an ordered list of [`CaptureProbe`]s and caches
//! the first source that accepts: a registered camera backend, a recorded
//! frame-sequence directory, a synthetic test pattern, and a static
//! placeholder, in that order. A source that keeps failing sends the chain
//! down to the next probe, so capture is never fatal.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

use fallwatch_core::overlay;

use crate::ClientConfig;

/// Consecutive read failures before the chain advances to the next probe.
const MAX_SOURCE_FAILURES: u32 = 3;

/// Fraction of the synthetic cycle where the figure starts to fall.
const FALL_START: f64 = 0.75;
/// Fraction of the synthetic cycle where the figure is fully down.
const FALL_END: f64 = 0.875;

/// One captured frame, JPEG-encoded.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic capture index assigned by the chain
    pub index: u64,
    /// Wall-clock capture time
    pub captured_at: DateTime<Utc>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// JPEG bytes
    pub jpeg: Vec<u8>,
}

/// A live producer of frames.
pub trait FrameSource: Send {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Produces the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`](crate::ClientError) when the underlying
    /// device or file read fails; the chain retries and eventually falls
    /// back to the next probe.
    fn next_frame(&mut self) -> crate::Result<Frame>;
}

/// A capability check that yields a [`FrameSource`] when its backing
/// medium is available.
pub trait CaptureProbe: Send {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Returns a source when the probe's medium is usable, `None` otherwise.
    fn probe(&self) -> Option<Box<dyn FrameSource>>;
}

/// Availability of one probe, as reported by [`CaptureChain::diagnose`].
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Probe name
    pub name: String,
    /// Whether the probe produced a source
    pub available: bool,
}

/// Ordered probe chain with the winning source cached for the session.
pub struct CaptureChain {
    probes: Vec<Box<dyn CaptureProbe>>,
    active: Option<ActiveSource>,
    resume_at: usize,
    next_index: u64,
    width: u32,
    height: u32,
    quality: u8,
}

struct ActiveSource {
    source: Box<dyn FrameSource>,
    probe_idx: usize,
    failures: u32,
}

impl CaptureChain {
    /// Builds the default chain: an optional frame directory, the synthetic
    /// pattern, and the placeholder.
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut probes: Vec<Box<dyn CaptureProbe>> = Vec::new();
        if let Some(dir) = &config.frames_dir {
            probes.push(Box::new(FrameDirectoryProbe::new(
                dir.clone(),
                config.jpeg_quality,
            )));
        }
        probes.push(Box::new(SyntheticProbe::new(
            config.frame_width,
            config.frame_height,
            config.jpeg_quality,
        )));
        probes.push(Box::new(PlaceholderProbe::new(
            config.frame_width,
            config.frame_height,
            config.jpeg_quality,
        )));

        Self {
            probes,
            active: None,
            resume_at: 0,
            next_index: 0,
            width: config.frame_width,
            height: config.frame_height,
            quality: config.jpeg_quality,
        }
    }

    /// Registers an external backend ahead of the built-in probes. Takes
    /// effect on the next (re)probe.
    pub fn register(&mut self, probe: Box<dyn CaptureProbe>) {
        self.probes.insert(0, probe);
    }

    /// Runs every probe once and reports availability without selecting.
    pub fn diagnose(&self) -> Vec<ProbeReport> {
        self.probes
            .iter()
            .map(|probe| ProbeReport {
                name: probe.name().to_string(),
                available: probe.probe().is_some(),
            })
            .collect()
    }

    /// Name of the currently selected source, once one has produced a frame.
    pub fn active_source(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.source.name())
    }

    /// Produces the next frame, re-probing down the chain on repeated
    /// failure. The placeholder accepts unconditionally, so this always
    /// returns.
    pub fn next_frame(&mut self) -> Frame {
        loop {
            if self.active.is_none() {
                self.active = Some(self.select_source());
            }
            let Some(active) = self.active.as_mut() else {
                continue;
            };

            match active.source.next_frame() {
                Ok(mut frame) => {
                    active.failures = 0;
                    frame.index = self.next_index;
                    self.next_index += 1;
                    return frame;
                }
                Err(err) => {
                    active.failures += 1;
                    warn!(
                        source = active.source.name(),
                        failures = active.failures,
                        error = %err,
                        "Capture read failed"
                    );
                    if active.failures >= MAX_SOURCE_FAILURES {
                        self.resume_at = active.probe_idx + 1;
                        self.active = None;
                    }
                }
            }
        }
    }

    fn select_source(&self) -> ActiveSource {
        let count = self.probes.len();
        for offset in 0..count {
            let idx = (self.resume_at + offset) % count;
            if let Some(source) = self.probes[idx].probe() {
                info!(source = source.name(), "Capture source selected");
                return ActiveSource {
                    source,
                    probe_idx: idx,
                    failures: 0,
                };
            }
        }

        // Only reachable with an empty probe list.
        ActiveSource {
            source: Box::new(PlaceholderSource::new(self.width, self.height, self.quality)),
            probe_idx: 0,
            failures: 0,
        }
    }
}

/// Probe for a directory of recorded frames.
pub struct FrameDirectoryProbe {
    dir: PathBuf,
    quality: u8,
}

impl FrameDirectoryProbe {
    pub fn new(dir: PathBuf, quality: u8) -> Self {
        Self { dir, quality }
    }
}

impl CaptureProbe for FrameDirectoryProbe {
    fn name(&self) -> &str {
        "frame-directory"
    }

    fn probe(&self) -> Option<Box<dyn FrameSource>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %self.dir.display(), error = %err, "Frame directory unavailable");
                return None;
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| {
                        let ext = ext.to_ascii_lowercase();
                        ext == "jpg" || ext == "jpeg" || ext == "png"
                    })
                    .unwrap_or(false)
            })
            .collect();

        if files.is_empty() {
            debug!(dir = %self.dir.display(), "No frames in directory");
            return None;
        }
        files.sort();

        Some(Box::new(FrameDirectorySource {
            files,
            cursor: 0,
            quality: self.quality,
        }))
    }
}

/// Replays image files from a directory in sorted order, looping forever.
pub struct FrameDirectorySource {
    files: Vec<PathBuf>,
    cursor: usize,
    quality: u8,
}

impl FrameSource for FrameDirectorySource {
    fn name(&self) -> &str {
        "frame-directory"
    }

    fn next_frame(&mut self) -> crate::Result<Frame> {
        let path = self.files[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.files.len();

        let image = image::open(&path)?.to_rgb8();
        let jpeg = overlay::encode_jpeg(&image, self.quality)?;
        Ok(Frame {
            index: 0,
            captured_at: Utc::now(),
            width: image.width(),
            height: image.height(),
            jpeg,
        })
    }
}

/// Probe for the synthetic test pattern. Always accepts.
pub struct SyntheticProbe {
    width: u32,
    height: u32,
    quality: u8,
}

impl SyntheticProbe {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width,
            height,
            quality,
        }
    }
}

impl CaptureProbe for SyntheticProbe {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn probe(&self) -> Option<Box<dyn FrameSource>> {
        Some(Box::new(SyntheticSource::new(
            self.width,
            self.height,
            self.quality,
        )))
    }
}

/// Deterministic test pattern: a figure walks a sine path, falls once per
/// cycle, and gets back up. Matches the cadence of the simulated oracle so
/// an end-to-end run exercises both calm and alerting frames.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    quality: u8,
    tick: u64,
    cycle: u64,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self::with_cycle(width, height, quality, 240)
    }

    /// Test pattern with a custom cycle length (minimum 8 ticks).
    pub fn with_cycle(width: u32, height: u32, quality: u8, cycle: u64) -> Self {
        Self {
            width: width.max(64),
            height: height.max(64),
            quality,
            tick: 0,
            cycle: cycle.max(8),
        }
    }

    fn render(&self) -> RgbImage {
        let height = self.height;
        let mut image = RgbImage::from_fn(self.width, self.height, |_, y| {
            let shade = (26 + y * 36 / height) as u8;
            Rgb([shade, shade, shade.saturating_add(10)])
        });

        let phase = (self.tick % self.cycle) as f64 / self.cycle as f64;
        let w = self.width as f64;
        let h = self.height as f64;
        let floor = h * 0.88;
        let cx = w / 2.0 + (self.tick as f64 * 0.05).sin() * w / 4.0;

        // Torso block rotates from upright to lying by trading width for
        // height across the fall window.
        let (torso_w, torso_h) = if phase < FALL_START {
            (24.0, h * 0.2)
        } else if phase < FALL_END {
            let f = (phase - FALL_START) / (FALL_END - FALL_START);
            (24.0 + f * (h * 0.2 - 24.0), h * 0.2 - f * (h * 0.2 - 24.0))
        } else {
            (h * 0.2, 24.0)
        };

        let top = (floor - torso_h).max(0.0);
        let left = (cx - torso_w / 2.0).clamp(0.0, (w - torso_w).max(0.0));
        let rect = Rect::at(left as i32, top as i32)
            .of_size(torso_w.max(1.0) as u32, torso_h.max(1.0) as u32);
        draw_filled_rect_mut(&mut image, rect, Rgb([210, 205, 195]));

        let (head_x, head_y) = if phase < FALL_END {
            (cx as i32, (top - 14.0).max(12.0) as i32)
        } else {
            ((left - 12.0).max(12.0) as i32, (floor - 12.0) as i32)
        };
        draw_filled_circle_mut(&mut image, (head_x, head_y), 12, Rgb([222, 202, 186]));

        image
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn next_frame(&mut self) -> crate::Result<Frame> {
        let image = self.render();
        self.tick = self.tick.wrapping_add(1);
        let jpeg = overlay::encode_jpeg(&image, self.quality)?;
        Ok(Frame {
            index: 0,
            captured_at: Utc::now(),
            width: image.width(),
            height: image.height(),
            jpeg,
        })
    }
}

/// Probe for the static placeholder. Always accepts; last in the chain.
pub struct PlaceholderProbe {
    width: u32,
    height: u32,
    quality: u8,
}

impl PlaceholderProbe {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width,
            height,
            quality,
        }
    }
}

impl CaptureProbe for PlaceholderProbe {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn probe(&self) -> Option<Box<dyn FrameSource>> {
        Some(Box::new(PlaceholderSource::new(
            self.width,
            self.height,
            self.quality,
        )))
    }
}

/// Serves one pre-rendered static frame over and over.
pub struct PlaceholderSource {
    width: u32,
    height: u32,
    jpeg: Vec<u8>,
}

impl PlaceholderSource {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        let width = width.max(64);
        let height = height.max(64);
        let mut image = RgbImage::from_pixel(width, height, Rgb([24, 26, 32]));

        // Centered panel marks the frame as a stand-in.
        let panel_w = width / 2;
        let panel_h = height / 4;
        let rect = Rect::at(
            ((width - panel_w) / 2) as i32,
            ((height - panel_h) / 2) as i32,
        )
        .of_size(panel_w.max(1), panel_h.max(1));
        draw_filled_rect_mut(&mut image, rect, Rgb([58, 62, 74]));

        let jpeg = overlay::encode_jpeg(&image, quality).unwrap_or_default();
        Self {
            width,
            height,
            jpeg,
        }
    }
}

impl FrameSource for PlaceholderSource {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn next_frame(&mut self) -> crate::Result<Frame> {
        Ok(Frame {
            index: 0,
            captured_at: Utc::now(),
            width: self.width,
            height: self.height,
            jpeg: self.jpeg.clone(),
        })
    }
}
