//! Baseline storage and comparison.
//!
//! Baselines are the raw response bytes stored under
//! `<snapshot_dir>/<identity>.snap`. A missing baseline is recorded on first
//! run; an existing one is only ever replaced in update mode.

use image::{GenericImageView, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

const BASELINE_EXTENSION: &str = "snap";
const DIFF_DIR: &str = "__diff_output__";

/// How a received image is judged against its baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComparisonPolicy {
    /// Bytes must be identical.
    Exact,
    /// Decoded pixels may differ on at most `max_diff_ratio` of the image,
    /// where a pixel differs when any channel moves by more than `color_threshold`.
    Pixel {
        color_threshold: u8,
        max_diff_ratio: f64,
    },
}

/// Accepted reference for one test identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBaseline {
    pub test_identity: String,
    pub reference_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonResult {
    /// Byte-identical to the baseline.
    Matched,
    /// Bytes differ but pixels are within the configured tolerance.
    Tolerated { diff_ratio: f64 },
    /// No baseline existed; the received bytes became the baseline.
    Recorded { baseline: PathBuf },
    /// Update mode replaced a differing baseline.
    Updated { baseline: PathBuf },
    Mismatch(SnapshotMismatch),
}

/// A failed comparison, with both buffers and any artifacts written for review.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotMismatch {
    pub baseline_path: PathBuf,
    pub received_path: PathBuf,
    pub diff_path: Option<PathBuf>,
    /// Fraction of differing pixels, when both images decode with equal geometry.
    pub diff_ratio: Option<f64>,
    pub baseline: Vec<u8>,
    pub received: Vec<u8>,
}

/// Identity-keyed baseline store on the local filesystem.
pub struct SnapshotStore {
    dir: PathBuf,
    policy: ComparisonPolicy,
    update: bool,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, policy: ComparisonPolicy, update: bool) -> Self {
        Self {
            dir: dir.into(),
            policy,
            update,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn baseline_path(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("{identity}.{BASELINE_EXTENSION}"))
    }

    pub fn diff_dir(&self) -> PathBuf {
        self.dir.join(DIFF_DIR)
    }

    pub async fn load(&self, identity: &str) -> Result<Option<SnapshotBaseline>, SnapshotError> {
        let path = self.baseline_path(identity);
        match tokio::fs::read(&path).await {
            Ok(reference_bytes) => Ok(Some(SnapshotBaseline {
                test_identity: identity.to_string(),
                reference_bytes,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SnapshotError::Io { path, source }),
        }
    }

    fn received_path(&self, identity: &str) -> PathBuf {
        self.diff_dir().join(format!("{identity}.received"))
    }

    fn diff_path(&self, identity: &str) -> PathBuf {
        self.diff_dir().join(format!("{identity}.diff.png"))
    }

    /// Compare `received` with the baseline for `identity`.
    ///
    /// Any passing verdict removes the mismatch artifacts a previous run may
    /// have left for this identity.
    pub async fn compare(
        &self,
        identity: &str,
        received: &[u8],
    ) -> Result<ComparisonResult, SnapshotError> {
        let baseline_path = self.baseline_path(identity);

        let Some(baseline) = self.load(identity).await? else {
            write_file(&baseline_path, received).await?;
            self.clear_artifacts(identity).await?;
            tracing::warn!(
                case = identity,
                path = %baseline_path.display(),
                "No baseline found, recorded a new one"
            );
            return Ok(ComparisonResult::Recorded {
                baseline: baseline_path,
            });
        };

        if baseline.reference_bytes == received {
            self.clear_artifacts(identity).await?;
            return Ok(ComparisonResult::Matched);
        }

        let diff = match (self.policy, self.update) {
            // the new bytes win regardless of pixels
            (ComparisonPolicy::Exact, true) => None,
            (policy, _) => {
                let color_threshold = match policy {
                    ComparisonPolicy::Exact => 0,
                    ComparisonPolicy::Pixel {
                        color_threshold, ..
                    } => color_threshold,
                };
                let expected = baseline.reference_bytes.clone();
                let actual = received.to_vec();
                tokio::task::spawn_blocking(move || pixel_diff(&expected, &actual, color_threshold))
                    .await?
            }
        };

        if let (ComparisonPolicy::Pixel { max_diff_ratio, .. }, Some(diff)) = (self.policy, &diff) {
            if diff.ratio() <= max_diff_ratio {
                tracing::debug!(case = identity, diff_ratio = diff.ratio(), "Within pixel tolerance");
                self.clear_artifacts(identity).await?;
                return Ok(ComparisonResult::Tolerated {
                    diff_ratio: diff.ratio(),
                });
            }
        }

        if self.update {
            write_file(&baseline_path, received).await?;
            self.clear_artifacts(identity).await?;
            tracing::warn!(
                case = identity,
                path = %baseline_path.display(),
                "Baseline differed and was replaced"
            );
            return Ok(ComparisonResult::Updated {
                baseline: baseline_path,
            });
        }

        let received_path = self.received_path(identity);
        write_file(&received_path, received).await?;

        let diff_path = self.diff_path(identity);
        let diff_path = match &diff {
            Some(d) => {
                write_file(&diff_path, &d.image).await?;
                Some(diff_path)
            }
            None => {
                remove_if_present(&diff_path).await?;
                None
            }
        };

        Ok(ComparisonResult::Mismatch(SnapshotMismatch {
            baseline_path,
            received_path,
            diff_path,
            diff_ratio: diff.as_ref().map(PixelDiff::ratio),
            baseline: baseline.reference_bytes,
            received: received.to_vec(),
        }))
    }

    async fn clear_artifacts(&self, identity: &str) -> Result<(), SnapshotError> {
        remove_if_present(&self.received_path(identity)).await?;
        remove_if_present(&self.diff_path(identity)).await
    }
}

/// Pixel-level difference between two encoded images.
#[derive(Debug, Clone)]
pub struct PixelDiff {
    pub differing_pixels: u64,
    pub total_pixels: u64,
    /// PNG with differing pixels in red over a dimmed copy of the received image.
    pub image: Vec<u8>,
}

impl PixelDiff {
    pub fn ratio(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            self.differing_pixels as f64 / self.total_pixels as f64
        }
    }
}

/// Decode both buffers and diff them pixel by pixel.
///
/// Returns `None` when either side fails to decode or the geometries differ;
/// such inputs can only be compared byte for byte.
pub fn pixel_diff(baseline: &[u8], received: &[u8], color_threshold: u8) -> Option<PixelDiff> {
    let expected = image::load_from_memory(baseline).ok()?;
    let actual = image::load_from_memory(received).ok()?;
    if expected.dimensions() != actual.dimensions() {
        return None;
    }

    let (width, height) = actual.dimensions();
    let expected = expected.to_rgba8();
    let actual = actual.to_rgba8();
    let mut diff_img = RgbaImage::new(width, height);
    let mut differing_pixels = 0u64;

    for (x, y, got) in actual.enumerate_pixels() {
        let want = expected.get_pixel(x, y);
        let delta = got
            .0
            .iter()
            .zip(want.0.iter())
            .map(|(a, b)| a.abs_diff(*b))
            .max()
            .unwrap_or(0);

        if delta > color_threshold {
            differing_pixels += 1;
            diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
        } else {
            let Rgba([r, g, b, _]) = *got;
            diff_img.put_pixel(x, y, Rgba([r / 2, g / 2, b / 2, 128]));
        }
    }

    let mut image = Vec::new();
    diff_img
        .write_to(&mut Cursor::new(&mut image), image::ImageFormat::Png)
        .ok()?;

    Some(PixelDiff {
        differing_pixels,
        total_pixels: u64::from(width) * u64::from(height),
        image,
    })
}

/// Write through a temporary file so a crash never leaves a half-written baseline.
async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let io_err = |source: std::io::Error| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<(), SnapshotError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Pixel comparison task failed: {0}")]
    Diff(#[from] tokio::task::JoinError),
}
