//! Raw gray8 video sources
//!
//! A raw video is a headerless file of `width * height` byte luma planes,
//! one per frame, as produced by `ffmpeg -pix_fmt gray -f rawvideo`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::Bytes;
use contracts::{
    ContractError, CropRegion, FrameSource, GrayFrame, SignalKind, SignalSource, SyncSignal,
    ViewId,
};
use tracing::{debug, instrument};

use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;

/// Random-access reader over a raw gray8 video file
pub struct RawVideoSource {
    view: ViewId,
    path: PathBuf,
    width: u32,
    height: u32,
    frame_rate: f64,
    frame_count: u64,
    file: Mutex<File>,
}

impl RawVideoSource {
    /// Open `path` and check it holds whole frames
    pub fn open(
        view: ViewId,
        path: &Path,
        width: u32,
        height: u32,
        frame_rate: f64,
    ) -> Result<Self> {
        let frame_len = width as usize * height as usize;
        if frame_len == 0 {
            return Err(IngestionError::InvalidParams {
                view,
                message: format!("invalid frame size {width}x{height}"),
            });
        }

        let io_err = |source| IngestionError::Io {
            view: view.clone(),
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let len = file.metadata().map_err(io_err)?.len() as usize;
        if len % frame_len != 0 {
            return Err(IngestionError::FrameSize {
                view,
                len,
                frame_len,
            });
        }

        Ok(Self {
            view,
            path: path.to_path_buf(),
            width,
            height,
            frame_rate,
            frame_count: (len / frame_len) as u64,
            file: Mutex::new(file),
        })
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn read_frame(&self, index: u64) -> Result<GrayFrame> {
        if index >= self.frame_count {
            return Err(IngestionError::FrameOutOfRange {
                view: self.view.clone(),
                index,
                count: self.frame_count,
            });
        }

        let mut buf = vec![0u8; self.frame_len()];
        let io_err = |source| IngestionError::Io {
            view: self.view.clone(),
            path: self.path.clone(),
            source,
        };
        {
            let mut file = self.file.lock().map_err(|_| IngestionError::InvalidParams {
                view: self.view.clone(),
                message: "video reader lock poisoned".into(),
            })?;
            file.seek(SeekFrom::Start(index * self.frame_len() as u64))
                .map_err(io_err)?;
            file.read_exact(&mut buf).map_err(io_err)?;
        }

        Ok(GrayFrame {
            width: self.width,
            height: self.height,
            data: Bytes::from(buf),
        })
    }
}

impl FrameSource for RawVideoSource {
    fn view_id(&self) -> &ViewId {
        &self.view
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn frame(&self, index: u64) -> std::result::Result<GrayFrame, ContractError> {
        Ok(self.read_frame(index)?)
    }
}

/// Mean brightness inside `crop` for every frame of `frames`
pub fn crop_brightness<F: FrameSource + ?Sized>(
    frames: &F,
    crop: &CropRegion,
) -> std::result::Result<Vec<f64>, ContractError> {
    let count = frames.frame_count();
    let mut samples = Vec::with_capacity(count as usize);
    for index in 0..count {
        let frame = frames.frame(index)?;
        let value = frame
            .mean_brightness(crop)
            .ok_or_else(|| IngestionError::CropOutsideFrame {
                view: frames.view_id().clone(),
                width: frame.width,
                height: frame.height,
            })?;
        samples.push(value);
    }
    Ok(samples)
}

/// Sync signal taken from the crop brightness of a raw video file
///
/// The file is opened on every load, so building the source never fails.
pub struct VideoSignalSource {
    view: ViewId,
    path: PathBuf,
    width: u32,
    height: u32,
    frame_rate: f64,
    crop: CropRegion,
    metrics: Arc<IngestionMetrics>,
}

impl VideoSignalSource {
    pub fn new(
        view: ViewId,
        path: PathBuf,
        (width, height): (u32, u32),
        frame_rate: f64,
        crop: CropRegion,
        metrics: Arc<IngestionMetrics>,
    ) -> Self {
        Self {
            view,
            path,
            width,
            height,
            frame_rate,
            crop,
            metrics,
        }
    }

    fn load(&self) -> std::result::Result<Vec<f64>, ContractError> {
        let video = RawVideoSource::open(
            self.view.clone(),
            &self.path,
            self.width,
            self.height,
            self.frame_rate,
        )?;
        if video.frame_count() == 0 {
            return Err(IngestionError::EmptySignal {
                view: self.view.clone(),
            }
            .into());
        }
        let samples = crop_brightness(&video, &self.crop)?;
        self.metrics.record_frames(video.frame_count());
        Ok(samples)
    }
}

impl SignalSource for VideoSignalSource {
    fn view_id(&self) -> &ViewId {
        &self.view
    }

    fn sample_rate(&self) -> f64 {
        self.frame_rate
    }

    fn signal_kind(&self) -> SignalKind {
        SignalKind::Brightness
    }

    #[instrument(name = "video_load", skip(self), fields(view = %self.view, path = ?self.path))]
    fn load_signal(&self) -> std::result::Result<SyncSignal, ContractError> {
        let started = Instant::now();
        let samples = self.load().inspect_err(|_| self.metrics.record_error(&self.view))?;

        debug!(frames = samples.len(), "video brightness extracted");
        self.metrics.record_loaded(
            &self.view,
            SignalKind::Brightness,
            samples.len(),
            started.elapsed(),
        );
        Ok(SyncSignal {
            samples,
            sample_rate: self.frame_rate,
            kind: SignalKind::Brightness,
        })
    }
}
