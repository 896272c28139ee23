//! MP4 recorder combining encoder and muxer

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use muxide::api::{Metadata, Muxer, MuxerBuilder, VideoCodec};

use super::config::{RecordingConfig, RecordingStats};
use super::encoder::{crop_to_even, H264Encoder};
use crate::errors::FocusError;
use crate::platform::FrameRecorder;
use crate::types::CameraFrame;

struct ActiveRecording {
    encoder: H264Encoder,
    muxer: Muxer<BufWriter<File>>,
    /// Dimensions of the first frame; later frames must match
    source_size: (u32, u32),
}

/// Records every frame it is given to an H.264 MP4 file.
///
/// The file is created when the first frame arrives, since only then are
/// the stream dimensions known. Odd dimensions are cropped by one pixel.
pub struct Mp4Recorder {
    output_path: PathBuf,
    config: RecordingConfig,
    active: Option<ActiveRecording>,
    frame_count: u64,
    dropped_frames: u64,
    stats: Option<RecordingStats>,
}

impl Mp4Recorder {
    pub fn new<P: AsRef<Path>>(output_path: P, config: RecordingConfig) -> Result<Self, FocusError> {
        config.validate().map_err(FocusError::Recording)?;
        Ok(Self {
            output_path: output_path.as_ref().to_path_buf(),
            config,
            active: None,
            frame_count: 0,
            dropped_frames: 0,
            stats: None,
        })
    }

    fn open(&self, width: u32, height: u32) -> Result<ActiveRecording, FocusError> {
        let encoder = H264Encoder::new(width & !1, height & !1)?;
        let (enc_w, enc_h) = encoder.dimensions();

        let file = File::create(&self.output_path).map_err(|e| {
            FocusError::Recording(format!(
                "Failed to create {}: {}",
                self.output_path.display(),
                e
            ))
        })?;

        let mut metadata = Metadata::new().with_current_time();
        if let Some(ref title) = self.config.title {
            metadata = metadata.with_title(title);
        }

        let muxer = MuxerBuilder::new(BufWriter::new(file))
            .video(VideoCodec::H264, enc_w, enc_h, self.config.fps)
            .with_fast_start(self.config.fast_start)
            .with_metadata(metadata)
            .build()
            .map_err(|e| FocusError::Recording(format!("Failed to create muxer: {}", e)))?;

        log::info!(
            "Recording {}x{} @ {:.1} fps to {}",
            enc_w,
            enc_h,
            self.config.fps,
            self.output_path.display()
        );

        Ok(ActiveRecording {
            encoder,
            muxer,
            source_size: (width, height),
        })
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Statistics of the finished recording
    pub fn stats(&self) -> Option<&RecordingStats> {
        self.stats.as_ref()
    }
}

impl FrameRecorder for Mp4Recorder {
    fn record(&mut self, frame: &CameraFrame) -> Result<(), FocusError> {
        if self.stats.is_some() {
            return Err(FocusError::Recording("recording already finished".to_string()));
        }
        if self.active.is_none() {
            self.active = Some(self.open(frame.width, frame.height)?);
        }
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };

        if (frame.width, frame.height) != active.source_size {
            return Err(FocusError::Recording(format!(
                "Frame dimensions {}x{} don't match recording {}x{}",
                frame.width, frame.height, active.source_size.0, active.source_size.1
            )));
        }

        let rgb = frame.rgb_bytes()?;
        let (rgb, _, _) = crop_to_even(&rgb, frame.width, frame.height);
        let encoded = active.encoder.encode_rgb(&rgb)?;

        if encoded.data.is_empty() {
            self.dropped_frames += 1;
            return Ok(());
        }

        let pts = self.frame_count as f64 / self.config.fps;
        active
            .muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| FocusError::Recording(format!("Failed to write frame: {}", e)))?;

        self.frame_count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FocusError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };

        let muxer_stats = active
            .muxer
            .finish_with_stats()
            .map_err(|e| FocusError::Recording(format!("Failed to finalize recording: {}", e)))?;

        let stats = RecordingStats {
            video_frames: muxer_stats.video_frames,
            duration_secs: muxer_stats.duration_secs,
            bytes_written: muxer_stats.bytes_written,
            dropped_frames: self.dropped_frames,
            output_path: self.output_path.to_string_lossy().to_string(),
        };
        log::info!(
            "Recording finished: {} frames, {} bytes",
            stats.video_frames,
            stats.bytes_written
        );
        self.stats = Some(stats);
        Ok(())
    }
}
