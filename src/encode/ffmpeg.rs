use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Video settings handed to ffmpeg
#[derive(Clone, Debug)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pix_fmt: String,
    pub crf: u32,
}

/// Pipes raw RGBA frames into an ffmpeg process that muxes them with the source audio.
pub struct FfmpegEncoder {
    child: Child,
    frame_bytes: usize,
    frames: u64,
}

impl FfmpegEncoder {
    pub fn spawn(output: &Path, audio: &Path, settings: &EncoderSettings) -> Result<Self> {
        let args = ffmpeg_args(output, audio, settings);
        log::debug!("ffmpeg {}", args.join(" "));

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "Encoder started: {}x{} @ {}fps, codec={}, crf={}",
            settings.width,
            settings.height,
            settings.fps,
            settings.codec,
            settings.crf
        );

        Ok(Self {
            child,
            frame_bytes: settings.width as usize * settings.height as usize * 4,
            frames: 0,
        })
    }

    pub fn write_frame(&mut self, rgba: &[u8]) -> Result<()> {
        if rgba.len() != self.frame_bytes {
            anyhow::bail!(
                "Frame is {} bytes, encoder expects {}",
                rgba.len(),
                self.frame_bytes
            );
        }
        let stdin = self.child.stdin.as_mut().context("ffmpeg stdin not available")?;
        stdin
            .write_all(rgba)
            .with_context(|| format!("Failed to write frame {} to ffmpeg", self.frames))?;
        self.frames += 1;
        Ok(())
    }

    /// Closes the pipe and waits for ffmpeg, surfacing its stderr on failure.
    pub fn finish(mut self) -> Result<u64> {
        drop(self.child.stdin.take());
        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffmpeg exited with {}:\n{}", output.status, stderr);
        }
        log::info!("Encoding complete: {} frames", self.frames);
        Ok(self.frames)
    }
}

/// Only errors reach stderr. The pipe is not drained until `finish`.
fn ffmpeg_args(output: &Path, audio: &Path, settings: &EncoderSettings) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-nostats".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pixel_format".into(),
        "rgba".into(),
        "-video_size".into(),
        format!("{}x{}", settings.width, settings.height),
        "-framerate".into(),
        settings.fps.to_string(),
        "-i".into(),
        "pipe:0".into(),
        "-i".into(),
        audio.to_string_lossy().into_owned(),
        "-c:v".into(),
        settings.codec.clone(),
        "-pix_fmt".into(),
        settings.pix_fmt.clone(),
        "-crf".into(),
        settings.crf.to_string(),
        "-preset".into(),
        "medium".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-shortest".into(),
        output.to_string_lossy().into_owned(),
    ]
}
