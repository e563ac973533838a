use thiserror::Error;

use crate::capture::domain::frame_source::{FrameSource, ReadError};
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to initialise ffmpeg: {0}")]
    Init(ffmpeg_next::Error),
    #[error("unknown capture format '{0}'")]
    UnknownFormat(String),
    #[error("failed to open camera {device}: {source}")]
    Open {
        device: String,
        source: ffmpeg_next::Error,
    },
    #[error("camera {0} exposes no video stream")]
    NoVideoStream(String),
    #[error("failed to set up decoder: {0}")]
    Decoder(ffmpeg_next::Error),
}

/// Reads live frames from a capture device through libavdevice.
///
/// `device` is whatever the capture backend accepts (`/dev/video0` for
/// v4l2, `0` for avfoundation, `video=...` for dshow). Frames come out as
/// RGB24 at the device resolution.
pub struct FfmpegCameraSource {
    device: String,
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    frame_index: usize,
}

// Safety: the source is owned by the single capture thread that reads it.
// The raw pointers inside ffmpeg types are never shared across threads.
unsafe impl Send for FfmpegCameraSource {}

impl FfmpegCameraSource {
    /// Opens `device`, optionally forcing a capture format such as `v4l2`.
    pub fn open(device: &str, format: Option<&str>) -> Result<Self, CaptureError> {
        ffmpeg_next::init().map_err(CaptureError::Init)?;
        ffmpeg_next::device::register_all();

        let ictx = match format {
            Some(name) => {
                let format = ffmpeg_next::device::input::video()
                    .find(|f| f.name() == name)
                    .ok_or_else(|| CaptureError::UnknownFormat(name.to_string()))?;
                ffmpeg_next::format::open_with(device, &format, ffmpeg_next::Dictionary::new())
                    .map(|ctx| ctx.input())
            }
            None => ffmpeg_next::format::input(device),
        }
        .map_err(|source| CaptureError::Open {
            device: device.to_string(),
            source,
        })?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CaptureError::NoVideoStream(device.to_string()))?;
        let stream_index = stream.index();
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(CaptureError::Decoder)?;

        let (width, height) = (decoder.width(), decoder.height());
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(CaptureError::Decoder)?;

        log::info!("Camera {device} opened ({width}x{height})");
        Ok(Self {
            device: device.to_string(),
            ictx,
            decoder,
            scaler,
            stream_index,
            frame_index: 0,
        })
    }

    fn receive(&mut self) -> Result<Option<Frame>, ReadError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb)?;

        let (width, height) = (self.decoder.width(), self.decoder.height());
        let frame = Frame::new(
            extract_rgb_pixels(&rgb, width, height),
            width,
            height,
            3,
            self.frame_index,
        );
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

impl FrameSource for FfmpegCameraSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, ReadError> {
        if let Some(frame) = self.receive()? {
            return Ok(Some(frame));
        }
        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                log::info!("Camera {} stopped delivering packets", self.device);
                return Ok(None);
            };
            if stream.index() != self.stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Dropping undecodable camera packet: {e}");
                continue;
            }
            if let Some(frame) = self.receive()? {
                return Ok(Some(frame));
            }
        }
    }
}

/// Copies RGB24 rows out of a possibly padded ffmpeg plane.
fn extract_rgb_pixels(
    rgb: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}
