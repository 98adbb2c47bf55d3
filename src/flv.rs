use std::io::Write;

use serde::Serialize;
use tracing::debug;

use crate::amf0;
use crate::sample::{MediaSample, MovieInfo, SampleKind};
use crate::Error;

const TAG_HEADER_SIZE: u32 = 11;

/// FLV tag types (E.4.1, flv_v10_1.pdf).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    Audio = 8,
    Video = 9,
    Script = 18,
}

/// FLV video codec id. Only AVC is produced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VideoCodec {
    Avc,
}

impl VideoCodec {
    pub fn id(self) -> u8 {
        match self {
            VideoCodec::Avc => 7,
        }
    }
}

/// FLV audio codec id. Only AAC is produced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AudioCodec {
    Aac,
}

impl AudioCodec {
    pub fn id(self) -> u8 {
        match self {
            AudioCodec::Aac => 10,
        }
    }
}

/// FLV 2-bit sound-rate field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SoundRate {
    Hz5512,
    Hz11025,
    Hz22050,
    Hz44100,
}

impl SoundRate {
    /// Bucket an arbitrary sample rate into the nearest FLV rate at or below.
    pub fn bucket(hz: u32) -> Self {
        if hz >= 44100 {
            SoundRate::Hz44100
        } else if hz >= 22050 {
            SoundRate::Hz22050
        } else if hz >= 11025 {
            SoundRate::Hz11025
        } else {
            SoundRate::Hz5512
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SoundRate::Hz5512 => 0,
            SoundRate::Hz11025 => 1,
            SoundRate::Hz22050 => 2,
            SoundRate::Hz44100 => 3,
        }
    }
}

/// FLV 1-bit sound-size field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SoundBits {
    Bits8,
    Bits16,
}

impl SoundBits {
    pub fn code(self) -> u8 {
        match self {
            SoundBits::Bits8 => 0,
            SoundBits::Bits16 => 1,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            SoundBits::Bits8 => 8,
            SoundBits::Bits16 => 16,
        }
    }
}

/// FLV 1-bit sound-type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SoundChannels {
    Mono,
    Stereo,
}

impl SoundChannels {
    pub fn code(self) -> u8 {
        match self {
            SoundChannels::Mono => 0,
            SoundChannels::Stereo => 1,
        }
    }
}

/// 3-byte big-endian append, used for data sizes, timestamps and AVC
/// composition times (signed values truncate to 24 bits).
fn put_u24(out: &mut Vec<u8>, value: u32) {
    out.push((value >> 16) as u8);
    out.push((value >> 8) as u8);
    out.push(value as u8);
}

/// FLV muxer: writes the file header once, then one tag per sample, each
/// followed by its previous-tag-size back-pointer.
pub struct FlvMuxer<W: Write> {
    writer: W,
    info: MovieInfo,
}

impl<W: Write> FlvMuxer<W> {
    pub fn new(writer: W, info: MovieInfo) -> Self {
        Self { writer, info }
    }

    /// 9-byte file header plus the leading zero previous-tag-size.
    pub fn write_header(&mut self) -> Result<(), Error> {
        let mut flags = 0u8;
        if self.info.audio.is_some() {
            flags |= 0x04;
        }
        if self.info.video.is_some() {
            flags |= 0x01;
        }
        self.writer.write_all(&[b'F', b'L', b'V', 1, flags, 0, 0, 0, 9])?;
        self.writer.write_all(&0u32.to_be_bytes())?;
        Ok(())
    }

    /// `onMetaData` script tag at timestamp 0.
    ///
    /// The ECMA array count is the exact number of emitted entries and the
    /// object-end trailer is omitted, which common FLV readers accept.
    pub fn write_metadata(&mut self) -> Result<(), Error> {
        let mut payload = Vec::new();
        amf0::put_string(&mut payload, "onMetaData");

        let mut count = 2; // duration + author
        if self.info.video.is_some() {
            count += 3;
        }
        if self.info.audio.is_some() {
            count += 3;
        }
        amf0::put_ecma_array_header(&mut payload, count);

        amf0::put_key(&mut payload, "duration");
        amf0::put_number(&mut payload, self.info.duration_ms as f64 / 1000.0);
        if let Some(video) = &self.info.video {
            amf0::put_key(&mut payload, "width");
            amf0::put_number(&mut payload, video.width as f64);
            amf0::put_key(&mut payload, "height");
            amf0::put_number(&mut payload, video.height as f64);
            amf0::put_key(&mut payload, "videocodecid");
            amf0::put_number(&mut payload, video.codec.id() as f64);
        }
        if let Some(audio) = &self.info.audio {
            amf0::put_key(&mut payload, "audiosamplerate");
            amf0::put_number(&mut payload, audio.sample_rate_hz as f64);
        }
        amf0::put_key(&mut payload, "author");
        amf0::put_string(&mut payload, env!("CARGO_PKG_NAME"));
        if let Some(audio) = &self.info.audio {
            amf0::put_key(&mut payload, "audiosamplesize");
            amf0::put_number(&mut payload, audio.bits.bits() as f64);
            amf0::put_key(&mut payload, "audiocodecid");
            amf0::put_number(&mut payload, audio.codec.id() as f64);
        }
        self.write_tag(TagType::Script, 0, &payload)
    }

    /// Convert one demuxed sample into an audio or video tag.
    pub fn write_sample(&mut self, sample: &MediaSample) -> Result<(), Error> {
        match sample.kind {
            SampleKind::Audio => {
                let audio = self.info.audio.as_ref().ok_or(Error::MissingBox { kind: "mp4a" })?;
                let mut payload = Vec::with_capacity(sample.data.len() + 2);
                // E.4.2.1 AUDIODATA.
                payload.push(
                    (audio.codec.id() << 4)
                        | (audio.rate.code() << 2)
                        | (audio.bits.code() << 1)
                        | audio.channels.code(),
                );
                payload.push(if sample.seq_header { 0 } else { 1 });
                payload.extend_from_slice(&sample.data);
                self.write_tag(TagType::Audio, sample.dts_ms, &payload)
            }
            SampleKind::Video => {
                let video = self.info.video.as_ref().ok_or(Error::MissingBox { kind: "avc1" })?;
                let frame_type: u8 = if sample.keyframe { 1 } else { 2 };
                let mut payload = Vec::with_capacity(sample.data.len() + 5);
                // E.4.3.1 VIDEODATA.
                payload.push((frame_type << 4) | video.codec.id());
                payload.push(if sample.seq_header { 0 } else { 1 });
                let cts = (sample.pts_ms - sample.dts_ms) as i32;
                put_u24(&mut payload, cts as u32);
                payload.extend_from_slice(&sample.data);
                self.write_tag(TagType::Video, sample.dts_ms, &payload)
            }
        }
    }

    /// 11-byte tag header, payload, then `previous_tag_size = 11 + payload`.
    fn write_tag(&mut self, tag_type: TagType, timestamp_ms: i64, payload: &[u8]) -> Result<(), Error> {
        let ts = timestamp_ms as i32 as u32;
        let mut head = Vec::with_capacity(TAG_HEADER_SIZE as usize);
        head.push(tag_type as u8);
        put_u24(&mut head, payload.len() as u32);
        put_u24(&mut head, ts & 0x00ff_ffff);
        head.push((ts >> 24) as u8);
        put_u24(&mut head, 0); // stream id
        self.writer.write_all(&head)?;
        self.writer.write_all(payload)?;
        self.writer.write_all(&(TAG_HEADER_SIZE + payload.len() as u32).to_be_bytes())?;
        debug!(tag_type = tag_type as u8, timestamp_ms, size = payload.len(), "wrote tag");
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{AudioInfo, VideoInfo};

    fn av_info() -> MovieInfo {
        MovieInfo {
            duration_ms: 1000,
            video: Some(VideoInfo { codec: VideoCodec::Avc, width: 1280, height: 720 }),
            audio: Some(AudioInfo {
                codec: AudioCodec::Aac,
                sample_rate_hz: 44100,
                rate: SoundRate::Hz44100,
                bits: SoundBits::Bits16,
                channels: SoundChannels::Stereo,
            }),
        }
    }

    #[test]
    fn put_u24_big_endian() {
        let mut out = Vec::new();
        put_u24(&mut out, 0x01_0203);
        assert_eq!(out, [1, 2, 3]);

        out.clear();
        put_u24(&mut out, (-2i32) as u32);
        assert_eq!(out, [0xff, 0xff, 0xfe]);
    }

    #[test]
    fn header_flags_mirror_track_presence() {
        let mut muxer = FlvMuxer::new(Vec::new(), av_info());
        muxer.write_header().unwrap();
        let out = muxer.into_inner();
        assert_eq!(&out[..9], &[b'F', b'L', b'V', 1, 0x05, 0, 0, 0, 9]);
        assert_eq!(&out[9..13], &[0, 0, 0, 0]);

        let mut info = av_info();
        info.audio = None;
        let mut muxer = FlvMuxer::new(Vec::new(), info);
        muxer.write_header().unwrap();
        assert_eq!(muxer.into_inner()[4], 0x01);
    }

    #[test]
    fn metadata_tag_has_eight_entries() {
        let mut muxer = FlvMuxer::new(Vec::new(), av_info());
        muxer.write_metadata().unwrap();
        let out = muxer.into_inner();

        assert_eq!(out[0], TagType::Script as u8);
        let data_size = u32::from_be_bytes([0, out[1], out[2], out[3]]) as usize;
        let payload = &out[11..11 + data_size];
        // "onMetaData" string, then the ECMA array with an exact count.
        assert_eq!(payload[0], amf0::STRING_MARKER);
        assert_eq!(&payload[3..13], b"onMetaData");
        assert_eq!(payload[13], amf0::ECMA_ARRAY_MARKER);
        assert_eq!(u32::from_be_bytes([payload[14], payload[15], payload[16], payload[17]]), 8);
        // No object-end trailer.
        assert_ne!(&payload[payload.len() - 3..], &amf0::OBJECT_END);
        // Prev-tag-size back-pointer closes the tag.
        let prev = &out[11 + data_size..];
        assert_eq!(u32::from_be_bytes([prev[0], prev[1], prev[2], prev[3]]), 11 + data_size as u32);
    }

    #[test]
    fn audio_tag_header_byte() {
        let mut muxer = FlvMuxer::new(Vec::new(), av_info());
        let sample = MediaSample {
            kind: SampleKind::Audio,
            dts_ms: 40,
            pts_ms: 40,
            keyframe: false,
            seq_header: false,
            data: vec![0xDE, 0xAD],
        };
        muxer.write_sample(&sample).unwrap();
        let out = muxer.into_inner();
        assert_eq!(out[0], TagType::Audio as u8);
        // codec 10 << 4 | rate 3 << 2 | 16-bit << 1 | stereo.
        assert_eq!(out[11], 0xAF);
        assert_eq!(out[12], 1);
        assert_eq!(&out[13..15], &[0xDE, 0xAD]);
    }

    #[test]
    fn video_tag_carries_composition_time() {
        let mut muxer = FlvMuxer::new(Vec::new(), av_info());
        let sample = MediaSample {
            kind: SampleKind::Video,
            dts_ms: 100,
            pts_ms: 180,
            keyframe: false,
            seq_header: false,
            data: vec![0, 0, 0, 1, 0x41],
        };
        muxer.write_sample(&sample).unwrap();
        let out = muxer.into_inner();
        assert_eq!(out[0], TagType::Video as u8);
        assert_eq!(out[11], 0x27); // inter frame, AVC
        assert_eq!(out[12], 1); // NALU
        assert_eq!(&out[13..16], &[0, 0, 80]); // pts - dts
    }

    #[test]
    fn sequence_header_packet_types() {
        let mut muxer = FlvMuxer::new(Vec::new(), av_info());
        let avcc = MediaSample {
            kind: SampleKind::Video,
            dts_ms: 0,
            pts_ms: 0,
            keyframe: true,
            seq_header: true,
            data: vec![1, 0x64, 0, 0x1f],
        };
        muxer.write_sample(&avcc).unwrap();
        let out = muxer.into_inner();
        assert_eq!(out[11], 0x17); // keyframe, AVC
        assert_eq!(out[12], 0); // sequence header
        assert_eq!(&out[13..16], &[0, 0, 0]);
    }

    #[test]
    fn tag_timestamp_split_24_plus_8() {
        let mut muxer = FlvMuxer::new(Vec::new(), av_info());
        let sample = MediaSample {
            kind: SampleKind::Audio,
            dts_ms: 0x0123_4567,
            pts_ms: 0x0123_4567,
            keyframe: false,
            seq_header: false,
            data: vec![],
        };
        muxer.write_sample(&sample).unwrap();
        let out = muxer.into_inner();
        assert_eq!(&out[4..7], &[0x23, 0x45, 0x67]);
        assert_eq!(out[7], 0x01);
    }
}
