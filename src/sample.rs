use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, trace};

use crate::flv::{AudioCodec, SoundBits, SoundChannels, SoundRate, VideoCodec};
use crate::mp4::{
    self, CompositionOffsetBox, FourCc, HandlerKind, Mp4Box, MovieBox, SampleToChunkBox,
    StscEntry, TimeToSampleBox, TrackBox,
};
use crate::Error;

/// Which track a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleKind {
    Video,
    Audio,
}

/// One sample-table record: where a sample lives and when it plays.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub kind: SampleKind,
    /// 0-based index within the sample's own track.
    pub index: u32,
    /// Absolute file offset of the payload.
    pub offset: u64,
    pub size: u32,
    /// Decode timestamp in the track's timescale.
    pub dts: u64,
    /// Presentation timestamp; equals `dts` unless `ctts` says otherwise.
    pub pts: u64,
    pub timescale: u32,
    pub keyframe: bool,
    /// Signed millisecond correction applied by A/V drift alignment.
    pub adjust: i32,
}

impl Sample {
    pub fn dts_ms(&self) -> i64 {
        (self.dts * 1000 / self.timescale as u64) as i64 + self.adjust as i64
    }

    pub fn pts_ms(&self) -> i64 {
        (self.pts * 1000 / self.timescale as u64) as i64 + self.adjust as i64
    }
}

/// A demuxed unit ready for FLV tagging: timestamps in milliseconds plus the
/// raw payload (codec configuration for sequence headers, sample bytes
/// otherwise).
#[derive(Debug, Clone)]
pub struct MediaSample {
    pub kind: SampleKind,
    pub dts_ms: i64,
    pub pts_ms: i64,
    pub keyframe: bool,
    /// True for the synthetic codec-configuration samples emitted before any
    /// media payloads.
    pub seq_header: bool,
    pub data: Vec<u8>,
}

/// Movie-level parameters extracted from `moov`, serializable for `--info`.
#[derive(Debug, Clone, Serialize)]
pub struct MovieInfo {
    pub duration_ms: u64,
    pub video: Option<VideoInfo>,
    pub audio: Option<AudioInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoInfo {
    pub codec: VideoCodec,
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioInfo {
    pub codec: AudioCodec,
    pub sample_rate_hz: u32,
    pub rate: SoundRate,
    pub bits: SoundBits,
    pub channels: SoundChannels,
}

// -----------------------------
// Cursored table access
// -----------------------------
//
// stts, ctts and stsc are run-length coded. The builder queries them once per
// sample in strictly non-decreasing index order, so a cursor into the runs
// gives O(1) amortized lookups. The contract is debug-asserted.

struct SttsCursor<'a> {
    entries: &'a [mp4::SttsEntry],
    entry: usize,
    consumed: u32,
    next_index: u32,
}

impl<'a> SttsCursor<'a> {
    fn new(stts: &'a TimeToSampleBox) -> Self {
        Self { entries: &stts.entries, entry: 0, consumed: 0, next_index: 0 }
    }

    fn on_sample(&mut self, index: u32) -> Result<u32, Error> {
        debug_assert_eq!(index, self.next_index, "stts queried out of order");
        while self.entry < self.entries.len() && self.consumed == self.entries[self.entry].count {
            self.entry += 1;
            self.consumed = 0;
        }
        let Some(entry) = self.entries.get(self.entry) else {
            return Err(Error::IndexOutOfRange {
                table: "stts",
                index,
                entries: self.entries.iter().map(|e| e.count).sum(),
            });
        };
        self.consumed += 1;
        self.next_index = index + 1;
        Ok(entry.delta)
    }
}

struct CttsCursor<'a> {
    entries: &'a [mp4::CttsEntry],
    entry: usize,
    consumed: u32,
    next_index: u32,
}

impl<'a> CttsCursor<'a> {
    fn new(ctts: &'a CompositionOffsetBox) -> Self {
        Self { entries: &ctts.entries, entry: 0, consumed: 0, next_index: 0 }
    }

    fn on_sample(&mut self, index: u32) -> Result<i32, Error> {
        debug_assert_eq!(index, self.next_index, "ctts queried out of order");
        while self.entry < self.entries.len() && self.consumed == self.entries[self.entry].count {
            self.entry += 1;
            self.consumed = 0;
        }
        let Some(entry) = self.entries.get(self.entry) else {
            return Err(Error::IndexOutOfRange {
                table: "ctts",
                index,
                entries: self.entries.iter().map(|e| e.count).sum(),
            });
        };
        self.consumed += 1;
        self.next_index = index + 1;
        Ok(entry.offset)
    }
}

struct StscCursor<'a> {
    entries: &'a [StscEntry],
    entry: usize,
}

impl<'a> StscCursor<'a> {
    fn new(stsc: &'a SampleToChunkBox) -> Self {
        Self { entries: &stsc.entries, entry: 0 }
    }

    /// Entry applicable to 0-based chunk `ci`: the run with
    /// `first_chunk <= ci + 1 < next.first_chunk`.
    fn on_chunk(&mut self, ci: u32) -> Result<StscEntry, Error> {
        while self.entry + 1 < self.entries.len()
            && self.entries[self.entry + 1].first_chunk <= ci + 1
        {
            self.entry += 1;
        }
        self.entries.get(self.entry).copied().ok_or(Error::IndexOutOfRange {
            table: "stsc",
            index: ci,
            entries: 0,
        })
    }
}

// -----------------------------
// Sample-table builder
// -----------------------------

/// Materialize the per-track sample tables into a flat list of samples.
fn load_track(kind: SampleKind, track: &TrackBox) -> Result<Vec<Sample>, Error> {
    match track.handler_kind() {
        Some(HandlerKind::Video) | Some(HandlerKind::Audio) => {}
        _ => {
            let handler = track
                .handler()
                .map(|h| h.handler.to_string())
                .unwrap_or_else(|_| "none".to_string());
            return Err(Error::InvalidHandler { handler });
        }
    }

    let mdhd = track.mdhd()?;
    let stbl = track.stbl()?;
    let stco = stbl.stco()?;
    let stsz = stbl.stsz()?;
    let stts = stbl.stts()?;
    let (ctts, stss) = match kind {
        SampleKind::Video => (stbl.ctts(), stbl.stss()),
        SampleKind::Audio => (None, None),
    };

    let mut stts_cursor = SttsCursor::new(stts);
    let mut ctts_cursor = ctts.map(CttsCursor::new);
    let mut stsc_cursor = StscCursor::new(stbl.stsc()?);

    let timescale = mdhd.timescale.max(1);
    let mut samples: Vec<Sample> = Vec::with_capacity(stsz.sample_count as usize);
    let mut previous: Option<(u32, u64)> = None; // (index, dts)

    for (ci, &base) in stco.entries.iter().enumerate() {
        let entry = stsc_cursor.on_chunk(ci as u32)?;
        let mut relative = 0u64;
        for _ in 0..entry.samples_per_chunk {
            let index = previous.map_or(0, |(i, _)| i + 1);
            let size = stsz.sample_size(index)?;
            let delta = stts_cursor.on_sample(index)?;
            // The first sample sits at dts 0; deltas accumulate from there.
            let dts = previous.map_or(0, |(_, d)| d + delta as u64);
            let pts = match ctts_cursor.as_mut() {
                Some(c) => (dts as i64 + c.on_sample(index)? as i64).max(0) as u64,
                None => dts,
            };
            let keyframe = match kind {
                SampleKind::Video => stss.is_none_or(|s| s.is_sync(index)),
                SampleKind::Audio => false,
            };
            samples.push(Sample {
                kind,
                index,
                offset: base + relative,
                size,
                dts,
                pts,
                timescale,
                keyframe,
                adjust: 0,
            });
            trace!(?kind, index, offset = base + relative, size, dts, "loaded sample");
            relative += size as u64;
            previous = Some((index, dts));
        }
    }

    let assembled = previous.map_or(0, |(i, _)| i + 1);
    if assembled != stsz.sample_count {
        return Err(Error::SampleCountMismatch { expected: stsz.sample_count, actual: assembled });
    }

    Ok(samples)
}

/// Merge both tracks into one list ordered by file offset and align audio to
/// video when the file carries a constant A/V decode-time offset.
fn merge_tracks(video: Vec<Sample>, audio: Vec<Sample>) -> Vec<Sample> {
    let mut all = video;
    all.extend(audio);
    all.sort_by_key(|s| s.offset);
    apply_drift_adjust(&mut all);
    all
}

/// Some MP4 authors leave audio leading or lagging video by a fixed offset.
/// Scan adjacent video→audio pairs in on-disk order; when every pair drifts
/// in the same direction, shift all audio timestamps back by that drift.
fn apply_drift_adjust(samples: &mut [Sample]) {
    let mut maxp = 0i64;
    let mut maxn = 0i64;
    for pair in samples.windows(2) {
        if pair[0].kind == SampleKind::Video && pair[1].kind == SampleKind::Audio {
            let diff = pair[1].dts_ms() - pair[0].dts_ms();
            maxp = maxp.max(diff);
            maxn = maxn.min(diff);
        }
    }
    let shift = maxp + maxn;
    if (maxp == 0) != (maxn == 0) && shift != 0 {
        debug!(shift, "adjusting audio timestamps to match video");
        for s in samples.iter_mut().filter(|s| s.kind == SampleKind::Audio) {
            s.adjust -= shift as i32;
        }
    }
}

// -----------------------------
// Demuxer façade
// -----------------------------

const LEGAL_BRANDS: [FourCc; 4] = [FourCc::ISOM, FourCc::ISO2, FourCc::AVC1, FourCc::MP41];

/// MP4 demuxer: owns the input handle, the merged sample table and the codec
/// configuration blobs, and serves samples in remux order.
///
/// The same handle is used for box discovery and per-sample payload reads, so
/// the input must be seekable. Implements `Iterator<Item = Result<MediaSample,
/// Error>>`; iteration ends when the table is exhausted.
#[derive(Debug)]
pub struct Mp4Demuxer<R> {
    reader: R,
    info: MovieInfo,
    samples: Vec<Sample>,
    cur_index: usize,
    avcc: Vec<u8>,
    asc: Vec<u8>,
    avcc_written: bool,
    asc_written: bool,
}

/// Create a demuxer from an on-disk MP4 path.
pub fn demuxer_from_path(path: impl AsRef<Path>) -> Result<Mp4Demuxer<File>, Error> {
    let file = File::open(path)?;
    demuxer_from_reader(file)
}

/// Create a demuxer from any seekable reader.
pub fn demuxer_from_reader<R: Read + Seek>(mut reader: R) -> Result<Mp4Demuxer<R>, Error> {
    let boxes = mp4::discover(&mut reader)?;

    let ftyp = boxes
        .iter()
        .find_map(|b| match b {
            Mp4Box::FileType(f) => Some(f),
            _ => None,
        })
        .ok_or(Error::MissingBox { kind: "ftyp" })?;
    if !LEGAL_BRANDS.contains(&ftyp.major_brand) {
        return Err(Error::UnsupportedBrand { brand: ftyp.major_brand.to_string() });
    }

    let moov = boxes
        .iter()
        .find_map(|b| match b {
            Mp4Box::Movie(m) => Some(m),
            _ => None,
        })
        .ok_or(Error::MissingBox { kind: "moov" })?;

    parse_moov(reader, moov)
}

fn parse_moov<R: Read + Seek>(reader: R, moov: &MovieBox) -> Result<Mp4Demuxer<R>, Error> {
    let mvhd = moov.mvhd()?;
    let video_track = moov.video().ok();
    let audio_track = moov.audio().ok();
    if video_track.is_none() && audio_track.is_none() {
        return Err(Error::MissingBox { kind: "trak" });
    }

    let mut avcc = Vec::new();
    let mut video = None;
    let mut video_samples = Vec::new();
    if let Some(track) = video_track {
        let entry = track.visual_entry()?;
        avcc = track.avcc()?.config.clone();
        video = Some(VideoInfo { codec: VideoCodec::Avc, width: entry.width, height: entry.height });
        video_samples = load_track(SampleKind::Video, track)?;
    }

    let mut asc = Vec::new();
    let mut audio = None;
    let mut audio_samples = Vec::new();
    if let Some(track) = audio_track {
        let entry = track.audio_entry()?;
        asc = track.asc()?.asc.clone();
        audio = Some(AudioInfo {
            codec: AudioCodec::Aac,
            sample_rate_hz: entry.sample_rate_hz(),
            rate: SoundRate::bucket(entry.sample_rate_hz()),
            bits: if entry.sample_size == 16 { SoundBits::Bits16 } else { SoundBits::Bits8 },
            channels: if entry.channel_count == 2 {
                SoundChannels::Stereo
            } else {
                SoundChannels::Mono
            },
        });
        audio_samples = load_track(SampleKind::Audio, track)?;
    }

    let samples = merge_tracks(video_samples, audio_samples);
    let info = MovieInfo { duration_ms: mvhd.duration_ms(), video, audio };
    debug!(
        duration_ms = info.duration_ms,
        samples = samples.len(),
        avcc = avcc.len(),
        asc = asc.len(),
        "parsed moov"
    );

    Ok(Mp4Demuxer {
        reader,
        info,
        samples,
        cur_index: 0,
        avcc,
        asc,
        avcc_written: false,
        asc_written: false,
    })
}

impl<R: Read + Seek> Mp4Demuxer<R> {
    pub fn info(&self) -> &MovieInfo {
        &self.info
    }

    pub fn has_video(&self) -> bool {
        self.info.video.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.info.audio.is_some()
    }

    /// Total number of media samples in the merged table (sequence headers
    /// not included).
    pub fn total_samples(&self) -> usize {
        self.samples.len()
    }

    /// Serve the next sample in remux order: the AVC sequence header once,
    /// then the AAC sequence header once, then media samples by ascending
    /// file offset. Ends with [`Error::EndOfStream`].
    pub fn read_next_sample(&mut self) -> Result<MediaSample, Error> {
        if !self.avcc_written && !self.avcc.is_empty() {
            self.avcc_written = true;
            return Ok(MediaSample {
                kind: SampleKind::Video,
                dts_ms: 0,
                pts_ms: 0,
                keyframe: true,
                seq_header: true,
                data: self.avcc.clone(),
            });
        }
        if !self.asc_written && !self.asc.is_empty() {
            self.asc_written = true;
            return Ok(MediaSample {
                kind: SampleKind::Audio,
                dts_ms: 0,
                pts_ms: 0,
                keyframe: false,
                seq_header: true,
                data: self.asc.clone(),
            });
        }

        let Some(sample) = self.samples.get(self.cur_index).copied() else {
            return Err(Error::EndOfStream);
        };
        self.cur_index += 1;

        let mut data = vec![0u8; sample.size as usize];
        self.reader.seek(SeekFrom::Start(sample.offset))?;
        self.reader.read_exact(&mut data)?;
        trace!(
            kind = ?sample.kind,
            index = sample.index,
            dts_ms = sample.dts_ms(),
            size = sample.size,
            "read sample"
        );

        Ok(MediaSample {
            kind: sample.kind,
            dts_ms: sample.dts_ms(),
            pts_ms: sample.pts_ms(),
            keyframe: sample.keyframe,
            seq_header: false,
            data,
        })
    }
}

impl<R: Read + Seek> Iterator for Mp4Demuxer<R> {
    type Item = Result<MediaSample, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next_sample() {
            Err(Error::EndOfStream) => None,
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mp4::{CttsEntry, HandlerBox, MediaBox, SttsEntry};

    fn sample(kind: SampleKind, offset: u64, dts: u64) -> Sample {
        Sample { kind, index: 0, offset, size: 10, dts, pts: dts, timescale: 1000, keyframe: false, adjust: 0 }
    }

    #[test]
    fn stts_cursor_walks_runs() {
        let stts = TimeToSampleBox {
            entries: vec![SttsEntry { count: 2, delta: 10 }, SttsEntry { count: 1, delta: 20 }],
        };
        let mut cursor = SttsCursor::new(&stts);
        assert_eq!(cursor.on_sample(0).unwrap(), 10);
        assert_eq!(cursor.on_sample(1).unwrap(), 10);
        assert_eq!(cursor.on_sample(2).unwrap(), 20);
        assert!(matches!(
            cursor.on_sample(3),
            Err(Error::IndexOutOfRange { table: "stts", index: 3, entries: 3 })
        ));
    }

    #[test]
    fn ctts_cursor_signed_offsets() {
        let ctts = CompositionOffsetBox {
            entries: vec![CttsEntry { count: 1, offset: 0 }, CttsEntry { count: 2, offset: 80 }],
        };
        let mut cursor = CttsCursor::new(&ctts);
        assert_eq!(cursor.on_sample(0).unwrap(), 0);
        assert_eq!(cursor.on_sample(1).unwrap(), 80);
        assert_eq!(cursor.on_sample(2).unwrap(), 80);
    }

    #[test]
    fn stsc_cursor_first_chunk_rule() {
        let stsc = SampleToChunkBox {
            entries: vec![
                StscEntry { first_chunk: 1, samples_per_chunk: 3, sample_description_index: 1 },
                StscEntry { first_chunk: 3, samples_per_chunk: 1, sample_description_index: 1 },
            ],
        };
        let mut cursor = StscCursor::new(&stsc);
        assert_eq!(cursor.on_chunk(0).unwrap().samples_per_chunk, 3);
        assert_eq!(cursor.on_chunk(1).unwrap().samples_per_chunk, 3);
        assert_eq!(cursor.on_chunk(2).unwrap().samples_per_chunk, 1);
        assert_eq!(cursor.on_chunk(5).unwrap().samples_per_chunk, 1);
    }

    #[test]
    fn drift_adjust_shifts_lagging_audio() {
        let mut samples = vec![
            sample(SampleKind::Video, 100, 0),
            sample(SampleKind::Audio, 200, 50),
            sample(SampleKind::Video, 300, 33),
            sample(SampleKind::Audio, 400, 83),
        ];
        apply_drift_adjust(&mut samples);
        assert_eq!(samples[1].adjust, -50);
        assert_eq!(samples[3].adjust, -50);
        assert_eq!(samples[0].adjust, 0);
        assert_eq!(samples[1].dts_ms(), samples[0].dts_ms());
    }

    #[test]
    fn drift_adjust_leaves_mixed_drift_alone() {
        let mut samples = vec![
            sample(SampleKind::Video, 100, 0),
            sample(SampleKind::Audio, 200, 50),
            sample(SampleKind::Video, 300, 100),
            sample(SampleKind::Audio, 400, 60),
        ];
        apply_drift_adjust(&mut samples);
        assert!(samples.iter().all(|s| s.adjust == 0));
    }

    #[test]
    fn drift_adjust_shifts_leading_audio() {
        let mut samples = vec![
            sample(SampleKind::Video, 100, 40),
            sample(SampleKind::Audio, 200, 10),
            sample(SampleKind::Video, 300, 80),
            sample(SampleKind::Audio, 400, 50),
        ];
        apply_drift_adjust(&mut samples);
        assert_eq!(samples[1].adjust, 30);
        assert_eq!(samples[1].dts_ms(), 40);
    }

    #[test]
    fn merge_orders_by_file_offset() {
        let merged = merge_tracks(
            vec![sample(SampleKind::Video, 500, 0), sample(SampleKind::Video, 100, 33)],
            vec![sample(SampleKind::Audio, 300, 0)],
        );
        let offsets: Vec<u64> = merged.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![100, 300, 500]);
    }

    #[test]
    fn forbidden_handler_is_rejected() {
        let track = TrackBox {
            children: vec![Mp4Box::Media(MediaBox {
                children: vec![Mp4Box::Handler(HandlerBox { handler: FourCc(*b"hint") })],
            })],
        };
        let err = load_track(SampleKind::Video, &track).unwrap_err();
        assert!(matches!(err, Error::InvalidHandler { .. }));
    }

    #[test]
    fn sound_rate_buckets() {
        assert_eq!(SoundRate::bucket(48000), SoundRate::Hz44100);
        assert_eq!(SoundRate::bucket(44100), SoundRate::Hz44100);
        assert_eq!(SoundRate::bucket(22050), SoundRate::Hz22050);
        assert_eq!(SoundRate::bucket(16000), SoundRate::Hz11025);
        assert_eq!(SoundRate::bucket(8000), SoundRate::Hz5512);
    }
}
