use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use tracing::trace;

use crate::Error;

// -----------------------------
// ISO-BMFF box tree (minimal: the boxes FLV remuxing needs)
// -----------------------------

/// Four-character box type code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MDAT: Self = Self(*b"mdat");
    pub const MVHD: Self = Self(*b"mvhd");
    pub const TRAK: Self = Self(*b"trak");
    pub const MDIA: Self = Self(*b"mdia");
    pub const MDHD: Self = Self(*b"mdhd");
    pub const HDLR: Self = Self(*b"hdlr");
    pub const MINF: Self = Self(*b"minf");
    pub const STBL: Self = Self(*b"stbl");
    pub const STSD: Self = Self(*b"stsd");
    pub const AVC1: Self = Self(*b"avc1");
    pub const AVCC: Self = Self(*b"avcC");
    pub const MP4A: Self = Self(*b"mp4a");
    pub const ESDS: Self = Self(*b"esds");
    pub const STTS: Self = Self(*b"stts");
    pub const CTTS: Self = Self(*b"ctts");
    pub const STSC: Self = Self(*b"stsc");
    pub const STSZ: Self = Self(*b"stsz");
    pub const STCO: Self = Self(*b"stco");
    pub const CO64: Self = Self(*b"co64");
    pub const STSS: Self = Self(*b"stss");
    pub const UUID: Self = Self(*b"uuid");

    // ftyp major brands accepted for conversion.
    pub const ISOM: Self = Self(*b"isom");
    pub const ISO2: Self = Self(*b"iso2");
    pub const MP41: Self = Self(*b"mp41");

    // hdlr handler types.
    pub const VIDE: Self = Self(*b"vide");
    pub const SOUN: Self = Self(*b"soun");
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &c in &self.0 {
            let c = if c.is_ascii_graphic() || c == b' ' { c as char } else { '.' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({self})")
    }
}

// -----------------------------
// Byte primitives
// -----------------------------

fn eof_to_truncated(e: io::Error, context: &'static str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated { context }
    } else {
        Error::Io(e)
    }
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8], context: &'static str) -> Result<(), Error> {
    r.read_exact(buf).map_err(|e| eof_to_truncated(e, context))
}

fn read_u8<R: Read>(r: &mut R, context: &'static str) -> Result<u8, Error> {
    let mut b = [0u8; 1];
    read_exact(r, &mut b, context)?;
    Ok(b[0])
}

fn read_be_u16<R: Read>(r: &mut R, context: &'static str) -> Result<u16, Error> {
    let mut b = [0u8; 2];
    read_exact(r, &mut b, context)?;
    Ok(u16::from_be_bytes(b))
}

fn read_be_u24<R: Read>(r: &mut R, context: &'static str) -> Result<u32, Error> {
    let mut b = [0u8; 3];
    read_exact(r, &mut b, context)?;
    Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
}

fn read_be_u32<R: Read>(r: &mut R, context: &'static str) -> Result<u32, Error> {
    let mut b = [0u8; 4];
    read_exact(r, &mut b, context)?;
    Ok(u32::from_be_bytes(b))
}

fn read_be_u64<R: Read>(r: &mut R, context: &'static str) -> Result<u64, Error> {
    let mut b = [0u8; 8];
    read_exact(r, &mut b, context)?;
    Ok(u64::from_be_bytes(b))
}

fn read_fourcc<R: Read>(r: &mut R, context: &'static str) -> Result<FourCc, Error> {
    let mut b = [0u8; 4];
    read_exact(r, &mut b, context)?;
    Ok(FourCc(b))
}

fn read_vec<R: Read>(r: &mut R, len: usize, context: &'static str) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0u8; len];
    read_exact(r, &mut buf, context)?;
    Ok(buf)
}

/// Version byte plus 24-bit flags shared by all full boxes.
fn read_full_box_head<R: Read>(r: &mut R, context: &'static str) -> Result<(u8, u32), Error> {
    let version = read_u8(r, context)?;
    let flags = read_be_u24(r, context)?;
    Ok((version, flags))
}

// -----------------------------
// Box framework
// -----------------------------

/// Parsed box header.
///
/// `size` is the total box size including the header. A raw size of 1 has
/// already been replaced by the 64-bit largesize; 0 means the box extends to
/// the end of its containing span and is resolved by [`box_end`].
#[derive(Debug, Clone)]
pub struct BoxHeader {
    pub kind: FourCc,
    pub size: u64,
    pub header_len: u64,
    pub usertype: Option<[u8; 16]>,
}

/// Read one box header.
///
/// Returns `Ok(None)` on clean EOF at the very first size byte (normal
/// top-level termination); EOF anywhere else inside the header is fatal.
fn read_box_header<R: Read>(r: &mut R) -> Result<Option<BoxHeader>, Error> {
    let mut sizebuf = [0u8; 4];
    let mut n = 0;
    while n < 4 {
        match r.read(&mut sizebuf[n..]) {
            Ok(0) => break,
            Ok(m) => n += m,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    if n == 0 {
        return Ok(None);
    }
    if n < 4 {
        return Err(Error::Truncated { context: "box header" });
    }

    let size32 = u32::from_be_bytes(sizebuf) as u64;
    let kind = read_fourcc(r, "box header")?;

    let (size, mut header_len) = if size32 == 1 {
        (read_be_u64(r, "box largesize")?, 16)
    } else {
        (size32, 8)
    };

    let usertype = if kind == FourCc::UUID {
        let mut u = [0u8; 16];
        read_exact(r, &mut u, "uuid usertype")?;
        header_len += 16;
        Some(u)
    } else {
        None
    };

    Ok(Some(BoxHeader { kind, size, header_len, usertype }))
}

/// Resolve the absolute end offset of a box that starts at `start` within a
/// span bounded by `limit`. A declared size of 0 extends to the limit.
fn box_end(start: u64, header: &BoxHeader, limit: u64) -> Result<u64, Error> {
    let size = if header.size == 0 { limit.saturating_sub(start) } else { header.size };
    if size < header.header_len {
        return Err(Error::Truncated { context: "box size" });
    }
    let end = start.saturating_add(size);
    if end > limit {
        return Err(Error::Truncated { context: "box payload" });
    }
    Ok(end)
}

/// One recognized ISO-BMFF box, or an opaque skipped span.
#[derive(Debug, Clone)]
pub enum Mp4Box {
    FileType(FileTypeBox),
    Movie(MovieBox),
    MovieHeader(MovieHeaderBox),
    Track(TrackBox),
    Media(MediaBox),
    MediaHeader(MediaHeaderBox),
    Handler(HandlerBox),
    MediaInfo(MediaInfoBox),
    SampleTable(SampleTableBox),
    SampleDescription(SampleDescriptionBox),
    Visual(VisualSampleEntry),
    Audio(AudioSampleEntry),
    AvcConfig(AvcConfigBox),
    Esds(EsdsBox),
    TimeToSample(TimeToSampleBox),
    CompositionOffset(CompositionOffsetBox),
    SampleToChunk(SampleToChunkBox),
    SampleSize(SampleSizeBox),
    ChunkOffset(ChunkOffsetBox),
    SyncSample(SyncSampleBox),
    MediaData(MediaDataBox),
    Free(FreeSpaceBox),
}

macro_rules! find_box {
    ($children:expr, $variant:ident) => {
        $children.iter().find_map(|b| match b {
            Mp4Box::$variant(v) => Some(v),
            _ => None,
        })
    };
}

/// Walk the top-level boxes of an MP4 file.
///
/// `mdat` payloads are skipped by seeking, so `moov` before or after `mdat`
/// both parse. Clean EOF at a box boundary ends the walk.
pub fn discover<R: Read + Seek>(r: &mut R) -> Result<Vec<Mp4Box>, Error> {
    let file_len = r.seek(SeekFrom::End(0))?;
    let mut boxes = Vec::new();
    let mut pos = 0u64;

    while pos < file_len {
        r.seek(SeekFrom::Start(pos))?;
        let Some(header) = read_box_header(r)? else { break };
        let size = if header.size == 0 { file_len - pos } else { header.size };
        if size < header.header_len {
            return Err(Error::Truncated { context: "box size" });
        }
        // A trailing box cut short by EOF (typically mdat) is tolerated here;
        // the truncation surfaces as an IO error when its payload is read.
        let end = (pos + size).min(file_len);
        trace!(kind = %header.kind, size = header.size, offset = pos, "discovered box");
        boxes.push(decode_box(r, &header, pos + header.header_len, end)?);
        pos = end;
    }

    Ok(boxes)
}

/// Parse the children of a container box occupying `[pos, end)`.
///
/// Children must tile the span exactly; a trailing fragment too short to hold
/// a box header means the container is truncated.
fn decode_children<R: Read + Seek>(r: &mut R, mut pos: u64, end: u64) -> Result<Vec<Mp4Box>, Error> {
    let mut children = Vec::new();
    while pos < end {
        if end - pos < 8 {
            return Err(Error::Truncated { context: "box header" });
        }
        r.seek(SeekFrom::Start(pos))?;
        let header = read_box_header(r)?.ok_or(Error::Truncated { context: "box header" })?;
        let child_end = box_end(pos, &header, end)?;
        trace!(kind = %header.kind, size = header.size, offset = pos, "discovered box");
        children.push(decode_box(r, &header, pos + header.header_len, child_end)?);
        pos = child_end;
    }
    Ok(children)
}

/// Dispatch a box header to the concrete parser.
///
/// `start` is the payload offset (after the header) and `end` the box end.
/// Unknown types become an opaque [`FreeSpaceBox`] whose payload is skipped.
fn decode_box<R: Read + Seek>(
    r: &mut R,
    header: &BoxHeader,
    start: u64,
    end: u64,
) -> Result<Mp4Box, Error> {
    let b = match header.kind {
        FourCc::FTYP => Mp4Box::FileType(parse_ftyp(r, start, end)?),
        FourCc::MOOV => Mp4Box::Movie(MovieBox { children: decode_children(r, start, end)? }),
        FourCc::TRAK => Mp4Box::Track(TrackBox { children: decode_children(r, start, end)? }),
        FourCc::MDIA => Mp4Box::Media(MediaBox { children: decode_children(r, start, end)? }),
        FourCc::MINF => {
            Mp4Box::MediaInfo(MediaInfoBox { children: decode_children(r, start, end)? })
        }
        FourCc::STBL => {
            Mp4Box::SampleTable(SampleTableBox { children: decode_children(r, start, end)? })
        }
        FourCc::MVHD => Mp4Box::MovieHeader(parse_mvhd(r)?),
        FourCc::MDHD => Mp4Box::MediaHeader(parse_mdhd(r)?),
        FourCc::HDLR => Mp4Box::Handler(parse_hdlr(r)?),
        FourCc::STSD => Mp4Box::SampleDescription(parse_stsd(r, start, end)?),
        FourCc::AVC1 => Mp4Box::Visual(parse_visual_entry(r, header.kind, start, end)?),
        FourCc::MP4A => Mp4Box::Audio(parse_audio_entry(r, header.kind, start, end)?),
        FourCc::AVCC => Mp4Box::AvcConfig(AvcConfigBox {
            config: read_vec(r, (end - start) as usize, "avcC payload")?,
        }),
        FourCc::ESDS => Mp4Box::Esds(parse_esds(r, start, end)?),
        FourCc::STTS => Mp4Box::TimeToSample(parse_stts(r, start, end)?),
        FourCc::CTTS => Mp4Box::CompositionOffset(parse_ctts(r, start, end)?),
        FourCc::STSC => Mp4Box::SampleToChunk(parse_stsc(r, start, end)?),
        FourCc::STSZ => Mp4Box::SampleSize(parse_stsz(r, start, end)?),
        FourCc::STCO => Mp4Box::ChunkOffset(parse_stco(r, start, end)?),
        FourCc::CO64 => Mp4Box::ChunkOffset(parse_co64(r, start, end)?),
        FourCc::STSS => Mp4Box::SyncSample(parse_stss(r, start, end)?),
        FourCc::MDAT => Mp4Box::MediaData(MediaDataBox { offset: start, size: end - start }),
        kind => Mp4Box::Free(FreeSpaceBox { kind, size: end - start }),
    };
    // Parsers may leave trailing payload (reserved fields, padding) unread.
    r.seek(SeekFrom::Start(end))?;
    Ok(b)
}

/// Guard a declared entry count against the actual payload span.
fn check_table_len(
    start: u64,
    end: u64,
    fixed: u64,
    count: u64,
    entry_len: u64,
    context: &'static str,
) -> Result<(), Error> {
    let need = fixed + count * entry_len;
    if start + need > end {
        return Err(Error::Truncated { context });
    }
    Ok(())
}

// -----------------------------
// Concrete box payloads
// -----------------------------

#[derive(Debug, Clone)]
pub struct FileTypeBox {
    pub major_brand: FourCc,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCc>,
}

fn parse_ftyp<R: Read>(r: &mut R, start: u64, end: u64) -> Result<FileTypeBox, Error> {
    let major_brand = read_fourcc(r, "ftyp")?;
    let minor_version = read_be_u32(r, "ftyp")?;
    let mut compatible_brands = Vec::new();
    let mut left = (end - start).saturating_sub(8);
    while left >= 4 {
        compatible_brands.push(read_fourcc(r, "ftyp brands")?);
        left -= 4;
    }
    Ok(FileTypeBox { major_brand, minor_version, compatible_brands })
}

#[derive(Debug, Clone)]
pub struct MovieBox {
    pub children: Vec<Mp4Box>,
}

impl MovieBox {
    pub fn mvhd(&self) -> Result<&MovieHeaderBox, Error> {
        find_box!(self.children, MovieHeader).ok_or(Error::MissingBox { kind: "mvhd" })
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackBox> {
        self.children.iter().filter_map(|b| match b {
            Mp4Box::Track(t) => Some(t),
            _ => None,
        })
    }

    /// First track whose handler is `vide`.
    pub fn video(&self) -> Result<&TrackBox, Error> {
        self.tracks()
            .find(|t| t.handler_kind() == Some(HandlerKind::Video))
            .ok_or(Error::MissingBox { kind: "trak (vide)" })
    }

    /// First track whose handler is `soun`.
    pub fn audio(&self) -> Result<&TrackBox, Error> {
        self.tracks()
            .find(|t| t.handler_kind() == Some(HandlerKind::Audio))
            .ok_or(Error::MissingBox { kind: "trak (soun)" })
    }
}

#[derive(Debug, Clone)]
pub struct MovieHeaderBox {
    pub version: u8,
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
}

impl MovieHeaderBox {
    pub fn duration_ms(&self) -> u64 {
        if self.timescale == 0 {
            return 0;
        }
        self.duration * 1000 / self.timescale as u64
    }
}

fn parse_mvhd<R: Read>(r: &mut R) -> Result<MovieHeaderBox, Error> {
    let (version, flags) = read_full_box_head(r, "mvhd")?;
    let (creation_time, modification_time, timescale, duration) = if version == 1 {
        (
            read_be_u64(r, "mvhd")?,
            read_be_u64(r, "mvhd")?,
            read_be_u32(r, "mvhd")?,
            read_be_u64(r, "mvhd")?,
        )
    } else {
        (
            read_be_u32(r, "mvhd")? as u64,
            read_be_u32(r, "mvhd")? as u64,
            read_be_u32(r, "mvhd")?,
            read_be_u32(r, "mvhd")? as u64,
        )
    };
    // Rate, volume and the transform matrix are not needed for remuxing.
    Ok(MovieHeaderBox { version, flags, creation_time, modification_time, timescale, duration })
}

#[derive(Debug, Clone)]
pub struct TrackBox {
    pub children: Vec<Mp4Box>,
}

impl TrackBox {
    fn mdia(&self) -> Result<&MediaBox, Error> {
        find_box!(self.children, Media).ok_or(Error::MissingBox { kind: "mdia" })
    }

    pub fn mdhd(&self) -> Result<&MediaHeaderBox, Error> {
        find_box!(self.mdia()?.children, MediaHeader).ok_or(Error::MissingBox { kind: "mdhd" })
    }

    pub fn handler(&self) -> Result<&HandlerBox, Error> {
        find_box!(self.mdia()?.children, Handler).ok_or(Error::MissingBox { kind: "hdlr" })
    }

    /// Handler classification, or `None` when the track has no `hdlr`.
    pub fn handler_kind(&self) -> Option<HandlerKind> {
        self.handler().ok().map(|h| h.kind())
    }

    pub fn stbl(&self) -> Result<&SampleTableBox, Error> {
        let minf = find_box!(self.mdia()?.children, MediaInfo)
            .ok_or(Error::MissingBox { kind: "minf" })?;
        find_box!(minf.children, SampleTable).ok_or(Error::MissingBox { kind: "stbl" })
    }

    /// The `avc1` sample description. Only the first `stsd` entry counts;
    /// anything else there is ignored.
    pub fn visual_entry(&self) -> Result<&VisualSampleEntry, Error> {
        match self.stbl()?.stsd()?.entries.first() {
            Some(Mp4Box::Visual(entry)) => Ok(entry),
            _ => Err(Error::MissingBox { kind: "avc1" }),
        }
    }

    /// The `mp4a` sample description. Only the first `stsd` entry counts;
    /// anything else there is ignored.
    pub fn audio_entry(&self) -> Result<&AudioSampleEntry, Error> {
        match self.stbl()?.stsd()?.entries.first() {
            Some(Mp4Box::Audio(entry)) => Ok(entry),
            _ => Err(Error::MissingBox { kind: "mp4a" }),
        }
    }

    /// The raw AVCDecoderConfigurationRecord nested under `avc1`.
    pub fn avcc(&self) -> Result<&AvcConfigBox, Error> {
        find_box!(self.visual_entry()?.children, AvcConfig)
            .ok_or(Error::MissingBox { kind: "avcC" })
    }

    /// The AudioSpecificConfig extracted from `esds` under `mp4a`.
    pub fn asc(&self) -> Result<&EsdsBox, Error> {
        find_box!(self.audio_entry()?.children, Esds).ok_or(Error::MissingBox { kind: "esds" })
    }
}

#[derive(Debug, Clone)]
pub struct MediaBox {
    pub children: Vec<Mp4Box>,
}

#[derive(Debug, Clone)]
pub struct MediaHeaderBox {
    pub version: u8,
    pub flags: u32,
    pub timescale: u32,
    pub duration: u64,
}

fn parse_mdhd<R: Read>(r: &mut R) -> Result<MediaHeaderBox, Error> {
    let (version, flags) = read_full_box_head(r, "mdhd")?;
    let (timescale, duration) = if version == 1 {
        let _creation = read_be_u64(r, "mdhd")?;
        let _modification = read_be_u64(r, "mdhd")?;
        (read_be_u32(r, "mdhd")?, read_be_u64(r, "mdhd")?)
    } else {
        let _creation = read_be_u32(r, "mdhd")?;
        let _modification = read_be_u32(r, "mdhd")?;
        (read_be_u32(r, "mdhd")?, read_be_u32(r, "mdhd")? as u64)
    };
    Ok(MediaHeaderBox { version, flags, timescale, duration })
}

/// Handler classification from `hdlr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Video,
    Audio,
    Forbidden,
}

#[derive(Debug, Clone)]
pub struct HandlerBox {
    pub handler: FourCc,
}

impl HandlerBox {
    pub fn kind(&self) -> HandlerKind {
        match self.handler {
            FourCc::VIDE => HandlerKind::Video,
            FourCc::SOUN => HandlerKind::Audio,
            _ => HandlerKind::Forbidden,
        }
    }
}

fn parse_hdlr<R: Read>(r: &mut R) -> Result<HandlerBox, Error> {
    let (_version, _flags) = read_full_box_head(r, "hdlr")?;
    let _pre_defined = read_be_u32(r, "hdlr")?;
    let handler = read_fourcc(r, "hdlr")?;
    // Reserved words and the handler name string follow; not needed.
    Ok(HandlerBox { handler })
}

#[derive(Debug, Clone)]
pub struct MediaInfoBox {
    pub children: Vec<Mp4Box>,
}

#[derive(Debug, Clone)]
pub struct SampleTableBox {
    pub children: Vec<Mp4Box>,
}

impl SampleTableBox {
    pub fn stsd(&self) -> Result<&SampleDescriptionBox, Error> {
        find_box!(self.children, SampleDescription).ok_or(Error::MissingBox { kind: "stsd" })
    }

    pub fn stts(&self) -> Result<&TimeToSampleBox, Error> {
        find_box!(self.children, TimeToSample).ok_or(Error::MissingBox { kind: "stts" })
    }

    pub fn ctts(&self) -> Option<&CompositionOffsetBox> {
        find_box!(self.children, CompositionOffset)
    }

    pub fn stsc(&self) -> Result<&SampleToChunkBox, Error> {
        find_box!(self.children, SampleToChunk).ok_or(Error::MissingBox { kind: "stsc" })
    }

    pub fn stsz(&self) -> Result<&SampleSizeBox, Error> {
        find_box!(self.children, SampleSize).ok_or(Error::MissingBox { kind: "stsz" })
    }

    pub fn stco(&self) -> Result<&ChunkOffsetBox, Error> {
        find_box!(self.children, ChunkOffset).ok_or(Error::MissingBox { kind: "stco/co64" })
    }

    pub fn stss(&self) -> Option<&SyncSampleBox> {
        find_box!(self.children, SyncSample)
    }
}

#[derive(Debug, Clone)]
pub struct SampleDescriptionBox {
    pub entries: Vec<Mp4Box>,
}

fn parse_stsd<R: Read + Seek>(r: &mut R, start: u64, end: u64) -> Result<SampleDescriptionBox, Error> {
    let (_version, _flags) = read_full_box_head(r, "stsd")?;
    let entry_count = read_be_u32(r, "stsd")?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    let mut pos = start + 8;
    for _ in 0..entry_count {
        if end - pos < 8 {
            return Err(Error::Truncated { context: "stsd entry" });
        }
        r.seek(SeekFrom::Start(pos))?;
        let header = read_box_header(r)?.ok_or(Error::Truncated { context: "stsd entry" })?;
        let entry_end = box_end(pos, &header, end)?;
        entries.push(decode_box(r, &header, pos + header.header_len, entry_end)?);
        pos = entry_end;
    }
    Ok(SampleDescriptionBox { entries })
}

#[derive(Debug, Clone)]
pub struct VisualSampleEntry {
    pub kind: FourCc,
    pub data_reference_index: u16,
    pub width: u16,
    pub height: u16,
    pub children: Vec<Mp4Box>,
}

fn parse_visual_entry<R: Read + Seek>(
    r: &mut R,
    kind: FourCc,
    start: u64,
    end: u64,
) -> Result<VisualSampleEntry, Error> {
    let mut reserved = [0u8; 6];
    read_exact(r, &mut reserved, "sample entry")?;
    let data_reference_index = read_be_u16(r, "sample entry")?;

    // VisualSampleEntry: pre_defined(2) + reserved(2) + pre_defined(12),
    // then width/height, then resolutions, frame count, compressor name,
    // depth and a trailing pre_defined before any child boxes.
    let mut skip = [0u8; 16];
    read_exact(r, &mut skip, "visual sample entry")?;
    let width = read_be_u16(r, "visual sample entry")?;
    let height = read_be_u16(r, "visual sample entry")?;
    let mut tail = [0u8; 50];
    read_exact(r, &mut tail, "visual sample entry")?;

    let children = decode_children(r, start + 78, end)?;
    Ok(VisualSampleEntry { kind, data_reference_index, width, height, children })
}

#[derive(Debug, Clone)]
pub struct AudioSampleEntry {
    pub kind: FourCc,
    pub data_reference_index: u16,
    pub channel_count: u16,
    pub sample_size: u16,
    /// 16.16 fixed point; shift right 16 for Hz.
    pub sample_rate: u32,
    pub children: Vec<Mp4Box>,
}

impl AudioSampleEntry {
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate >> 16
    }
}

fn parse_audio_entry<R: Read + Seek>(
    r: &mut R,
    kind: FourCc,
    start: u64,
    end: u64,
) -> Result<AudioSampleEntry, Error> {
    let mut reserved = [0u8; 6];
    read_exact(r, &mut reserved, "sample entry")?;
    let data_reference_index = read_be_u16(r, "sample entry")?;

    // AudioSampleEntry: version(2) + revision(2) + vendor(4).
    let mut skip = [0u8; 8];
    read_exact(r, &mut skip, "audio sample entry")?;
    let channel_count = read_be_u16(r, "audio sample entry")?;
    let sample_size = read_be_u16(r, "audio sample entry")?;
    let _compression_id = read_be_u16(r, "audio sample entry")?;
    let _packet_size = read_be_u16(r, "audio sample entry")?;
    let sample_rate = read_be_u32(r, "audio sample entry")?;

    let children = decode_children(r, start + 28, end)?;
    Ok(AudioSampleEntry { kind, data_reference_index, channel_count, sample_size, sample_rate, children })
}

#[derive(Debug, Clone)]
pub struct AvcConfigBox {
    /// Raw AVCDecoderConfigurationRecord, emitted verbatim as the FLV AVC
    /// sequence header.
    pub config: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct EsdsBox {
    /// AudioSpecificConfig from the DecoderSpecificInfo descriptor.
    pub asc: Vec<u8>,
}

// MPEG-4 descriptor tags walked inside esds.
const ES_DESCR_TAG: u8 = 0x03;
const DECODER_CONFIG_DESCR_TAG: u8 = 0x04;
const DECODER_SPECIFIC_INFO_TAG: u8 = 0x05;

/// Descriptor length: 1-4 bytes, 7 bits each, high bit flags continuation.
fn read_descr_len(data: &[u8], pos: &mut usize) -> Result<usize, Error> {
    let mut len = 0usize;
    for _ in 0..4 {
        let b = *data.get(*pos).ok_or(Error::Truncated { context: "esds descriptor" })?;
        *pos += 1;
        len = (len << 7) | (b & 0x7f) as usize;
        if b & 0x80 == 0 {
            return Ok(len);
        }
    }
    Ok(len)
}

fn read_descr_head(data: &[u8], pos: &mut usize) -> Result<(u8, usize), Error> {
    let tag = *data.get(*pos).ok_or(Error::Truncated { context: "esds descriptor" })?;
    *pos += 1;
    let len = read_descr_len(data, pos)?;
    if *pos + len > data.len() {
        return Err(Error::Truncated { context: "esds descriptor" });
    }
    Ok((tag, len))
}

fn parse_esds<R: Read>(r: &mut R, start: u64, end: u64) -> Result<EsdsBox, Error> {
    if end - start < 4 {
        return Err(Error::Truncated { context: "esds payload" });
    }
    let (_version, _flags) = read_full_box_head(r, "esds")?;
    let data = read_vec(r, (end - start - 4) as usize, "esds payload")?;
    let mut pos = 0usize;

    let (tag, _len) = read_descr_head(&data, &mut pos)?;
    if tag != ES_DESCR_TAG {
        return Err(Error::MissingBox { kind: "esds ES_Descriptor" });
    }
    let _es_id = u16::from_be_bytes([
        *data.get(pos).ok_or(Error::Truncated { context: "esds descriptor" })?,
        *data.get(pos + 1).ok_or(Error::Truncated { context: "esds descriptor" })?,
    ]);
    pos += 2;
    let stream_flags = *data.get(pos).ok_or(Error::Truncated { context: "esds descriptor" })?;
    pos += 1;
    if stream_flags & 0x80 != 0 {
        pos += 2; // dependsOn_ES_ID
    }
    if stream_flags & 0x40 != 0 {
        let url_len = *data.get(pos).ok_or(Error::Truncated { context: "esds descriptor" })? as usize;
        pos += 1 + url_len;
    }
    if stream_flags & 0x20 != 0 {
        pos += 2; // OCR_ES_ID
    }

    let (tag, _len) = read_descr_head(&data, &mut pos)?;
    if tag != DECODER_CONFIG_DESCR_TAG {
        return Err(Error::MissingBox { kind: "esds DecoderConfigDescriptor" });
    }
    // objectTypeIndication(1) + streamType/bufferSize(4) + maxBitrate(4) +
    // avgBitrate(4).
    pos += 13;
    if pos > data.len() {
        return Err(Error::Truncated { context: "esds descriptor" });
    }

    let (tag, len) = read_descr_head(&data, &mut pos)?;
    if tag != DECODER_SPECIFIC_INFO_TAG {
        return Err(Error::MissingBox { kind: "esds DecoderSpecificInfo" });
    }
    Ok(EsdsBox { asc: data[pos..pos + len].to_vec() })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SttsEntry {
    pub count: u32,
    pub delta: u32,
}

#[derive(Debug, Clone)]
pub struct TimeToSampleBox {
    pub entries: Vec<SttsEntry>,
}

fn parse_stts<R: Read>(r: &mut R, start: u64, end: u64) -> Result<TimeToSampleBox, Error> {
    let (_version, _flags) = read_full_box_head(r, "stts")?;
    let entry_count = read_be_u32(r, "stts")?;
    check_table_len(start, end, 8, entry_count as u64, 8, "stts entries")?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(SttsEntry {
            count: read_be_u32(r, "stts entries")?,
            delta: read_be_u32(r, "stts entries")?,
        });
    }
    Ok(TimeToSampleBox { entries })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CttsEntry {
    pub count: u32,
    pub offset: i32,
}

#[derive(Debug, Clone)]
pub struct CompositionOffsetBox {
    pub entries: Vec<CttsEntry>,
}

fn parse_ctts<R: Read>(r: &mut R, start: u64, end: u64) -> Result<CompositionOffsetBox, Error> {
    let (version, _flags) = read_full_box_head(r, "ctts")?;
    let entry_count = read_be_u32(r, "ctts")?;
    check_table_len(start, end, 8, entry_count as u64, 8, "ctts entries")?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let count = read_be_u32(r, "ctts entries")?;
        let raw = read_be_u32(r, "ctts entries")?;
        // Version 1 offsets are signed (B-frames before their anchor).
        let offset = if version == 0 { raw as i32 } else { i32::from_be_bytes(raw.to_be_bytes()) };
        entries.push(CttsEntry { count, offset });
    }
    Ok(CompositionOffsetBox { entries })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

#[derive(Debug, Clone)]
pub struct SampleToChunkBox {
    pub entries: Vec<StscEntry>,
}

fn parse_stsc<R: Read>(r: &mut R, start: u64, end: u64) -> Result<SampleToChunkBox, Error> {
    let (_version, _flags) = read_full_box_head(r, "stsc")?;
    let entry_count = read_be_u32(r, "stsc")?;
    check_table_len(start, end, 8, entry_count as u64, 12, "stsc entries")?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(StscEntry {
            first_chunk: read_be_u32(r, "stsc entries")?,
            samples_per_chunk: read_be_u32(r, "stsc entries")?,
            sample_description_index: read_be_u32(r, "stsc entries")?,
        });
    }
    Ok(SampleToChunkBox { entries })
}

#[derive(Debug, Clone)]
pub struct SampleSizeBox {
    /// Constant size for all samples, or 0 when `sizes` is populated.
    pub sample_size: u32,
    pub sample_count: u32,
    pub sizes: Vec<u32>,
}

impl SampleSizeBox {
    pub fn sample_size(&self, index: u32) -> Result<u32, Error> {
        if index >= self.sample_count {
            return Err(Error::IndexOutOfRange {
                table: "stsz",
                index,
                entries: self.sample_count,
            });
        }
        if self.sample_size != 0 {
            return Ok(self.sample_size);
        }
        Ok(self.sizes[index as usize])
    }
}

fn parse_stsz<R: Read>(r: &mut R, start: u64, end: u64) -> Result<SampleSizeBox, Error> {
    let (_version, _flags) = read_full_box_head(r, "stsz")?;
    let sample_size = read_be_u32(r, "stsz")?;
    let sample_count = read_be_u32(r, "stsz")?;
    let mut sizes = Vec::new();
    if sample_size == 0 {
        check_table_len(start, end, 12, sample_count as u64, 4, "stsz entries")?;
        sizes.reserve(sample_count as usize);
        for _ in 0..sample_count {
            sizes.push(read_be_u32(r, "stsz entries")?);
        }
    }
    Ok(SampleSizeBox { sample_size, sample_count, sizes })
}

#[derive(Debug, Clone)]
pub struct ChunkOffsetBox {
    /// Absolute file offsets, widened from `stco` or taken from `co64`.
    pub entries: Vec<u64>,
}

fn parse_stco<R: Read>(r: &mut R, start: u64, end: u64) -> Result<ChunkOffsetBox, Error> {
    let (_version, _flags) = read_full_box_head(r, "stco")?;
    let entry_count = read_be_u32(r, "stco")?;
    check_table_len(start, end, 8, entry_count as u64, 4, "stco entries")?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(read_be_u32(r, "stco entries")? as u64);
    }
    Ok(ChunkOffsetBox { entries })
}

fn parse_co64<R: Read>(r: &mut R, start: u64, end: u64) -> Result<ChunkOffsetBox, Error> {
    let (_version, _flags) = read_full_box_head(r, "co64")?;
    let entry_count = read_be_u32(r, "co64")?;
    check_table_len(start, end, 8, entry_count as u64, 8, "co64 entries")?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(read_be_u64(r, "co64 entries")?);
    }
    Ok(ChunkOffsetBox { entries })
}

#[derive(Debug, Clone)]
pub struct SyncSampleBox {
    /// 1-based sync sample numbers.
    pub entries: Vec<u32>,
}

impl SyncSampleBox {
    /// Whether 0-based sample `index` is a sync sample.
    pub fn is_sync(&self, index: u32) -> bool {
        self.entries.contains(&(index + 1))
    }
}

fn parse_stss<R: Read>(r: &mut R, start: u64, end: u64) -> Result<SyncSampleBox, Error> {
    let (_version, _flags) = read_full_box_head(r, "stss")?;
    let entry_count = read_be_u32(r, "stss")?;
    check_table_len(start, end, 8, entry_count as u64, 4, "stss entries")?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(read_be_u32(r, "stss entries")?);
    }
    Ok(SyncSampleBox { entries })
}

#[derive(Debug, Clone, Copy)]
pub struct MediaDataBox {
    /// Absolute file offset of the payload (after the header).
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct FreeSpaceBox {
    pub kind: FourCc,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn boxed(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + payload.len());
        out.extend_from_slice(&(8 + payload.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }

    fn full_boxed(kind: &[u8; 4], version: u8, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![version, 0, 0, 0];
        body.extend_from_slice(payload);
        boxed(kind, &body)
    }

    #[test]
    fn box_header_largesize() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&24u64.to_be_bytes());
        data.extend_from_slice(&[0u8; 8]);

        let header = read_box_header(&mut Cursor::new(&data)).unwrap().unwrap();
        assert_eq!(header.kind, FourCc::MDAT);
        assert_eq!(header.size, 24);
        assert_eq!(header.header_len, 16);
    }

    #[test]
    fn box_header_uuid_usertype() {
        let mut data = Vec::new();
        data.extend_from_slice(&24u32.to_be_bytes());
        data.extend_from_slice(b"uuid");
        data.extend_from_slice(&[0xAB; 16]);

        let header = read_box_header(&mut Cursor::new(&data)).unwrap().unwrap();
        assert_eq!(header.kind, FourCc::UUID);
        assert_eq!(header.header_len, 24);
        assert_eq!(header.usertype, Some([0xAB; 16]));
    }

    #[test]
    fn box_header_clean_eof_and_truncated() {
        assert!(read_box_header(&mut Cursor::new(&[] as &[u8])).unwrap().is_none());

        let err = read_box_header(&mut Cursor::new(&[0u8, 0, 0][..])).unwrap_err();
        assert!(matches!(err, Error::Truncated { .. }));
    }

    #[test]
    fn discover_stops_at_eof() {
        let mut data = boxed(b"ftyp", b"isom\x00\x00\x02\x00isomavc1");
        data.extend_from_slice(&boxed(b"free", &[0u8; 4]));

        let boxes = discover(&mut Cursor::new(&data)).unwrap();
        assert_eq!(boxes.len(), 2);
        let Mp4Box::FileType(ftyp) = &boxes[0] else { panic!("expected ftyp") };
        assert_eq!(ftyp.major_brand, FourCc::ISOM);
        assert_eq!(ftyp.minor_version, 0x200);
        assert_eq!(ftyp.compatible_brands, vec![FourCc::ISOM, FourCc::AVC1]);
        let Mp4Box::Free(free) = &boxes[1] else { panic!("expected free") };
        assert_eq!(free.kind, FourCc(*b"free"));
        assert_eq!(free.size, 4);
    }

    #[test]
    fn mdat_records_offset_and_size() {
        let mut data = boxed(b"ftyp", b"isom\x00\x00\x00\x00isom");
        data.extend_from_slice(&boxed(b"mdat", &[1, 2, 3, 4, 5]));

        let boxes = discover(&mut Cursor::new(&data)).unwrap();
        let Mp4Box::MediaData(mdat) = &boxes[1] else { panic!("expected mdat") };
        assert_eq!(mdat.offset, 20 + 8);
        assert_eq!(mdat.size, 5);
    }

    #[test]
    fn container_children_tile_exactly() {
        // mvhd v0 payload: creation, modification, timescale, duration.
        let mut mvhd = Vec::new();
        mvhd.extend_from_slice(&0u32.to_be_bytes());
        mvhd.extend_from_slice(&0u32.to_be_bytes());
        mvhd.extend_from_slice(&1000u32.to_be_bytes());
        mvhd.extend_from_slice(&2000u32.to_be_bytes());
        let moov = boxed(b"moov", &full_boxed(b"mvhd", 0, &mvhd));

        let boxes = discover(&mut Cursor::new(&moov)).unwrap();
        let Mp4Box::Movie(movie) = &boxes[0] else { panic!("expected moov") };
        assert_eq!(movie.children.len(), 1);
        let header = movie.mvhd().unwrap();
        assert_eq!(header.timescale, 1000);
        assert_eq!(header.duration, 2000);
        assert_eq!(header.duration_ms(), 2000);

        // Trailing bytes too short for a child header are a truncation.
        let mut bad = boxed(b"moov", &full_boxed(b"mvhd", 0, &mvhd));
        bad.splice(0..4, (8 + bad.len() as u32 - 8 + 4).to_be_bytes());
        bad.extend_from_slice(&[0u8; 4]);
        let err = discover(&mut Cursor::new(&bad)).unwrap_err();
        assert!(matches!(err, Error::Truncated { .. }));
    }

    #[test]
    fn mvhd_version1_reads_64bit_fields() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&5u64.to_be_bytes());
        payload.extend_from_slice(&6u64.to_be_bytes());
        payload.extend_from_slice(&600u32.to_be_bytes());
        payload.extend_from_slice(&1200u64.to_be_bytes());
        let data = full_boxed(b"mvhd", 1, &payload);

        let boxes = discover(&mut Cursor::new(&data)).unwrap();
        let Mp4Box::MovieHeader(mvhd) = &boxes[0] else { panic!("expected mvhd") };
        assert_eq!(mvhd.timescale, 600);
        assert_eq!(mvhd.duration, 1200);
        assert_eq!(mvhd.duration_ms(), 2000);
    }

    #[test]
    fn stsz_constant_and_table() {
        let mut constant = Vec::new();
        constant.extend_from_slice(&100u32.to_be_bytes());
        constant.extend_from_slice(&3u32.to_be_bytes());
        let data = full_boxed(b"stsz", 0, &constant);
        let boxes = discover(&mut Cursor::new(&data)).unwrap();
        let Mp4Box::SampleSize(stsz) = &boxes[0] else { panic!("expected stsz") };
        assert_eq!(stsz.sample_size(0).unwrap(), 100);
        assert_eq!(stsz.sample_size(2).unwrap(), 100);
        assert!(matches!(
            stsz.sample_size(3),
            Err(Error::IndexOutOfRange { table: "stsz", index: 3, entries: 3 })
        ));

        let mut table = Vec::new();
        table.extend_from_slice(&0u32.to_be_bytes());
        table.extend_from_slice(&2u32.to_be_bytes());
        table.extend_from_slice(&10u32.to_be_bytes());
        table.extend_from_slice(&20u32.to_be_bytes());
        let data = full_boxed(b"stsz", 0, &table);
        let boxes = discover(&mut Cursor::new(&data)).unwrap();
        let Mp4Box::SampleSize(stsz) = &boxes[0] else { panic!("expected stsz") };
        assert_eq!(stsz.sample_size(1).unwrap(), 20);
    }

    #[test]
    fn stsz_declared_count_beyond_payload_is_truncated() {
        let mut table = Vec::new();
        table.extend_from_slice(&0u32.to_be_bytes());
        table.extend_from_slice(&100u32.to_be_bytes());
        table.extend_from_slice(&10u32.to_be_bytes());
        let data = full_boxed(b"stsz", 0, &table);
        let err = discover(&mut Cursor::new(&data)).unwrap_err();
        assert!(matches!(err, Error::Truncated { context: "stsz entries" }));
    }

    #[test]
    fn stss_sync_lookup() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&2u32.to_be_bytes());
        payload.extend_from_slice(&1u32.to_be_bytes());
        payload.extend_from_slice(&5u32.to_be_bytes());
        let data = full_boxed(b"stss", 0, &payload);
        let boxes = discover(&mut Cursor::new(&data)).unwrap();
        let Mp4Box::SyncSample(stss) = &boxes[0] else { panic!("expected stss") };
        assert!(stss.is_sync(0));
        assert!(!stss.is_sync(1));
        assert!(stss.is_sync(4));
    }

    #[test]
    fn ctts_version1_offsets_are_signed() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u32.to_be_bytes());
        payload.extend_from_slice(&1u32.to_be_bytes());
        payload.extend_from_slice(&(-40i32).to_be_bytes());
        let data = full_boxed(b"ctts", 1, &payload);
        let boxes = discover(&mut Cursor::new(&data)).unwrap();
        let Mp4Box::CompositionOffset(ctts) = &boxes[0] else { panic!("expected ctts") };
        assert_eq!(ctts.entries[0].offset, -40);
    }

    #[test]
    fn esds_descriptor_walk_extracts_asc() {
        // ES_Descriptor > DecoderConfigDescriptor > DecoderSpecificInfo.
        let asc = [0x12u8, 0x10];
        let mut dsi = vec![DECODER_SPECIFIC_INFO_TAG, asc.len() as u8];
        dsi.extend_from_slice(&asc);

        let mut dcd_body = vec![0x40, 0x15, 0, 0, 0];
        dcd_body.extend_from_slice(&0u32.to_be_bytes());
        dcd_body.extend_from_slice(&0u32.to_be_bytes());
        dcd_body.extend_from_slice(&dsi);
        let mut dcd = vec![DECODER_CONFIG_DESCR_TAG, dcd_body.len() as u8];
        dcd.extend_from_slice(&dcd_body);

        let mut esd_body = vec![0, 1, 0]; // ES_ID + flags
        esd_body.extend_from_slice(&dcd);
        let mut esd = vec![ES_DESCR_TAG];
        // Continuation-coded length exercises the multi-byte path.
        esd.push(0x80);
        esd.push(esd_body.len() as u8);
        esd.extend_from_slice(&esd_body);

        let data = full_boxed(b"esds", 0, &esd);
        let boxes = discover(&mut Cursor::new(&data)).unwrap();
        let Mp4Box::Esds(esds) = &boxes[0] else { panic!("expected esds") };
        assert_eq!(esds.asc, asc);
    }

    #[test]
    fn stsd_first_entry_wins() {
        // An unrecognized first entry means no usable codec, even when a
        // matching entry follows it.
        let mp4a = AudioSampleEntry {
            kind: FourCc::MP4A,
            data_reference_index: 1,
            channel_count: 2,
            sample_size: 16,
            sample_rate: 44100 << 16,
            children: Vec::new(),
        };
        let stsd = SampleDescriptionBox {
            entries: vec![
                Mp4Box::Free(FreeSpaceBox { kind: FourCc(*b"smp1"), size: 0 }),
                Mp4Box::Audio(mp4a.clone()),
            ],
        };
        let stbl = SampleTableBox { children: vec![Mp4Box::SampleDescription(stsd)] };
        let minf = MediaInfoBox { children: vec![Mp4Box::SampleTable(stbl)] };
        let mdia = MediaBox { children: vec![Mp4Box::MediaInfo(minf)] };
        let track = TrackBox { children: vec![Mp4Box::Media(mdia)] };
        assert!(matches!(track.audio_entry(), Err(Error::MissingBox { kind: "mp4a" })));
        assert!(matches!(track.visual_entry(), Err(Error::MissingBox { kind: "avc1" })));

        let first = SampleDescriptionBox { entries: vec![Mp4Box::Audio(mp4a)] };
        let stbl = SampleTableBox { children: vec![Mp4Box::SampleDescription(first)] };
        let minf = MediaInfoBox { children: vec![Mp4Box::SampleTable(stbl)] };
        let mdia = MediaBox { children: vec![Mp4Box::MediaInfo(minf)] };
        let track = TrackBox { children: vec![Mp4Box::Media(mdia)] };
        assert_eq!(track.audio_entry().unwrap().channel_count, 2);
    }

    #[test]
    fn stsd_parses_audio_entry_fields() {
        let asc = [0x12u8, 0x10];
        let mut dsi = vec![DECODER_SPECIFIC_INFO_TAG, asc.len() as u8];
        dsi.extend_from_slice(&asc);
        let mut dcd = vec![DECODER_CONFIG_DESCR_TAG, 13 + dsi.len() as u8];
        dcd.extend_from_slice(&[0x40, 0x15, 0, 0, 0]);
        dcd.extend_from_slice(&[0u8; 8]);
        dcd.extend_from_slice(&dsi);
        let mut esd = vec![ES_DESCR_TAG, 3 + dcd.len() as u8, 0, 1, 0];
        esd.extend_from_slice(&dcd);
        let esds = full_boxed(b"esds", 0, &esd);

        let mut entry = Vec::new();
        entry.extend_from_slice(&[0u8; 6]); // reserved
        entry.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
        entry.extend_from_slice(&[0u8; 8]); // version/revision/vendor
        entry.extend_from_slice(&2u16.to_be_bytes()); // channels
        entry.extend_from_slice(&16u16.to_be_bytes()); // sample size
        entry.extend_from_slice(&[0u8; 4]); // compression/packet size
        entry.extend_from_slice(&(44100u32 << 16).to_be_bytes());
        entry.extend_from_slice(&esds);
        let mp4a = boxed(b"mp4a", &entry);

        let mut stsd = Vec::new();
        stsd.extend_from_slice(&1u32.to_be_bytes());
        stsd.extend_from_slice(&mp4a);
        let data = full_boxed(b"stsd", 0, &stsd);

        let boxes = discover(&mut Cursor::new(&data)).unwrap();
        let Mp4Box::SampleDescription(desc) = &boxes[0] else { panic!("expected stsd") };
        let Mp4Box::Audio(audio) = &desc.entries[0] else { panic!("expected mp4a") };
        assert_eq!(audio.channel_count, 2);
        assert_eq!(audio.sample_size, 16);
        assert_eq!(audio.sample_rate_hz(), 44100);
        let Mp4Box::Esds(esds) = &audio.children[0] else { panic!("expected esds") };
        assert_eq!(esds.asc, asc);
    }
}
