use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

use tracing::debug;

use crate::flv::FlvMuxer;
use crate::sample::{demuxer_from_reader, Mp4Demuxer};
use crate::Error;

/// Remux an MP4 stream into FLV: header, metadata, sequence headers, then
/// every media sample as a tag. `EndOfStream` is consumed here as the normal
/// termination; every other error is fatal and propagated.
pub fn remux<R: Read + Seek, W: Write>(reader: R, writer: W) -> Result<(), Error> {
    let mut demuxer = demuxer_from_reader(reader)?;
    let mut muxer = FlvMuxer::new(writer, demuxer.info().clone());
    mux_all(&mut demuxer, &mut muxer)
}

/// Open `input`, demux it, and only then create `output`, so nothing is
/// created on disk when the input is rejected. Both handles are scoped to
/// this call and released on every exit path; the output is flushed before
/// close.
pub fn remux_paths(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<(), Error> {
    let reader = File::open(input)?;
    let mut demuxer = demuxer_from_reader(reader)?;
    let writer = BufWriter::new(File::create(output)?);
    let mut muxer = FlvMuxer::new(writer, demuxer.info().clone());
    mux_all(&mut demuxer, &mut muxer)
}

fn mux_all<R: Read + Seek, W: Write>(
    demuxer: &mut Mp4Demuxer<R>,
    muxer: &mut FlvMuxer<W>,
) -> Result<(), Error> {
    muxer.write_header()?;
    muxer.write_metadata()?;

    let mut tags = 0u64;
    loop {
        match demuxer.read_next_sample() {
            Ok(sample) => {
                muxer.write_sample(&sample)?;
                tags += 1;
            }
            Err(Error::EndOfStream) => break,
            Err(e) => return Err(e),
        }
    }

    muxer.flush()?;
    debug!(tags, "remux complete");
    Ok(())
}
