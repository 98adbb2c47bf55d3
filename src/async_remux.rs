#![cfg(feature = "async")]

use std::fs::File;
use std::io::{Read, Seek};
use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::sample::{demuxer_from_path, demuxer_from_reader, MediaSample, Mp4Demuxer};
use crate::Error;

/// Build the demuxer on a blocking thread and pump its samples over a
/// bounded channel. Demuxing needs `Seek`, so it cannot run on the async
/// executor directly.
///
/// Any error other than `EndOfStream` is fatal to the conversion, so the
/// pump forwards it once and stops instead of continuing past it.
fn spawn_sample_pump<R, F>(buffer: usize, open: F) -> ReceiverStream<Result<MediaSample, Error>>
where
    R: Read + Seek,
    F: FnOnce() -> Result<Mp4Demuxer<R>, Error> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer.max(1));

    tokio::task::spawn_blocking(move || {
        let mut demuxer = match open() {
            Ok(d) => d,
            Err(err) => {
                let _ = tx.blocking_send(Err(err));
                return;
            }
        };

        loop {
            let item = match demuxer.read_next_sample() {
                Err(Error::EndOfStream) => break,
                other => other,
            };
            let fatal = item.is_err();
            if tx.blocking_send(item).is_err() || fatal {
                break;
            }
        }
    });

    ReceiverStream::new(rx)
}

/// Create a Tokio `Stream` of demuxed samples from an MP4 file on disk.
///
/// `buffer` controls the channel capacity between the blocking demux thread
/// and the async consumer.
pub fn stream_from_path(
    path: impl Into<PathBuf>,
    buffer: usize,
) -> ReceiverStream<Result<MediaSample, Error>> {
    let path = path.into();
    spawn_sample_pump::<File, _>(buffer, move || demuxer_from_path(path))
}

/// Create a Tokio `Stream` of demuxed samples from any seekable reader.
///
/// The reader must be `Send + 'static` because it crosses onto the blocking
/// demux thread.
pub fn stream_from_reader<R>(reader: R, buffer: usize) -> ReceiverStream<Result<MediaSample, Error>>
where
    R: Read + Seek + Send + 'static,
{
    spawn_sample_pump(buffer, move || demuxer_from_reader(reader))
}
