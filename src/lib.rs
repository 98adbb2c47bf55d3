//! `mp4flv` remuxes stored MP4 (ISO-BMFF) files into FLV without re-encoding.
//!
//! This crate provides:
//! - An MP4 demuxer that parses the box tree, extracts the H.264 and AAC
//!   codec configuration, and materializes a file-ordered sample table.
//! - An FLV muxer that writes the header, `onMetaData`, the codec sequence
//!   headers, and one tag per sample with correct composition times.
//! - A Tokio-based async `Stream` wrapper (enabled by default) over the
//!   demuxer for integration with async apps.
//!
//! ## Quick start (sync)
//! - Convert a file with [`remux_paths`], or drive the pieces yourself:
//!   build a demuxer with [`demuxer_from_path`] and feed its samples to an
//!   [`FlvMuxer`].
//!
//! ## Quick start (async)
//! - Use [`stream_from_path`] to get a Tokio `Stream` of demuxed samples.
//!
//! ## Features
//! - `async` (default): enables the Tokio stream helpers.

pub mod error;

mod amf0;
mod flv;
mod sample;

pub mod mp4;
pub mod remux;

#[cfg(feature = "async")]
pub mod async_remux;

pub use error::Error;
pub use flv::{AudioCodec, FlvMuxer, SoundBits, SoundChannels, SoundRate, TagType, VideoCodec};
pub use remux::{remux, remux_paths};
pub use sample::{
    demuxer_from_path, demuxer_from_reader, AudioInfo, MediaSample, MovieInfo, Mp4Demuxer,
    SampleKind, VideoInfo,
};

#[cfg(feature = "async")]
pub use async_remux::{stream_from_path, stream_from_reader};
