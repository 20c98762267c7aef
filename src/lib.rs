//! Reelforge - narrated short-video assembly
//!
//! Turns a narration timing stream and a set of images into a vertical video:
//! sentence and karaoke subtitles are rendered from speech marks, images are staged
//! concurrently, animated as zoom-pan clips, joined, muxed with the narration and
//! finally burned with the karaoke subtitles by ffmpeg.

pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod job;
pub mod media;
pub mod sources;
pub mod stager;
pub mod subtitle;
pub mod timeline;
pub mod workflow;
