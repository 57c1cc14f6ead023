#![cfg_attr(docsrs, feature(doc_cfg))]

//! This crate contains the mp4 side of `alacd`. A small callback based box parser
//! is used to demux fragmented ALAC files into samples, and a seekable box writer
//! is used to rebuild those samples into a standalone `.m4a` file.
//!
//! # Optional Features
//!
//! The following are a list of [Cargo features](https://doc.rust-lang.org/stable/cargo/reference/features.html#the-features-section) that can be
//! enabled or disabled:
//!
//! - **serde**: Derives `Serialize` for [`CodecParams`].
//! - **fixture**: Exposes a builder for synthetic fragmented files, used by tests.

pub mod boxes;
pub mod demux;
pub mod mux;

#[cfg(feature = "fixture")]
#[cfg_attr(docsrs, doc(cfg(feature = "fixture")))]
#[doc(hidden)]
pub mod fixture;

mod error;
mod movie;
mod parser;
mod reader;
mod writer;

pub use boxes::CodecParams;
pub use demux::{Sample, Track};
pub use error::Error;
pub use movie::{DurationHeader, Movie, SourceBox};
pub use mux::{MetaValue, Muxer, SampleTable, Tags};
pub use parser::*;
pub use reader::Reader;
pub use writer::{BoxInfo, BoxWriter};

/// A `Result` alias where the `Err` case is `alacd_mp4::Error`.
pub type Result<T> = std::result::Result<T, Error>;
