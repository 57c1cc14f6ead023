//! Download encrypted, fragmented ALAC streams and rebuild each track as a
//! standalone, tagged `.m4a` file.
//!
//! A track goes through [`resolver`] (master playlist to container url and keys),
//! [`fetch`] (parallel range requests), [`alacd_mp4::demux`], [`oracle`]
//! (sample decryption through an external process) and finally
//! [`alacd_mp4::Muxer`]. [`rip`] drives that sequence for each track of an album.

pub mod catalog;
mod commands;
mod error;
pub mod fetch;
pub mod logger;
pub mod oracle;
pub mod resolver;
pub mod rip;
pub mod session;
pub mod utils;

#[doc(hidden)]
pub use commands::{Args, Commands};
pub use error::{Error, Result};
pub use reqwest;
pub use session::{Session, SessionBuilder};
