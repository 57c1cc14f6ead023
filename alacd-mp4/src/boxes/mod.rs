//! Fragment and codec boxes with parsers.

/*
    REFERENCES
    ----------

    1. https://github.com/shaka-project/shaka-player/blob/d465942c4393e6c891d6a230bea90a44d90cc70b/lib/util/mp4_box_parsers.js
    2. https://github.com/macosforge/alac/blob/master/ALACMagicCookieDescription.txt

*/

mod alac;
mod tfhd;
mod trex;
mod trun;

pub use alac::CodecParams;
pub use tfhd::TfhdBox;
pub use trex::TrexBox;
pub use trun::{TrunBox, TrunSample};
