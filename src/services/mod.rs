//! Service layer: asset transport, codecs and local I/O

pub mod assets;
pub mod format;
pub mod io;
pub mod test_utils;

pub use assets::{AssetFetcher, AssetFormat, AssetStore, CloudinaryStore, FetchFailure, HttpFetcher};
pub use format::ImageCodec;
pub use io::{ImageIOService, LocalOrHttpFetcher};
