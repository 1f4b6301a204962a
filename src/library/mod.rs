mod service;

pub use service::{LibraryError, VideoLibrary};
