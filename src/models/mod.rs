//! Data models for ranobe.

mod book;
mod chapter;
mod image;

pub use book::{MainPageInfo, SaverContext, DEFAULT_AUTHOR, DEFAULT_LANGUAGE};
pub use chapter::{Chapter, LoadedChapter};
pub use image::{Image, LoadedImage};
