pub mod disk;
pub mod fs;
pub mod utils;

pub use disk::{BlockDevice, FileDisk, MemDisk};
pub use fs::{
    error::{FileSystemError, Result},
    mkfs::FormatOptions,
    FileAttr, FileSystem,
};
