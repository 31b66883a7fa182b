use std::io;

use thiserror::Error;

use crate::disk::BlockId;

/// 文件系统错误类型
#[derive(Debug, Error)]
pub enum FileSystemError {
    #[error("Disk I/O error: {0}")]
    Io(#[from] io::Error), // 底层 I/O 错误
    #[error("Record encoding error: {0}")]
    Codec(#[from] bincode::Error), // 定长记录编解码失败
    #[error("Disk space is full")]
    DiskFull, // 空闲链表已耗尽
    #[error("No free inode available")]
    InodeFull, // inode 已满
    #[error("Disk space is full: wrote {written} of {requested} bytes")]
    PartialWrite { written: usize, requested: usize }, // 写了一部分，size 反映实际写入
    #[error("Inode {0} is out of range")]
    InodeOutOfRange(u64), // inode 号越界，未触碰磁盘
    #[error("Invalid block address: {0}")]
    InvalidBlock(BlockId), // 非法块号（0 或链表头）
    #[error("Size {0} exceeds the direct block range; indirect blocks are not supported")]
    Unsupported(u64), // 需要间接块
    #[error("File or directory not found: {0}")]
    NotFound(String),
    #[error("File or directory already exists: {0}")]
    AlreadyExists(String),
    #[error("Expected a directory, found a file: {0}")]
    NotADirectory(String),
    #[error("Expected a file, found a directory: {0}")]
    IsADirectory(String),
    #[error("Directory is not empty: {0}")]
    DirectoryNotEmpty(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("File name too long: {0}")]
    NameTooLong(String),
    #[error("Invalid file system geometry: {0}")]
    InvalidGeometry(String), // 格式化参数不合法
    #[error("File system corrupted: {0}")]
    Corrupted(String), // 文件系统损坏
}

impl FileSystemError {
    /// 分配失败（inode 或块耗尽），调用方释放空间后可重试
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            Self::DiskFull | Self::InodeFull | Self::PartialWrite { .. }
        )
    }
}

// 适配层边界：映射到标准的 io::ErrorKind
impl From<FileSystemError> for io::Error {
    fn from(e: FileSystemError) -> Self {
        let kind = match &e {
            FileSystemError::Io(inner) => inner.kind(),
            FileSystemError::DiskFull
            | FileSystemError::InodeFull
            | FileSystemError::PartialWrite { .. } => io::ErrorKind::StorageFull,
            FileSystemError::InodeOutOfRange(_)
            | FileSystemError::InvalidBlock(_)
            | FileSystemError::InvalidPath(_)
            | FileSystemError::NameTooLong(_)
            | FileSystemError::InvalidGeometry(_) => io::ErrorKind::InvalidInput,
            FileSystemError::Unsupported(_) => io::ErrorKind::FileTooLarge,
            FileSystemError::NotFound(_) => io::ErrorKind::NotFound,
            FileSystemError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            FileSystemError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            FileSystemError::IsADirectory(_) => io::ErrorKind::IsADirectory,
            FileSystemError::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            FileSystemError::Codec(_) | FileSystemError::Corrupted(_) => {
                io::ErrorKind::InvalidData
            }
        };
        io::Error::new(kind, e)
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
