use std::{
    fs::{File, OpenOptions},
    io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write},
    path::Path,
    sync::{Mutex, MutexGuard},
};

use crate::disk::{
    block_device::BlockDevice,
    types::{Block, BlockId, BLOCK_SIZE},
};

/// 以普通文件模拟的磁盘镜像
#[derive(Debug)]
pub struct FileDisk {
    file: Mutex<File>,
}

impl FileDisk {
    /// 打开（必要时创建）镜像文件，并保证其长度至少为 `size` 字节
    pub fn new(path: impl AsRef<Path>, size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.metadata()?.len() < size {
            file.set_len(size)?;
        }

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// 打开已存在的镜像文件，不改变其长度
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| Error::new(ErrorKind::Other, "disk handle lock poisoned"))
    }
}

impl BlockDevice for FileDisk {
    fn read_block(&self, block_id: BlockId, buf: &mut Block) -> Result<()> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: BlockId, buf: &Block) -> Result<()> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn block_count(&self) -> Result<u64> {
        Ok(self.lock()?.metadata()?.len() / BLOCK_SIZE as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_extends_image_to_requested_size() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("disk.img");
        let disk = FileDisk::new(&path, 8 * BLOCK_SIZE as u64).expect("create");
        assert_eq!(disk.block_count().expect("len"), 8);
    }

    #[test]
    fn blocks_persist_across_handles() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("disk.img");
        {
            let disk = FileDisk::new(&path, 4 * BLOCK_SIZE as u64).expect("create");
            let mut block: Block = [0; BLOCK_SIZE];
            block[0] = 0xAB;
            block[BLOCK_SIZE - 1] = 0xCD;
            disk.write_block(3, &block).expect("write");
        }

        let disk = FileDisk::open(&path).expect("reopen");
        let mut block: Block = [0; BLOCK_SIZE];
        disk.read_block(3, &mut block).expect("read");
        assert_eq!(block[0], 0xAB);
        assert_eq!(block[BLOCK_SIZE - 1], 0xCD);
    }

    #[test]
    fn reading_past_the_end_fails() {
        let dir = TempDir::new().expect("tempdir");
        let disk = FileDisk::new(dir.path().join("disk.img"), 2 * BLOCK_SIZE as u64).expect("create");
        let mut block: Block = [0; BLOCK_SIZE];
        assert!(disk.read_block(2, &mut block).is_err());
    }
}
