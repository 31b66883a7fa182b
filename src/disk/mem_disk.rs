use std::{
    io::{Error, ErrorKind, Result},
    sync::{Mutex, MutexGuard},
};

use crate::disk::{
    block_device::BlockDevice,
    types::{Block, BlockId, BLOCK_SIZE},
};

/// 内存中的磁盘，所有块扁平存放在一个字节数组里
#[derive(Debug)]
pub struct MemDisk {
    blocks: Mutex<Vec<u8>>,
    total_blocks: u64,
}

impl MemDisk {
    pub fn new(total_blocks: u64) -> Self {
        Self {
            blocks: Mutex::new(vec![0u8; total_blocks as usize * BLOCK_SIZE]),
            total_blocks,
        }
    }

    // 返回块在扁平数组中的起始偏移，越界视为设备错误
    fn offset(&self, block_id: BlockId) -> Result<usize> {
        if block_id as u64 >= self.total_blocks {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!("block {} is beyond the end of the device", block_id),
            ));
        }
        Ok(block_id as usize * BLOCK_SIZE)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<u8>>> {
        self.blocks
            .lock()
            .map_err(|_| Error::new(ErrorKind::Other, "memory disk lock poisoned"))
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, block_id: BlockId, buf: &mut Block) -> Result<()> {
        let start = self.offset(block_id)?;
        buf.copy_from_slice(&self.lock()?[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: BlockId, buf: &Block) -> Result<()> {
        let start = self.offset(block_id)?;
        self.lock()?[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }

    fn block_count(&self) -> Result<u64> {
        Ok(self.total_blocks)
    }
}
