use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    disk::{Block, BlockDevice, BlockId, BLOCK_SIZE},
    fs::{
        config::{BITMAP_BITS_PER_BLOCK, INODES_PER_BLOCK, SUPER_BLOCK_BLOCK_ID},
        error::{FileSystemError, Result},
    },
};

/// 0 号块上的超级块，定长小端序，没有版本号：
/// 任何布局改动都是不兼容的格式变更。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    pub bitmap_start: BlockId,  // inode 位图起始块
    pub ilist_start: BlockId,   // inode 表起始块
    pub ilist_length: u64,      // inode 总数
    pub freelist_head: BlockId, // 空闲链表头块
}

impl SuperBlock {
    /// inode 位图占用的块数
    pub fn bitmap_blocks(&self) -> u32 {
        self.ilist_start - self.bitmap_start
    }

    /// inode 表占用的块数 = ceil(ilist_length / INODES_PER_BLOCK)
    pub fn ilist_blocks(&self) -> u64 {
        self.ilist_length.div_ceil(INODES_PER_BLOCK)
    }

    /// 检查各区域是否按 bitmap < ilist < freelist 连续且不重叠
    pub fn validate(&self) -> Result<()> {
        if self.bitmap_start <= SUPER_BLOCK_BLOCK_ID {
            return Err(FileSystemError::Corrupted(format!(
                "inode bitmap starts at block {}",
                self.bitmap_start
            )));
        }
        if !(self.bitmap_start < self.ilist_start && self.ilist_start < self.freelist_head) {
            return Err(FileSystemError::Corrupted(format!(
                "regions out of order: bitmap {}, ilist {}, freelist {}",
                self.bitmap_start, self.ilist_start, self.freelist_head
            )));
        }
        if self.ilist_length == 0 {
            return Err(FileSystemError::Corrupted("empty inode table".to_string()));
        }
        if self.ilist_start as u64 + self.ilist_blocks() > self.freelist_head as u64 {
            return Err(FileSystemError::Corrupted(format!(
                "{} inodes do not fit between blocks {} and {}",
                self.ilist_length, self.ilist_start, self.freelist_head
            )));
        }
        if (self.bitmap_blocks() as u64) * BITMAP_BITS_PER_BLOCK < self.ilist_length {
            return Err(FileSystemError::Corrupted(format!(
                "{} bitmap blocks cannot track {} inodes",
                self.bitmap_blocks(),
                self.ilist_length
            )));
        }
        Ok(())
    }

    pub fn load(disk: &dyn BlockDevice) -> Result<Self> {
        let mut block: Block = [0; BLOCK_SIZE];
        disk.read_block(SUPER_BLOCK_BLOCK_ID, &mut block)?;
        let sb: SuperBlock = bincode::deserialize(&block)?;
        debug!("loaded super block: {:?}", sb);
        Ok(sb)
    }

    pub fn store(&self, disk: &dyn BlockDevice) -> Result<()> {
        // 块的其余部分补 0
        let mut block: Block = [0; BLOCK_SIZE];
        bincode::serialize_into(&mut block[..], self)?;
        disk.write_block(SUPER_BLOCK_BLOCK_ID, &block)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemDisk;

    fn sample() -> SuperBlock {
        SuperBlock {
            bitmap_start: 1,
            ilist_start: 2,
            ilist_length: 512,
            freelist_head: 18,
        }
    }

    #[test]
    fn layout_is_fixed_width_little_endian() {
        let disk = MemDisk::new(1);
        sample().store(&disk).expect("store");

        let mut block: Block = [0; BLOCK_SIZE];
        disk.read_block(0, &mut block).expect("read");
        assert_eq!(&block[0..4], &1u32.to_le_bytes());
        assert_eq!(&block[4..8], &2u32.to_le_bytes());
        assert_eq!(&block[8..16], &512u64.to_le_bytes());
        assert_eq!(&block[16..20], &18u32.to_le_bytes());
        assert!(block[20..].iter().all(|&b| b == 0));

        assert_eq!(SuperBlock::load(&disk).expect("load"), sample());
    }

    #[test]
    fn validate_accepts_formatted_layout() {
        assert!(sample().validate().is_ok());
        assert_eq!(sample().bitmap_blocks(), 1);
        assert_eq!(sample().ilist_blocks(), 16);
    }

    #[test]
    fn validate_rejects_zeroed_block() {
        let disk = MemDisk::new(1);
        let sb = SuperBlock::load(&disk).expect("load");
        assert!(matches!(sb.validate(), Err(FileSystemError::Corrupted(_))));
    }

    #[test]
    fn validate_rejects_overlapping_inode_table() {
        let sb = SuperBlock {
            freelist_head: 10,
            ..sample()
        };
        assert!(matches!(sb.validate(), Err(FileSystemError::Corrupted(_))));
    }
}
