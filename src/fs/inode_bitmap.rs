use log::debug;

use crate::{
    disk::{Block, BlockDevice, BlockId, BLOCK_SIZE},
    fs::{
        config::{BITMAP_WORDS_PER_BLOCK, BITMAP_WORD_BITS},
        error::Result,
    },
};

const WORD_SIZE: usize = std::mem::size_of::<u32>();

/// inode 位图在内存中的镜像，按 u32 字存放；每次修改立即写回所在的块
#[derive(Debug)]
pub struct InodeBitmap {
    words: Vec<u32>,       // 位图数据，每个 bit 表示一个 inode 的状态
    total_inodes: u64,     // inode 总数
    free_inodes: u64,      // 当前空闲 inode 数
    start_block: BlockId,  // 位图在磁盘中的起始块号
}

impl InodeBitmap {
    /// # 示例说明
    ///
    /// 假设 total_inodes = 40，位图占 1 块，块内前 8 字节为：
    ///
    ///   Word0 = 0x0000_0007  // inode 0~31，0、1、2 已占用
    ///   Word1 = 0x0000_0001  // inode 32~63，32 已占用
    ///
    /// 读入整块得到 1024 个字，已用 inode = 3 + 1 = 4，
    /// free_inodes = 40 - 4 = 36。超出 total_inodes 的位不参与分配。
    pub fn load(
        disk: &dyn BlockDevice,
        start_block: BlockId,
        size_in_blocks: u32,
        total_inodes: u64,
    ) -> Result<Self> {
        let mut words = Vec::with_capacity(size_in_blocks as usize * BITMAP_WORDS_PER_BLOCK);
        let mut block_buf: Block = [0; BLOCK_SIZE];

        for i in 0..size_in_blocks {
            disk.read_block(start_block + i, &mut block_buf)?;
            words.extend(block_buf.chunks_exact(WORD_SIZE).map(|chunk| {
                let mut raw = [0u8; WORD_SIZE];
                raw.copy_from_slice(chunk);
                u32::from_le_bytes(raw)
            }));
        }

        let mut bitmap = Self {
            words,
            total_inodes,
            free_inodes: 0,
            start_block,
        };
        let used = (0..total_inodes).filter(|&i| bitmap.is_used(i)).count() as u64;
        bitmap.free_inodes = total_inodes - used;
        debug!(
            "loaded inode bitmap: {} blocks, {} of {} inodes free",
            size_in_blocks, bitmap.free_inodes, total_inodes
        );
        Ok(bitmap)
    }

    pub fn total_inodes(&self) -> u64 {
        self.total_inodes
    }

    pub fn free_inodes(&self) -> u64 {
        self.free_inodes
    }

    // inode 号 -> (字下标, 字内位)
    fn locate(inode_index: u64) -> (usize, u32) {
        (
            (inode_index / BITMAP_WORD_BITS) as usize,
            (inode_index % BITMAP_WORD_BITS) as u32,
        )
    }

    /// 按字顺序找到第一个为 0 的位并置 1，返回 inode 编号
    pub fn alloc(&mut self) -> Option<u64> {
        for (word_index, word) in self.words.iter_mut().enumerate() {
            if *word == u32::MAX {
                continue;
            }
            let bit = (!*word).trailing_zeros();
            let index = word_index as u64 * BITMAP_WORD_BITS + bit as u64;
            if index >= self.total_inodes {
                return None;
            }
            *word |= 1 << bit;
            self.free_inodes -= 1;
            return Some(index);
        }
        None // 没有空闲 inode
    }

    /// 清除一个 inode 的占用位，原本就空闲时返回 false
    pub fn free(&mut self, inode_index: u64) -> bool {
        if inode_index >= self.total_inodes {
            return false; // 防止越界
        }

        let (word_index, bit) = Self::locate(inode_index);
        if self.words[word_index] & (1 << bit) == 0 {
            return false; // 防止空释放
        }
        self.words[word_index] &= !(1 << bit);
        self.free_inodes += 1;
        true
    }

    // 检查 inode 是否被占用
    pub fn is_used(&self, inode_index: u64) -> bool {
        if inode_index >= self.total_inodes {
            return false;
        }
        let (word_index, bit) = Self::locate(inode_index);
        self.words[word_index] & (1 << bit) != 0
    }

    /// 只把包含该 inode 位的那一块写回磁盘
    pub fn sync_bit(&self, disk: &dyn BlockDevice, inode_index: u64) -> Result<()> {
        let (word_index, _) = Self::locate(inode_index);
        let block_offset = word_index / BITMAP_WORDS_PER_BLOCK;
        let start = block_offset * BITMAP_WORDS_PER_BLOCK;

        let mut block_buf: Block = [0; BLOCK_SIZE];
        for (chunk, word) in block_buf
            .chunks_exact_mut(WORD_SIZE)
            .zip(&self.words[start..start + BITMAP_WORDS_PER_BLOCK])
        {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        disk.write_block(self.start_block + block_offset as BlockId, &block_buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemDisk;

    #[test]
    fn load_counts_used_bits() {
        let disk = MemDisk::new(2);
        let mut block: Block = [0; BLOCK_SIZE];
        block[0..4].copy_from_slice(&7u32.to_le_bytes());
        block[4..8].copy_from_slice(&1u32.to_le_bytes());
        disk.write_block(1, &block).expect("write");

        let bitmap = InodeBitmap::load(&disk, 1, 1, 40).expect("load");
        assert_eq!(bitmap.free_inodes(), 36);
        assert!(bitmap.is_used(2));
        assert!(!bitmap.is_used(3));
        assert!(bitmap.is_used(32));
    }

    #[test]
    fn alloc_takes_lowest_free_bit_and_stops_at_total() {
        let disk = MemDisk::new(2);
        let mut bitmap = InodeBitmap::load(&disk, 1, 1, 3).expect("load");
        assert_eq!(bitmap.alloc(), Some(0));
        assert_eq!(bitmap.alloc(), Some(1));
        assert!(bitmap.free(0));
        assert_eq!(bitmap.alloc(), Some(0));
        assert_eq!(bitmap.alloc(), Some(2));
        assert_eq!(bitmap.alloc(), None);
        assert_eq!(bitmap.free_inodes(), 0);
    }

    #[test]
    fn double_free_is_ignored() {
        let disk = MemDisk::new(2);
        let mut bitmap = InodeBitmap::load(&disk, 1, 1, 8).expect("load");
        bitmap.alloc();
        assert!(bitmap.free(0));
        assert!(!bitmap.free(0));
        assert!(!bitmap.free(100));
        assert_eq!(bitmap.free_inodes(), 8);
    }

    #[test]
    fn sync_bit_writes_only_the_containing_block() {
        let per_block = (BLOCK_SIZE * 8) as u64;
        let disk = MemDisk::new(3);
        let mut bitmap = InodeBitmap::load(&disk, 1, 2, per_block * 2).expect("load");

        // 把第一块填满，下一次分配落在第二块
        for _ in 0..per_block {
            bitmap.alloc();
        }
        let index = bitmap.alloc().expect("inode");
        assert_eq!(index, per_block);
        bitmap.sync_bit(&disk, index).expect("sync");

        let mut block: Block = [0; BLOCK_SIZE];
        disk.read_block(1, &mut block).expect("read");
        assert!(block.iter().all(|&b| b == 0));
        disk.read_block(2, &mut block).expect("read");
        assert_eq!(&block[0..4], &1u32.to_le_bytes());

        let reloaded = InodeBitmap::load(&disk, 1, 2, per_block * 2).expect("load");
        assert!(reloaded.is_used(per_block));
        assert!(!reloaded.is_used(0));
    }
}
