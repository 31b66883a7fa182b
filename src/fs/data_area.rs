use log::{debug, warn};

use crate::{
    disk::{Block, BlockDevice, BLOCK_SIZE},
    fs::{
        config::MAX_FILE_SIZE,
        error::{FileSystemError, Result},
        free_list::FreeList,
        inode_table::{Inode, InodeTable},
    },
};

/// 数据区：把 inode 的字节流映射到直接块上，块从空闲链表按需分配
#[derive(Debug, Clone, Copy)]
pub struct DataArea {
    free_list: FreeList,
}

impl DataArea {
    pub fn new(free_list: FreeList) -> Self {
        Self { free_list }
    }

    pub fn free_list(&self) -> &FreeList {
        &self.free_list
    }

    /// 读出 inode 的全部内容
    pub fn read_fully(&self, disk: &dyn BlockDevice, inode: &Inode) -> Result<Vec<u8>> {
        if inode.size > MAX_FILE_SIZE {
            return Err(FileSystemError::Unsupported(inode.size));
        }

        let size = inode.size as usize;
        let mut bytes = Vec::with_capacity(size);
        let mut block_buf: Block = [0; BLOCK_SIZE];
        for &block_id in inode.direct_blocks.iter() {
            if bytes.len() == size {
                break;
            }
            if block_id == 0 {
                return Err(FileSystemError::Corrupted(format!(
                    "hole at offset {} of a {} byte file",
                    bytes.len(),
                    size
                )));
            }
            disk.read_block(block_id, &mut block_buf)?;
            let chunk = std::cmp::min(BLOCK_SIZE, size - bytes.len());
            bytes.extend_from_slice(&block_buf[..chunk]);
        }
        Ok(bytes)
    }

    /// 用 `bytes` 覆盖 inode 的内容，返回实际写入的字节数。
    ///
    /// 已有的直接块被复用，空槽从空闲链表分配。链表耗尽时提前停止，
    /// 以已写入的长度持久化 inode 并返回较短的计数；调用方需要与请求长度比较。
    /// 超出直接块范围的请求不产生任何写入。
    pub fn write_fully(
        &self,
        disk: &dyn BlockDevice,
        table: &InodeTable,
        number: u64,
        inode: &mut Inode,
        bytes: &[u8],
    ) -> Result<usize> {
        if bytes.len() as u64 > MAX_FILE_SIZE {
            return Err(FileSystemError::Unsupported(bytes.len() as u64));
        }

        let mut written = 0;
        for slot in inode.direct_blocks.iter_mut() {
            if written == bytes.len() {
                break;
            }
            let block_id = if *slot != 0 {
                *slot
            } else {
                match self.free_list.allocate(disk)? {
                    Some(block_id) => {
                        *slot = block_id;
                        block_id
                    }
                    None => {
                        warn!(
                            "inode {}: disk full after {} of {} bytes",
                            number,
                            written,
                            bytes.len()
                        );
                        break;
                    }
                }
            };

            let chunk = std::cmp::min(BLOCK_SIZE, bytes.len() - written);
            let mut block_buf: Block = [0; BLOCK_SIZE];
            block_buf[..chunk].copy_from_slice(&bytes[written..written + chunk]);
            disk.write_block(block_id, &block_buf)?;
            written += chunk;
        }

        inode.size = written as u64;
        inode.touch_modified();
        table.write_inode(disk, number, inode)?;
        debug!("inode {}: wrote {} bytes", number, written);
        Ok(written)
    }

    /// 把 inode 的全部直接块还给空闲链表，清空块索引并把 size 置 0。
    /// 不写回 inode，由调用方决定是否持久化。
    pub fn release_blocks(&self, disk: &dyn BlockDevice, inode: &mut Inode) -> Result<usize> {
        let mut released = 0;
        for slot in inode.direct_blocks.iter_mut().filter(|slot| **slot != 0) {
            self.free_list.free(disk, *slot)?;
            *slot = 0;
            released += 1;
        }
        inode.size = 0;
        Ok(released)
    }
}
