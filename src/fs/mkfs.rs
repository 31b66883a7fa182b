use log::info;

use crate::{
    disk::{Block, BlockDevice, BlockId, BLOCK_SIZE},
    fs::{
        config::{
            BITMAP_BITS_PER_BLOCK, DEFAULT_DIR_MODE, DEFAULT_DISK_SIZE, DEFAULT_INODE_FRACTION,
            INODES_PER_BLOCK, INODE_BITMAP_START_BLOCK_ID, MIN_DEVICE_BLOCKS, ROOT_INODE,
        },
        error::{FileSystemError, Result},
        free_list::FreeList,
        inode_table::{Inode, InodeMode, InodeTable},
        super_block::SuperBlock,
    },
};

/// 格式化参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatOptions {
    pub inode_fraction: f64, // inode 表占全部块的比例
    pub total_bytes: u64,    // 设备总字节数
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            inode_fraction: DEFAULT_INODE_FRACTION,
            total_bytes: DEFAULT_DISK_SIZE,
        }
    }
}

/// 由格式化参数推导出的磁盘布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub block_count: u64,
    pub bitmap_blocks: u64,
    pub inode_blocks: u64,
    pub inode_count: u64,
    pub data_blocks: u64,
}

impl Geometry {
    pub fn compute(options: &FormatOptions) -> Result<Self> {
        let block_count = options.total_bytes / BLOCK_SIZE as u64;
        if block_count < MIN_DEVICE_BLOCKS {
            return Err(FileSystemError::InvalidGeometry(format!(
                "{} bytes give {} blocks, need at least {}",
                options.total_bytes, block_count, MIN_DEVICE_BLOCKS
            )));
        }
        if block_count > BlockId::MAX as u64 {
            return Err(FileSystemError::InvalidGeometry(format!(
                "{} blocks exceed the block id range",
                block_count
            )));
        }
        if !(options.inode_fraction > 0.0 && options.inode_fraction < 1.0) {
            return Err(FileSystemError::InvalidGeometry(format!(
                "inode fraction {} must be between 0 and 1",
                options.inode_fraction
            )));
        }

        let inode_blocks = (options.inode_fraction * block_count as f64) as u64;
        if inode_blocks == 0 {
            return Err(FileSystemError::InvalidGeometry(
                "not enough blocks available for inodes".to_string(),
            ));
        }
        let inode_count = inode_blocks * INODES_PER_BLOCK;
        let bitmap_blocks = inode_count.div_ceil(BITMAP_BITS_PER_BLOCK);

        let data_start = INODE_BITMAP_START_BLOCK_ID as u64 + bitmap_blocks + inode_blocks;
        if data_start >= block_count {
            return Err(FileSystemError::InvalidGeometry(format!(
                "metadata needs {} blocks, leaving no room for data in {}",
                data_start, block_count
            )));
        }

        Ok(Self {
            block_count,
            bitmap_blocks,
            inode_blocks,
            inode_count,
            data_blocks: block_count - data_start,
        })
    }

    pub fn super_block(&self) -> SuperBlock {
        let bitmap_start = INODE_BITMAP_START_BLOCK_ID;
        let ilist_start = bitmap_start + self.bitmap_blocks as BlockId;
        SuperBlock {
            bitmap_start,
            ilist_start,
            ilist_length: self.inode_count,
            freelist_head: ilist_start + self.inode_blocks as BlockId,
        }
    }
}

/// 在设备上建立一个空文件系统：清零位图和 inode 表，建立并校验空闲链表，
/// 写超级块，最后创建根目录。
pub fn format(disk: &dyn BlockDevice, options: &FormatOptions) -> Result<SuperBlock> {
    let geometry = Geometry::compute(options)?;
    // 空闲链表一直覆盖到设备末尾，挂载时据此推算其长度
    let device_blocks = disk.block_count()?;
    if device_blocks != geometry.block_count {
        return Err(FileSystemError::InvalidGeometry(format!(
            "options describe {} blocks but the device has {}",
            geometry.block_count, device_blocks
        )));
    }
    let sb = geometry.super_block();
    info!(
        "formatting {} blocks: {} bitmap, {} inode ({} inodes), {} data",
        geometry.block_count,
        geometry.bitmap_blocks,
        geometry.inode_blocks,
        geometry.inode_count,
        geometry.data_blocks
    );

    let zero: Block = [0; BLOCK_SIZE];
    for block_id in sb.bitmap_start..sb.freelist_head {
        disk.write_block(block_id, &zero)?;
    }

    let free_list = FreeList::new(sb.freelist_head);
    let data_blocks = geometry.data_blocks as u32;
    free_list.initialize(disk, data_blocks)?;
    free_list.verify(disk, data_blocks)?;

    sb.store(disk)?;

    let mut table = InodeTable::load(disk, &sb)?;
    let root = table.allocate_inode(disk)?;
    if root != ROOT_INODE {
        return Err(FileSystemError::Corrupted(format!(
            "root directory landed on inode {}",
            root
        )));
    }
    table.write_inode(
        disk,
        root,
        &Inode::new(InodeMode::directory(DEFAULT_DIR_MODE), 0, 0),
    )?;

    info!("file system ready, free list head at block {}", sb.freelist_head);
    Ok(sb)
}
