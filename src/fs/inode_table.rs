use bitflags::bitflags;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    disk::{Block, BlockDevice, BlockId, BLOCK_SIZE},
    fs::{
        config::{DIRECT_BLOCKS, INODES_PER_BLOCK, INODE_SIZE},
        error::{FileSystemError, Result},
        inode_bitmap::InodeBitmap,
        super_block::SuperBlock,
    },
    utils::current_timestamp,
};

bitflags! {
    /// 类 Unix 的 mode 字段：文件类型位 + 权限位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InodeMode: u32 {
        const DIRECTORY = 0o040000;
        const REGULAR = 0o100000;

        const OWNER_READ = 0o400;
        const OWNER_WRITE = 0o200;
        const OWNER_EXEC = 0o100;
        const GROUP_READ = 0o040;
        const GROUP_WRITE = 0o020;
        const GROUP_EXEC = 0o010;
        const OTHER_READ = 0o004;
        const OTHER_WRITE = 0o002;
        const OTHER_EXEC = 0o001;
    }
}

const TYPE_MASK: u32 = 0o170000;
const PERMISSION_MASK: u32 = 0o777;

impl InodeMode {
    pub fn directory(permissions: u32) -> Self {
        Self::DIRECTORY | Self::from_bits_truncate(permissions & PERMISSION_MASK)
    }

    pub fn regular(permissions: u32) -> Self {
        Self::REGULAR | Self::from_bits_truncate(permissions & PERMISSION_MASK)
    }

    pub fn permissions(self) -> u32 {
        self.bits() & PERMISSION_MASK
    }

    pub fn kind(self) -> FileKind {
        if self.bits() & TYPE_MASK == Self::DIRECTORY.bits() {
            FileKind::Directory
        } else {
            FileKind::File
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,      // 普通文件
    Directory, // 目录
}

/// 磁盘上的 inode 记录，定长 128 字节
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inode {
    pub uid: u32,        // 所属用户
    pub gid: u32,        // 所属组
    pub ctime: i64,      // 状态改变时间（Change Time）
    pub atime: i64,      // 最后访问时间（Access Time）
    pub mtime: i64,      // 最后修改时间（Modify Time）
    pub mode: u32,       // 文件类型 + 权限位
    pub size: u64,       // 文件大小（字节）
    pub link_count: u64, // 硬链接数，只记录不维护

    // 块索引区，0 表示尚未分配
    pub direct_blocks: [BlockId; DIRECT_BLOCKS], // 直接块指针
    pub indirect_block: BlockId,                 // 一级间接块（保留，未实现）
    pub double_indirect_block: BlockId,          // 二级间接块（保留，未实现）
    pub triple_indirect_block: BlockId,          // 三级间接块（保留，未实现）
}

impl Inode {
    pub fn new(mode: InodeMode, uid: u32, gid: u32) -> Self {
        let now = current_timestamp();
        Self {
            uid,
            gid,
            ctime: now,
            atime: now,
            mtime: now,
            mode: mode.bits(),
            link_count: 1,
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InodeMode {
        InodeMode::from_bits_retain(self.mode)
    }

    pub fn kind(&self) -> FileKind {
        self.mode().kind()
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == FileKind::Directory
    }

    // 内容被修改
    pub fn touch_modified(&mut self) {
        let now = current_timestamp();
        self.mtime = now;
        self.ctime = now;
    }

    pub fn block_count(&self) -> u64 {
        self.direct_blocks.iter().filter(|&&b| b != 0).count() as u64
    }
}

/// inode 表：持有位图镜像与 inode 区的几何信息
#[derive(Debug)]
pub struct InodeTable {
    bitmap: InodeBitmap,
    start_block: BlockId,
}

impl InodeTable {
    /// 根据超级块读入全部位图块
    pub fn load(disk: &dyn BlockDevice, super_block: &SuperBlock) -> Result<Self> {
        let bitmap = InodeBitmap::load(
            disk,
            super_block.bitmap_start,
            super_block.bitmap_blocks(),
            super_block.ilist_length,
        )?;
        debug!(
            "inode table at block {} with {} entries",
            super_block.ilist_start, super_block.ilist_length
        );
        Ok(Self {
            bitmap,
            start_block: super_block.ilist_start,
        })
    }

    pub fn total_inodes(&self) -> u64 {
        self.bitmap.total_inodes()
    }

    pub fn free_inodes(&self) -> u64 {
        self.bitmap.free_inodes()
    }

    pub fn is_allocated(&self, number: u64) -> bool {
        self.bitmap.is_used(number)
    }

    // inode 号 -> (所在块号, 块内槽位)
    fn locate(&self, number: u64) -> Result<(BlockId, usize)> {
        if number >= self.total_inodes() {
            return Err(FileSystemError::InodeOutOfRange(number));
        }
        let block = self.start_block + (number / INODES_PER_BLOCK) as BlockId;
        Ok((block, (number % INODES_PER_BLOCK) as usize))
    }

    pub fn allocate_inode(&mut self, disk: &dyn BlockDevice) -> Result<u64> {
        let Some(number) = self.bitmap.alloc() else {
            warn!("no free inode among {}", self.total_inodes());
            return Err(FileSystemError::InodeFull);
        };
        self.bitmap.sync_bit(disk, number)?;
        debug!("allocated inode {}", number);
        Ok(number)
    }

    /// 只清除位图，不回收 inode 引用的数据块
    pub fn release_inode(&mut self, disk: &dyn BlockDevice, number: u64) -> Result<()> {
        self.locate(number)?;
        if !self.bitmap.free(number) {
            warn!("inode {} released while not allocated", number);
            return Ok(());
        }
        self.bitmap.sync_bit(disk, number)?;
        debug!("released inode {}", number);
        Ok(())
    }

    /// 按值拷贝出 inode 记录
    pub fn get_inode(&self, disk: &dyn BlockDevice, number: u64) -> Result<Inode> {
        let (block_id, slot) = self.locate(number)?;
        let mut block: Block = [0; BLOCK_SIZE];
        disk.read_block(block_id, &mut block)?;
        let start = slot * INODE_SIZE;
        Ok(bincode::deserialize(&block[start..start + INODE_SIZE])?)
    }

    /// inode 不能单独寻址：读出整块、覆盖槽位、写回整块
    pub fn write_inode(&self, disk: &dyn BlockDevice, number: u64, inode: &Inode) -> Result<()> {
        let (block_id, slot) = self.locate(number)?;
        let mut block: Block = [0; BLOCK_SIZE];
        disk.read_block(block_id, &mut block)?;
        let start = slot * INODE_SIZE;
        bincode::serialize_into(&mut block[start..start + INODE_SIZE], inode)?;
        disk.write_block(block_id, &block)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemDisk;

    // 1 块位图 + 2 块 inode 表 = 64 个 inode
    fn setup() -> (MemDisk, InodeTable) {
        let disk = MemDisk::new(5);
        let sb = SuperBlock {
            bitmap_start: 1,
            ilist_start: 2,
            ilist_length: 2 * INODES_PER_BLOCK,
            freelist_head: 4,
        };
        let table = InodeTable::load(&disk, &sb).expect("load");
        (disk, table)
    }

    fn sample() -> Inode {
        let mut inode = Inode::new(InodeMode::regular(0o640), 1000, 100);
        inode.size = 5000;
        inode.direct_blocks[0] = 17;
        inode.direct_blocks[1] = 42;
        inode
    }

    #[test]
    fn record_is_exactly_inode_size() {
        let bytes = bincode::serialize(&sample()).expect("serialize");
        assert_eq!(bytes.len(), INODE_SIZE);
    }

    #[test]
    fn mode_reports_kind_and_permissions() {
        let dir = InodeMode::directory(0o755);
        assert_eq!(dir.kind(), FileKind::Directory);
        assert_eq!(dir.permissions(), 0o755);
        assert_eq!(InodeMode::regular(0o7644).permissions(), 0o644);
        assert_eq!(InodeMode::regular(0o644).kind(), FileKind::File);
    }

    #[test]
    fn allocate_sets_bit_and_persists_it() {
        let (disk, mut table) = setup();
        assert!(!table.is_allocated(0));
        assert_eq!(table.allocate_inode(&disk).expect("alloc"), 0);
        assert_eq!(table.allocate_inode(&disk).expect("alloc"), 1);
        assert!(table.is_allocated(0));
        assert_eq!(table.free_inodes(), 62);

        let sb = SuperBlock {
            bitmap_start: 1,
            ilist_start: 2,
            ilist_length: 2 * INODES_PER_BLOCK,
            freelist_head: 4,
        };
        let reloaded = InodeTable::load(&disk, &sb).expect("reload");
        assert!(reloaded.is_allocated(1));
        assert!(!reloaded.is_allocated(2));
    }

    #[test]
    fn allocate_reports_exhaustion() {
        let (disk, mut table) = setup();
        for _ in 0..table.total_inodes() {
            table.allocate_inode(&disk).expect("alloc");
        }
        assert!(matches!(
            table.allocate_inode(&disk),
            Err(FileSystemError::InodeFull)
        ));
    }

    #[test]
    fn release_frees_slot_for_reuse() {
        let (disk, mut table) = setup();
        for _ in 0..3 {
            table.allocate_inode(&disk).expect("alloc");
        }
        table.release_inode(&disk, 1).expect("release");
        assert!(!table.is_allocated(1));
        assert_eq!(table.allocate_inode(&disk).expect("alloc"), 1);
    }

    #[test]
    fn write_then_get_returns_equal_record() {
        let (disk, table) = setup();
        let inode = sample();
        table.write_inode(&disk, 33, &inode).expect("write");
        assert_eq!(table.get_inode(&disk, 33).expect("get"), inode);
        // 同一块中的其他槽位不受影响
        assert_eq!(table.get_inode(&disk, 32).expect("get"), Inode::empty());
        assert_eq!(table.get_inode(&disk, 34).expect("get"), Inode::empty());
    }

    #[test]
    fn out_of_range_is_rejected_without_touching_disk() {
        let (disk, mut table) = setup();
        let limit = table.total_inodes();
        assert!(matches!(
            table.get_inode(&disk, limit),
            Err(FileSystemError::InodeOutOfRange(n)) if n == limit
        ));
        assert!(matches!(
            table.write_inode(&disk, limit, &sample()),
            Err(FileSystemError::InodeOutOfRange(_))
        ));
        assert!(matches!(
            table.release_inode(&disk, limit),
            Err(FileSystemError::InodeOutOfRange(_))
        ));

        let mut block: Block = [0; BLOCK_SIZE];
        for id in 0..5 {
            disk.read_block(id, &mut block).expect("read");
            assert!(block.iter().all(|&b| b == 0), "block {} changed", id);
        }
    }
}
