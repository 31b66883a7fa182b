use crate::disk::{BlockId, BLOCK_ID_SIZE, BLOCK_SIZE};

pub const SUPER_BLOCK_BLOCK_ID: BlockId = 0;
pub const INODE_BITMAP_START_BLOCK_ID: BlockId = 1;

// 每个 Inode 128 字节，一个 4KB 块可以存 32 个 Inode
pub const INODE_SIZE: usize = 128;
pub const INODES_PER_BLOCK: u64 = (BLOCK_SIZE / INODE_SIZE) as u64;

// 直接块指针数量，文件大小上限 = 16 * 4KB
pub const DIRECT_BLOCKS: usize = 16;
pub const MAX_FILE_SIZE: u64 = (DIRECT_BLOCKS * BLOCK_SIZE) as u64;

// 空闲链表节点：一个块能放下的块号个数（槽 0 为链接指针）
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / BLOCK_ID_SIZE;

// 位图以 u32 为字存放
pub const BITMAP_WORD_BITS: u64 = u32::BITS as u64;
pub const BITMAP_WORDS_PER_BLOCK: usize = BLOCK_SIZE / std::mem::size_of::<u32>();
pub const BITMAP_BITS_PER_BLOCK: u64 = (BLOCK_SIZE * 8) as u64;

/// 初始化后 check 应得到的差值：链表头块本身永远不会被任何槽引用，
/// 也永远不会被分配出去，它是整个空闲链表的锚点。
pub const FREE_LIST_ANCHOR_BLOCKS: i64 = 1;

// 根目录固定为 0 号 inode
pub const ROOT_INODE: u64 = 0;

// 目录项：24 字节名字 + 8 字节 inode 号
pub const NAME_LEN: usize = 24;
pub const DIR_ENTRY_SIZE: usize = 32;

// 超级块 + 位图 + inode 表 + 空闲链表头，至少 4 块
pub const MIN_DEVICE_BLOCKS: u64 = 4;

pub const DEFAULT_DISK_PATH: &str = "disk.img";
pub const DEFAULT_DISK_SIZE: u64 = 4 * 1024 * 1024;
pub const DEFAULT_INODE_FRACTION: f64 = 0.1;

pub const DEFAULT_DIR_MODE: u32 = 0o755;
pub const DEFAULT_FILE_MODE: u32 = 0o644;
