/// 每个逻辑块（Block）的大小：4KB
/// 文件系统以“块”为最小读写单位。
pub const BLOCK_SIZE: usize = 4096;

/// 块号类型，磁盘上以 4 字节小端序存储
pub type BlockId = u32;

/// 一个块号在磁盘上占用的字节数
pub const BLOCK_ID_SIZE: usize = std::mem::size_of::<BlockId>();

/// 定义一个逻辑块类型（每块 4KB 的字节数组）
/// 所有磁盘读写都以 Block 为单位进行。
pub type Block = [u8; BLOCK_SIZE];
