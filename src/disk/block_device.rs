use std::io::Result;

use crate::disk::types::{Block, BlockId};

/// 块设备：按块号寻址，偏移量 = block_id * BLOCK_SIZE。
/// 不做缓存，每次调用都直接落到底层设备。
pub trait BlockDevice: Send + Sync {
    fn read_block(&self, block_id: BlockId, buf: &mut Block) -> Result<()>;
    fn write_block(&self, block_id: BlockId, buf: &Block) -> Result<()>;
    /// 设备上完整块的数量
    fn block_count(&self) -> Result<u64>;
}
