//! 嵌入式空闲块链表。
//!
//! 空闲块本身被用作链表节点：一个节点块是 `POINTERS_PER_BLOCK` 个块号，
//! 槽 0 指向下一个节点（0 表示链尾），其余槽各自放一个可直接分配的块号。
//! 从链表头出发能到达的所有非零槽，加上各节点块自身，恰好是当前空闲块的集合。
//! 链表头块是锚点，从不被分配，也不被任何槽引用。

use log::{debug, warn};

use crate::{
    disk::{Block, BlockDevice, BlockId, BLOCK_ID_SIZE, BLOCK_SIZE},
    fs::{
        config::{FREE_LIST_ANCHOR_BLOCKS, POINTERS_PER_BLOCK},
        error::{FileSystemError, Result},
    },
};

/// 每个节点中可存放空闲块号的槽数（去掉槽 0）
pub const PAYLOAD_SLOTS: usize = POINTERS_PER_BLOCK - 1;

/// 一个空闲链表节点。`slots[i]` 对应磁盘上的槽 `i + 1`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeListNode {
    pub next: Option<BlockId>,
    pub slots: [BlockId; PAYLOAD_SLOTS],
}

impl FreeListNode {
    pub fn empty() -> Self {
        Self {
            next: None,
            slots: [0; PAYLOAD_SLOTS],
        }
    }

    /// 只含一个链接指针的节点
    pub fn linked_to(next: BlockId) -> Self {
        Self {
            next: Some(next),
            ..Self::empty()
        }
    }

    pub fn decode(block: &Block) -> Self {
        let mut ptrs = block.chunks_exact(BLOCK_ID_SIZE).map(|chunk| {
            let mut raw = [0u8; BLOCK_ID_SIZE];
            raw.copy_from_slice(chunk);
            BlockId::from_le_bytes(raw)
        });

        let next = ptrs.next().filter(|&id| id != 0);
        let mut slots = [0; PAYLOAD_SLOTS];
        for (slot, id) in slots.iter_mut().zip(ptrs) {
            *slot = id;
        }
        Self { next, slots }
    }

    pub fn encode(&self) -> Block {
        let mut block: Block = [0; BLOCK_SIZE];
        let ptrs = std::iter::once(self.next.unwrap_or(0)).chain(self.slots.iter().copied());
        for (chunk, id) in block.chunks_exact_mut(BLOCK_ID_SIZE).zip(ptrs) {
            chunk.copy_from_slice(&id.to_le_bytes());
        }
        block
    }

    /// 从最高槽往下找第一个非零块号，取出并清空该槽
    pub fn take(&mut self) -> Option<BlockId> {
        let slot = self.slots.iter_mut().rev().find(|slot| **slot != 0)?;
        Some(std::mem::take(slot))
    }

    /// 把块号放进槽 1..N-2 中第一个空位；节点已满时返回 false
    pub fn push(&mut self, block: BlockId) -> bool {
        match self.slots[..PAYLOAD_SLOTS - 1]
            .iter_mut()
            .find(|slot| **slot == 0)
        {
            Some(slot) => {
                *slot = block;
                true
            }
            None => false,
        }
    }

    /// 节点中非零槽的数量（包括链接指针）
    pub fn reachable(&self) -> u64 {
        self.slots.iter().filter(|&&id| id != 0).count() as u64 + self.next.is_some() as u64
    }
}

/// 以链表头块号为句柄的空闲块分配器，所有状态都在磁盘上
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeList {
    head: BlockId,
}

impl FreeList {
    pub fn new(head: BlockId) -> Self {
        Self { head }
    }

    fn read_node(&self, disk: &dyn BlockDevice, block_id: BlockId) -> Result<FreeListNode> {
        let mut block: Block = [0; BLOCK_SIZE];
        disk.read_block(block_id, &mut block)?;
        Ok(FreeListNode::decode(&block))
    }

    fn write_node(&self, disk: &dyn BlockDevice, block_id: BlockId, node: &FreeListNode) -> Result<()> {
        disk.write_block(block_id, &node.encode())?;
        Ok(())
    }

    /// 在 `[head, head + block_count)` 上建立空闲链表。
    ///
    /// 节点地址从低端递增，节点携带的块号从高端递减消耗，
    /// 两端相遇时链表结束，整个区间都变为空闲。
    pub fn initialize(&self, disk: &dyn BlockDevice, block_count: u32) -> Result<()> {
        if block_count == 0 {
            warn!("free list over block {}: block count must be positive", self.head);
            return Err(FileSystemError::InvalidGeometry(
                "free list needs at least one block".to_string(),
            ));
        }
        let end = self.head as u64 + block_count as u64;
        if end > BlockId::MAX as u64 + 1 {
            return Err(FileSystemError::InvalidGeometry(format!(
                "free list range {}+{} overflows block ids",
                self.head, block_count
            )));
        }

        let mut current = self.head as u64;
        let mut last = end - 1;
        let mut nodes = 0u64;
        while current <= last {
            let mut node = FreeListNode::empty();
            for slot in node.slots.iter_mut().rev() {
                if current == last {
                    break;
                }
                *slot = last as BlockId;
                last -= 1;
            }
            if current < last {
                node.next = Some((current + 1) as BlockId);
            }
            self.write_node(disk, current as BlockId, &node)?;
            nodes += 1;
            current += 1;
        }

        debug!(
            "built free list at block {}: {} blocks, {} nodes",
            self.head, block_count, nodes
        );
        Ok(())
    }

    /// 分配一个空闲块，池耗尽时返回 `None`（块 0 永远不会被返回）
    pub fn allocate(&self, disk: &dyn BlockDevice) -> Result<Option<BlockId>> {
        let mut node = self.read_node(disk, self.head)?;
        if let Some(block) = node.take() {
            self.write_node(disk, self.head, &node)?;
            return Ok(Some(block));
        }

        match node.next {
            Some(next) if next == self.head => Err(FileSystemError::Corrupted(format!(
                "free list head {} links to itself",
                self.head
            ))),
            // 头节点已空：把下一个节点的内容搬进头块，下一个节点块本身被分配出去
            Some(next) => {
                let successor = self.read_node(disk, next)?;
                self.write_node(disk, self.head, &successor)?;
                Ok(Some(next))
            }
            None => {
                debug!("free list at block {} is exhausted", self.head);
                Ok(None)
            }
        }
    }

    /// 归还一个块
    pub fn free(&self, disk: &dyn BlockDevice, block: BlockId) -> Result<()> {
        if block == 0 || block == self.head {
            warn!("refusing to free block {}", block);
            return Err(FileSystemError::InvalidBlock(block));
        }

        let mut node = self.read_node(disk, self.head)?;
        if node.push(block) {
            return self.write_node(disk, self.head, &node);
        }

        // 头节点已满：原内容降级写入被释放的块，头节点只保留指向它的链接
        self.write_node(disk, block, &node)?;
        self.write_node(disk, self.head, &FreeListNode::linked_to(block))
    }

    /// 沿链表统计所有非零槽（含链接指针），返回 `block_count - total`
    pub fn check(&self, disk: &dyn BlockDevice, block_count: u32) -> Result<i64> {
        let mut current = self.head;
        let mut total = 0u64;
        let mut hops = 0u64;
        loop {
            let node = self.read_node(disk, current)?;
            total += node.reachable();
            match node.next {
                Some(next) => {
                    hops += 1;
                    if hops > block_count as u64 {
                        return Err(FileSystemError::Corrupted(format!(
                            "free list at block {} does not terminate",
                            self.head
                        )));
                    }
                    current = next;
                }
                None => break,
            }
        }
        Ok(block_count as i64 - total as i64)
    }

    /// `check` 的结果必须恰好等于锚点块数
    pub fn verify(&self, disk: &dyn BlockDevice, block_count: u32) -> Result<()> {
        let discrepancy = self.check(disk, block_count)?;
        if discrepancy != FREE_LIST_ANCHOR_BLOCKS {
            return Err(FileSystemError::Corrupted(format!(
                "free list discrepancy is {}, expected {}",
                discrepancy, FREE_LIST_ANCHOR_BLOCKS
            )));
        }
        Ok(())
    }
}
