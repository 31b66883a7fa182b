use log::{info, warn};

use crate::{
    disk::BlockDevice,
    fs::{
        config::{ROOT_INODE, SUPER_BLOCK_BLOCK_ID},
        data_area::DataArea,
        directory::{validate_name, Directory},
        error::{FileSystemError, Result},
        free_list::FreeList,
        inode_table::{FileKind, Inode, InodeMode, InodeTable},
        mkfs::FormatOptions,
        super_block::SuperBlock,
    },
    utils::current_timestamp,
};

pub mod config;
pub mod data_area;
pub mod directory;
pub mod error;
pub mod free_list;
pub mod inode_bitmap;
pub mod inode_table;
pub mod mkfs;
pub mod super_block;

/// stat 风格的属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttr {
    pub ino: u64,
    pub kind: FileKind,
    pub mode: InodeMode,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl FileAttr {
    fn new(ino: u64, inode: &Inode) -> Self {
        Self {
            ino,
            kind: inode.kind(),
            mode: inode.mode(),
            nlink: inode.link_count,
            uid: inode.uid,
            gid: inode.gid,
            size: inode.size,
            atime: inode.atime,
            mtime: inode.mtime,
            ctime: inode.ctime,
        }
    }
}

/// 已挂载的文件系统：所有路径级操作的入口。
/// 单线程使用，每个修改在返回前都已写回磁盘。
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    pub disk: D,                 // 底层磁盘抽象层
    pub super_block: SuperBlock, // 文件系统总体信息
    pub inode_table: InodeTable, // inode 位图与 inode 表
    pub data_area: DataArea,     // 文件内容与空闲块管理
    data_blocks: u32,            // 空闲链表覆盖的块数，由设备大小决定
    owner: (u32, u32),           // 新建 inode 的 uid / gid
}

impl<D: BlockDevice> FileSystem<D> {
    /// 格式化后直接挂载
    pub fn format(disk: D, options: &FormatOptions) -> Result<Self> {
        mkfs::format(&disk, options)?;
        Self::mount(disk)
    }

    pub fn mount(disk: D) -> Result<Self> {
        let super_block = SuperBlock::load(&disk)?;
        super_block.validate()?;
        let inode_table = InodeTable::load(&disk, &super_block)?;
        if !inode_table.is_allocated(ROOT_INODE) {
            return Err(FileSystemError::Corrupted(
                "root inode is not allocated".to_string(),
            ));
        }
        let device_blocks = disk.block_count()?;
        let data_blocks = device_blocks
            .checked_sub(super_block.freelist_head as u64)
            .filter(|&n| n > 0)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                FileSystemError::Corrupted(format!(
                    "free list head {} lies outside a {} block device",
                    super_block.freelist_head, device_blocks
                ))
            })?;
        info!(
            "mounted: super block at {}, {} inodes ({} free), free list head {}",
            SUPER_BLOCK_BLOCK_ID,
            inode_table.total_inodes(),
            inode_table.free_inodes(),
            super_block.freelist_head
        );
        Ok(Self {
            data_area: DataArea::new(FreeList::new(super_block.freelist_head)),
            disk,
            super_block,
            inode_table,
            data_blocks,
            owner: (0, 0),
        })
    }

    /// 卸载并交还底层设备；所有修改都已落盘，无需 flush
    pub fn unmount(self) -> D {
        info!("unmounted");
        self.disk
    }

    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.owner = (uid, gid);
        self
    }

    // 路径 -> 组件列表，`.` 和 `..` 按字面折叠
    fn components(path: &str) -> Result<Vec<&str>> {
        if !path.starts_with('/') {
            return Err(FileSystemError::InvalidPath(path.to_string()));
        }
        let mut parts = Vec::new();
        for part in path.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                name => parts.push(name),
            }
        }
        Ok(parts)
    }

    fn join(parts: &[&str]) -> String {
        format!("/{}", parts.join("/"))
    }

    // 拆成 (父目录组件, 最后一个名字)
    fn split_parent(path: &str) -> Result<(Vec<&str>, &str)> {
        let mut parts = Self::components(path)?;
        let name = parts
            .pop()
            .ok_or_else(|| FileSystemError::InvalidPath(path.to_string()))?;
        Ok((parts, name))
    }

    fn lookup(&self, parts: &[&str]) -> Result<u64> {
        let mut current = ROOT_INODE;
        for (depth, name) in parts.iter().enumerate() {
            let inode = self.inode_table.get_inode(&self.disk, current)?;
            if !inode.is_dir() {
                return Err(FileSystemError::NotADirectory(Self::join(&parts[..depth])));
            }
            let dir = Directory::load(&self.disk, &self.data_area, current, &inode)?;
            current = dir.find(name).ok_or_else(|| {
                FileSystemError::NotFound(Self::join(&parts[..=depth]))
            })?;
        }
        Ok(current)
    }

    // 读出一个目录 inode，非目录时报错
    fn load_dir(&self, number: u64, path: &str) -> Result<(Inode, Directory)> {
        let inode = self.inode_table.get_inode(&self.disk, number)?;
        if !inode.is_dir() {
            return Err(FileSystemError::NotADirectory(path.to_string()));
        }
        let dir = Directory::load(&self.disk, &self.data_area, number, &inode)?;
        Ok((inode, dir))
    }

    /// 从根目录逐级查找，返回 inode 号
    pub fn resolve(&self, path: &str) -> Result<u64> {
        self.lookup(&Self::components(path)?)
    }

    pub fn get_attributes(&self, path: &str) -> Result<FileAttr> {
        let number = self.resolve(path)?;
        let inode = self.inode_table.get_inode(&self.disk, number)?;
        Ok(FileAttr::new(number, &inode))
    }

    pub fn make_directory(&mut self, path: &str, mode: u32) -> Result<u64> {
        self.make_node(path, InodeMode::directory(mode))
    }

    pub fn create_file(&mut self, path: &str, mode: u32) -> Result<u64> {
        self.make_node(path, InodeMode::regular(mode))
    }

    fn make_node(&mut self, path: &str, mode: InodeMode) -> Result<u64> {
        let (parent_parts, name) = Self::split_parent(path)?;
        validate_name(name)?;
        let parent_no = self.lookup(&parent_parts)?;
        let (mut parent, mut dir) = self.load_dir(parent_no, &Self::join(&parent_parts))?;
        if dir.find(name).is_some() {
            return Err(FileSystemError::AlreadyExists(path.to_string()));
        }

        let number = self.inode_table.allocate_inode(&self.disk)?;
        let (uid, gid) = self.owner;
        let created = self
            .inode_table
            .write_inode(&self.disk, number, &Inode::new(mode, uid, gid))
            .and_then(|_| dir.add(name, number))
            .and_then(|_| dir.store(&self.disk, &self.data_area, &self.inode_table, &mut parent));

        // 父目录写不下时回收刚分配的 inode
        if let Err(e) = created {
            warn!("creating {} failed: {}", path, e);
            self.inode_table.release_inode(&self.disk, number)?;
            return Err(e);
        }
        Ok(number)
    }

    pub fn remove_directory(&mut self, path: &str) -> Result<()> {
        self.remove_node(path, FileKind::Directory)
    }

    pub fn remove_file(&mut self, path: &str) -> Result<()> {
        self.remove_node(path, FileKind::File)
    }

    // 先从父目录摘除，再回收数据块，最后释放 inode：
    // 中途失败只会泄漏空间，不会留下悬空目录项
    fn remove_node(&mut self, path: &str, expected: FileKind) -> Result<()> {
        let (parent_parts, name) = Self::split_parent(path)?;
        let parent_no = self.lookup(&parent_parts)?;
        let (mut parent, mut dir) = self.load_dir(parent_no, &Self::join(&parent_parts))?;
        let number = dir
            .find(name)
            .ok_or_else(|| FileSystemError::NotFound(path.to_string()))?;

        let mut inode = self.inode_table.get_inode(&self.disk, number)?;
        match (expected, inode.kind()) {
            (FileKind::Directory, FileKind::File) => {
                return Err(FileSystemError::NotADirectory(path.to_string()))
            }
            (FileKind::File, FileKind::Directory) => {
                return Err(FileSystemError::IsADirectory(path.to_string()))
            }
            (FileKind::Directory, FileKind::Directory) => {
                let child = Directory::load(&self.disk, &self.data_area, number, &inode)?;
                if !child.is_empty() {
                    return Err(FileSystemError::DirectoryNotEmpty(path.to_string()));
                }
            }
            (FileKind::File, FileKind::File) => {}
        }

        dir.remove(name);
        dir.store(&self.disk, &self.data_area, &self.inode_table, &mut parent)?;
        self.data_area.release_blocks(&self.disk, &mut inode)?;
        self.inode_table.write_inode(&self.disk, number, &inode)?;
        self.inode_table.release_inode(&self.disk, number)
    }

    /// 目录项名字，按存储顺序
    pub fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        let number = self.resolve(path)?;
        let (_, dir) = self.load_dir(number, path)?;
        Ok(dir.names())
    }

    pub fn set_times(&mut self, path: &str, atime: i64, mtime: i64) -> Result<()> {
        let number = self.resolve(path)?;
        let mut inode = self.inode_table.get_inode(&self.disk, number)?;
        inode.atime = atime;
        inode.mtime = mtime;
        inode.ctime = current_timestamp();
        self.inode_table.write_inode(&self.disk, number, &inode)
    }

    // 解析为普通文件
    fn resolve_file(&self, path: &str) -> Result<(u64, Inode)> {
        let number = self.resolve(path)?;
        let inode = self.inode_table.get_inode(&self.disk, number)?;
        if inode.is_dir() {
            return Err(FileSystemError::IsADirectory(path.to_string()));
        }
        Ok((number, inode))
    }

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let (_, inode) = self.resolve_file(path)?;
        self.data_area.read_fully(&self.disk, &inode)
    }

    /// 整体覆盖文件内容；空间不足时文件保留已写入的部分并返回 PartialWrite，
    /// 一个字节都没写进去时返回 DiskFull
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> Result<usize> {
        let (number, mut inode) = self.resolve_file(path)?;
        let written =
            self.data_area
                .write_fully(&self.disk, &self.inode_table, number, &mut inode, data)?;
        if written == 0 && !data.is_empty() {
            return Err(FileSystemError::DiskFull);
        }
        if written != data.len() {
            return Err(FileSystemError::PartialWrite {
                written,
                requested: data.len(),
            });
        }
        Ok(written)
    }

    /// 当前空闲链表差值；没有分配任何块时等于 `FREE_LIST_ANCHOR_BLOCKS`
    pub fn check_free_list(&self) -> Result<i64> {
        self.data_area.free_list().check(&self.disk, self.data_blocks)
    }

    /// 空闲链表覆盖的块数（包括锚点）
    pub fn data_blocks(&self) -> u32 {
        self.data_blocks
    }
}
