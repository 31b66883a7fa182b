use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    disk::BlockDevice,
    fs::{
        config::{DIR_ENTRY_SIZE, NAME_LEN},
        data_area::DataArea,
        error::{FileSystemError, Result},
        inode_table::{Inode, InodeTable},
    },
};

// 一个目录项：定长名字（不足补 0）+ inode 号
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    name: [u8; NAME_LEN],
    pub inode_index: u64,
}

impl DirEntry {
    pub fn new(name: &str, inode_index: u64) -> Result<Self> {
        validate_name(name)?;
        let mut raw = [0u8; NAME_LEN];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self {
            name: raw,
            inode_index,
        })
    }

    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(FileSystemError::InvalidPath(name.to_string()));
    }
    if name.len() > NAME_LEN {
        return Err(FileSystemError::NameTooLong(name.to_string()));
    }
    Ok(())
}

/// 把目录的字节流解析为目录项序列
pub fn decode_entries(bytes: &[u8]) -> Result<Vec<DirEntry>> {
    if bytes.len() % DIR_ENTRY_SIZE != 0 {
        return Err(FileSystemError::Corrupted(format!(
            "directory size {} is not a multiple of {}",
            bytes.len(),
            DIR_ENTRY_SIZE
        )));
    }
    bytes
        .chunks_exact(DIR_ENTRY_SIZE)
        .map(|chunk| Ok(bincode::deserialize(chunk)?))
        .collect()
}

pub fn encode_entries(entries: &[DirEntry]) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(entries.len() * DIR_ENTRY_SIZE);
    for entry in entries {
        bincode::serialize_into(&mut bytes, entry)?;
    }
    Ok(bytes)
}

/// 读出目录的全部目录项
pub fn read_dir(disk: &dyn BlockDevice, data_area: &DataArea, inode: &Inode) -> Result<Vec<DirEntry>> {
    decode_entries(&data_area.read_fully(disk, inode)?)
}

/// 整体写回目录内容，返回写入的字节数（可能短于请求长度）
pub fn write_dir(
    disk: &dyn BlockDevice,
    data_area: &DataArea,
    table: &InodeTable,
    number: u64,
    inode: &mut Inode,
    entries: &[DirEntry],
) -> Result<usize> {
    let bytes = encode_entries(entries)?;
    data_area.write_fully(disk, table, number, inode, &bytes)
}

// 目录结构
#[derive(Debug, Clone)]
pub struct Directory {
    pub inode_index: u64,
    pub entries: Vec<DirEntry>,
    index_map: HashMap<String, usize>, // name -> entries 索引
}

impl Directory {
    pub fn new(inode_index: u64) -> Self {
        Self {
            inode_index,
            entries: Vec::new(),
            index_map: HashMap::new(),
        }
    }

    // 从磁盘加载目录，自动重建 index_map
    pub fn load(
        disk: &dyn BlockDevice,
        data_area: &DataArea,
        inode_index: u64,
        inode: &Inode,
    ) -> Result<Self> {
        let mut dir = Self::new(inode_index);
        dir.entries = read_dir(disk, data_area, inode)?;
        dir.rebuild_index_map();
        Ok(dir)
    }

    /// 整体写回；写不完整时报 PartialWrite
    pub fn store(
        &self,
        disk: &dyn BlockDevice,
        data_area: &DataArea,
        table: &InodeTable,
        inode: &mut Inode,
    ) -> Result<()> {
        let requested = self.entries.len() * DIR_ENTRY_SIZE;
        let written = write_dir(disk, data_area, table, self.inode_index, inode, &self.entries)?;
        if written != requested {
            return Err(FileSystemError::PartialWrite { written, requested });
        }
        Ok(())
    }

    pub fn rebuild_index_map(&mut self) {
        self.index_map.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            self.index_map.insert(entry.name(), i);
        }
    }

    // 添加目录项，追加在末尾
    pub fn add(&mut self, name: &str, inode_index: u64) -> Result<()> {
        if self.index_map.contains_key(name) {
            return Err(FileSystemError::AlreadyExists(name.to_string()));
        }
        self.entries.push(DirEntry::new(name, inode_index)?);
        self.index_map.insert(name.to_string(), self.entries.len() - 1);
        Ok(())
    }

    // 删除目录项并压缩，其余目录项保持原有顺序，返回 inode_index
    pub fn remove(&mut self, name: &str) -> Option<u64> {
        let idx = *self.index_map.get(name)?;
        let entry = self.entries.remove(idx);
        self.rebuild_index_map();
        Some(entry.inode_index)
    }

    // 查找目录项，返回 inode_index
    pub fn find(&self, name: &str) -> Option<u64> {
        self.index_map
            .get(name)
            .map(|&idx| self.entries[idx].inode_index)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(DirEntry::name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_is_fixed_size() {
        let entry = DirEntry::new("foo", 1).expect("entry");
        let bytes = encode_entries(&[entry]).expect("encode");
        assert_eq!(bytes.len(), DIR_ENTRY_SIZE);
        assert_eq!(&bytes[..3], b"foo");
        assert!(bytes[3..NAME_LEN].iter().all(|&b| b == 0));
        assert_eq!(&bytes[NAME_LEN..], &1u64.to_le_bytes());
    }

    #[test]
    fn name_uses_full_width() {
        let name = "x".repeat(NAME_LEN);
        let entry = DirEntry::new(&name, 9).expect("entry");
        assert_eq!(entry.name(), name);
    }

    #[test]
    fn invalid_names_are_rejected() {
        assert!(matches!(
            DirEntry::new(&"x".repeat(NAME_LEN + 1), 1),
            Err(FileSystemError::NameTooLong(_))
        ));
        for bad in ["", ".", "..", "a/b"] {
            assert!(matches!(
                DirEntry::new(bad, 1),
                Err(FileSystemError::InvalidPath(_))
            ));
        }
    }

    #[test]
    fn decode_rejects_torn_entry() {
        assert!(matches!(
            decode_entries(&[0u8; DIR_ENTRY_SIZE + 1]),
            Err(FileSystemError::Corrupted(_))
        ));
    }

    #[test]
    fn remove_compacts_and_keeps_order() {
        let mut dir = Directory::new(0);
        dir.add("a", 1).expect("add");
        dir.add("b", 2).expect("add");
        dir.add("c", 3).expect("add");

        assert_eq!(dir.remove("b"), Some(2));
        assert_eq!(dir.names(), vec!["a", "c"]);
        assert_eq!(dir.find("c"), Some(3));
        assert_eq!(dir.remove("b"), None);

        let round = decode_entries(&encode_entries(&dir.entries).expect("encode")).expect("decode");
        assert_eq!(round, dir.entries);
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut dir = Directory::new(0);
        dir.add("a", 1).expect("add");
        assert!(matches!(
            dir.add("a", 2),
            Err(FileSystemError::AlreadyExists(_))
        ));
        assert_eq!(dir.find("a"), Some(1));
    }
}
