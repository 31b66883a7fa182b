use std::{env, path::PathBuf, sync::mpsc::Sender};

use log::{info, warn};

use crate::{
    disk::{file_disk::FileDisk, BlockDevice, BLOCK_SIZE},
    fs::{
        config::{DEFAULT_DISK_PATH, DEFAULT_DISK_SIZE, DEFAULT_INODE_FRACTION},
        error::{FileSystemError, Result},
        mkfs::FormatOptions,
        FileSystem,
    },
};

/// 启动过程中发给界面线程的消息
#[derive(Debug)]
pub enum BootProgress {
    Step(&'static str),
    Progress(u64),
    Finished(Result<FileSystem<FileDisk>>),
}

/// 磁盘镜像配置，可由环境变量覆盖
#[derive(Debug, Clone, PartialEq)]
pub struct DiskConfig {
    pub path: PathBuf,        // MINIFS_DISK
    pub total_bytes: u64,     // MINIFS_DISK_SIZE
    pub inode_fraction: f64,  // MINIFS_INODE_FRACTION
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DISK_PATH),
            total_bytes: DEFAULT_DISK_SIZE,
            inode_fraction: DEFAULT_INODE_FRACTION,
        }
    }
}

impl DiskConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = env::var("MINIFS_DISK") {
            config.path = PathBuf::from(path);
        }
        if let Some(size) = parse_var("MINIFS_DISK_SIZE") {
            config.total_bytes = size;
        }
        if let Some(fraction) = parse_var("MINIFS_INODE_FRACTION") {
            config.inode_fraction = fraction;
        }
        config
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            inode_fraction: self.inode_fraction,
            total_bytes: self.total_bytes,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring unparsable {}={}", name, raw);
            None
        }
    }
}

/// 按镜像实际大小格式化，保证空闲链表覆盖到设备末尾
pub fn format_disk(disk: FileDisk, config: &DiskConfig) -> Result<FileSystem<FileDisk>> {
    let options = FormatOptions {
        total_bytes: disk.block_count()? * BLOCK_SIZE as u64,
        ..config.format_options()
    };
    FileSystem::format(disk, &options)
}

pub fn perform_disk_initialization(config: DiskConfig, tx: Sender<BootProgress>) {
    // 界面线程已退出时无人接收，直接丢弃消息
    let send = |msg: BootProgress| {
        let _ = tx.send(msg);
    };

    send(BootProgress::Step("🧠 Initializing virtual disk..."));
    let disk_exists = config.path.exists();

    // 已有镜像按原样打开，不改变其大小
    let opened = if disk_exists {
        FileDisk::open(&config.path)
    } else {
        FileDisk::new(&config.path, config.total_bytes)
    };
    let disk = match opened {
        Ok(d) => d,
        Err(e) => {
            send(BootProgress::Finished(Err(FileSystemError::Io(e))));
            return;
        }
    };
    send(BootProgress::Progress(30));

    let result = if disk_exists {
        send(BootProgress::Step("⚙️ Mounting file system..."));
        FileSystem::mount(disk)
    } else {
        // 只有“明确是新磁盘”才格式化
        info!("no image at {}, formatting", config.path.display());
        send(BootProgress::Step(
            "🔧 No disk found, formatting new file system...",
        ));
        format_disk(disk, &config)
    };

    send(BootProgress::Progress(100));
    send(BootProgress::Finished(result));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::config::FREE_LIST_ANCHOR_BLOCKS;
    use std::sync::mpsc;

    fn config_in(dir: &tempfile::TempDir) -> DiskConfig {
        DiskConfig {
            path: dir.path().join("disk.img"),
            total_bytes: 64 * BLOCK_SIZE as u64,
            inode_fraction: 0.25,
        }
    }

    fn run(config: &DiskConfig) -> Result<FileSystem<FileDisk>> {
        let (tx, rx) = mpsc::channel();
        perform_disk_initialization(config.clone(), tx);
        rx.into_iter()
            .find_map(|msg| match msg {
                BootProgress::Finished(result) => Some(result),
                _ => None,
            })
            .expect("finished message")
    }

    #[test]
    fn new_image_is_formatted_then_mounted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(&dir);

        let mut fs = run(&config).expect("format");
        assert_eq!(fs.data_blocks(), 46);
        fs.make_directory("/kept", 0o755).expect("mkdir");
        drop(fs);

        let fs = run(&config).expect("mount");
        assert_eq!(fs.list_directory("/").expect("ls"), vec!["kept"]);
    }

    #[test]
    fn remount_keeps_image_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(&dir);
        let fs = run(&config).expect("format");
        assert_eq!(fs.check_free_list().expect("check"), FREE_LIST_ANCHOR_BLOCKS);
        drop(fs);

        config.total_bytes = 128 * BLOCK_SIZE as u64;
        let fs = run(&config).expect("mount");
        assert_eq!(fs.data_blocks(), 46);
        assert_eq!(fs.check_free_list().expect("check"), FREE_LIST_ANCHOR_BLOCKS);
        assert_eq!(
            std::fs::metadata(&config.path).expect("metadata").len(),
            64 * BLOCK_SIZE as u64
        );
    }

    #[test]
    fn garbage_image_fails_to_mount() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(&dir);
        std::fs::write(&config.path, vec![0xABu8; 64 * BLOCK_SIZE]).expect("write");

        assert!(run(&config).is_err());

        let fs = format_disk(FileDisk::open(&config.path).expect("open"), &config)
            .expect("reformat");
        assert!(fs.list_directory("/").expect("ls").is_empty());
    }
}
