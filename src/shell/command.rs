use colored::*;
use dialoguer::Confirm;
use std::error::Error;

use minifs::{
    disk::{
        init::{format_disk, DiskConfig},
        FileDisk,
    },
    fs::{
        config::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, FREE_LIST_ANCHOR_BLOCKS},
        inode_table::FileKind,
    },
    utils::{current_timestamp, format_timestamp},
    FileSystem,
};

#[derive(Debug)]
pub enum Command {
    Help,
    Ls(Option<String>),
    Pwd,
    Mkdir(String),
    Rmdir(String),
    Create(String),
    Rm(String),
    Cd(String),
    Read(String),
    Write(String, String),
    Stat(String),
    Touch(String),
    Fsck,
    Format,
    Exit,
}

/// 一次 shell 会话：已挂载的文件系统 + 当前目录
pub struct Session {
    pub fs: FileSystem<FileDisk>,
    pub current_dir: String,
    pub config: DiskConfig,
}

impl Session {
    pub fn new(fs: FileSystem<FileDisk>, config: DiskConfig) -> Self {
        Self {
            fs,
            current_dir: String::from("/"),
            config,
        }
    }

    // 相对路径拼到当前目录后面
    fn absolute(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else if self.current_dir == "/" {
            format!("/{}", path)
        } else {
            format!("{}/{}", self.current_dir, path)
        }
    }

    // 去掉 `.`、`..` 和多余的斜杠
    fn normalize(path: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for part in path.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                name => parts.push(name),
            }
        }
        format!("/{}", parts.join("/"))
    }
}

pub fn execute_command(cmd: &Command, session: &mut Session) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Ls(path) => {
            let dir = session.absolute(path.as_deref().unwrap_or("."));
            println!("📂  .");
            println!("📁  ..");
            for name in session.fs.list_directory(&dir)? {
                match session.fs.get_attributes(&format!("{}/{}", dir, name))?.kind {
                    FileKind::Directory => println!("📁  {}", name.blue().bold()),
                    FileKind::File => println!("📄  {}", name),
                }
            }
        }
        Command::Pwd => println!("📍 {}", session.current_dir.cyan()),
        Command::Mkdir(name) => {
            let path = session.absolute(name);
            session.fs.make_directory(&path, DEFAULT_DIR_MODE)?;
            println!("✅ Created directory: {}", path.green());
        }
        Command::Rmdir(name) => {
            let path = session.absolute(name);
            session.fs.remove_directory(&path)?;
            println!("🗑️ Removed directory: {}", path.red());
        }
        Command::Create(name) => {
            let path = session.absolute(name);
            session.fs.create_file(&path, DEFAULT_FILE_MODE)?;
            println!("📝 Created file: {}", path.green());
        }
        Command::Rm(name) => {
            let path = session.absolute(name);
            session.fs.remove_file(&path)?;
            println!("❌ Deleted file: {}", path.red());
        }
        Command::Cd(path) => {
            let target = Session::normalize(&session.absolute(path));
            if session.fs.get_attributes(&target)?.kind != FileKind::Directory {
                return Err(format!("not a directory: {}", target).into());
            }
            session.current_dir = target;
            println!("📂 Moved to {}", session.current_dir.blue());
        }
        Command::Read(file) => {
            let path = session.absolute(file);
            let content = session.fs.read_file(&path)?;
            println!("📖 Reading file: {}", path.cyan());
            println!("{}", String::from_utf8_lossy(&content));
        }
        Command::Write(file, content) => {
            let path = session.absolute(file);
            if session.fs.resolve(&path).is_err() {
                session.fs.create_file(&path, DEFAULT_FILE_MODE)?;
            }
            let written = session.fs.write_file(&path, content.as_bytes())?;
            println!("✏️  Writing to {}", path.cyan());
            println!("{} {} bytes", "✅ Written:".green(), written);
        }
        Command::Stat(file) => {
            let path = session.absolute(file);
            let attr = session.fs.get_attributes(&path)?;
            let kind = match attr.kind {
                FileKind::Directory => "Directory",
                FileKind::File => "File",
            };
            println!(
                "{}\n{}: {}\n{}: {}\n{}: {}\n{}: {:o}\n{}: {}:{}\n{}: {} bytes\n{}: {}\n{}: {}\n{}: {}\n",
                "📊 File Info".bright_yellow().bold(),
                "Name".blue(),
                path,
                "Inode".blue(),
                attr.ino,
                "Type".blue(),
                kind,
                "Mode".blue(),
                attr.mode.permissions(),
                "Owner".blue(),
                attr.uid,
                attr.gid,
                "Size".blue(),
                attr.size,
                "Access".blue(),
                format_timestamp(attr.atime),
                "Modify".blue(),
                format_timestamp(attr.mtime),
                "Change".blue(),
                format_timestamp(attr.ctime),
            );
        }
        Command::Touch(file) => {
            let path = session.absolute(file);
            if session.fs.resolve(&path).is_ok() {
                let now = current_timestamp();
                session.fs.set_times(&path, now, now)?;
            } else {
                session.fs.create_file(&path, DEFAULT_FILE_MODE)?;
            }
        }
        Command::Fsck => {
            let discrepancy = session.fs.check_free_list()?;
            let total = session.fs.data_blocks() as i64;
            println!("{}", "🩺 Free list check".bright_yellow().bold());
            println!("{}: {}", "Data blocks".blue(), total);
            println!("{}: {}", "Free blocks".blue(), total - discrepancy);
            println!(
                "{}: {}",
                "In use".blue(),
                discrepancy - FREE_LIST_ANCHOR_BLOCKS
            );
            println!(
                "{}: {} / {}",
                "Free inodes".blue(),
                session.fs.inode_table.free_inodes(),
                session.fs.inode_table.total_inodes()
            );
        }
        Command::Format => {
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Format {}? All data will be lost",
                    session.config.path.display()
                ))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("{}", "Format cancelled".bright_black());
                return Ok(());
            }
            println!("💾 Formatting virtual disk...");
            let disk = FileDisk::open(&session.config.path)?;
            session.fs = format_disk(disk, &session.config)?;
            session.current_dir = String::from("/");
            println!("{}", "✅ Disk formatted successfully!".green());
        }
        Command::Exit => println!("{}", "👋 Exiting MiniFS shell...".yellow().bold()),
    }

    Ok(())
}

fn print_help() {
    println!("{}", "📘 MiniFS Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  ls [dir]           List files in a directory
  pwd                Print current path
  mkdir <dir>        Create directory
  rmdir <dir>        Remove empty directory
  create <file>      Create file
  rm <file>          Remove file
  cd <dir>           Change directory
  read <file>        Read file content
  write <file> <str> Write string into file
  stat <path>        Show file info
  touch <file>       Create file or update its times
  fsck               Check the free block list
  format             Format virtual disk
  help               Show this help message
  exit               Quit the shell
"
        .bright_black()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(Session::normalize("/a/./b/../c/"), "/a/c");
        assert_eq!(Session::normalize("/.."), "/");
        assert_eq!(Session::normalize("//"), "/");
    }
}
