pub mod command;
pub mod logger;
pub mod parse;

use crate::shell::{
    command::{execute_command, Command, Session},
    parse::parse_command,
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use minifs::{
    disk::{
        init::{format_disk, perform_disk_initialization, BootProgress, DiskConfig},
        FileDisk,
    },
    FileSystem,
};
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use std::{
    error::Error,
    io::stdout,
    path::PathBuf,
    sync::mpsc,
    thread,
};

const COMMANDS: [&str; 17] = [
    "help", "ls", "pwd", "mkdir", "rmdir", "create", "rm", "cd", "read", "cat", "write", "stat",
    "touch", "fsck", "format", "exit", "quit",
];

pub fn start_shell(config: DiskConfig) {
    let fs = match boot(&config) {
        Ok(fs) => fs,
        Err(e) => {
            println!("{} {}", "❌ Failed to start MiniFS:".red().bold(), e);
            return;
        }
    };
    let mut session = Session::new(fs, config);

    let username = whoami::username();
    let hostname = whoami::devicename();

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    // 初始化 reedline
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".minifs_history");

    let mut line_editor = Reedline::create();
    match FileBackedHistory::with_file(100, history_path) {
        Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
        Err(e) => log::warn!("history disabled: {}", e),
    }

    // 命令补全
    let commands = COMMANDS.iter().map(|c| c.to_string()).collect();
    let completer = DefaultCompleter::new_with_wordlen(commands, 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    loop {
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(format!(
                "{}:{}",
                format!("{}@{}", username, hostname).green(),
                session.current_dir.blue()
            )),
            DefaultPromptSegment::Basic("MiniFS".bright_blue().bold().to_string()),
        );

        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut session) {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command. Type 'help' for command list.".yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting MiniFS...".yellow());
                break;
            }
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    session.fs.unmount();
    println!("{}", "GoodBye!".bright_yellow());
}

/// 后台线程挂载磁盘，前台根据进度消息刷新进度条
fn boot(config: &DiskConfig) -> Result<FileSystem<FileDisk>, Box<dyn Error>> {
    let mut stdout = stdout();
    execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    println!("{}", "[MiniFS Booting...]".bright_yellow().bold());

    let (tx, rx) = mpsc::channel();
    let worker_config = config.clone();
    let worker = thread::spawn(move || perform_disk_initialization(worker_config, tx));

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=> "),
    );

    let mut result = None;
    for msg in rx {
        match msg {
            BootProgress::Step(step) => pb.println(step),
            BootProgress::Progress(pos) => pb.set_position(pos),
            BootProgress::Finished(r) => {
                result = Some(r);
                break;
            }
        }
    }
    if worker.join().is_err() {
        return Err("disk initialization thread panicked".into());
    }

    let fs = match result {
        Some(Ok(fs)) => {
            pb.finish_with_message("✅ Ready!");
            fs
        }
        Some(Err(e)) => {
            pb.abandon_with_message("❌ Mount failed");
            println!("{} {}", "⚠️  Cannot mount disk:".yellow().bold(), e);
            let reformat = Confirm::new()
                .with_prompt(format!(
                    "Reformat {}? All data will be lost",
                    config.path.display()
                ))
                .default(false)
                .interact()?;
            if !reformat {
                return Err(e.into());
            }
            format_disk(FileDisk::open(&config.path)?, config)?
        }
        None => return Err("disk initialization ended without a result".into()),
    };

    execute!(
        stdout,
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print(format!("Welcome to MiniFS v{}\n", env!("CARGO_PKG_VERSION"))),
        ResetColor
    )?;
    Ok(fs)
}
