use minifs::disk::init::DiskConfig;

use crate::shell::start_shell;

mod shell;

fn main() {
    shell::logger::init();

    // 第一个参数可以覆盖镜像路径
    let mut config = DiskConfig::from_env();
    if let Some(path) = std::env::args_os().nth(1) {
        config.path = path.into();
    }
    start_shell(config);
}
