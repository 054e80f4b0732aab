use crate::utils::config::Config;
use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{self, File};
use std::io::Write;
use std::process;

/// 日志写到按日期命名的文件里；标准输出留给命令本身，
/// 需要时可以同时镜像到 stderr
pub fn init_logger(config: &Config) {
    let level = config.get_log_level();
    let mut writers: Vec<Box<dyn Write + Send + Sync>> = Vec::new();

    let file = fs::create_dir_all(&config.logger_dir).and_then(|_| {
        let date = Local::now().format("%Y-%m-%d");
        File::options()
            .create(true)
            .append(true)
            .open(config.logger_dir.join(format!("kosh_{}.log", date)))
    });
    let file_error = match file {
        Ok(file) => {
            writers.push(Box::new(file));
            None
        }
        Err(e) => Some(e),
    };
    if config.log_to_stderr || file_error.is_some() {
        writers.push(Box::new(std::io::stderr()));
    }
    // 写不了日志文件时只把警告以上打到 stderr
    let level = if file_error.is_some() && !config.log_to_stderr {
        level.min(LevelFilter::Warn)
    } else {
        level
    };

    let result = Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[PID:{}][{}] {} - {}",
                process::id(),
                record.level(),
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(MultiWriter { writers })))
        .filter(Some(&config.name), level)
        .filter(None, LevelFilter::Warn)
        .try_init();

    if let Err(e) = result {
        eprintln!("kosh: logger init failed: {}", e);
        return;
    }
    if let Some(e) = file_error {
        log::warn!("无法创建日志文件 {}: {}", config.logger_dir.display(), e);
    }
    log::debug!("日志级别设置为: {}", level);
}

/// 同一条记录写到所有目标；某个目标出错不影响其余目标，最后返回第一个错误
struct MultiWriter {
    writers: Vec<Box<dyn Write + Send + Sync>>,
}

impl MultiWriter {
    fn each<F>(&mut self, mut op: F) -> std::io::Result<()>
    where
        F: FnMut(&mut dyn Write) -> std::io::Result<()>,
    {
        let mut first_error = None;
        for writer in &mut self.writers {
            if let Err(e) = op(writer.as_mut()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.each(|writer| writer.write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.each(|writer| writer.flush())
    }
}
