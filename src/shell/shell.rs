use log::{debug, error, warn};
use nix::libc::c_int;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use crate::shell::executor::{build_stages, run, Flow};
use crate::shell::history::{History, SharedHistory};
use crate::shell::parser::{parse_pipeline, scan};
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::utils::config::Config;
use crate::utils::theme::Theme;

pub struct Shell {
    theme: Theme,
    readline: ReadlineManager,
    history: SharedHistory,
    history_file: PathBuf,
}

impl Shell {
    pub fn new(config: &Config) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            theme: Theme::load_theme(&config.theme),
            readline: ReadlineManager::new(config)?,
            history: SharedHistory::new(History::new()),
            history_file: config.history_file.clone(),
        })
    }

    /// 运行读取-执行循环，返回进程退出码
    pub fn run(&mut self) -> Result<i32, Box<dyn Error>> {
        debug!("初始化 kosh...");
        install_signal_handlers();
        self.load_history();

        let code = self.run_loop()?;

        self.save_history();
        if !self.theme.goodbye_message.is_empty() {
            println!("{}", self.theme.goodbye_message);
        }
        debug!("退出 kosh, 退出码 {}", code);
        Ok(code)
    }

    fn run_loop(&mut self) -> Result<i32, Box<dyn Error>> {
        loop {
            std::io::stdout().flush()?;

            match self.readline.readline(&self.theme.prompt) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if let Err(e) = self.readline.add_history(&line) {
                        warn!("无法写入编辑器历史: {}", e);
                    }
                    if let Flow::Exit(code) =
                        eval_line(&line, &self.history, &*self.theme.error_style)
                    {
                        return Ok(code);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    debug!("接收到中断信号");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    debug!("接收到 EOF，退出 kosh");
                    println!();
                    return Ok(0);
                }
                Err(err) => {
                    error!("读取输入失败: {}", err);
                    eprintln!("{}", (self.theme.error_style)(format!("kosh: {}", err)));
                    return Ok(1);
                }
            }
        }
    }

    fn load_history(&mut self) {
        if !self.history_file.exists() {
            debug!("历史文件 {} 不存在", self.history_file.display());
            return;
        }
        let loaded = self.history.lock().read_from(&self.history_file);
        match loaded {
            Ok(_) => {
                let entries = self.history.lock().entries().to_vec();
                for line in &entries {
                    if let Err(e) = self.readline.add_history(line) {
                        warn!("无法写入编辑器历史: {}", e);
                    }
                }
            }
            Err(e) => self.warn_history("读取", e),
        }
    }

    fn save_history(&self) {
        let history = self.history.lock();
        // 没有输入过命令时不创建空的历史文件
        if history.is_empty() && !self.history_file.exists() {
            return;
        }
        debug!("保存 {} 条历史到 {}", history.len(), self.history_file.display());
        if let Err(e) = history.write_to(&self.history_file) {
            self.warn_history("保存", e);
        }
    }

    fn warn_history(&self, action: &str, e: std::io::Error) {
        warn!("无法{}历史文件 {}: {}", action, self.history_file.display(), e);
        eprintln!(
            "{}",
            (self.theme.warning_style)(format!(
                "kosh: history: {}: {}",
                self.history_file.display(),
                e
            ))
        );
    }
}

extern "C" fn on_interrupt(_: c_int) {}

/// shell 自身不被 Ctrl-C 结束；捕获（而非忽略）的信号在 exec 后恢复默认，
/// 所以前台子进程仍然会收到 SIGINT
fn install_signal_handlers() {
    let action = SigAction::new(
        SigHandler::Handler(on_interrupt),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for sig in [Signal::SIGINT, Signal::SIGQUIT] {
        // SAFETY: 处理函数是空函数，异步信号安全
        if let Err(e) = unsafe { sigaction(sig, &action) } {
            warn!("无法设置 {} 处理函数: {}", sig, e);
        }
    }
}

/// 记录一行输入并执行。行尾的换行已经去掉，其余空白原样保留，
/// 转义的结尾空格属于最后一个词
pub fn eval_line(line: &str, history: &SharedHistory, style: &dyn Fn(String) -> String) -> Flow {
    if line.trim().is_empty() {
        return Flow::Continue;
    }
    history.lock().push(line);

    let commands = parse_pipeline(scan(line));
    debug!("解析得到 {} 个命令", commands.len());
    let mut stages = build_stages(commands, history);
    run(&mut stages, style)
}
