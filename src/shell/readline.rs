use log::{debug, error};
pub use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use rustyline::{CompletionType, Config as RLConfig};

use crate::shell::completion::CommandCompleter;
use crate::utils::config::Config;

/// 行输入源，历史文件由 `History` 负责，这里只保留内存中的条目供方向键翻阅
pub struct ReadlineManager {
    editor: Editor<CommandCompleter, DefaultHistory>,
}

impl ReadlineManager {
    pub fn new(config: &Config) -> Result<Self, ReadlineError> {
        let rl_config = RLConfig::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(config.get_edit_mode())
            .build();

        let mut editor = Editor::with_config(rl_config).map_err(|err| {
            error!("无法初始化 readline: {}", err);
            err
        })?;
        editor.set_helper(Some(CommandCompleter::new()));
        debug!("readline 初始化完成");
        Ok(Self { editor })
    }

    /// 读一行，去掉末尾的换行和回车
    pub fn readline(&mut self, prompt: &str) -> Result<String, ReadlineError> {
        self.editor
            .readline(prompt)
            .map(|line| line.trim_end_matches(['\n', '\r']).to_string())
    }

    pub fn add_history(&mut self, line: &str) -> Result<bool, ReadlineError> {
        self.editor.add_history_entry(line)
    }
}
