use dotenv::dotenv;
use log::LevelFilter;
use rustyline::EditMode;
use std::env;
use std::fs;
use std::path::PathBuf;

pub struct Config {
    pub name: String,
    pub config_dir: PathBuf,
    pub theme: String,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
    pub log_to_stderr: bool,
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/kosh")
        } else {
            env::temp_dir().join("kosh")
        }
    }

    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from("kosh"),
            theme: String::from("default"),
            history_file: config_dir.join(".kosh_history"),
            editor_mode: String::from("emacs"),
            logger_level: String::from("warn"),
            logger_dir: config_dir.join("logs"),
            log_to_stderr: false,
            config_dir,
        }
    }

    pub fn new() -> Self {
        // 优先加载 .env 文件
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();
        config.apply_env(|key| env::var(key).ok());

        // 确保历史文件目录存在，失败时只是无法保存历史
        if let Some(parent) = config.history_file.parent() {
            let _ = fs::create_dir_all(parent);
        }

        config
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(theme) = lookup("KOSH_THEME") {
            self.theme = theme;
        }

        if let Some(editor) = lookup("KOSH_EDITOR") {
            self.editor_mode = editor;
        }

        if let Some(history) = lookup("HISTFILE").filter(|h| !h.is_empty()) {
            self.history_file = PathBuf::from(history);
        }

        if let Some(level) = lookup("KOSH_LOG_LEVEL") {
            self.logger_level = level;
        }

        if let Some(dir) = lookup("KOSH_LOG_DIR") {
            self.logger_dir = PathBuf::from(dir);
        }

        if let Some(flag) = lookup("KOSH_LOG_STDERR") {
            self.log_to_stderr = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "vi" => EditMode::Vi,
            _ => EditMode::Emacs,
        }
    }

    pub fn get_log_level(&self) -> LevelFilter {
        match &self.logger_level {
            level if level.eq_ignore_ascii_case("off") => LevelFilter::Off,
            level if level.eq_ignore_ascii_case("error") => LevelFilter::Error,
            level if level.eq_ignore_ascii_case("warn") => LevelFilter::Warn,
            level if level.eq_ignore_ascii_case("info") => LevelFilter::Info,
            level if level.eq_ignore_ascii_case("debug") => LevelFilter::Debug,
            level if level.eq_ignore_ascii_case("trace") => LevelFilter::Trace,
            _ => LevelFilter::Warn,
        }
    }
}
