#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectMode {
    #[default]
    None,
    Truncate,
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Redirect {
    pub mode: RedirectMode,
    pub target: String,
}

impl Redirect {
    pub fn new(mode: RedirectMode, target: impl Into<String>) -> Self {
        Self {
            mode,
            target: target.into(),
        }
    }

    pub fn is_set(&self) -> bool {
        self.mode != RedirectMode::None
    }
}

/// 解析得到的一条命令，管道中的一个阶段
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Command {
    pub argv: Vec<String>,
    pub stdout: Redirect,
    pub stderr: Redirect,
}

impl Command {
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn arguments(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }
}
