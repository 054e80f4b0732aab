use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    /// 进程创建失败
    #[error("{name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("{name}: {path}: {source}")]
    RedirectOpen {
        name: String,
        path: String,
        #[source]
        source: io::Error,
    },

    /// 非零退出码；错误信息已经由命令自己输出过
    #[error("{name}: exit status {code}")]
    Exited { name: String, code: i32 },

    #[error("{name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },

    /// 内建命令执行时 panic
    #[error("{name}: internal error: {message}")]
    BuiltinFault { name: String, message: String },

    #[error("pipe: {0}")]
    Pipe(#[from] nix::Error),

    #[error("exit requested with status {0}")]
    ExitRequested(i32),
}

impl ShellError {
    pub fn io(name: &str, source: io::Error) -> Self {
        ShellError::Io {
            name: name.to_string(),
            source,
        }
    }

    /// 不需要再向用户输出的错误
    pub fn is_silent(&self) -> bool {
        matches!(self, ShellError::Exited { .. } | ShellError::ExitRequested(_))
    }
}
