use std::any::Any;
use std::io::Write;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{self, Child};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use super::builtins::{BuiltinContext, BuiltinFn, BUILTINS};
use super::error::ShellError;
use super::handle::{open_redirect, StdStream, StreamHandle};
use super::pipeline::Runnable;
use crate::shell::history::SharedHistory;
use crate::shell::parser::Command;
use crate::utils::path::find_file_in_path;

#[derive(Debug)]
enum RunState {
    Pending,
    /// 找不到命令或空命令，wait 直接成功
    Skipped,
    External(Child),
    Builtin(JoinHandle<Result<(), ShellError>>),
    Finished,
}

/// 管道中的一个阶段：内建命令跑在独立线程里，外部命令跑在子进程里，
/// 对驱动来说都是同样的 start / wait
#[derive(Debug)]
pub struct Stage {
    command: Command,
    history: SharedHistory,
    stdin: StreamHandle,
    stdout: StreamHandle,
    stderr: StreamHandle,
    state: RunState,
}

impl Stage {
    pub fn new(command: Command, history: SharedHistory) -> Self {
        Self {
            command,
            history,
            stdin: StreamHandle::Default(StdStream::Stdin),
            stdout: StreamHandle::Default(StdStream::Stdout),
            stderr: StreamHandle::Default(StdStream::Stderr),
            state: RunState::Pending,
        }
    }

    pub fn name(&self) -> &str {
        self.command.program().unwrap_or_default()
    }

    pub fn start(&mut self) -> Result<(), ShellError> {
        if self.command.is_empty() {
            self.state = RunState::Skipped;
            return Ok(());
        }

        debug!("启动命令: {}", shell_words::join(&self.command.argv));
        match BUILTINS.get(self.name()) {
            Some(builtin) => self.start_builtin(builtin),
            None => self.start_external(),
        }
    }

    pub fn wait(&mut self) -> Result<(), ShellError> {
        let state = std::mem::replace(&mut self.state, RunState::Finished);
        let name = self.name().to_string();

        match state {
            RunState::Pending | RunState::Skipped | RunState::Finished => Ok(()),
            RunState::External(mut child) => {
                let status = child.wait().map_err(|e| ShellError::io(&name, e))?;
                debug!("外部命令结束: {} {}", name, status);
                if status.success() {
                    Ok(())
                } else {
                    let code = status
                        .code()
                        .or_else(|| status.signal().map(|sig| 128 + sig))
                        .unwrap_or(1);
                    Err(ShellError::Exited { name, code })
                }
            }
            RunState::Builtin(handle) => match handle.join() {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!("内建命令 {} 异常终止: {}", name, message);
                    Err(ShellError::BuiltinFault { name, message })
                }
            },
        }
    }

    /// 重定向优先于管道/默认流；打开的文件在本阶段启动后即关闭
    fn open_outputs(&self) -> Result<(Option<StreamHandle>, Option<StreamHandle>), ShellError> {
        Ok((
            open_redirect(self.name(), &self.command.stdout)?,
            open_redirect(self.name(), &self.command.stderr)?,
        ))
    }

    fn start_builtin(&mut self, builtin: BuiltinFn) -> Result<(), ShellError> {
        let name = self.name().to_string();
        let (stdout_file, stderr_file) = self.open_outputs()?;

        let io_err = |e| ShellError::io(&name, e);
        let stdout = stdout_file.as_ref().unwrap_or(&self.stdout).writer().map_err(io_err)?;
        let stderr = stderr_file.as_ref().unwrap_or(&self.stderr).writer().map_err(io_err)?;

        let mut ctx = BuiltinContext {
            name: name.clone(),
            args: self.command.arguments().to_vec(),
            stdout,
            stderr,
            history: self.history.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("builtin-{}", name))
            .spawn(move || builtin(&mut ctx))
            .map_err(|source| ShellError::Spawn {
                name: name.clone(),
                source,
            })?;

        self.state = RunState::Builtin(handle);
        Ok(())
    }

    fn start_external(&mut self) -> Result<(), ShellError> {
        let name = self.name().to_string();
        let (stdout_file, stderr_file) = self.open_outputs()?;
        let io_err = |e| ShellError::io(&name, e);

        // 找不到命令不算失败，提示写到该命令自己的 stdout
        let Some(path) = find_file_in_path(&name) else {
            debug!("找不到命令: {}", name);
            let mut out = stdout_file
                .as_ref()
                .unwrap_or(&self.stdout)
                .writer()
                .map_err(io_err)?;
            writeln!(out, "{}: command not found", name)
                .and_then(|_| out.flush())
                .map_err(io_err)?;
            self.state = RunState::Skipped;
            return Ok(());
        };

        let mut cmd = process::Command::new(&path);
        cmd.arg0(&name)
            .args(self.command.arguments())
            .stdin(self.stdin.to_stdio().map_err(io_err)?)
            .stdout(
                stdout_file
                    .as_ref()
                    .unwrap_or(&self.stdout)
                    .to_stdio()
                    .map_err(io_err)?,
            )
            .stderr(
                stderr_file
                    .as_ref()
                    .unwrap_or(&self.stderr)
                    .to_stdio()
                    .map_err(io_err)?,
            );

        let child = cmd.spawn().map_err(|source| ShellError::Spawn {
            name: name.clone(),
            source,
        })?;
        debug!("外部命令已启动: {} pid={}", path.display(), child.id());
        self.state = RunState::External(child);
        Ok(())
    }
}

impl Runnable for Stage {
    fn start(&mut self) -> Result<(), ShellError> {
        Stage::start(self)
    }

    fn wait(&mut self) -> Result<(), ShellError> {
        Stage::wait(self)
    }

    fn redirects_stdout(&self) -> bool {
        self.command.stdout.is_set()
    }

    fn wire_stdin(&mut self, handle: StreamHandle) {
        self.stdin = handle;
    }

    fn wire_stdout(&mut self, handle: StreamHandle) {
        self.stdout = handle;
    }

    fn close_stdin(&mut self) {
        self.stdin.close(StdStream::Stdin);
    }

    fn close_stdout(&mut self) {
        self.stdout.close(StdStream::Stdout);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
