use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::process::Stdio;

use log::{debug, trace};
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::unistd::pipe;

use super::error::ShellError;
use crate::shell::parser::{Redirect, RedirectMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdin,
    Stdout,
    Stderr,
}

/// 带来源标记的文件句柄。
///
/// `Default` 是进程本身的标准流，谁都不会关闭它；
/// `PipeEnd` 只由管道驱动在 wait 之后关闭；
/// `RedirectOpened` 归打开它的命令所有，用完即关。
#[derive(Debug)]
pub enum StreamHandle {
    Default(StdStream),
    PipeEnd(File),
    RedirectOpened(File),
}

impl StreamHandle {
    #[cfg(test)]
    pub fn is_default(&self) -> bool {
        matches!(self, StreamHandle::Default(_))
    }

    #[cfg(test)]
    pub fn is_pipe_end(&self) -> bool {
        matches!(self, StreamHandle::PipeEnd(_))
    }

    /// 为子进程准备一个 Stdio，管道端点给的是 dup 出来的副本，
    /// 原件仍留在句柄里等待驱动关闭
    pub fn to_stdio(&self) -> io::Result<Stdio> {
        match self {
            StreamHandle::Default(_) => Ok(Stdio::inherit()),
            StreamHandle::PipeEnd(file) | StreamHandle::RedirectOpened(file) => {
                Ok(Stdio::from(file.try_clone()?))
            }
        }
    }

    /// 给内建命令写输出用
    pub fn writer(&self) -> io::Result<Box<dyn Write + Send>> {
        match self {
            StreamHandle::Default(StdStream::Stderr) => Ok(Box::new(io::stderr())),
            StreamHandle::Default(_) => Ok(Box::new(io::stdout())),
            StreamHandle::PipeEnd(file) | StreamHandle::RedirectOpened(file) => {
                Ok(Box::new(file.try_clone()?))
            }
        }
    }

    /// 关闭句柄并恢复成默认流；默认流本身不会被关闭，
    /// 所以重复调用是安全的
    pub fn close(&mut self, stream: StdStream) {
        let old = std::mem::replace(self, StreamHandle::Default(stream));
        match old {
            StreamHandle::Default(_) => {}
            StreamHandle::PipeEnd(file) | StreamHandle::RedirectOpened(file) => {
                trace!("关闭 {:?} fd={}", stream, file.as_raw_fd());
                drop(file);
            }
        }
    }
}

pub fn open_redirect(name: &str, redirect: &Redirect) -> Result<Option<StreamHandle>, ShellError> {
    let mut options = OpenOptions::new();
    match redirect.mode {
        RedirectMode::None => return Ok(None),
        RedirectMode::Truncate => options.write(true).create(true).truncate(true),
        RedirectMode::Append => options.append(true).create(true),
    };

    debug!("打开重定向文件: {} ({:?})", redirect.target, redirect.mode);
    options
        .open(&redirect.target)
        .map(|file| Some(StreamHandle::RedirectOpened(file)))
        .map_err(|source| ShellError::RedirectOpen {
            name: name.to_string(),
            path: redirect.target.clone(),
            source,
        })
}

/// 创建一对管道端点 (读端, 写端)，都设置 close-on-exec，
/// 避免先启动的下游进程继承到上游的写端
pub fn open_pipe() -> Result<(StreamHandle, StreamHandle), ShellError> {
    let (reader, writer) = pipe()?;
    for fd in [&reader, &writer] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((
        StreamHandle::PipeEnd(File::from(reader)),
        StreamHandle::PipeEnd(File::from(writer)),
    ))
}
