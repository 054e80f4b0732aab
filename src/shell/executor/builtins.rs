use std::collections::HashMap;
use std::env;
use std::io::Write;
use std::path::Path;

use log::debug;
use once_cell::sync::Lazy;

use super::error::ShellError;
use crate::shell::history::SharedHistory;
use crate::utils::path::find_file_in_path;

pub type BuiltinFn = fn(&mut BuiltinContext) -> Result<(), ShellError>;

/// 内建命令运行时拿到的全部东西，输出流已经按重定向/管道解析好
pub struct BuiltinContext {
    pub name: String,
    pub args: Vec<String>,
    pub stdout: Box<dyn Write + Send>,
    pub stderr: Box<dyn Write + Send>,
    pub history: SharedHistory,
}

impl BuiltinContext {
    fn out(&mut self, text: &str) -> Result<(), ShellError> {
        self.stdout
            .write_all(text.as_bytes())
            .and_then(|_| self.stdout.flush())
            .map_err(|e| ShellError::io(&self.name, e))
    }

    fn err(&mut self, text: &str) -> Result<(), ShellError> {
        self.stderr
            .write_all(text.as_bytes())
            .and_then(|_| self.stderr.flush())
            .map_err(|e| ShellError::io(&self.name, e))
    }

    /// 错误信息已写到 stderr，返回一个静默的失败
    fn fail(&mut self, message: &str, code: i32) -> Result<(), ShellError> {
        self.err(message)?;
        Err(ShellError::Exited {
            name: self.name.clone(),
            code,
        })
    }
}

/// 内建命令表，初始化后只读
pub struct BuiltinRegistry {
    builtins: HashMap<&'static str, BuiltinFn>,
}

impl BuiltinRegistry {
    fn new() -> Self {
        let mut builtins: HashMap<&'static str, BuiltinFn> = HashMap::new();
        builtins.insert("pwd", builtin_pwd);
        builtins.insert("cd", builtin_cd);
        builtins.insert("exit", builtin_exit);
        builtins.insert("echo", builtin_echo);
        builtins.insert("type", builtin_type);
        builtins.insert("history", builtin_history);
        Self { builtins }
    }

    pub fn get(&self, name: &str) -> Option<BuiltinFn> {
        self.builtins.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.builtins.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

pub static BUILTINS: Lazy<BuiltinRegistry> = Lazy::new(BuiltinRegistry::new);

fn builtin_pwd(ctx: &mut BuiltinContext) -> Result<(), ShellError> {
    let dir = env::current_dir().map_err(|e| ShellError::io("pwd", e))?;
    ctx.out(&format!("{}\n", dir.display()))
}

fn builtin_cd(ctx: &mut BuiltinContext) -> Result<(), ShellError> {
    let path = ctx.args.first().map(String::as_str).unwrap_or("~");
    let path = shellexpand::tilde(path).to_string();

    match env::set_current_dir(Path::new(&path)) {
        Ok(_) => {
            debug!("切换目录: {}", path);
            Ok(())
        }
        Err(e) => {
            debug!("cd 失败: {}: {}", path, e);
            ctx.fail(&format!("cd: {}: No such file or directory\n", path), 1)
        }
    }
}

fn builtin_exit(ctx: &mut BuiltinContext) -> Result<(), ShellError> {
    let code = match ctx.args.first().cloned() {
        None => 0,
        Some(arg) => match arg.parse::<i32>() {
            Ok(code) => code,
            Err(_) => {
                ctx.err(&format!("exit: {}: numeric argument required\n", arg))?;
                2
            }
        },
    };
    Err(ShellError::ExitRequested(code))
}

fn builtin_echo(ctx: &mut BuiltinContext) -> Result<(), ShellError> {
    let line = format!("{}\n", ctx.args.join(" "));
    ctx.out(&line)
}

fn builtin_type(ctx: &mut BuiltinContext) -> Result<(), ShellError> {
    let mut missing = false;
    let mut report = String::new();

    for name in &ctx.args {
        if BUILTINS.contains(name) {
            report.push_str(&format!("{} is a shell builtin\n", name));
        } else if let Some(path) = find_file_in_path(name) {
            report.push_str(&format!("{} is {}\n", name, path.display()));
        } else {
            report.push_str(&format!("{}: not found\n", name));
            missing = true;
        }
    }

    ctx.out(&report)?;
    if missing {
        Err(ShellError::Exited {
            name: ctx.name.clone(),
            code: 1,
        })
    } else {
        Ok(())
    }
}

fn builtin_history(ctx: &mut BuiltinContext) -> Result<(), ShellError> {
    let args = ctx.args.clone();
    match args.first().map(String::as_str) {
        None => {
            let text = ctx.history.lock().render(None);
            ctx.out(&text)
        }
        Some(option @ ("-r" | "-w" | "-a")) => {
            let Some(file) = args.get(1) else {
                return ctx.fail(
                    &format!("history: {}: option requires an argument\n", option),
                    2,
                );
            };
            let path = Path::new(file);
            let result = {
                let mut history = ctx.history.lock();
                match option {
                    "-r" => history.read_from(path).map(|_| ()),
                    "-w" => history.write_to(path),
                    _ => history.append_to(path),
                }
            };
            match result {
                Ok(_) => Ok(()),
                Err(e) => ctx.fail(&format!("history: {}: {}\n", file, e), 1),
            }
        }
        Some(arg) => match arg.parse::<usize>() {
            Ok(n) => {
                let text = ctx.history.lock().render(Some(n));
                ctx.out(&text)
            }
            Err(_) => ctx.fail(
                &format!("history: {}: numeric argument required\n", arg),
                2,
            ),
        },
    }
}
