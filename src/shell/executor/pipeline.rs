use log::{debug, error, warn};

use super::command::Stage;
use super::error::ShellError;
use super::handle::{open_pipe, StreamHandle};
use crate::shell::history::SharedHistory;
use crate::shell::parser::Command;

/// 管道驱动眼中的一个阶段
pub trait Runnable {
    fn start(&mut self) -> Result<(), ShellError>;
    fn wait(&mut self) -> Result<(), ShellError>;
    fn redirects_stdout(&self) -> bool;
    fn wire_stdin(&mut self, handle: StreamHandle);
    fn wire_stdout(&mut self, handle: StreamHandle);
    fn close_stdin(&mut self);
    fn close_stdout(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit(i32),
}

pub fn build_stages(commands: Vec<Command>, history: &SharedHistory) -> Vec<Stage> {
    commands
        .into_iter()
        .map(|command| Stage::new(command, history.clone()))
        .collect()
}

/// 运行一条管道。
///
/// 相邻阶段之间各分配一个管道；倒序启动（下游先于上游），
/// 正序等待，每个阶段 wait 返回后再关闭它持有的管道端点。
/// 某个阶段 wait 失败时直接跳出等待循环，之后阶段的端点不会在这里显式关闭，
/// 只在阶段被丢弃时随之释放。
pub fn run<R: Runnable>(stages: &mut [R], style: &dyn Fn(String) -> String) -> Flow {
    if stages.is_empty() {
        return Flow::Continue;
    }

    if let Err(err) = wire(stages) {
        report(&err, style);
        return Flow::Continue;
    }

    let last = stages.len() - 1;
    for (i, stage) in stages.iter_mut().enumerate().rev() {
        if let Err(err) = stage.start() {
            debug!("阶段 {} 启动失败，放弃启动剩余阶段", i);
            report(&err, style);
            break;
        }
    }

    for (i, stage) in stages.iter_mut().enumerate() {
        if let Err(err) = stage.wait() {
            if let ShellError::ExitRequested(code) = err {
                debug!("收到 exit 请求: {}", code);
                return Flow::Exit(code);
            }
            report(&err, style);
            break;
        }
        if i > 0 {
            stage.close_stdin();
        }
        if i < last {
            stage.close_stdout();
        }
    }

    Flow::Continue
}

fn wire<R: Runnable>(stages: &mut [R]) -> Result<(), ShellError> {
    for i in 1..stages.len() {
        let (reader, writer) = open_pipe()?;
        if stages[i - 1].redirects_stdout() {
            // 显式重定向优先，写端直接关闭，下游立即读到 EOF
            debug!("阶段 {} 已重定向 stdout，不接管道写端", i - 1);
            drop(writer);
        } else {
            stages[i - 1].wire_stdout(writer);
        }
        stages[i].wire_stdin(reader);
    }
    Ok(())
}

/// 打印并记录一次失败，`style` 是当前主题的错误样式；静默错误只写 debug 日志
pub fn report(err: &ShellError, style: &dyn Fn(String) -> String) {
    if err.is_silent() {
        debug!("{}", err);
        return;
    }
    match err {
        ShellError::BuiltinFault { .. } | ShellError::Pipe(_) => error!("{}", err),
        _ => warn!("{}", err),
    }
    eprintln!("{}", style(err.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::parser::Parser;
    use std::cell::RefCell;
    use std::io::{Read, Write};
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn plain(message: String) -> String {
        message
    }

    /// 记录驱动调用顺序的假阶段
    struct Recorder {
        name: &'static str,
        log: Log,
        redirected: bool,
        fail_start: bool,
        wait_result: Option<ShellError>,
        stdin: Option<StreamHandle>,
        stdout: Option<StreamHandle>,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: log.clone(),
                redirected: false,
                fail_start: false,
                wait_result: None,
                stdin: None,
                stdout: None,
            }
        }

        fn record(&self, event: &str) {
            self.log.borrow_mut().push(format!("{} {}", event, self.name));
        }
    }

    impl Runnable for Recorder {
        fn start(&mut self) -> Result<(), ShellError> {
            self.record("start");
            if self.fail_start {
                return Err(ShellError::Spawn {
                    name: self.name.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                });
            }
            Ok(())
        }

        fn wait(&mut self) -> Result<(), ShellError> {
            self.record("wait");
            match self.wait_result.take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        fn redirects_stdout(&self) -> bool {
            self.redirected
        }

        fn wire_stdin(&mut self, handle: StreamHandle) {
            self.stdin = Some(handle);
        }

        fn wire_stdout(&mut self, handle: StreamHandle) {
            self.stdout = Some(handle);
        }

        fn close_stdin(&mut self) {
            self.record("close_stdin");
            self.stdin = None;
        }

        fn close_stdout(&mut self) {
            self.record("close_stdout");
            self.stdout = None;
        }
    }

    fn recorders(names: &[&'static str], log: &Log) -> Vec<Recorder> {
        names.iter().map(|&name| Recorder::new(name, log)).collect()
    }

    fn events(log: &Log) -> Vec<String> {
        log.borrow().clone()
    }

    #[test]
    fn test_start_reverse_wait_forward() {
        let log = Log::default();
        let mut stages = recorders(&["cmd1", "cmd2", "cmd3"], &log);
        assert_eq!(run(&mut stages, &plain), Flow::Continue);
        assert_eq!(
            events(&log),
            vec![
                "start cmd3",
                "start cmd2",
                "start cmd1",
                "wait cmd1",
                "close_stdout cmd1",
                "wait cmd2",
                "close_stdin cmd2",
                "close_stdout cmd2",
                "wait cmd3",
                "close_stdin cmd3",
            ]
        );
    }

    #[test]
    fn test_single_stage_closes_nothing() {
        let log = Log::default();
        let mut stages = recorders(&["only"], &log);
        run(&mut stages, &plain);
        assert_eq!(events(&log), vec!["start only", "wait only"]);
        assert!(stages[0].stdin.is_none());
        assert!(stages[0].stdout.is_none());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_wiring_connects_neighbours() {
        let log = Log::default();
        let mut stages = recorders(&["a", "b", "c", "d"], &log);
        wire(&mut stages).unwrap();

        // N 个阶段恰好 N-1 个管道
        let writers = stages.iter().filter(|s| s.stdout.is_some()).count();
        let readers = stages.iter().filter(|s| s.stdin.is_some()).count();
        assert_eq!(writers, 3);
        assert_eq!(readers, 3);
        assert!(stages[0].stdin.is_none());
        assert!(stages[3].stdout.is_none());

        for i in 0..3 {
            let Some(StreamHandle::PipeEnd(mut w)) = stages[i].stdout.take() else {
                panic!("stage {} stdout is not a pipe end", i);
            };
            let Some(StreamHandle::PipeEnd(mut r)) = stages[i + 1].stdin.take() else {
                panic!("stage {} stdin is not a pipe end", i + 1);
            };
            write!(w, "pipe {}", i).unwrap();
            drop(w);
            let mut buf = String::new();
            r.read_to_string(&mut buf).unwrap();
            assert_eq!(buf, format!("pipe {}", i));
        }
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_redirected_stage_gets_no_pipe_writer() {
        let log = Log::default();
        let mut stages = recorders(&["a", "b"], &log);
        stages[0].redirected = true;
        wire(&mut stages).unwrap();
        assert!(stages[0].stdout.is_none());

        let Some(StreamHandle::PipeEnd(mut r)) = stages[1].stdin.take() else {
            panic!("stage 1 stdin is not a pipe end");
        };
        let mut buf = Vec::new();
        r.read_to_end(&mut buf).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_start_failure_stops_remaining_starts() {
        let log = Log::default();
        let mut stages = recorders(&["cmd1", "cmd2", "cmd3"], &log);
        stages[1].fail_start = true;
        assert_eq!(run(&mut stages, &plain), Flow::Continue);
        let events = events(&log);
        assert!(!events.contains(&"start cmd1".to_string()));
        // 已启动的阶段照常等待
        assert!(events.contains(&"wait cmd3".to_string()));
        assert!(events.contains(&"wait cmd1".to_string()));
    }

    #[test]
    fn test_errors_are_printed_in_given_style() {
        let log = Log::default();
        let styled = RefCell::new(Vec::new());
        let style = |message: String| {
            styled.borrow_mut().push(message.clone());
            format!("<{}>", message)
        };

        let mut stages = recorders(&["cmd1", "cmd2"], &log);
        stages[1].fail_start = true;
        run(&mut stages, &style);
        assert_eq!(*styled.borrow(), vec!["cmd2: denied".to_string()]);

        // 非零退出不再额外打印
        let mut stages = recorders(&["cmd1"], &log);
        stages[0].wait_result = Some(ShellError::Exited {
            name: "cmd1".to_string(),
            code: 1,
        });
        run(&mut stages, &style);
        assert_eq!(styled.borrow().len(), 1);
    }

    #[test]
    fn test_wait_failure_leaves_later_stages_unclosed() {
        let log = Log::default();
        let mut stages = recorders(&["cmd1", "cmd2", "cmd3"], &log);
        stages[0].wait_result = Some(ShellError::Exited {
            name: "cmd1".to_string(),
            code: 1,
        });
        run(&mut stages, &plain);
        let events = events(&log);
        assert!(events.contains(&"wait cmd1".to_string()));
        assert!(!events.contains(&"wait cmd2".to_string()));
        // 已知缺口：失败点之后的阶段不会被显式关闭
        assert!(!events.iter().any(|e| e.starts_with("close_")));
        assert!(stages[1].stdin.is_some());
        assert!(stages[2].stdin.is_some());
    }

    #[test]
    fn test_exit_request_ends_session() {
        let log = Log::default();
        let mut stages = recorders(&["exit", "cat"], &log);
        stages[0].wait_result = Some(ShellError::ExitRequested(7));
        assert_eq!(run(&mut stages, &plain), Flow::Exit(7));
    }

    fn temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("kosh_pipeline_{}_{}.txt", tag, std::process::id()))
    }

    fn run_line(line: &str) -> Flow {
        let commands = Parser::from_line(line).parse_pipeline();
        let mut stages = build_stages(commands, &SharedHistory::default());
        run(&mut stages, &plain)
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_builtin_into_external() {
        let path = temp_path("echo_cat");
        let flow = run_line(&format!("echo hello world | cat > {}", path.display()));
        assert_eq!(flow, Flow::Continue);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello world\n");
        std::fs::remove_file(&path).unwrap();
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_three_external_stages() {
        let path = temp_path("three");
        let line = format!(
            "sh -c 'echo one; echo two; echo three' | cat | wc -l > {}",
            path.display()
        );
        run_line(&line);
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "3");
        std::fs::remove_file(&path).unwrap();
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_redirect_beats_pipe() {
        let out = temp_path("beats_out");
        let piped = temp_path("beats_piped");
        let line = format!(
            "echo direct > {} | cat > {}",
            out.display(),
            piped.display()
        );
        run_line(&line);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "direct\n");
        assert_eq!(std::fs::read_to_string(&piped).unwrap(), "");
        std::fs::remove_file(&out).unwrap();
        std::fs::remove_file(&piped).unwrap();
    }

    #[test]
    fn test_exit_in_pipeline() {
        assert_eq!(run_line("exit 5"), Flow::Exit(5));
        assert_eq!(run_line("echo hi > /dev/null"), Flow::Continue);
    }
}
