use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};

/// 会话历史，只追加不删除。磁盘格式为每行一条。
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<String>,
    // 上次 -a / -r / 加载后的位置，之后的条目还没有追加到文件
    appended: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 读取文件中的历史并追加，空行跳过
    pub fn read_from(&mut self, path: &Path) -> io::Result<usize> {
        let reader = BufReader::new(File::open(path)?);
        let mut count = 0;
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.entries.push(line.to_string());
            count += 1;
        }
        self.appended = self.entries.len();
        debug!("从 {} 读取 {} 条历史", path.display(), count);
        Ok(count)
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        let mut file = File::create(path)?;
        for line in &self.entries {
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }

    pub fn append_to(&mut self, path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for line in &self.entries[self.appended.min(self.entries.len())..] {
            writeln!(file, "{}", line)?;
        }
        self.appended = self.entries.len();
        Ok(())
    }

    /// `    <序号>  <内容>` 格式，序号从 1 开始；`last` 限制只输出最后几条
    pub fn render(&self, last: Option<usize>) -> String {
        let skip = last
            .map(|n| self.entries.len().saturating_sub(n))
            .unwrap_or(0);
        self.entries
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(i, line)| format!("    {}  {}\n", i + 1, line))
            .collect()
    }
}

/// 在 REPL 和内建命令线程之间共享的历史
#[derive(Debug, Clone, Default)]
pub struct SharedHistory(Arc<Mutex<History>>);

impl SharedHistory {
    pub fn new(history: History) -> Self {
        Self(Arc::new(Mutex::new(history)))
    }

    pub fn lock(&self) -> MutexGuard<'_, History> {
        // 持锁线程 panic 后数据仍然可用
        self.0.lock().unwrap_or_else(|poisoned| {
            warn!("history lock poisoned");
            poisoned.into_inner()
        })
    }
}
