use std::env;
use std::fs::{read_dir, DirEntry, Metadata};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, error};

/// Windows 上按扩展名判断是否可执行
#[cfg_attr(unix, allow(dead_code))]
const WINDOWS_EXEC_EXTS: [&str; 5] = ["exe", "bat", "cmd", "com", "ps1"];

fn path_dirs() -> Vec<PathBuf> {
    match env::var_os("PATH") {
        Some(paths) => env::split_paths(&paths)
            .map(|p| {
                // 空的 PATH 项按惯例表示当前目录
                if p.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    p
                }
            })
            .collect(),
        None => {
            error!("kosh: env PATH is not set");
            Vec::new()
        }
    }
}

/// 在 PATH 中查找名字匹配且当前用户有执行权限的文件，
/// 返回第一个命中的绝对路径
pub fn find_file_in_path(filename: &str) -> Option<PathBuf> {
    if filename.is_empty() {
        return None;
    }

    // 带路径分隔符的名字直接按路径检查，不搜索 PATH
    if filename.contains('/') || filename.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(filename);
        return is_executable_path(&path).then_some(path);
    }

    for dir in path_dirs() {
        let list = match read_dir(&dir) {
            Ok(list) => list,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    debug!("kosh: read_dir error: {}: {}", dir.display(), e);
                }
                continue;
            }
        };

        for entry in list.flatten() {
            if entry.file_name() != filename {
                continue;
            }
            if is_executable_entry(&entry) {
                return Some(entry.path());
            }
        }
    }
    None
}

/// 列出 PATH 中所有可执行文件的文件名，供补全使用
pub fn list_executables() -> Vec<String> {
    let mut names = Vec::new();
    for dir in path_dirs() {
        let Ok(list) = read_dir(&dir) else {
            continue;
        };
        for entry in list.flatten() {
            if !is_executable_entry(&entry) {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
    }
    names.sort();
    names.dedup();
    names
}

fn is_executable_entry(entry: &DirEntry) -> bool {
    is_executable_path(&entry.path())
}

fn is_executable_path(path: &Path) -> bool {
    // 跟随符号链接，/usr/bin 下有不少链接
    match path.metadata() {
        Ok(meta) => meta.is_file() && has_execute_permission(path, &meta),
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                debug!("kosh: metadata error: {}: {}", path.display(), e);
            }
            false
        }
    }
}

#[cfg(unix)]
fn has_execute_permission(_path: &Path, meta: &Metadata) -> bool {
    use nix::unistd::{getegid, geteuid};
    use std::os::unix::fs::MetadataExt;

    mode_allows_exec(
        meta.mode(),
        meta.uid() == geteuid().as_raw(),
        meta.gid() == getegid().as_raw(),
    )
}

#[cfg(not(unix))]
fn has_execute_permission(path: &Path, _meta: &Metadata) -> bool {
    has_windows_exec_extension(path)
}

/// 依次检查 owner、group、other 的执行位
#[cfg_attr(not(unix), allow(dead_code))]
fn mode_allows_exec(mode: u32, is_owner: bool, in_group: bool) -> bool {
    if is_owner && mode & 0o100 != 0 {
        true
    } else if in_group && mode & 0o010 != 0 {
        true
    } else {
        mode & 0o001 != 0
    }
}

#[cfg_attr(unix, allow(dead_code))]
fn has_windows_exec_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            WINDOWS_EXEC_EXTS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}
