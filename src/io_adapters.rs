use crate::command::OutputStream;
use crate::parser::{RedirectMode, RedirectTarget};
use std::cell::RefCell;
use std::fs::{self, File, OpenOptions};
use std::io::{Result as IoResult, Write};
use std::path::Path;
use std::process::Stdio;
use std::rc::Rc;

/// Memory-backed writer for capturing output of a command.
///
/// Cloning shares the buffer, so a caller can keep one handle and give the
/// other to the interpreter. External commands writing to a `MemWriter` get
/// their output piped back into it.
#[derive(Debug, Clone, Default)]
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: create writer and return (writer, rc_handle).
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let mw = MemWriter::new();
        let rc = mw.buf.clone();
        (mw, rc)
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.borrow()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.buf.borrow_mut().clear();
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl OutputStream for MemWriter {
    fn stdio(&mut self) -> IoResult<Option<Stdio>> {
        Ok(None)
    }
}

/// Open a redirection target, relative paths resolved against `cwd`.
///
/// Missing parent directories are created.
pub(crate) fn open_redirect(target: &RedirectTarget, cwd: &Path) -> IoResult<File> {
    let path = cwd.join(&target.path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut options = OpenOptions::new();
    options.create(true);
    match target.mode {
        RedirectMode::Truncate => options.write(true).truncate(true),
        RedirectMode::Append => options.append(true),
    };
    options.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_writer_clones_share_the_buffer() {
        let (mut writer, handle) = MemWriter::with_handle();
        let observer = writer.clone();
        write!(writer, "hello ").unwrap();
        writer.write_all(b"world").unwrap();
        assert_eq!(observer.contents(), "hello world");
        assert_eq!(handle.borrow().as_slice(), b"hello world");
        observer.clear();
        assert!(writer.is_empty());
    }

    #[test]
    fn mem_writer_cannot_be_handed_to_a_child() {
        assert!(MemWriter::new().stdio().unwrap().is_none());
    }

    #[test]
    fn truncate_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let truncate = RedirectTarget::new("out.txt", RedirectMode::Truncate);
        let append = RedirectTarget::new("out.txt", RedirectMode::Append);

        open_redirect(&truncate, dir.path()).unwrap().write_all(b"one\n").unwrap();
        open_redirect(&append, dir.path()).unwrap().write_all(b"two\n").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "one\ntwo\n");

        open_redirect(&truncate, dir.path()).unwrap().write_all(b"three\n").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "three\n");
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = RedirectTarget::new("a/b/c.log", RedirectMode::Append);
        open_redirect(&target, dir.path()).unwrap();
        assert!(dir.path().join("a/b/c.log").is_file());
    }

    #[test]
    fn absolute_target_ignores_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abs.txt");
        let target = RedirectTarget::new(&path, RedirectMode::Truncate);
        open_redirect(&target, Path::new("/definitely/not/here")).unwrap();
        assert!(path.is_file());
    }
}
