//! Purpose: Encode multipart/form-data bodies for the upload endpoints.
//! Exports: `MultipartForm`, `MultipartReader`, `ProgressFn`.
//! Role: Streaming wire formatting; file parts read from disk, never buffered whole.
//! Invariants: `content_length` matches the streamed byte count exactly.
//! Invariants: Files must not change size between form construction and upload.

use crate::core::error::{Error, ErrorKind};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

pub type ProgressFn = Box<dyn FnMut(u64, u64) + Send>;

#[derive(Debug)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

#[derive(Debug)]
struct Part {
    header: Vec<u8>,
    body: Body,
}

#[derive(Debug)]
enum Body {
    Text(Vec<u8>),
    File { path: PathBuf, len: u64 },
}

impl MultipartForm {
    pub fn new() -> Result<Self, Error> {
        let mut seed = [0u8; 16];
        getrandom::fill(&mut seed).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to generate multipart boundary")
                .with_source(err)
        })?;
        let mut boundary = String::with_capacity(5 + seed.len() * 2);
        boundary.push_str("yuyu-");
        for byte in seed {
            use std::fmt::Write;
            let _ = write!(boundary, "{byte:02x}");
        }
        Ok(Self {
            boundary,
            parts: Vec::new(),
        })
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        let header = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
            self.boundary,
            sanitize(name)
        );
        self.parts.push(Part {
            header: header.into_bytes(),
            body: Body::Text(value.as_bytes().to_vec()),
        });
        self
    }

    pub fn file(mut self, name: &str, path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let metadata = std::fs::metadata(&path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read upload file")
                .with_source(err)
        })?;
        if !metadata.is_file() {
            return Err(Error::new(ErrorKind::Usage).with_message("upload path is not a file"));
        }
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        let header = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            self.boundary,
            sanitize(name),
            sanitize(&filename),
            content_type_for(&path),
        );
        self.parts.push(Part {
            header: header.into_bytes(),
            body: Body::File {
                path,
                len: metadata.len(),
            },
        });
        Ok(self)
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn content_length(&self) -> u64 {
        let parts: u64 = self
            .parts
            .iter()
            .map(|part| {
                let body_len = match &part.body {
                    Body::Text(bytes) => bytes.len() as u64,
                    Body::File { len, .. } => *len,
                };
                part.header.len() as u64 + body_len + 2
            })
            .sum();
        parts + self.closing().len() as u64
    }

    pub fn into_reader(self, progress: Option<ProgressFn>) -> MultipartReader {
        let total = self.content_length();
        let closing = self.closing();
        let mut chunks = VecDeque::new();
        for part in self.parts {
            chunks.push_back(Chunk::Bytes(Cursor::new(part.header)));
            match part.body {
                Body::Text(bytes) => chunks.push_back(Chunk::Bytes(Cursor::new(bytes))),
                Body::File { path, len } => chunks.push_back(Chunk::Pending { path, len }),
            }
            chunks.push_back(Chunk::Bytes(Cursor::new(b"\r\n".to_vec())));
        }
        chunks.push_back(Chunk::Bytes(Cursor::new(closing)));
        MultipartReader {
            chunks,
            sent: 0,
            total,
            progress,
        }
    }

    fn closing(&self) -> Vec<u8> {
        format!("--{}--\r\n", self.boundary).into_bytes()
    }
}

pub struct MultipartReader {
    chunks: VecDeque<Chunk>,
    sent: u64,
    total: u64,
    progress: Option<ProgressFn>,
}

enum Chunk {
    Bytes(Cursor<Vec<u8>>),
    /// A file part not yet reached; opened on first read so errors surface
    /// at send time and no handle is held longer than needed.
    Pending { path: PathBuf, len: u64 },
    Streaming(io::Take<File>),
}

impl Chunk {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Chunk::Pending { path, len } = self {
            let file = File::open(&*path)?;
            *self = Chunk::Streaming(file.take(*len));
        }
        match self {
            Chunk::Bytes(cursor) => cursor.read(buf),
            Chunk::Streaming(reader) => reader.read(buf),
            Chunk::Pending { .. } => Ok(0),
        }
    }
}

impl Read for MultipartReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let Some(chunk) = self.chunks.front_mut() else {
                return Ok(0);
            };
            let read = chunk.read(buf)?;
            if read == 0 {
                self.chunks.pop_front();
                continue;
            }
            self.sent += read as u64;
            if let Some(progress) = &mut self.progress {
                progress(self.sent, self.total);
            }
            return Ok(read);
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|ch| *ch != '"' && *ch != '\\' && !ch.is_control())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::MultipartForm;
    use std::io::Read;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    fn temp_file(contents: &[u8], name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(contents).expect("write");
        (dir, path)
    }

    #[test]
    fn body_length_matches_declared_content_length() {
        let (_dir, video) = temp_file(b"not really a video", "clip.mp4");
        let form = MultipartForm::new()
            .expect("form")
            .text("title", "first catch")
            .file("file", &video)
            .expect("file part");

        let declared = form.content_length();
        let mut body = Vec::new();
        form.into_reader(None)
            .read_to_end(&mut body)
            .expect("read body");
        assert_eq!(body.len() as u64, declared);
    }

    #[test]
    fn body_contains_headers_and_file_bytes() {
        let (_dir, cover) = temp_file(b"PNGDATA", "cover.png");
        let form = MultipartForm::new()
            .expect("form")
            .text("description", "a fish")
            .file("cover", &cover)
            .expect("file part");
        let boundary = form.content_type();
        assert!(boundary.starts_with("multipart/form-data; boundary=yuyu-"));

        let mut body = Vec::new();
        form.into_reader(None)
            .read_to_end(&mut body)
            .expect("read body");
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("Content-Disposition: form-data; name=\"description\""));
        assert!(text.contains("name=\"cover\"; filename=\"cover.png\""));
        assert!(text.contains("Content-Type: image/png"));
        assert!(text.contains("PNGDATA"));
        assert!(text.ends_with("--\r\n"));
    }

    #[test]
    fn progress_reports_monotonic_bytes_up_to_total() {
        let (_dir, video) = temp_file(&[7u8; 4096], "clip.webm");
        let form = MultipartForm::new()
            .expect("form")
            .file("file", &video)
            .expect("file part");
        let total = form.content_length();

        let seen: Arc<Mutex<Vec<(u64, u64)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut reader = form.into_reader(Some(Box::new(move |sent, total| {
            sink.lock().expect("lock").push((sent, total));
        })));
        let mut body = Vec::new();
        reader.read_to_end(&mut body).expect("read body");

        let reports = seen.lock().expect("lock");
        assert!(!reports.is_empty());
        let mut last = 0;
        for (sent, reported_total) in reports.iter() {
            assert!(*sent >= last);
            assert_eq!(*reported_total, total);
            last = *sent;
        }
        assert_eq!(last, total);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = MultipartForm::new()
            .expect("form")
            .file("file", "/does/not/exist.mp4")
            .expect_err("err");
        assert_eq!(err.kind(), crate::core::error::ErrorKind::Io);
    }
}
