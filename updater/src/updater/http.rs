use curl::easy::{Easy2, Handler, WriteError};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::io::Write;
use std::time::Duration;

const USER_AGENT: &str = concat!("duploader-updater/", env!("CARGO_PKG_VERSION"));

pub trait Progress {
    /// Return false to abort the transfer.
    fn progress(&self, _dltotal: f64, _dlnow: f64) -> bool {
        true
    }
}

pub struct ProgressCallback {
    callback: Box<dyn Fn(f64) -> bool + 'static>,
}

impl ProgressCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(f64) -> bool + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl Progress for ProgressCallback {
    fn progress(&self, dltotal: f64, dlnow: f64) -> bool {
        let p = if dltotal > 0.0 {
            dlnow / dltotal * 100.0
        } else {
            0.0
        };

        self.callback.as_ref()(p)
    }
}

/// True when a transfer failed because a progress callback asked for abort,
/// as opposed to a genuine network error.
pub fn is_user_abort(err: &anyhow::Error) -> bool {
    err.downcast_ref::<curl::Error>()
        .is_some_and(|e| e.is_aborted_by_callback())
}

struct FileCollector<'a, P> {
    file: std::fs::File,
    progress: &'a P,
}

impl<'a, P: Progress> FileCollector<'a, P> {
    pub fn new(file: std::fs::File, progress: &'a P) -> Self {
        Self { file, progress }
    }
}

impl<'a, P: Progress> Handler for FileCollector<'a, P> {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        // Returning a short count makes libcurl fail the transfer.
        if self.file.write_all(data).is_err() {
            Ok(0)
        } else {
            Ok(data.len())
        }
    }

    fn progress(&mut self, dltotal: f64, dlnow: f64, _ultotal: f64, _ulnow: f64) -> bool {
        self.progress.progress(dltotal, dlnow)
    }
}

/// Stream a GET response into `path`. The progress callback is polled during
/// the transfer and may abort it.
pub fn download_file<P: Progress>(
    url: &str,
    path: &std::path::Path,
    progress: &P,
) -> anyhow::Result<()> {
    let mut easy = build_easy_get(
        url,
        FileCollector::new(std::fs::File::create(path)?, progress),
    )?;
    easy.perform()?;
    check_response_code(&mut easy)?;
    Ok(())
}

struct Collector {
    data: Vec<u8>,
}

impl Collector {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }
}

impl Handler for Collector {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        self.data.extend_from_slice(data);
        Ok(data.len())
    }
}

pub fn download_str(url: &str, timeout: Option<Duration>) -> anyhow::Result<String> {
    let mut easy = build_easy_get(url, Collector::new())?;
    if let Some(timeout) = timeout {
        easy.timeout(timeout)?;
    }
    easy.perform()?;
    check_response_code(&mut easy)?;
    let handler = easy.get_ref();

    Ok(String::from_utf8(handler.data.clone())?)
}

fn build_easy_get<H: Handler>(url: &str, handler: H) -> Result<Easy2<H>, curl::Error> {
    let mut easy = Easy2::new(handler);
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.url(url)?;
    easy.useragent(USER_AGENT)?;
    easy.progress(true)?;
    Ok(easy)
}

/// libcurl treats a 5xx body as a successful transfer; for our purposes a
/// server error is a failed fetch.
fn check_response_code<H: Handler>(easy: &mut Easy2<H>) -> anyhow::Result<()> {
    let code = easy.response_code()?;
    if code >= 400 {
        return Err(HttpStatusError::new(code).into());
    }
    Ok(())
}

pub struct HttpStatusError {
    message: String,
}

impl HttpStatusError {
    fn new(code: u32) -> Self {
        Self {
            message: format!("Server returned HTTP status {code}"),
        }
    }
}

impl Display for HttpStatusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.message)
    }
}

impl Debug for HttpStatusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.message)
    }
}

impl Error for HttpStatusError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn progress_callback_reports_percentage() {
        let seen = Rc::new(Cell::new(-1.0));
        let seen_by_callback = Rc::clone(&seen);
        let callback = ProgressCallback::new(move |p| {
            seen_by_callback.set(p);
            true
        });

        assert!(callback.progress(200.0, 50.0));
        assert_eq!(seen.get(), 25.0);
    }

    #[test]
    fn progress_callback_with_unknown_total_reports_zero() {
        let callback = ProgressCallback::new(|p| p == 0.0);
        assert!(callback.progress(0.0, 1024.0));
    }

    #[test]
    fn non_curl_errors_are_not_user_aborts() {
        let err = anyhow::Error::from(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        ));
        assert!(!is_user_abort(&err));
    }
}
