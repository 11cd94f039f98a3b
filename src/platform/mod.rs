//! Seam over the platform's native log output routine.
//!
//! On ESP-IDF that routine is the `vprintf`-like function registered with
//! `esp_log_set_vprintf`. Redirecting it is a reversible registration:
//! [`Platform::register`] returns a [`Registration`] token holding whatever
//! was registered before, and [`Platform::restore`] consumes it.

use core::fmt;

#[cfg(target_os = "espidf")]
pub mod esp;
pub mod sim;

/// One formatting call, as handed to the log output routine.
///
/// Same contract as `vsnprintf`: write as much of the output as fits into
/// `buf` and return the full output length, or a negative value if
/// formatting failed. The output is complete only when the returned length
/// is smaller than `buf.len()`. Every call formats from an independent copy
/// of the arguments, so a fragment can be formatted any number of times.
pub trait Fragment {
    fn format_into(&self, buf: &mut [u8]) -> i32;
}

impl Fragment for fmt::Arguments<'_> {
    fn format_into(&self, buf: &mut [u8]) -> i32 {
        let mut writer = TruncatingWriter { buf, pos: 0, total: 0 };
        if fmt::write(&mut writer, *self).is_err() {
            return -1;
        }
        i32::try_from(writer.total).unwrap_or(-1)
    }
}

impl Fragment for str {
    fn format_into(&self, buf: &mut [u8]) -> i32 {
        let n = self.len().min(buf.len());
        buf[..n].copy_from_slice(&self.as_bytes()[..n]);
        i32::try_from(self.len()).unwrap_or(-1)
    }
}

/// Copies what fits, counts everything.
struct TruncatingWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
    total: usize,
}

impl fmt::Write for TruncatingWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buf.len() - self.pos;
        let to_write = bytes.len().min(remaining);
        self.buf[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
        self.pos += to_write;
        self.total += bytes.len();
        Ok(())
    }
}

/// Token for a redirected log output routine.
///
/// Holds the routine that was registered before the bridge. Restoring it
/// consumes the token, so the previous routine is put back exactly once.
#[must_use = "dropping a Registration loses the previous log handler"]
#[derive(Debug)]
pub struct Registration<H> {
    previous: Option<H>,
}

impl<H> Registration<H> {
    pub fn new(previous: Option<H>) -> Self {
        Self { previous }
    }

    pub fn previous(&self) -> Option<&H> {
        self.previous.as_ref()
    }

    pub fn into_previous(self) -> Option<H> {
        self.previous
    }
}

/// A platform log output routine the bridge can take over.
pub trait Platform: Send + Sync {
    /// A formatting call as the platform delivers it.
    type Call<'a>: Fragment;

    /// A previously registered output routine.
    type Handler: Clone + Send + Sync;

    /// Make the bridge the platform's output routine.
    fn register(&self) -> Registration<Self::Handler>;

    /// Put back the routine captured by `register`.
    fn restore(&self, registration: Registration<Self::Handler>);

    /// Replay `call` to `handler`, from an independent copy of its arguments.
    fn forward(&self, handler: &Self::Handler, call: &Self::Call<'_>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_fit() {
        let mut buf = [0u8; 32];
        let n = format_args!("Hello {}", 42).format_into(&mut buf);
        assert_eq!(n, 8);
        assert_eq!(&buf[..8], b"Hello 42");
    }

    #[test]
    fn test_arguments_truncated_reports_full_length() {
        let mut buf = [0u8; 4];
        let n = format_args!("{}-{}", "abcdef", 7).format_into(&mut buf);
        assert_eq!(n, 8);
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn test_measure_with_empty_buffer() {
        assert_eq!(format_args!("{:>10}", 1).format_into(&mut [0u8; 0]), 10);
        assert_eq!("text".format_into(&mut [0u8; 0]), 4);
    }

    #[test]
    fn test_formatting_error_is_negative() {
        struct Broken;
        impl fmt::Display for Broken {
            fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
                Err(fmt::Error)
            }
        }
        let mut buf = [0u8; 8];
        assert!(format_args!("{}", Broken).format_into(&mut buf) < 0);
    }

    #[test]
    fn test_registration_yields_previous_once() {
        let registration = Registration::new(Some(7u8));
        assert_eq!(registration.previous(), Some(&7));
        assert_eq!(registration.into_previous(), Some(7));
    }
}
