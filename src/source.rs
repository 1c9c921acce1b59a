use std::io::{self, BufRead};

use memchr::memchr;

/// A source of CSV bytes the [`Parser`](crate::Parser) pulls lines from.
///
/// This trait is implemented for every [`std::io::BufRead`], so one rarely
/// needs to implement it by hand.
pub trait LineSource {
    /// Read bytes into `buf`, stopping after the next `\n` (which is written),
    /// when `buf` is full or when the end of input is reached.
    ///
    /// Returns the number of bytes written. `0` must only be returned, for a
    /// non-empty `buf`, when the end of input was reached.
    ///
    /// Implementations are allowed to return less than a full line even if
    /// more is available: the parser will simply ask again.
    fn read_line_into(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<R: BufRead + ?Sized> LineSource for R {
    fn read_line_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written: usize = 0;

        while written < buf.len() {
            let input = match self.fill_buf() {
                Ok(input) => input,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };

            if input.is_empty() {
                break;
            }

            let room = buf.len() - written;
            let window = &input[..input.len().min(room)];

            match memchr(b'\n', window) {
                None => {
                    let amt = window.len();

                    buf[written..written + amt].copy_from_slice(window);
                    self.consume(amt);
                    written += amt;
                }
                Some(pos) => {
                    let amt = pos + 1;

                    buf[written..written + amt].copy_from_slice(&window[..amt]);
                    self.consume(amt);

                    return Ok(written + amt);
                }
            };
        }

        Ok(written)
    }
}
