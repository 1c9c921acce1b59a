use std::io::{BufReader, Read};

use crate::core::{Callbacks, CoreParser};
use crate::error::Result;
use crate::records::Record;
use crate::source::LineSource;

/// Builds a [`Parser`] with given configuration.
#[derive(Debug, Clone)]
pub struct ParserBuilder {
    buffer_capacity: usize,
    field_capacity: usize,
    record_capacity: usize,
    io_capacity: usize,
    keep_non_ascii: bool,
}

impl Default for ParserBuilder {
    fn default() -> Self {
        Self {
            buffer_capacity: 32 * (1 << 10),
            field_capacity: 4096,
            record_capacity: 32,
            io_capacity: 8192,
            keep_non_ascii: false,
        }
    }
}

impl ParserBuilder {
    /// Create a new [`ParserBuilder`] with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial capacity of the buffer lines are read into.
    ///
    /// The buffer will double its capacity whenever a line does not fit, so
    /// this is only a starting point. Will be rounded up to a power of two.
    ///
    /// Will default to 32 KiB.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the initial capacity of the buffer quoted fields are unescaped
    /// into. Will be rounded up to a power of two.
    ///
    /// Will default to 4096.
    pub fn field_capacity(&mut self, capacity: usize) -> &mut Self {
        self.field_capacity = capacity;
        self
    }

    /// Set the number of fields the first record can hold before growing.
    /// Subsequent records are sized after the header.
    ///
    /// Will default to 32.
    pub fn record_capacity(&mut self, capacity: usize) -> &mut Self {
        self.record_capacity = capacity;
        self
    }

    /// Set the capacity of the [`BufReader`] wrapped around readers given to
    /// [`Parser::parse`].
    ///
    /// Will default to 8192.
    pub fn io_capacity(&mut self, capacity: usize) -> &mut Self {
        self.io_capacity = capacity;
        self
    }

    /// Indicate whether bytes above `0x7f` should be kept in unquoted fields,
    /// so UTF-8 text does not need to be quoted.
    ///
    /// By default, unquoted fields only keep printable ASCII characters and
    /// every other byte (tabs, control characters, stray `CR`...) is dropped.
    /// Quoted fields are always kept verbatim.
    ///
    /// Will default to `false`.
    pub fn keep_non_ascii(&mut self, yes: bool) -> &mut Self {
        self.keep_non_ascii = yes;
        self
    }

    /// Create a new [`Parser`] without any callback.
    pub fn build<'a>(&self) -> Parser<'a> {
        Parser {
            builder: self.clone(),
            callbacks: Callbacks::default(),
            core: None,
        }
    }
}

/// A streaming CSV parser pushing records to user callbacks.
///
/// The first record of the stream is the header and is given to the
/// [`Parser::on_header`] callback. Every subsequent record is given, along
/// with the header, to the [`Parser::on_record`] callback. Both callbacks are
/// optional.
///
/// Records are only borrowed for the duration of the callback: the parser
/// reuses their storage for the next row. Use [`Record::to_vec`] or
/// [`Clone`] to keep them around.
///
/// # Configuration
///
/// To tweak the size of the inner buffers, check out the [`ParserBuilder`].
///
/// # Example
///
/// ```
/// use push_csv::Parser;
///
/// let mut count = 0;
///
/// let mut parser = Parser::new();
/// parser.on_record(|_, _| count += 1);
/// parser.parse("name,age\njohn,45\n".as_bytes())?;
/// ```
pub struct Parser<'a> {
    builder: ParserBuilder,
    callbacks: Callbacks<'a>,
    core: Option<CoreParser>,
}

impl<'a> Parser<'a> {
    /// Create a new parser with default configuration and no callbacks.
    pub fn new() -> Self {
        ParserBuilder::new().build()
    }

    /// Create a new parser with both callbacks already set.
    pub fn with_callbacks<H, R>(on_header: H, on_record: R) -> Self
    where
        H: FnMut(&Record) + 'a,
        R: FnMut(&Record, &Record) + 'a,
    {
        let mut parser = Self::new();
        parser.on_header(on_header).on_record(on_record);
        parser
    }

    /// Set the callback invoked exactly once per stream with its header,
    /// before any call to the record callback.
    pub fn on_header<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&Record) + 'a,
    {
        self.callbacks.on_header = Some(Box::new(callback));
        self
    }

    /// Set the callback invoked with the header and each data record, in
    /// stream order.
    pub fn on_record<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&Record, &Record) + 'a,
    {
        self.callbacks.on_record = Some(Box::new(callback));
        self
    }

    /// Parse the whole given stream implementing [`std::io::Read`].
    ///
    /// Avoid providing a buffered reader because buffering will be handled for
    /// you by the [`Parser`].
    ///
    /// Records delivered before an error occurred remain valid observations.
    pub fn parse<R: Read>(&mut self, input: R) -> Result<()> {
        let mut source = BufReader::with_capacity(self.builder.io_capacity, input);
        self.parse_source(&mut source)
    }

    /// Parse the whole given [`LineSource`].
    pub fn parse_source<S: LineSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        let mut core = match self.core.take() {
            Some(core) => core,
            None => CoreParser::new(
                self.builder.buffer_capacity,
                self.builder.field_capacity,
                self.builder.record_capacity,
                self.builder.keep_non_ascii,
            )?,
        };

        let result = core.run(source, &mut self.callbacks);

        self.core = Some(core);

        result
    }

    /// Return the header of the last parsed stream, if any.
    pub fn headers(&self) -> Option<&Record> {
        self.core.as_ref().and_then(|core| core.header())
    }
}

impl Default for Parser<'_> {
    fn default() -> Self {
        Self::new()
    }
}
