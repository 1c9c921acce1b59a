use std::mem;

use memchr::{memchr, memchr2};
use tracing::{debug, trace};

use crate::buffer::ByteBuffer;
use crate::error::Result;
use crate::records::Record;
use crate::source::LineSource;
use crate::utils::{is_unquoted_content, unquoted_runs};

const SEPARATOR: u8 = b',';
const QUOTE: u8 = b'"';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    InField,
    InQuotedField,
    // One quote was found inside a quoted field, next byte decides whether it
    // was escaped or closing the field.
    QuoteInQuotedField,
    AfterClosingQuote,
    AtRecordEnd,
    AtInputEnd,
}

pub(crate) type HeaderCallback<'a> = Box<dyn FnMut(&Record) + 'a>;
pub(crate) type RecordCallback<'a> = Box<dyn FnMut(&Record, &Record) + 'a>;

#[derive(Default)]
pub(crate) struct Callbacks<'a> {
    pub(crate) on_header: Option<HeaderCallback<'a>>,
    pub(crate) on_record: Option<RecordCallback<'a>>,
}

pub(crate) struct CoreParser {
    // Current chunk of input and scan cursor
    line: ByteBuffer,
    pos: usize,

    // Bytes of the current field that cannot be sliced out of `line`
    field: ByteBuffer,
    field_start: usize,
    spilled: bool,
    keep_non_ascii: bool,

    record: Record,
    header: Option<Record>,

    state: State,
    record_was_started: bool,

    records: u64,
    bytes: u64,
}

impl CoreParser {
    pub(crate) fn new(
        line_capacity: usize,
        field_capacity: usize,
        record_capacity: usize,
        keep_non_ascii: bool,
    ) -> Result<Self> {
        Ok(Self {
            line: ByteBuffer::with_capacity(line_capacity)?,
            pos: 0,
            field: ByteBuffer::with_capacity(field_capacity)?,
            field_start: 0,
            spilled: false,
            keep_non_ascii,
            record: Record::with_capacity(record_capacity)?,
            header: None,
            state: State::Start,
            record_was_started: false,
            records: 0,
            bytes: 0,
        })
    }

    #[inline]
    pub(crate) fn header(&self) -> Option<&Record> {
        self.header.as_ref()
    }

    fn reset(&mut self) {
        self.line.clear();
        self.pos = 0;
        self.field.clear();
        self.field_start = 0;
        self.spilled = false;
        self.record.clear();
        self.header = None;
        self.state = State::Start;
        self.record_was_started = false;
        self.records = 0;
        self.bytes = 0;
    }

    pub(crate) fn run<S: LineSource + ?Sized>(
        &mut self,
        source: &mut S,
        callbacks: &mut Callbacks<'_>,
    ) -> Result<()> {
        self.reset();

        while self.state != State::AtInputEnd {
            self.scan(callbacks)?;

            self.suspend_field()?;

            if !self.refill(source)? {
                self.finish(callbacks)?;
            }
        }

        debug!(
            records = self.records,
            bytes = self.bytes,
            "reached end of CSV input"
        );

        Ok(())
    }

    // Read the next line, or at least the next chunk, of input into `line`.
    // Returns `false` when the end of input was reached.
    fn refill<S: LineSource + ?Sized>(&mut self, source: &mut S) -> Result<bool> {
        self.line.clear();
        self.pos = 0;

        loop {
            let amt = source.read_line_into(self.line.unfilled_mut())?;

            if amt == 0 {
                return Ok(!self.line.is_empty());
            }

            self.line.advance(amt);
            self.bytes += amt as u64;

            if self.line.as_slice().last() == Some(&b'\n')
                || self.line.len() < self.line.capacity()
            {
                return Ok(true);
            }

            // The line does not fit: keep what was read and double the buffer
            // so the rest of the line can be read into its tail.
            self.line.grow()?;

            debug!(capacity = self.line.capacity(), "grew CSV line buffer");
        }
    }

    // An unquoted field is still being read but `line` is about to be
    // overwritten: its bytes must be moved into `field`.
    fn suspend_field(&mut self) -> Result<()> {
        if self.state == State::InField {
            let keep_non_ascii = self.keep_non_ascii;

            for run in unquoted_runs(&self.line.as_slice()[self.field_start..], keep_non_ascii) {
                self.field.extend_from_slice(run)?;
            }

            self.field_start = 0;
            self.spilled = true;
        }

        Ok(())
    }

    fn scan(&mut self, callbacks: &mut Callbacks<'_>) -> Result<()> {
        use State::*;

        loop {
            match self.state {
                AtRecordEnd => {
                    self.emit_record(callbacks)?;
                }
                AtInputEnd => return Ok(()),
                _ if self.pos == self.line.len() => return Ok(()),
                Start => {
                    // An empty line is a record with a single empty field
                    self.record_was_started = true;

                    if self.line.as_slice()[self.pos] == QUOTE {
                        self.pos += 1;
                        self.state = InQuotedField;
                    } else {
                        self.field_start = self.pos;
                        self.state = InField;
                    }
                }
                InField => {
                    let input = &self.line.as_slice()[self.pos..];

                    if let Some(offset) = memchr2(SEPARATOR, b'\n', input) {
                        let byte = input[offset];
                        let end = self.pos + offset;

                        self.pos = end + 1;

                        self.emit_unquoted_field(end)?;
                        self.state = if byte == SEPARATOR { Start } else { AtRecordEnd };
                    } else {
                        self.pos = self.line.len();
                    }
                }
                InQuotedField => {
                    // Here we are moving to next quote
                    let input = &self.line.as_slice()[self.pos..];

                    if let Some(offset) = memchr(QUOTE, input) {
                        self.field.extend_from_slice(&input[..offset])?;
                        self.pos += offset + 1;
                        self.state = QuoteInQuotedField;
                    } else {
                        self.field.extend_from_slice(input)?;
                        self.pos = self.line.len();
                    }
                }
                QuoteInQuotedField => {
                    if self.line.as_slice()[self.pos] == QUOTE {
                        self.field.push(QUOTE)?;
                        self.pos += 1;
                        self.state = InQuotedField;
                    } else {
                        self.state = AfterClosingQuote;
                    }
                }
                AfterClosingQuote => {
                    // Anything between the closing quote and the next
                    // separator or terminator is dropped.
                    let input = &self.line.as_slice()[self.pos..];

                    if let Some(offset) = memchr2(SEPARATOR, b'\n', input) {
                        let byte = input[offset];

                        self.pos += offset + 1;
                        self.emit_quoted_field()?;

                        self.state = if byte == SEPARATOR { Start } else { AtRecordEnd };
                    } else {
                        self.pos = self.line.len();
                    }
                }
            }
        }
    }

    fn finish(&mut self, callbacks: &mut Callbacks<'_>) -> Result<()> {
        use State::*;

        match self.state {
            Start => {
                // Input ended right after a separator
                if self.record_was_started {
                    self.record.push_field(b"")?;
                    self.emit_record(callbacks)?;
                }
            }
            InField => {
                self.emit_unquoted_field(self.line.len())?;
                self.emit_record(callbacks)?;
            }
            InQuotedField | QuoteInQuotedField | AfterClosingQuote => {
                self.emit_quoted_field()?;
                self.emit_record(callbacks)?;
            }
            AtRecordEnd => {
                self.emit_record(callbacks)?;
            }
            AtInputEnd => (),
        }

        self.state = AtInputEnd;

        Ok(())
    }

    // Only the bytes accepted by `is_unquoted_content` are kept, which also
    // drops the CR of a CRLF, even when a refill split it from its LF.
    fn emit_unquoted_field(&mut self, end: usize) -> Result<()> {
        let keep_non_ascii = self.keep_non_ascii;
        let raw = &self.line.as_slice()[self.field_start..end];

        if !self.spilled
            && raw
                .iter()
                .all(|byte| is_unquoted_content(*byte, keep_non_ascii))
        {
            // Zero-copy path: the field is sliced directly from the line
            return self.record.push_field(raw);
        }

        for run in unquoted_runs(raw, keep_non_ascii) {
            self.field.extend_from_slice(run)?;
        }

        self.record.push_field(self.field.as_slice())?;
        self.field.clear();
        self.spilled = false;

        Ok(())
    }

    #[inline]
    fn emit_quoted_field(&mut self) -> Result<()> {
        self.record.push_field(self.field.as_slice())?;
        self.field.clear();

        Ok(())
    }

    fn emit_record(&mut self, callbacks: &mut Callbacks<'_>) -> Result<()> {
        match self.header {
            None => {
                let record = Record::with_capacity(self.record.len())?;
                let header = &*self.header.insert(mem::replace(&mut self.record, record));

                trace!(fields = header.len(), "read CSV header");

                if let Some(callback) = callbacks.on_header.as_mut() {
                    callback(header);
                }
            }
            Some(ref header) => {
                if let Some(callback) = callbacks.on_record.as_mut() {
                    callback(header, &self.record);
                }

                self.record.clear();
            }
        }

        self.records += 1;
        self.state = State::Start;
        self.record_was_started = false;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, BufReader, Cursor};

    use super::*;

    fn parse_with(data: &[u8], capacity: usize, io_capacity: usize) -> Result<Vec<Record>> {
        parse_with_options(data, capacity, io_capacity, false)
    }

    fn parse_with_options(
        data: &[u8],
        capacity: usize,
        io_capacity: usize,
        keep_non_ascii: bool,
    ) -> Result<Vec<Record>> {
        let mut core = CoreParser::new(capacity, 2, 1, keep_non_ascii)?;
        let mut rows = Vec::new();

        {
            let rows_cell = std::cell::RefCell::new(&mut rows);

            let mut callbacks = Callbacks {
                on_header: Some(Box::new(|header: &Record| {
                    rows_cell.borrow_mut().push(header.clone())
                })),
                on_record: Some(Box::new(|_: &Record, record: &Record| {
                    rows_cell.borrow_mut().push(record.clone())
                })),
            };

            let mut source = BufReader::with_capacity(io_capacity, Cursor::new(data));
            core.run(&mut source, &mut callbacks)?;
        }

        Ok(rows)
    }

    fn parse(data: &str) -> Vec<Record> {
        parse_with(data.as_bytes(), 1024, 1024).unwrap()
    }

    #[test]
    fn test_basic() {
        assert_eq!(
            parse("a,b,c\n1,\"x,y\",3\n"),
            vec![frec!["a", "b", "c"], frec!["1", "x,y", "3"]]
        );

        assert_eq!(parse("h\n\"q\"\"t\"\n"), vec![frec!["h"], frec!["q\"t"]]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse(""), Vec::<Record>::new());
        assert_eq!(parse("\n\r\n\n"), vec![frec![""], frec![""], frec![""]]);
    }

    #[test]
    fn test_empty_fields() {
        assert_eq!(
            parse("a,b,c\n,,\n1,,\n,2,\r\n"),
            vec![
                frec!["a", "b", "c"],
                frec!["", "", ""],
                frec!["1", "", ""],
                frec!["", "2", ""],
            ]
        );
    }

    #[test]
    fn test_missing_final_terminator() {
        let expected = vec![frec!["name", "age"], frec!["john", "45"]];

        assert_eq!(parse("name,age\njohn,45"), expected);
        assert_eq!(parse("name,age\njohn,45\n"), expected);
        assert_eq!(parse("name,age\r\njohn,45\r\n"), expected);
        assert_eq!(parse("name,age\r\njohn,45\r"), expected);

        assert_eq!(
            parse("name,age\njohn,"),
            vec![frec!["name", "age"], frec!["john", ""]]
        );
        assert_eq!(
            parse("name,age\njohn,\"45\""),
            vec![frec!["name", "age"], frec!["john", "45"]]
        );
    }

    #[test]
    fn test_crlf() {
        assert_eq!(
            parse("name,surname\r\nlucy,\"john\"\r\nevan,zhong\r\n\"béatrice\",glougou\r\n"),
            vec![
                frec!["name", "surname"],
                frec!["lucy", "john"],
                frec!["evan", "zhong"],
                frec!["béatrice", "glougou"],
            ]
        );
    }

    #[test]
    fn test_blank_lines() {
        assert_eq!(parse("h\n\n1\n"), vec![frec!["h"], frec![""], frec!["1"]]);

        assert_eq!(
            parse("\nname\n\njohn\r\n\r\nlucy\n\n"),
            vec![
                frec![""],
                frec!["name"],
                frec![""],
                frec!["john"],
                frec![""],
                frec!["lucy"],
                frec![""],
            ]
        );

        assert_eq!(
            parse("name\n\"\"\nlucy\n\"\""),
            vec![frec!["name"], frec![""], frec!["lucy"], frec![""]]
        );
    }

    #[test]
    fn test_quoting() {
        let csv = "name,surname,age\n\"john\",\"landy, the \"\"everlasting\"\" bastard\",45\n\"\"\"ok\"\"\",whatever,dude\nlucy,rose,\"67\"\njermaine,jackson,\"89\"\n\nkarine,loucan,\"52\"\nrose,\"glib\",12\n\"guillaume\",\"plique\",\"42\"\r\n";

        let expected = vec![
            frec!["name", "surname", "age"],
            frec!["john", "landy, the \"everlasting\" bastard", "45"],
            frec!["\"ok\"", "whatever", "dude"],
            frec!["lucy", "rose", "67"],
            frec!["jermaine", "jackson", "89"],
            frec![""],
            frec!["karine", "loucan", "52"],
            frec!["rose", "glib", "12"],
            frec!["guillaume", "plique", "42"],
        ];

        for capacity in [1024usize, 32, 4, 3, 2, 1] {
            for io_capacity in [1024usize, 5, 1] {
                assert_eq!(
                    parse_with(csv.as_bytes(), capacity, io_capacity).unwrap(),
                    expected,
                    "capacity={} io_capacity={}",
                    capacity,
                    io_capacity
                );
            }
        }
    }

    #[test]
    fn test_multiline_quoted_field() {
        let csv = "id,text\n1,\"first line\nsecond, line\r\nthird \"\"line\"\"\"\n2,plain\n";

        let expected = vec![
            frec!["id", "text"],
            frec!["1", "first line\nsecond, line\r\nthird \"line\""],
            frec!["2", "plain"],
        ];

        for capacity in [1024usize, 8, 2] {
            for io_capacity in [1024usize, 3, 1] {
                assert_eq!(
                    parse_with(csv.as_bytes(), capacity, io_capacity).unwrap(),
                    expected
                );
            }
        }
    }

    #[test]
    fn test_trailing_garbage_after_quote() {
        assert_eq!(
            parse("a,b\n\"x\"junk,\"y\" \r\n\"z\"\"\"tail\n"),
            vec![frec!["a", "b"], frec!["x", "y"], frec!["z\""]]
        );
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(
            parse("a,b\n1,\"never closed\n2,3\n"),
            vec![frec!["a", "b"], frec!["1", "never closed\n2,3\n"]]
        );
    }

    #[test]
    fn test_unquoted_fields_keep_printable_ascii_only() {
        assert_eq!(parse("h\nx\ty\x01z\n"), vec![frec!["h"], frec!["xyz"]]);

        assert_eq!(
            parse("name\njoh\"n\nab\"\"c\n\rlucy\n"),
            vec![frec!["name"], frec!["john"], frec!["abc"], frec!["lucy"]]
        );

        assert_eq!(
            parse("a,b\nx\ry,z\r\n\t,\x7f\n"),
            vec![frec!["a", "b"], frec!["xy", "z"], frec!["", ""]]
        );

        assert_eq!(parse("h\nbéatrice\n"), vec![frec!["h"], frec!["batrice"]]);

        // Quoted fields are kept verbatim
        assert_eq!(
            parse("h\n\"x\ty\x01\rz é\"\n"),
            vec![frec!["h"], frec!["x\ty\x01\rz é"]]
        );
    }

    #[test]
    fn test_unquoted_fields_keep_non_ascii() {
        let csv = "name,city\r\nbéatrice,Zürich\r\nx\ty,\x01日本\r\n";

        let expected = vec![
            frec!["name", "city"],
            frec!["béatrice", "Zürich"],
            frec!["xy", "日本"],
        ];

        for capacity in [1024usize, 4, 1] {
            for io_capacity in [1024usize, 3, 1] {
                assert_eq!(
                    parse_with_options(csv.as_bytes(), capacity, io_capacity, true).unwrap(),
                    expected,
                    "capacity={} io_capacity={}",
                    capacity,
                    io_capacity
                );
            }
        }
    }

    #[test]
    fn test_filtered_field_spanning_refills() {
        let csv = "h\nab\tcd\x01ef\r\n\t\n";

        for capacity in [1024usize, 4, 2, 1] {
            for io_capacity in [1024usize, 3, 1] {
                assert_eq!(
                    parse_with(csv.as_bytes(), capacity, io_capacity).unwrap(),
                    vec![frec!["h"], frec!["abcdef"], frec![""]],
                    "capacity={} io_capacity={}",
                    capacity,
                    io_capacity
                );
            }
        }
    }

    #[test]
    fn test_header_is_sized_record() -> Result<()> {
        let mut core = CoreParser::new(16, 2, 1, false)?;
        let mut callbacks = Callbacks::default();

        core.run(&mut Cursor::new("a,b,c\n1,2,3\n"), &mut callbacks)?;

        assert_eq!(core.header(), Some(&frec!["a", "b", "c"]));
        assert_eq!(core.record.capacity(), 4);
        assert_eq!(core.records, 2);

        // Parsing again forgets about the previous header
        core.run(&mut Cursor::new("x\n"), &mut callbacks)?;
        assert_eq!(core.header(), Some(&frec!["x"]));

        Ok(())
    }

    #[test]
    fn test_line_buffer_grows() -> Result<()> {
        let long = "x".repeat(1000);
        let data = format!("h\n{}\n", long);

        let mut core = CoreParser::new(2, 2, 1, false)?;
        core.run(&mut Cursor::new(data), &mut Callbacks::default())?;

        assert_eq!(core.line.capacity(), 1024);

        Ok(())
    }

    struct Chunked<'a> {
        data: &'a [u8],
        size: usize,
    }

    impl LineSource for Chunked<'_> {
        fn read_line_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let amt = self.size.min(buf.len()).min(self.data.len());

            buf[..amt].copy_from_slice(&self.data[..amt]);
            self.data = &self.data[amt..];

            Ok(amt)
        }
    }

    #[test]
    fn test_chunked_source() -> Result<()> {
        let csv = b"name,comment\r\njohn,\"hello\r\nworld\"\r\nlucy,bye\r\n\"\"\"x\"\"\",y\r";

        let expected = vec![
            frec!["name", "comment"],
            frec!["john", "hello\r\nworld"],
            frec!["lucy", "bye"],
            frec!["\"x\"", "y"],
        ];

        for size in 1..=csv.len() {
            let mut core = CoreParser::new(64, 2, 1, false)?;
            let mut rows = Vec::new();

            {
                let mut callbacks = Callbacks {
                    on_header: None,
                    on_record: Some(Box::new(|header: &Record, record: &Record| {
                        if rows.is_empty() {
                            rows.push(header.clone());
                        }

                        rows.push(record.clone());
                    })),
                };

                let mut source = Chunked { data: csv, size };
                core.run(&mut source, &mut callbacks)?;
            }

            assert_eq!(rows, expected, "size={}", size);
        }

        Ok(())
    }

    struct Broken<'a> {
        data: &'a [u8],
    }

    impl LineSource for Broken<'_> {
        fn read_line_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated"));
            }

            let amt = self.data.len().min(buf.len());
            buf[..amt].copy_from_slice(&self.data[..amt]);
            self.data = &self.data[amt..];

            Ok(amt)
        }
    }

    #[test]
    fn test_input_error_keeps_delivered_records() -> Result<()> {
        let mut core = CoreParser::new(1024, 2, 1, false)?;
        let mut seen = Vec::new();

        let result = {
            let mut callbacks = Callbacks {
                on_header: None,
                on_record: Some(Box::new(|_: &Record, record: &Record| {
                    seen.push(record.to_vec())
                })),
            };

            let mut source = Broken {
                data: b"a\n1\n2\n",
            };

            core.run(&mut source, &mut callbacks)
        };

        let err = result.unwrap_err();
        assert!(err.is_io_error());
        assert_eq!(seen, vec![vec![b"1".to_vec()], vec![b"2".to_vec()]]);

        Ok(())
    }
}
