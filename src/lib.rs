/*!
The `push-csv` crate provides a streaming CSV parser that pushes records to
user callbacks instead of handing out an iterator.

It reads arbitrarily large streams in bounded memory: only the current line
(or quoted field) is ever held, in buffers that grow by doubling and are reused
for the whole stream. The first record of the stream is understood as the
header and is kept around so it can be given back alongside every subsequent
record.

# Examples

*Counting records and reading a column by name*

```
use std::fs::File;
use push_csv::Parser;

let mut count = 0;
let mut total = 0.0;

let mut parser = Parser::new();

parser.on_record(|header, record| {
    count += 1;

    if let Some(value) = header.position("price").and_then(|i| record.get_str(i)) {
        total += value.parse::<f64>().unwrap_or(0.0);
    }
});

parser.parse(File::open("data.csv")?)?;
```

*Using a builder to configure your parser*

```
use std::fs::File;
use push_csv::ParserBuilder;

let mut parser = ParserBuilder::new()
    .buffer_capacity(1 << 20)
    .record_capacity(8)
    .build();

parser.on_header(|header| {
    dbg!(header);
});

parser.parse(File::open("data.csv")?)?;
```

*Classifying fields*

```
use push_csv::{FieldType, Parser};

let mut parser = Parser::new();

parser.on_record(|_, record| {
    for i in 0..record.len() {
        if record.field_type(i) == Some(FieldType::Integer) {
            // ...
        }
    }
});
```

# Dialect

- Fields are separated by commas.
- Records are terminated by `LF` or `CRLF`. A `CR` immediately preceding a
  `LF` is never part of a field.
- Fields starting with a double quote are quoted: separators and line
  terminators are literal inside of them and a doubled double quote stands for
  a single one. Quoted fields may span any number of lines.
- The last record of a stream does not need a line terminator.
- An empty line is a record holding a single empty field.

# Ownership

The [`Record`] given to callbacks is only borrowed for the duration of the
call. The parser releases its fields and reuses its storage for the next row,
so copy what you need to keep (e.g. with [`Record::to_vec`]). The header
[`Record`] however lives for the whole parse and can still be accessed through
[`Parser::headers`] afterwards.

# Custom sources

Any [`std::io::Read`] can be given to [`Parser::parse`]. Lower-level sources
can implement [`LineSource`] and be given to [`Parser::parse_source`]. Note
that [`LineSource`] is already implemented for every [`std::io::BufRead`].

# Caveats

## "Nonsensical" CSV data

The parser is permissive and never fails on malformed data:

- bytes found between a closing quote and the next separator or line
  terminator are dropped, so `"john"son,45` is read as `john,45`.
- a double quote found in the middle of an unquoted field is dropped, so
  `joh"n` is read as `john`.
- an unterminated quoted field is closed by the end of the stream.

## Unquoted fields only keep printable ASCII

Unquoted fields only keep printable ASCII characters. Tabs, control
characters, stray `CR` and every byte above `0x7f` are dropped, so
`béatrice` is read as `batrice`. Quote such fields, or enable
[`ParserBuilder::keep_non_ascii`] to read UTF-8 text as is.
*/
#[allow(unused_macros)]
macro_rules! frec {
    () => {{
        $crate::records::Record::new()
    }};

    ($($x: expr),*) => {{
        [$($x),*].into_iter().collect::<$crate::records::Record>()
    }};
}

mod buffer;
mod classify;
mod core;
mod debug;
mod error;
mod parser;
mod records;
mod source;
mod utils;

pub use buffer::ByteBuffer;
pub use classify::FieldType;
pub use error::{Error, ErrorKind, Result};
pub use parser::{Parser, ParserBuilder};
pub use records::{Record, RecordIter};
pub use source::LineSource;
