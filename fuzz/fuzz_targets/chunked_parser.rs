#![no_main]

use libfuzzer_sys::fuzz_target;

use push_csv::{ParserBuilder, Record};

fn parse(data: &[u8], capacity: usize) -> Vec<Vec<Vec<u8>>> {
    let mut rows = Vec::new();

    {
        let rows = std::cell::RefCell::new(&mut rows);

        let mut parser = ParserBuilder::new()
            .buffer_capacity(capacity)
            .field_capacity(capacity)
            .record_capacity(1)
            .io_capacity(capacity)
            .build();

        parser
            .on_header(|header: &Record| rows.borrow_mut().push(header.to_vec()))
            .on_record(|_, record| rows.borrow_mut().push(record.to_vec()));

        parser.parse(data).unwrap();
    }

    rows
}

// Parsing must not depend on how the input is chunked.
fuzz_target!(|data: &[u8]| {
    let expected = parse(data, 1 << 16);

    for capacity in [1, 2, 3, 7] {
        assert_eq!(parse(data, capacity), expected);
    }
});
