#![no_main]

use libfuzzer_sys::fuzz_target;

use push_csv::Parser;

fuzz_target!(|data: &[u8]| {
    let mut parser = Parser::new();

    parser
        .on_header(|header| assert!(!header.is_empty()))
        .on_record(|header, record| {
            assert!(!record.is_empty());

            for (i, field) in record.iter().enumerate() {
                assert_eq!(record.get(i), Some(field));
            }

            assert!(!header.is_empty());
        });

    parser.parse(data).unwrap();
});
