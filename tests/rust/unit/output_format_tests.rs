use std::io;

use variant_query::engine::Value;
use variant_query::output::{Delimiter, FormatOptions, HeaderMode, OutputFormatter};

fn render(options: FormatOptions, fields: &[&str], rows: Vec<Vec<Value>>) -> String {
    let mut out = Vec::new();
    let mut formatter = OutputFormatter::new(&mut out, options);
    formatter.write_header(fields, &mut io::empty()).unwrap();
    for row in &rows {
        formatter.write_record(row).unwrap();
    }
    formatter.finish().unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_fixed_width_columns_align() {
    let options = FormatOptions {
        header: HeaderMode::Derived,
        ..Default::default()
    };
    let rows = vec![
        vec![Value::Text("1".into()), Value::Integer(12345), Value::Text("rs1".into())],
        vec![Value::Text("X".into()), Value::Integer(7), Value::Null],
    ];
    assert_eq!(
        render(options, &["chr", "pos", "dbSNP.name"], rows),
        "chr pos   dbSNP_name\n\
         1   12345 rs1\n\
         X   7     .\n"
    );
}

#[test]
fn test_escaped_tab_delimiter() {
    let options = FormatOptions {
        delimiter: Delimiter::parse(Some("\\t")),
        na: "NA".into(),
        ..Default::default()
    };
    let rows = vec![vec![Value::Real(0.5), Value::Null, Value::Integer(3)]];
    assert_eq!(render(options, &["a", "b", "c"], rows), "0.5\tNA\t3\n");
}

#[test]
fn test_explicit_header_names() {
    let options = FormatOptions {
        header: HeaderMode::from_args(Some(vec!["CHROM".into(), "POS".into()])),
        delimiter: Delimiter::Text(",".into()),
        ..Default::default()
    };
    let rows = vec![vec![Value::Text("1".into()), Value::Integer(100)]];
    assert_eq!(render(options, &["chr", "pos"], rows), "CHROM,POS\n1,100\n");
}
