//! SQL surface tests: scalar functions and REGEXP_TABLE through a session

use sqlre::config::Config;
use sqlre::core::{GroupPolicy, PatternCache};
use sqlre::host::vtab::{
    IndexConstraint, COLUMN_GROUP_ID, COLUMN_MATCH_ORDER, COLUMN_PATTERN, COLUMN_SUBJECT,
    COLUMN_VALUE, IDX_GROUP_FILTER,
};
use sqlre::host::{HostError, Session, Value, FUNCTIONS};

fn text(s: &str) -> Value {
    Value::from(s)
}

fn call(session: &Session, name: &str, args: &[Value]) -> Value {
    session.call(name, args).unwrap()
}

#[test]
fn scalar_functions_basic() {
    let session = Session::default();
    assert_eq!(call(&session, "regexp", &[text("b+"), text("abbc")]), Value::Integer(1));
    assert_eq!(
        call(&session, "regexp_instr", &[text("xxabcxx"), text("abc")]),
        Value::Integer(3)
    );
    assert_eq!(call(&session, "regexp_substr", &[text("abc"), text("z+")]), text(""));
    assert_eq!(
        call(&session, "regexp_replace", &[text("banana"), text("a"), text("o")]),
        text("bonono")
    );
    assert_eq!(
        call(&session, "regexp_replace", &[text("banana"), text("(a)"), text("[$1]")]),
        text("b[a]n[a]n[a]")
    );
}

#[test]
fn every_function_returns_null_for_null_arguments() {
    let session = Session::default();
    for function in FUNCTIONS {
        for null_at in 0..function.min_args {
            let mut args = vec![text("a"); function.min_args];
            args[null_at] = Value::Null;
            assert_eq!(
                call(&session, function.name, &args),
                Value::Null,
                "{} with NULL argument {}",
                function.name,
                null_at + 1
            );
        }
    }
}

#[test]
fn replace_single_occurrence() {
    let session = Session::default();
    let args = [
        text("banana"),
        text("a"),
        text("o"),
        Value::Integer(1),
        Value::Integer(2),
    ];
    assert_eq!(call(&session, "REGEXP_REPLACE", &args), text("banona"));
}

#[test]
fn replace_with_backtracking_pattern() {
    let session = Session::default();
    assert_eq!(
        call(
            &session,
            "REGEXP_REPLACE",
            &[text("aa bb cd"), text(r"(\w)\1"), text("<$1>")]
        ),
        text("<a> <b> cd")
    );
}

#[test]
fn locate_unicode_text_and_blob() {
    let session = Session::default();
    assert_eq!(
        call(&session, "REGEXP_INSTR", &[text("a\u{e9}\u{e9}"), text("\u{e9}+")]),
        Value::Integer(2)
    );
    assert_eq!(
        call(
            &session,
            "REGEXP_INSTR",
            &[Value::Blob("a\u{e9}\u{e9}".as_bytes().to_vec()), text("\u{e9}+")]
        ),
        Value::Integer(2)
    );
}

#[test]
fn blob_start_inside_character_with_lookahead() {
    let session = Session::default();
    let blob = Value::Blob(vec![0xc3, 0xa9, b'a']);
    assert_eq!(
        call(&session, "REGEXP_INSTR", &[blob.clone(), text("(?=a)a"), Value::Integer(2)]),
        Value::Integer(3)
    );
    assert_eq!(
        call(&session, "REGEXP_INSTR", &[blob, text("a"), Value::Integer(2)]),
        Value::Integer(3)
    );
}

#[test]
fn compile_error_message_carries_offset() {
    let session = Session::default();
    let err = session
        .call("REGEXP", &[text("ab(cd"), text("abcd")])
        .unwrap_err();
    let HostError::Error(message) = err else {
        panic!("unexpected error kind: {:?}", err);
    };
    assert!(message.starts_with("Cannot compile REGEXP pattern 'ab(cd' at offset "));
}

#[test]
fn diagnostics_render_nul_as_hex() {
    let session = Session::default();
    let err = session
        .call(
            "REGEXP_REPLACE",
            &[Value::Blob(b"a\0b".to_vec()), text("b"), text("$3")],
        )
        .unwrap_err();
    assert!(
        err.to_string()
            .starts_with("Cannot execute REGEXP_REPLACE('a'||x'00'||'b', 'b', '$3') at character 2"),
        "{}",
        err
    );
}

#[test]
fn cache_capacity_follows_config() {
    let config = Config {
        cache_capacity: 2,
        ..Config::default()
    };
    let session = Session::new(&config);
    for pattern in ["a", "b", "c"] {
        call(&session, "REGEXP", &[text(pattern), text("abc")]);
    }
    let cache = session.cache();
    assert_eq!(cache.len(), 2);
    assert!(!cache.contains(b"a"));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn cache_shared_across_threads() {
    let session = Session::default();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let session = session.clone();
            std::thread::spawn(move || {
                let subject = format!("item{}", i);
                session.call("REGEXP", &[text(r"item\d"), Value::Text(subject)])
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), Value::Integer(1));
    }
    let stats = session.cache().stats();
    assert_eq!(stats.hits + stats.misses, 4);
    assert_eq!(session.cache().len(), 1);
}

fn scan(session: &Session, args: &[Value], idx_num: i32) -> Vec<Vec<Value>> {
    let table = session.table();
    let mut cursor = table.open();
    cursor.filter(idx_num, args).unwrap();
    let mut rows = Vec::new();
    while !cursor.eof() {
        rows.push(
            [COLUMN_GROUP_ID, COLUMN_VALUE, COLUMN_MATCH_ORDER]
                .iter()
                .map(|&c| cursor.column(c).unwrap())
                .collect(),
        );
        cursor.next().unwrap();
    }
    cursor.close();
    rows
}

#[test]
fn table_declares_schema() {
    let table = Session::default().table();
    assert_eq!(table.name(), "REGEXP_TABLE");
    assert!(table.schema().contains("subject TEXT HIDDEN, pattern TEXT HIDDEN"));
}

#[test]
fn table_plan_requires_subject_and_pattern() {
    let table = Session::default().table();
    let err = table
        .best_index(&[IndexConstraint::eq(COLUMN_PATTERN)])
        .unwrap_err();
    assert_eq!(err.to_string(), "Argument #0 of \"REGEXP_TABLE()\" missing");

    let err = table
        .best_index(&[
            IndexConstraint::eq(COLUMN_SUBJECT).unusable(),
            IndexConstraint::eq(COLUMN_PATTERN),
        ])
        .unwrap_err();
    assert_eq!(err, HostError::Constraint);
}

#[test]
fn table_whole_match_rows() {
    let session = Session::default();
    let rows = scan(&session, &[text("1 23"), text(r"(\d)(\d)?")], 0);
    assert_eq!(
        rows,
        vec![
            vec![Value::Integer(0), text("1"), Value::Integer(1)],
            vec![Value::Integer(0), text("23"), Value::Integer(2)],
        ]
    );
}

#[test]
fn table_all_groups_rows() {
    let config = Config {
        group_policy: GroupPolicy::AllGroups,
        ..Config::default()
    };
    let session = Session::new(&config);
    let rows = scan(&session, &[text("1 23"), text(r"(\d)(\d)?")], 0);
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[2], vec![Value::Integer(2), Value::Null, Value::Integer(1)]);
    assert_eq!(rows[5], vec![Value::Integer(2), text("3"), Value::Integer(2)]);
}

#[test]
fn table_group_filter_by_index() {
    let session = Session::default();
    let rows = scan(
        &session,
        &[text("a=1, b=2"), text(r"(\w)=(\d)"), Value::Integer(2)],
        IDX_GROUP_FILTER,
    );
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1], vec![Value::Integer(2), text("2"), Value::Integer(2)]);
}

#[test]
fn table_empty_matches_advance() {
    let session = Session::default();
    let rows = scan(&session, &[text("ab"), text("x*")], 0);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row[1] == text("")));
}

#[test]
fn empty_match_follows_non_empty_match() {
    let session = Session::default();
    let rows = scan(&session, &[text("axxb"), text("x*")], 0);
    let values: Vec<Value> = rows.iter().map(|row| row[1].clone()).collect();
    assert_eq!(values, vec![text(""), text("xx"), text(""), text("")]);

    assert_eq!(
        call(&session, "REGEXP_REPLACE", &[text("axxb"), text("x*"), text("-")]),
        text("-a--b-")
    );
    assert_eq!(
        call(&session, "REGEXP_REPLACE", &[text("a"), text("a??"), text("-")]),
        text("---")
    );
}

#[test]
fn table_scan_survives_eviction() {
    let config = Config {
        cache_capacity: 1,
        ..Config::default()
    };
    let session = Session::new(&config);
    let table = session.table();
    let mut cursor = table.open();
    cursor.filter(0, &[text("a1b2c3"), text(r"\d")]).unwrap();

    // Evict the scan's pattern from the one-slot cache
    call(&session, "REGEXP", &[text("other"), text("x")]);
    assert!(!session.cache().contains(br"\d"));

    let mut values = Vec::new();
    while !cursor.eof() {
        values.push(cursor.column(COLUMN_VALUE).unwrap());
        cursor.next().unwrap();
    }
    assert_eq!(values, vec![text("1"), text("2"), text("3")]);
}

#[test]
fn table_rowids_increase() {
    let session = Session::default();
    let table = session.table();
    let mut cursor = table.open();
    cursor.filter(0, &[text("aaa"), text("a")]).unwrap();
    let mut rowids = Vec::new();
    while !cursor.eof() {
        rowids.push(cursor.rowid());
        cursor.next().unwrap();
    }
    assert_eq!(rowids, vec![1, 2, 3]);

    // Re-filtering restarts the scan
    cursor.filter(0, &[text("a"), text("a")]).unwrap();
    assert_eq!(cursor.rowid(), 1);
}

#[test]
fn explicit_cache_still_works_standalone() {
    let mut cache = PatternCache::new(4);
    assert!(sqlre::core::test(&mut cache, b"q", sqlre::core::Subject::Text("q")).unwrap());
    assert_eq!(cache.len(), 1);
}
