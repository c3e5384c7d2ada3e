mod common;

use common::*;
use kvquery::prelude::*;
use proptest::prelude::*;

fn window_keys(
    rows: &[Row],
    expr: Option<&Expr>,
    keys: &KeyFilter,
    window: SyncWindow,
) -> Vec<Vec<u8>> {
    let begin = i64::try_from(window.begin).unwrap();
    let end = i64::try_from(window.end).unwrap();
    expected_keys(rows, expr, keys, |r| {
        r.is_remote() && r.timestamp >= begin && r.timestamp < end
    })
}

fn is_time_ordered(page: &[(Vec<u8>, i64)]) -> bool {
    page.windows(2).all(|w| w[0].1 <= w[1].1)
}

#[test]
fn continuation_pages_cover_the_window_once() {
    let rows = fixture();
    let conn = open(&rows);
    let schema = schema();
    let table = table();
    let compiler = Compiler::new(&schema, &table);

    let mut query = Query::new();
    query.greater_than_or_equal_to("age", 20);
    let snapshot = query.snapshot();

    // consecutive windows share no rows and leave no gaps
    let start = 95;
    let mut begin = start;
    let mut seen = Vec::new();
    while begin < 150 {
        let stmt = compiler
            .sync_scan(&snapshot, SyncWindow::new(begin, begin + 15))
            .unwrap();
        let page = fetch(&conn, &stmt);
        assert!(is_time_ordered(&page));

        seen.extend(page.into_iter().map(|(k, _)| k));
        begin += 15;
    }
    let mut unique = seen.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), seen.len());

    let expected = window_keys(
        &rows,
        Some(&Expr::Age(Cmp::Ge, 20)),
        &KeyFilter::None,
        SyncWindow::new(start, begin),
    );
    assert_eq!(unique, expected);
}

#[test]
fn limited_sync_scan_pages_inside_the_window() {
    let rows = fixture();
    let conn = open(&rows);
    let schema = schema();
    let table = table();

    let mut query = Query::new();
    query.limit(10, 0);
    let window = SyncWindow::new(110, 140);
    let stmt = Compiler::new(&schema, &table)
        .sync_scan(&query.snapshot(), window)
        .unwrap();
    let page = fetch(&conn, &stmt);

    assert!(page.len() <= 10);
    assert!(is_time_ordered(&page));
    let allowed = window_keys(&rows, None, &KeyFilter::None, window);
    assert!(page.iter().all(|(k, _)| allowed.contains(k)));
}

#[test]
fn limited_continuation_is_monotonic_and_disjoint() {
    let rows = fixture();
    let conn = open(&rows);
    let schema = schema();
    let table = table();
    let compiler = Compiler::new(&schema, &table);

    let mut query = Query::new();
    query.limit(10, 0);
    let snapshot = query.snapshot();

    let mut begin = 0u64;
    let mut stream: Vec<(Vec<u8>, i64)> = Vec::new();
    loop {
        let stmt = compiler
            .sync_scan(&snapshot, SyncWindow::new(begin, 1_000))
            .unwrap();
        let page = fetch(&conn, &stmt);
        let Some((_, last)) = page.last() else {
            break;
        };
        assert!(page.len() <= 10);
        begin = u64::try_from(*last).unwrap() + 1;
        stream.extend(page);
    }

    assert!(!stream.is_empty());
    assert!(is_time_ordered(&stream));
    let mut keys: Vec<&Vec<u8>> = stream.iter().map(|(k, _)| k).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), stream.len());
}

proptest! {
    #[test]
    fn sync_scan_matches_in_memory_evaluation(
        expr in prop::option::of(arb_expr()),
        keys in arb_key_filter(),
        begin in 95..145u64,
        len in 0..30u64,
    ) {
        let rows = fixture();
        let conn = open(&rows);
        let schema = schema();
        let table = table();
        let query = build(expr.as_ref(), &keys);
        let window = SyncWindow::new(begin, begin + len);

        let stmt = Compiler::new(&schema, &table)
            .sync_scan(&query.snapshot(), window)
            .unwrap();
        let page = fetch(&conn, &stmt);
        prop_assert!(is_time_ordered(&page));

        let mut got: Vec<Vec<u8>> = page.into_iter().map(|(k, _)| k).collect();
        got.sort();
        prop_assert_eq!(got, window_keys(&rows, expr.as_ref(), &keys, window));
    }
}
