use std::{fs, sync::Arc};

use heapdb::{
    test_utils::{
        collect_ints, collect_rows, generate_filename, int_row, int_rows, int_schema, TestDir,
    },
    Aggregate, AggregateOp, CompareOp, Database, DbConfig, Delete, Field, Filter, Insert, Join,
    JoinPredicate, OpIterator, Predicate, Row, RowIterator, TransactionId,
};

fn fill(db: &Database, table: &str, values: &[[i32; 2]]) -> heapdb::TableId {
    let table_id = db.create_table(table, int_schema(2)).unwrap();
    let schema = db.catalog().schema(table_id).unwrap();
    let mut insert = Insert::new(
        TransactionId::new(),
        Arc::clone(db.buffer_pool()),
        Box::new(RowIterator::new(Arc::clone(&schema), int_rows(&schema, values))),
        table_id,
    )
    .unwrap();
    insert.open().unwrap();
    assert_eq!(
        insert.next().unwrap().fields(),
        &[Field::Int(values.len() as i32)]
    );
    insert.close();
    table_id
}

#[test]
fn insert_then_delete_everything() {
    let (db, _dir) = Database::new_for_test(128, 8);
    let values: Vec<[i32; 2]> = (0..200).map(|i| [i, i * 2]).collect();
    let table_id = fill(&db, "t", &values);
    let tid = TransactionId::new();

    let mut delete = Delete::new(
        tid,
        Arc::clone(db.buffer_pool()),
        Box::new(db.scan(tid, table_id).unwrap()),
    )
    .unwrap();
    delete.open().unwrap();
    assert_eq!(delete.next().unwrap().fields(), &[Field::Int(200)]);
    assert!(!delete.has_next().unwrap());
    delete.close();

    let mut scan = db.scan(tid, table_id).unwrap();
    scan.open().unwrap();
    assert!(collect_rows(&mut scan).unwrap().is_empty());
}

#[test]
fn filter_join_aggregate() {
    let (db, _dir) = Database::new_for_test(4096, 16);
    // (customer, amount)
    let orders = fill(&db, "orders", &[[1, 10], [2, 5], [1, 7], [3, 1], [2, 4]]);
    // (customer, region)
    let customers = fill(&db, "customers", &[[1, 100], [2, 200], [3, 100]]);
    let tid = TransactionId::new();

    let big_orders = Filter::new(
        Predicate::new(1, CompareOp::GreaterThan, 3),
        Box::new(db.scan(tid, orders).unwrap()),
    )
    .unwrap();
    let join = Join::new(
        JoinPredicate::new(0, CompareOp::Equals, 0),
        Box::new(big_orders),
        Box::new(db.scan(tid, customers).unwrap()),
    )
    .unwrap();
    assert_eq!(join.schema().num_fields(), 4);

    // sum(amount) per region over orders with amount > 3
    let mut agg = Aggregate::new(Box::new(join), 1, Some(3), AggregateOp::Sum).unwrap();
    agg.open().unwrap();
    let rows: Vec<Vec<Field>> = collect_rows(&mut agg)
        .unwrap()
        .into_iter()
        .map(Row::into_fields)
        .collect();
    assert_eq!(
        rows,
        vec![
            vec![Field::Int(100), Field::Int(17)],
            vec![Field::Int(200), Field::Int(9)],
        ]
    );

    agg.rewind().unwrap();
    assert_eq!(collect_rows(&mut agg).unwrap().len(), 2);
}

#[test]
fn join_without_matching_condition_is_a_cross_product() {
    let (db, _dir) = Database::new_for_test(4096, 16);
    let left = fill(&db, "l", &[[1, 0], [2, 0], [3, 0]]);
    let right = fill(&db, "r", &[[5, 0], [6, 0]]);
    let tid = TransactionId::new();

    // the second columns are all zero, so every pair matches
    let mut join = Join::new(
        JoinPredicate::new(1, CompareOp::Equals, 1),
        Box::new(db.scan(tid, left).unwrap()),
        Box::new(db.scan(tid, right).unwrap()),
    )
    .unwrap();
    join.open().unwrap();
    let pairs: Vec<(i32, i32)> = collect_rows(&mut join)
        .unwrap()
        .iter()
        .map(|row| {
            (
                row.field(0).and_then(Field::as_int).unwrap(),
                row.field(2).and_then(Field::as_int).unwrap(),
            )
        })
        .collect();
    assert_eq!(pairs, vec![(1, 5), (1, 6), (2, 5), (2, 6), (3, 5), (3, 6)]);
}

#[test]
fn rows_survive_eviction_and_reopen() {
    let dir = TestDir::new(std::env::temp_dir().join(generate_filename()));
    let config = DbConfig::default().with_page_size(64).with_pool_pages(2);

    {
        let db = Database::new(&dir, config).unwrap();
        let table_id = db.create_table("t", int_schema(1)).unwrap();
        let schema = db.catalog().schema(table_id).unwrap();
        let tid = TransactionId::new();
        for i in 0..100 {
            db.buffer_pool()
                .insert_row(tid, table_id, &mut int_row(&schema, &[i]))
                .unwrap();
        }
        // 15 rows fit on a 64 byte page, so most pages were written out by eviction
        assert!(db.catalog().database_file(table_id).unwrap().num_pages().unwrap() >= 7);
        db.buffer_pool().flush_all().unwrap();
    }

    let db = Database::new(&dir, config).unwrap();
    let table_id = db.create_table("t", int_schema(1)).unwrap();
    let mut scan = db.scan(TransactionId::new(), table_id).unwrap();
    scan.open().unwrap();
    let mut values = collect_ints(&mut scan, 0).unwrap();
    values.sort_unstable();
    assert_eq!(values, (0..100).collect::<Vec<_>>());
}

#[test]
fn schema_file_tables_are_queryable() {
    let dir = TestDir::new(std::env::temp_dir().join(generate_filename()));
    let schema_file = dir.as_ref().join("catalog.txt");
    fs::write(
        &schema_file,
        "people (id int pk, name string, age int)\n\npets (owner int, kind string)\n",
    )
    .unwrap();

    let db = Database::new(&dir, DbConfig::default()).unwrap();
    let loaded = db.load_schema(&schema_file).unwrap();
    assert_eq!(loaded.len(), 2);
    let people = db.catalog().table_id("people").unwrap();
    assert_eq!(db.catalog().primary_key(people).unwrap(), "id");

    let schema = db.catalog().schema(people).unwrap();
    let tid = TransactionId::new();
    for (id, name, age) in [(1, "ada", 36), (2, "grace", 45), (3, "linus", 21)] {
        let mut row = Row::new(
            Arc::clone(&schema),
            vec![Field::Int(id), Field::from(name), Field::Int(age)],
        )
        .unwrap();
        db.buffer_pool().insert_row(tid, people, &mut row).unwrap();
    }

    let mut filter = Filter::new(
        Predicate::new(1, CompareOp::Like, "ra"),
        Box::new(db.scan(tid, people).unwrap()),
    )
    .unwrap();
    filter.open().unwrap();
    let rows = collect_rows(&mut filter).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].field(1), Some(&Field::from("grace")));
    assert_eq!(rows[0].to_string(), "2\tgrace\t45");
}
