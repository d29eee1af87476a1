use spendlog_core::db::open_db;
use spendlog_core::{
    CategoryPatch, CategoryService, ExpenseService, NewCategory, NewExpense, Patch,
};
use std::collections::HashSet;
use std::thread;

const WRITERS: usize = 4;
const PER_WRITER: usize = 10;
const UPDATES_PER_WRITER: usize = 100;

#[test]
fn concurrent_creates_on_separate_connections_all_land() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("concurrency.db");
    drop(open_db(&path).unwrap());

    let handles = (0..WRITERS)
        .map(|writer| {
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = CategoryService::try_new(&conn).unwrap();
                (0..PER_WRITER)
                    .map(|index| {
                        service
                            .create_category(NewCategory::new(format!("w{writer}-c{index}")))
                            .unwrap()
                            .id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();

    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id), "identifier handed out twice");
        }
    }
    assert_eq!(ids.len(), WRITERS * PER_WRITER);

    let conn = open_db(&path).unwrap();
    let service = CategoryService::try_new(&conn).unwrap();
    let listed = service.list([("limit", "1")]).unwrap();
    assert_eq!(listed.total_count, (WRITERS * PER_WRITER) as u64);
}

#[test]
fn concurrent_duplicate_names_admit_exactly_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("duplicates.db");
    drop(open_db(&path).unwrap());

    let handles = (0..WRITERS)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = CategoryService::try_new(&conn).unwrap();
                service.create_category(NewCategory::new("Shared")).is_ok()
            })
        })
        .collect::<Vec<_>>();

    let successes = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|created| *created)
        .count();
    assert_eq!(successes, 1);
}

#[test]
fn concurrent_updates_of_distinct_rows_wait_for_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("updates.db");
    let ids = {
        let conn = open_db(&path).unwrap();
        let service = CategoryService::try_new(&conn).unwrap();
        (0..WRITERS)
            .map(|writer| {
                service
                    .create_category(NewCategory::new(format!("owner-{writer}")))
                    .unwrap()
                    .id
            })
            .collect::<Vec<_>>()
    };

    let handles = ids
        .iter()
        .cloned()
        .enumerate()
        .map(|(writer, id)| {
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = CategoryService::try_new(&conn).unwrap();
                for round in 0..UPDATES_PER_WRITER {
                    let patch = CategoryPatch {
                        name: Patch::Set(format!("owner-{writer}-r{round}")),
                        ..CategoryPatch::default()
                    };
                    if let Err(err) = service.update_category(&id, patch) {
                        panic!("update {round} of writer {writer} failed: {err}");
                    }
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&path).unwrap();
    let service = CategoryService::try_new(&conn).unwrap();
    let last_round = UPDATES_PER_WRITER - 1;
    for (writer, id) in ids.iter().enumerate() {
        assert_eq!(
            service.get(id).unwrap().name,
            format!("owner-{writer}-r{last_round}")
        );
    }
}

#[test]
fn concurrent_expense_creates_check_the_category_and_land() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("expenses.db");
    let category_id = {
        let conn = open_db(&path).unwrap();
        CategoryService::try_new(&conn)
            .unwrap()
            .create_category(NewCategory::new("Travel"))
            .unwrap()
            .id
    };

    let handles = (0..WRITERS)
        .map(|writer| {
            let path = path.clone();
            let category_id = category_id.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = ExpenseService::try_new(&conn).unwrap();
                for index in 0..PER_WRITER {
                    let request = NewExpense {
                        category_id: category_id.clone(),
                        amount_cents: (writer * 100 + index + 1) as i64,
                        description: None,
                        spent_at: index as i64,
                    };
                    if let Err(err) = service.create_expense(request) {
                        panic!("expense {index} of writer {writer} failed: {err}");
                    }
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&path).unwrap();
    let service = ExpenseService::try_new(&conn).unwrap();
    let listed = service.list([("limit", "1")]).unwrap();
    assert_eq!(listed.total_count, (WRITERS * PER_WRITER) as u64);
}
