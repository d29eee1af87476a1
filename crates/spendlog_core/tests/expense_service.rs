use spendlog_core::db::open_db_in_memory;
use spendlog_core::model::update::Patch;
use spendlog_core::service::HookContext;
use spendlog_core::{
    Category, CategoryService, ConflictError, EntityId, EntityService, ErrorKind, Expense,
    ExpensePatch, ExpenseService, NewCategory, NewExpense, PageLimits, PageSpec, QueryError,
    Repository, ServiceError, ServiceHooks, ServiceResult, SqliteRepository, ValidationError,
};

fn new_expense(category_id: &EntityId, amount_cents: i64, spent_at: i64) -> NewExpense {
    NewExpense {
        category_id: category_id.clone(),
        amount_cents,
        description: None,
        spent_at,
    }
}

fn seed_category(conn: &rusqlite::Connection, name: &str) -> Category {
    CategoryService::try_new(conn)
        .unwrap()
        .create_category(NewCategory::new(name))
        .unwrap()
}

#[test]
fn amounts_must_be_positive() {
    let conn = open_db_in_memory().unwrap();
    let category = seed_category(&conn, "Dining");
    let service = ExpenseService::try_new(&conn).unwrap();

    for amount in [0, -250] {
        match service.create_expense(new_expense(&category.id, amount, 1_000)) {
            Err(ServiceError::Validation(ValidationError::InvalidValue { field, .. })) => {
                assert_eq!(field, "amount_cents")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("amount {amount} must be rejected"),
        }
    }

    let created = service
        .create_expense(new_expense(&category.id, 1_250, 1_000))
        .unwrap();
    let err = service
        .update_expense(
            &created.id,
            ExpensePatch {
                amount_cents: Patch::Set(0),
                ..ExpensePatch::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(service.get(&created.id).unwrap(), created);
}

#[test]
fn category_must_exist_and_be_active() {
    let conn = open_db_in_memory().unwrap();
    let categories = CategoryService::try_new(&conn).unwrap();
    let service = ExpenseService::try_new(&conn).unwrap();

    let missing = EntityId::new("CATMISSING");
    assert!(matches!(
        service.create_expense(new_expense(&missing, 100, 1_000)),
        Err(ServiceError::Validation(ValidationError::BrokenReference(field))) if field == "category_id"
    ));

    let retired = categories
        .create_category(NewCategory::new("Retired"))
        .unwrap();
    categories.delete(&retired.id).unwrap();
    assert!(matches!(
        service.create_expense(new_expense(&retired.id, 100, 1_000)),
        Err(ServiceError::Validation(ValidationError::BrokenReference(_)))
    ));

    let active = categories.create_category(NewCategory::new("Active")).unwrap();
    let created = service
        .create_expense(new_expense(&active.id, 100, 1_000))
        .unwrap();
    let err = service
        .update_expense(
            &created.id,
            ExpensePatch {
                category_id: Patch::Set(retired.id.as_str().to_string()),
                ..ExpensePatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::BrokenReference(_))
    ));
    assert_eq!(service.repository().count(&[]).unwrap(), 1);
}

#[test]
fn expected_version_makes_update_compare_and_swap() {
    let conn = open_db_in_memory().unwrap();
    let category = seed_category(&conn, "Travel");
    let service = ExpenseService::try_new(&conn).unwrap();
    let created = service
        .create_expense(new_expense(&category.id, 8_000, 1_000))
        .unwrap();
    assert_eq!(created.version, 1);

    let first = service
        .update_expense(
            &created.id,
            ExpensePatch {
                description: Patch::Set("train".to_string()),
                expected_version: Some(1),
                ..ExpensePatch::default()
            },
        )
        .unwrap();
    assert_eq!(first.version, 2);
    assert_eq!(first.description.as_deref(), Some("train"));

    let stale = service
        .update_expense(
            &created.id,
            ExpensePatch {
                description: Patch::Set("plane".to_string()),
                expected_version: Some(1),
                ..ExpensePatch::default()
            },
        )
        .unwrap_err();
    assert_eq!(stale.kind(), ErrorKind::Conflict);
    assert!(matches!(
        stale,
        ServiceError::Conflict(ConflictError::VersionMismatch {
            expected: 1,
            actual: 2,
            ..
        })
    ));
    assert_eq!(service.get(&created.id).unwrap(), first);
}

#[test]
fn expenses_are_hard_deleted() {
    let conn = open_db_in_memory().unwrap();
    let category = seed_category(&conn, "Gifts");
    let service = ExpenseService::try_new(&conn).unwrap();
    let created = service
        .create_expense(new_expense(&category.id, 2_000, 1_000))
        .unwrap();

    service.delete(&created.id).unwrap();
    assert!(!service.repository().exists(&created.id).unwrap());
    assert_eq!(
        service.delete(&created.id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(!service.delete_if_exists(&created.id).unwrap());
    assert_eq!(
        service.restore(&created.id).unwrap_err().kind(),
        ErrorKind::Validation
    );
}

#[test]
fn list_for_category_is_newest_first() {
    let conn = open_db_in_memory().unwrap();
    let groceries = seed_category(&conn, "Groceries");
    let transport = seed_category(&conn, "Transport");
    let service = ExpenseService::try_new(&conn).unwrap();

    for (spent_at, amount) in [(3_000, 300), (1_000, 100), (2_000, 200)] {
        service
            .create_expense(new_expense(&groceries.id, amount, spent_at))
            .unwrap();
    }
    service
        .create_expense(new_expense(&transport.id, 999, 4_000))
        .unwrap();

    let result = service
        .list_for_category(&groceries.id, PageSpec::new(0, 2).unwrap())
        .unwrap();
    assert_eq!(result.total_count, 3);
    let amounts = result
        .items
        .iter()
        .map(|item| item.amount_cents)
        .collect::<Vec<_>>();
    assert_eq!(amounts, vec![300, 200]);
    assert!(result.has_more());

    let everything = service.list(Vec::<(&str, &str)>::new()).unwrap();
    let spent = everything
        .items
        .iter()
        .map(|item| item.spent_at)
        .collect::<Vec<_>>();
    assert_eq!(spent, vec![4_000, 3_000, 2_000, 1_000]);

    let filtered = service
        .list([("amount_cents[between]", "150,400"), ("sort", "amount_cents")])
        .unwrap();
    let amounts = filtered
        .items
        .iter()
        .map(|item| item.amount_cents)
        .collect::<Vec<_>>();
    assert_eq!(amounts, vec![200, 300]);
}

/// Rejects every created expense after the insert went through.
struct RejectAfterCreate;

impl ServiceHooks<Expense> for RejectAfterCreate {
    fn after_create(&self, _ctx: &HookContext<'_>, _created: &Expense) -> ServiceResult<()> {
        Err(ValidationError::invalid_value("description", "rejected by audit").into())
    }
}

#[test]
fn failing_post_hook_rolls_back_the_write() {
    let conn = open_db_in_memory().unwrap();
    let category = seed_category(&conn, "Audit");
    let service = EntityService::new(
        SqliteRepository::<Expense>::try_new(&conn).unwrap(),
        RejectAfterCreate,
    );

    let err = service
        .create(new_expense(&category.id, 500, 1_000).into_attributes())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(service.repository().count(&[]).unwrap(), 0);
    assert!(conn.is_autocommit());
}

#[test]
fn configured_page_maximum_applies_to_typed_pages() {
    let conn = open_db_in_memory().unwrap();
    let groceries = seed_category(&conn, "Groceries");
    let service = ExpenseService::try_new(&conn)
        .unwrap()
        .with_limits(PageLimits {
            default_limit: 5,
            max_limit: 20,
        });

    match service.list_for_category(&groceries.id, PageSpec::new(0, 21).unwrap()) {
        Err(ServiceError::InvalidQuery(QueryError::PageSizeTooLarge { limit, max })) => {
            assert_eq!((limit, max), (21, 20));
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let within = service
        .list_for_category(&groceries.id, PageSpec::new(0, 20).unwrap())
        .unwrap();
    assert_eq!(within.total_count, 0);
}
