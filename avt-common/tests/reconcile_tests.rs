//! Annual tracking reconciliation tests
//!
//! Exercise `reconcile` against a real on-disk database: slot filling order,
//! exhaustion, idempotence and concurrent callers.

use avt_common::db::apprentices::create_apprentice;
use avt_common::db::init::init_database;
use avt_common::db::models::{
    Modality, NewApprentice, NewCompany, NewGroup, NewMentor, NewUser, NewVisit, Role, VisitStatus,
};
use avt_common::db::reference::{create_company, create_group, create_mentor};
use avt_common::db::tracking::{get_tracking, reconcile, tracking_report};
use avt_common::db::users::create_user;
use avt_common::db::visits::{create_visit, delete_visit};
use avt_common::{Error, ReconcileOutcome};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    pool: SqlitePool,
    project_lead: i64,
    mentor: i64,
    company: i64,
    group: i64,
}

impl Fixture {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("avt.db")).await.unwrap();

        let project_lead = create_user(
            &pool,
            &NewUser {
                username: "lead".into(),
                email: "lead@example.com".into(),
                password: "secret123".into(),
                first_name: "Paul".into(),
                last_name: "Durand".into(),
                role: Role::ProjectLead,
            },
        )
        .await
        .unwrap();
        let group = create_group(
            &pool,
            &NewGroup {
                name: "BTS SIO 1".into(),
                school_year: "2024-2025".into(),
            },
        )
        .await
        .unwrap();
        let company = create_company(
            &pool,
            &NewCompany {
                name: "Acme".into(),
                trade_name: None,
                postal_address: "1 rue de Paris".into(),
                phone: None,
                email: None,
            },
        )
        .await
        .unwrap();
        let mentor = create_mentor(
            &pool,
            &NewMentor {
                company_id: company,
                last_name: "Bernard".into(),
                first_name: "Marie".into(),
                mobile_phone: None,
                email: None,
                job_title: None,
            },
        )
        .await
        .unwrap();

        Self {
            _dir: dir,
            pool,
            project_lead,
            mentor,
            company,
            group,
        }
    }

    async fn apprentice(&self, last_name: &str) -> i64 {
        create_apprentice(
            &self.pool,
            &NewApprentice {
                group_id: self.group,
                company_id: self.company,
                mentor_id: self.mentor,
                last_name: last_name.into(),
                first_name: "Léa".into(),
                email: None,
                phone: None,
                address: None,
                contract_start: date(2023, 9, 1),
                contract_end: date(2025, 8, 31),
                notes: None,
            },
        )
        .await
        .unwrap()
    }

    async fn visit(&self, apprentice: i64, visit_date: NaiveDate) -> i64 {
        create_visit(
            &self.pool,
            &NewVisit {
                apprentice_id: apprentice,
                project_lead_id: self.project_lead,
                visit_date,
                modality: Modality::OnSite,
                status: VisitStatus::Done,
                comment: None,
                assessment: None,
                apprentice_feedback_date: None,
            },
        )
        .await
        .unwrap()
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn first_visit_creates_record_in_slot_one() {
    let fx = Fixture::new().await;
    let apprentice = fx.apprentice("Martin").await;
    let v1 = fx.visit(apprentice, date(2024, 2, 10)).await;

    let outcome = reconcile(&fx.pool, apprentice, 2024, v1).await.unwrap();
    match &outcome {
        ReconcileOutcome::Assigned { slot, status, tracking } => {
            assert_eq!(*slot, 1);
            assert_eq!(status, "1/4");
            assert_eq!(tracking.slots.as_array(), [Some(v1), None, None, None]);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn second_visit_fills_slot_two() {
    let fx = Fixture::new().await;
    let apprentice = fx.apprentice("Martin").await;
    let v1 = fx.visit(apprentice, date(2024, 2, 10)).await;
    let v2 = fx.visit(apprentice, date(2024, 5, 3)).await;

    reconcile(&fx.pool, apprentice, 2024, v1).await.unwrap();
    let outcome = reconcile(&fx.pool, apprentice, 2024, v2).await.unwrap();

    assert_eq!(outcome.slot(), Some(2));
    assert_eq!(outcome.tracking().status_label(), "2/4");
    assert_eq!(
        outcome.tracking().slots.as_array(),
        [Some(v1), Some(v2), None, None]
    );
}

#[tokio::test]
async fn fifth_visit_is_exhausted_and_changes_nothing() {
    let fx = Fixture::new().await;
    let apprentice = fx.apprentice("Martin").await;

    let mut visits = Vec::new();
    for month in 1..=5 {
        visits.push(fx.visit(apprentice, date(2024, month, 15)).await);
    }
    for (index, visit) in visits.iter().take(4).enumerate() {
        let outcome = reconcile(&fx.pool, apprentice, 2024, *visit).await.unwrap();
        assert_eq!(outcome.slot(), Some(index + 1));
        assert!(outcome.tracking().slots.is_gap_free());
    }

    let before = get_tracking(&fx.pool, apprentice, 2024).await.unwrap().unwrap();
    assert_eq!(before.status_label(), "Complete");

    let outcome = reconcile(&fx.pool, apprentice, 2024, visits[4]).await.unwrap();
    match &outcome {
        ReconcileOutcome::SlotsExhausted { status, tracking } => {
            assert_eq!(status, "Complete");
            assert_eq!(tracking, &before);
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }

    let after = get_tracking(&fx.pool, apprentice, 2024).await.unwrap().unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn reconciling_the_same_visit_twice_is_a_no_op() {
    let fx = Fixture::new().await;
    let apprentice = fx.apprentice("Martin").await;
    let v1 = fx.visit(apprentice, date(2024, 2, 10)).await;

    reconcile(&fx.pool, apprentice, 2024, v1).await.unwrap();
    let outcome = reconcile(&fx.pool, apprentice, 2024, v1).await.unwrap();

    assert!(matches!(outcome, ReconcileOutcome::AlreadyTracked { slot: 1, .. }));
    assert_eq!(
        outcome.tracking().slots.as_array(),
        [Some(v1), None, None, None]
    );
}

#[tokio::test]
async fn years_and_apprentices_are_tracked_separately() {
    let fx = Fixture::new().await;
    let first = fx.apprentice("Martin").await;
    let second = fx.apprentice("Petit").await;

    let a_2024 = fx.visit(first, date(2024, 11, 2)).await;
    let a_2025 = fx.visit(first, date(2025, 1, 8)).await;
    let b_2024 = fx.visit(second, date(2024, 11, 3)).await;

    assert_eq!(reconcile(&fx.pool, first, 2024, a_2024).await.unwrap().slot(), Some(1));
    assert_eq!(reconcile(&fx.pool, first, 2025, a_2025).await.unwrap().slot(), Some(1));
    assert_eq!(reconcile(&fx.pool, second, 2024, b_2024).await.unwrap().slot(), Some(1));

    let report = tracking_report(&fx.pool).await.unwrap();
    assert_eq!(report.len(), 3);
    // Ordered by name, most recent year first
    assert_eq!(report[0].apprentice_last_name, "Martin");
    assert_eq!(report[0].tracking.year, 2025);
    assert_eq!(report[1].tracking.year, 2024);
    assert_eq!(report[2].apprentice_last_name, "Petit");
    assert_eq!(report[2].visits.len(), 1);
    assert_eq!(report[2].visits[0].visit_date, date(2024, 11, 3));
    assert_eq!(report[2].progression, "1/4");
}

#[tokio::test]
async fn concurrent_reconciles_take_distinct_slots() {
    let fx = Fixture::new().await;
    let apprentice = fx.apprentice("Martin").await;
    let v1 = fx.visit(apprentice, date(2024, 3, 1)).await;
    let v2 = fx.visit(apprentice, date(2024, 3, 2)).await;

    let (first, second) = tokio::join!(
        reconcile(&fx.pool, apprentice, 2024, v1),
        reconcile(&fx.pool, apprentice, 2024, v2),
    );
    let mut slots = vec![first.unwrap().slot(), second.unwrap().slot()];
    slots.sort();
    assert_eq!(slots, vec![Some(1), Some(2)]);

    let tracking = get_tracking(&fx.pool, apprentice, 2024).await.unwrap().unwrap();
    assert_eq!(tracking.slots.filled(), 2);
    assert!(tracking.slots.slot_of(v1).is_some());
    assert!(tracking.slots.slot_of(v2).is_some());
}

#[tokio::test]
async fn many_concurrent_reconciles_never_overfill() {
    let fx = Fixture::new().await;
    let apprentice = fx.apprentice("Martin").await;

    let mut visits = Vec::new();
    for day in 1..=8 {
        visits.push(fx.visit(apprentice, date(2024, 4, day)).await);
    }

    let mut handles = Vec::new();
    for visit in visits.clone() {
        let pool = fx.pool.clone();
        handles.push(tokio::spawn(async move {
            reconcile(&pool, apprentice, 2024, visit).await
        }));
    }

    let mut assigned = 0;
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            ReconcileOutcome::Assigned { .. } => assigned += 1,
            ReconcileOutcome::SlotsExhausted { .. } => exhausted += 1,
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
    assert_eq!(assigned, 4);
    assert_eq!(exhausted, 4);

    let tracking = get_tracking(&fx.pool, apprentice, 2024).await.unwrap().unwrap();
    assert!(tracking.slots.is_complete());
    assert!(tracking.slots.is_gap_free());
}

#[tokio::test]
async fn tracked_visit_delete_is_conflict() {
    let fx = Fixture::new().await;
    let apprentice = fx.apprentice("Martin").await;
    let tracked = fx.visit(apprentice, date(2024, 2, 10)).await;
    let loose = fx.visit(apprentice, date(2024, 2, 11)).await;
    reconcile(&fx.pool, apprentice, 2024, tracked).await.unwrap();

    let err = delete_visit(&fx.pool, tracked).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    delete_visit(&fx.pool, loose).await.unwrap();
    let err = delete_visit(&fx.pool, loose).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
