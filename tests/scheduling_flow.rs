//! End-to-end flow over the public API: build the catalog, schedule a week,
//! file and approve a leave request, and watch availability follow along.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use rota::{
    Engine, NewObstacle, NewRole, NewTask, NewUser, ObstaclePatch, ObstacleStatus, RoleKind,
    SessionHub,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn names(list: &[&str]) -> HashSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn weekly_roster_lifecycle() {
    let engine = Engine::new(Arc::new(SessionHub::new()));

    engine
        .create_role(NewRole {
            name: "brother".into(),
            kind: RoleKind::Regular,
            tasks_visible_in_prints: true,
        })
        .await
        .unwrap();
    engine
        .create_role(NewRole {
            name: "kitchen".into(),
            kind: RoleKind::Supervisor,
            tasks_visible_in_prints: false,
        })
        .await
        .unwrap();

    let jan = engine
        .create_user(NewUser {
            name: "Jan".into(),
            surname: "Kowalski".into(),
            email: "jan@example.org".into(),
            role_names: names(&["brother"]),
        })
        .await
        .unwrap();
    let piotr = engine
        .create_user(NewUser {
            name: "Piotr".into(),
            surname: "Nowak".into(),
            email: "piotr@example.org".into(),
            role_names: names(&["brother"]),
        })
        .await
        .unwrap();

    let cooking = engine
        .create_task(NewTask {
            name: "Cooking".into(),
            category: "kitchen".into(),
            participants_limit: 1,
            days_of_week: [Weekday::Tue, Weekday::Thu].into_iter().collect(),
            allowed_role_names: names(&["brother"]),
            supervisor_role_name: Some("kitchen".into()),
            permanent: true,
            whole_period: false,
        })
        .await
        .unwrap();
    let washing = engine
        .create_task(NewTask {
            name: "Washing".into(),
            category: "kitchen".into(),
            participants_limit: 1,
            days_of_week: [Weekday::Tue].into_iter().collect(),
            allowed_role_names: names(&["brother"]),
            supervisor_role_name: Some("kitchen".into()),
            permanent: true,
            whole_period: false,
        })
        .await
        .unwrap();
    engine.declare_conflict(cooking, washing).await.unwrap();

    // Week of 2024-02-05 (Mon) … 2024-02-11 (Sun).
    let (monday, sunday) = (d(2024, 2, 5), d(2024, 2, 11));

    // Jan cooks Tuesday and Thursday; cooking is then fully staffed.
    engine.create_assignment(jan, cooking, d(2024, 2, 6), false).await.unwrap();
    engine.create_assignment(jan, cooking, d(2024, 2, 8), false).await.unwrap();

    let free = engine.available_tasks(monday, sunday).await.unwrap();
    let free_names: Vec<&str> = free.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(free_names, vec!["Washing"]);

    // Jan cannot also wash on Tuesday — the tasks are in conflict.
    let clash = engine.create_assignment(jan, washing, d(2024, 2, 6), false).await;
    assert!(clash.is_err());
    engine.create_assignment(piotr, washing, d(2024, 2, 6), false).await.unwrap();

    // Piotr requests leave for the week; approval revokes his washing slot.
    let obstacle = engine
        .create_obstacle(NewObstacle {
            user_id: piotr,
            tasks: [washing].into_iter().collect(),
            from: monday,
            to: sunday,
            applicant_description: "visiting family".into(),
        })
        .await
        .unwrap();
    engine
        .patch_obstacle(
            obstacle,
            ObstaclePatch {
                status: ObstacleStatus::Approved,
                recipient_answer: Some("have a good trip".into()),
                recipient_user: Some(jan),
            },
        )
        .await
        .unwrap();

    assert!(engine.assignments_by_user(piotr).await.unwrap().is_empty());
    let free = engine.available_tasks(monday, sunday).await.unwrap();
    assert!(free.iter().any(|t| t.id == washing));

    // And he cannot be rebooked while the approved obstacle covers the date.
    let blocked = engine.create_assignment(piotr, washing, d(2024, 2, 6), false).await;
    assert!(blocked.is_err());

    // The scheduler's view of Jan for that week.
    let summary = engine
        .user_dependencies_for_task(washing, jan, monday, sunday)
        .await
        .unwrap();
    assert_eq!(summary.assigned_tasks, vec!["Cooking".to_string()]);
    assert!(summary.is_in_conflict);
    assert!(!summary.has_obstacle);
}
