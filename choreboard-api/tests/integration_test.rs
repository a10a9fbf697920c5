/// Integration tests for the Choreboard API
///
/// These verify the system's core guarantees end-to-end:
/// - Idempotent join-by-code
/// - The one-owner invariant under role updates
/// - Cascade-delete atomicity (no orphaned rows)
/// - Replace-all assignment semantics
/// - Overdue notification deduplication across repeated reads
/// - Membership-based authorization on family and task endpoints
///
/// All tests require a running Postgres instance (DATABASE_URL) and are
/// ignored by default: `cargo test -- --ignored` runs them.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::TestContext;
use serde_json::json;

#[tokio::test]
#[ignore] // Requires running Postgres instance
async fn test_join_by_code_is_idempotent() {
    let ctx = TestContext::new().await.unwrap();
    let (_owner, owner_token) = ctx.create_user("owner").await.unwrap();
    let (member, member_token) = ctx.create_user("member").await.unwrap();

    let family_id = common::create_family(&ctx, &owner_token, "Smith").await;

    let (status, body) = ctx
        .send(
            "POST",
            &format!("/families/{}/invite", family_id),
            Some(&owner_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let code = body["inviteCode"].as_str().unwrap().to_string();
    assert_eq!(code.len(), ctx.config.invite.code_length);

    // First join creates the membership
    let (status, _) = ctx
        .send(
            "POST",
            "/families/join",
            Some(&member_token),
            Some(json!({ "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Second join succeeds without creating a duplicate (code also
    // normalizes: lowercase with whitespace still matches)
    let (status, body) = ctx
        .send(
            "POST",
            "/families/join",
            Some(&member_token),
            Some(json!({ "code": format!("  {}  ", code.to_lowercase()) })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["family"]["id"].as_str().unwrap(), family_id.to_string());

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM memberships WHERE family_id = $1 AND user_id = $2",
    )
    .bind(family_id)
    .bind(member.id)
    .fetch_one(&ctx.db)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore] // Requires running Postgres instance
async fn test_owner_role_is_immutable() {
    let ctx = TestContext::new().await.unwrap();
    let (owner, owner_token) = ctx.create_user("owner").await.unwrap();
    let (member, member_token) = ctx.create_user("member").await.unwrap();

    let family_id = common::create_family(&ctx, &owner_token, "Smith").await;
    common::join_family(&ctx, &owner_token, &member_token, family_id).await;

    // Owner may promote a member to admin
    let (status, body) = ctx
        .send(
            "PATCH",
            &format!("/families/{}/members/{}/role", family_id, member.id),
            Some(&owner_token),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["member"]["role"], "admin");

    // Demoting the owner is rejected
    let (status, _) = ctx
        .send(
            "PATCH",
            &format!("/families/{}/members/{}/role", family_id, owner.id),
            Some(&owner_token),
            Some(json!({ "role": "member" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Promoting a second owner is rejected too
    let (status, _) = ctx
        .send(
            "PATCH",
            &format!("/families/{}/members/{}/role", family_id, member.id),
            Some(&owner_token),
            Some(json!({ "role": "owner" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Unknown roles are a validation error
    let (status, _) = ctx
        .send(
            "PATCH",
            &format!("/families/{}/members/{}/role", family_id, member.id),
            Some(&owner_token),
            Some(json!({ "role": "viewer" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Non-owners may not change roles at all
    let (status, _) = ctx
        .send(
            "PATCH",
            &format!("/families/{}/members/{}/role", family_id, member.id),
            Some(&member_token),
            Some(json!({ "role": "member" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The invariant holds: exactly one owner membership
    let (owners,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM memberships WHERE family_id = $1 AND role = 'owner'",
    )
    .bind(family_id)
    .fetch_one(&ctx.db)
    .await
    .unwrap();
    assert_eq!(owners, 1);
}

#[tokio::test]
#[ignore] // Requires running Postgres instance
async fn test_cascade_delete_removes_all_references() {
    let ctx = TestContext::new().await.unwrap();
    let (_owner, owner_token) = ctx.create_user("owner").await.unwrap();
    let (member, member_token) = ctx.create_user("member").await.unwrap();

    let family_id = common::create_family(&ctx, &owner_token, "Smith").await;
    common::join_family(&ctx, &owner_token, &member_token, family_id).await;

    // Task with an assignee (creates an assignment and a notification)
    let task_id = common::create_task(
        &ctx,
        &owner_token,
        family_id,
        json!({ "title": "Clean garage", "assigneeIds": [member.id] }),
    )
    .await;

    // Comment, a reaction on the task, and a reaction on the comment
    let (status, body) = ctx
        .send(
            "POST",
            &format!("/tasks/{}/comments", task_id),
            Some(&member_token),
            Some(json!({ "body": "on it" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = body["comment"]["id"].as_str().unwrap().to_string();

    let (status, _) = ctx
        .send(
            "POST",
            &format!("/tasks/{}/reactions", task_id),
            Some(&member_token),
            Some(json!({ "emoji": "👍" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .send(
            "POST",
            &format!("/tasks/{}/reactions", task_id),
            Some(&owner_token),
            Some(json!({ "emoji": "🔥", "commentId": comment_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert!(common::count_task_references(&ctx.db, task_id).await > 0);

    let (status, _) = ctx
        .send(
            "DELETE",
            &format!("/tasks/{}", task_id),
            Some(&owner_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Zero rows reference the task afterwards, in any dependent table
    assert_eq!(common::count_task_references(&ctx.db, task_id).await, 0);
}

#[tokio::test]
#[ignore] // Requires running Postgres instance
async fn test_assignment_replace_semantics() {
    let ctx = TestContext::new().await.unwrap();
    let (_owner, owner_token) = ctx.create_user("owner").await.unwrap();
    let (alice, alice_token) = ctx.create_user("alice").await.unwrap();
    let (bob, bob_token) = ctx.create_user("bob").await.unwrap();

    let family_id = common::create_family(&ctx, &owner_token, "Smith").await;
    common::join_family(&ctx, &owner_token, &alice_token, family_id).await;
    common::join_family(&ctx, &owner_token, &bob_token, family_id).await;

    let task_id = common::create_task(
        &ctx,
        &owner_token,
        family_id,
        json!({ "title": "Mow lawn", "assigneeIds": [alice.id] }),
    )
    .await;

    // Reassign from alice to bob; the set is replaced, not merged
    let (status, body) = ctx
        .send(
            "PUT",
            &format!("/tasks/{}", task_id),
            Some(&owner_token),
            Some(json!({ "assigneeIds": [bob.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let assignees = body["task"]["assignees"].as_array().unwrap();
    assert_eq!(assignees.len(), 1);
    assert_eq!(assignees[0]["id"].as_str().unwrap(), bob.id.to_string());

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM assignments WHERE task_id = $1")
            .bind(task_id)
            .fetch_one(&ctx.db)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore] // Requires running Postgres instance
async fn test_overdue_notification_dedup() {
    let ctx = TestContext::new().await.unwrap();
    let (_owner, owner_token) = ctx.create_user("owner").await.unwrap();
    let (_member, member_token) = ctx.create_user("member").await.unwrap();

    let family_id = common::create_family(&ctx, &owner_token, "Smith").await;
    common::join_family(&ctx, &owner_token, &member_token, family_id).await;

    // "Buy milk" with a due date in the past, assigned to the member
    let member_id = {
        let (_, body) = ctx
            .send("GET", "/families", Some(&member_token), None)
            .await;
        body["families"][0]["members"]
            .as_array()
            .unwrap()
            .iter()
            .find(|m| m["role"] == "member")
            .unwrap()["user"]["id"]
            .as_str()
            .unwrap()
            .to_string()
    };

    let task_id = common::create_task(
        &ctx,
        &owner_token,
        family_id,
        json!({
            "title": "Buy milk",
            "dueDate": (Utc::now() - Duration::days(1)).to_rfc3339(),
            "assigneeIds": [member_id],
        }),
    )
    .await;

    let overdue_for_task = |body: &serde_json::Value| {
        body["notifications"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|n| n["kind"] == "overdue" && n["taskId"] == task_id.to_string())
            .count()
    };

    // First read lazily generates the overdue notification
    let (status, body) = ctx
        .send("GET", "/notifications", Some(&member_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overdue_for_task(&body), 1);

    // A second read returns the same single notification, not a duplicate
    let (status, body) = ctx
        .send("GET", "/notifications", Some(&member_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overdue_for_task(&body), 1);
}

#[tokio::test]
#[ignore] // Requires running Postgres instance
async fn test_non_member_is_forbidden() {
    let ctx = TestContext::new().await.unwrap();
    let (_owner, owner_token) = ctx.create_user("owner").await.unwrap();
    let (_outsider, outsider_token) = ctx.create_user("outsider").await.unwrap();

    let family_id = common::create_family(&ctx, &owner_token, "Smith").await;
    let task_id = common::create_task(
        &ctx,
        &owner_token,
        family_id,
        json!({ "title": "Water plants" }),
    )
    .await;

    // Existing family, no membership: forbidden, not "not found"
    let (status, _) = ctx
        .send(
            "GET",
            &format!("/families/{}", family_id),
            Some(&outsider_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .send(
            "POST",
            &format!("/families/{}/tasks", family_id),
            Some(&outsider_token),
            Some(json!({ "title": "intrusion" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .send(
            "PATCH",
            &format!("/tasks/{}/status", task_id),
            Some(&outsider_token),
            Some(json!({ "status": "done" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Absent family is a plain 404
    let (status, _) = ctx
        .send(
            "GET",
            &format!("/families/{}", uuid::Uuid::new_v4()),
            Some(&outsider_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // No credentials at all is a 401
    let (status, _) = ctx
        .send("GET", &format!("/families/{}", family_id), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore] // Requires running Postgres instance
async fn test_plain_member_cannot_create_but_can_edit() {
    let ctx = TestContext::new().await.unwrap();
    let (_owner, owner_token) = ctx.create_user("owner").await.unwrap();
    let (_member, member_token) = ctx.create_user("member").await.unwrap();

    let family_id = common::create_family(&ctx, &owner_token, "Smith").await;
    common::join_family(&ctx, &owner_token, &member_token, family_id).await;

    // Creation requires owner or admin
    let (status, _) = ctx
        .send(
            "POST",
            &format!("/families/{}/tasks", family_id),
            Some(&member_token),
            Some(json!({ "title": "Dishes" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // But any member may edit and set status
    let task_id = common::create_task(
        &ctx,
        &owner_token,
        family_id,
        json!({ "title": "Dishes" }),
    )
    .await;

    let (status, body) = ctx
        .send(
            "PUT",
            &format!("/tasks/{}", task_id),
            Some(&member_token),
            Some(json!({ "description": "tonight please" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["description"], "tonight please");

    let (status, body) = ctx
        .send(
            "PATCH",
            &format!("/tasks/{}/status", task_id),
            Some(&member_token),
            Some(json!({ "status": "done" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], "done");

    // A plain member may not delete a task they did not create
    let (status, _) = ctx
        .send(
            "DELETE",
            &format!("/tasks/{}", task_id),
            Some(&member_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore] // Requires running Postgres instance
async fn test_task_listing_filters_and_order() {
    let ctx = TestContext::new().await.unwrap();
    let (_owner, owner_token) = ctx.create_user("owner").await.unwrap();
    let (alice, alice_token) = ctx.create_user("alice").await.unwrap();

    let family_id = common::create_family(&ctx, &owner_token, "Smith").await;
    common::join_family(&ctx, &owner_token, &alice_token, family_id).await;

    let soon = (Utc::now() + Duration::days(1)).to_rfc3339();
    let later = (Utc::now() + Duration::days(7)).to_rfc3339();

    common::create_task(
        &ctx,
        &owner_token,
        family_id,
        json!({ "title": "later", "dueDate": later }),
    )
    .await;
    common::create_task(
        &ctx,
        &owner_token,
        family_id,
        json!({ "title": "soon", "dueDate": soon, "assigneeIds": [alice.id] }),
    )
    .await;
    common::create_task(&ctx, &owner_token, family_id, json!({ "title": "no due date" }))
        .await;

    // Due dates ascending, null due dates last
    let (status, body) = ctx
        .send(
            "GET",
            &format!("/families/{}/tasks", family_id),
            Some(&owner_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["soon", "later", "no due date"]);

    // Assignee filter
    let (status, body) = ctx
        .send(
            "GET",
            &format!("/families/{}/tasks?memberId={}", family_id, alice.id),
            Some(&owner_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(body["tasks"][0]["title"], "soon");

    // Cross-family "my tasks" view for alice
    let (status, body) = ctx
        .send("GET", "/tasks/my", Some(&alice_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let mine = body["tasks"].as_array().unwrap();
    assert!(mine.iter().any(|t| t["title"] == "soon"));
    assert!(!mine.iter().any(|t| t["title"] == "later"));
}
