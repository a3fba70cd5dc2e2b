use actix_web::{get, post, put, web, HttpResponse};
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedMember;
use crate::balance::{personal_summary, PersonalSummary};
use crate::error::Error;
use crate::exchange::settle_group;
use crate::money::Money;
use crate::schemas::{Expense, Group, Member, MemberId, Split};
use crate::split::{build_splits, SplitMethod, SplitMethodKind};
use crate::store::GroupStore;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(add_group)
        .service(add_member)
        .service(add_expense)
        .service(get_expenses)
        .service(get_balances)
        .service(get_user);
}

#[derive(Deserialize, Serialize)]
struct NewGroupJson {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewExpenseJson {
    description: String,
    amount: Money,
    #[serde(default)]
    date: Option<DateTime<Utc>>,
    #[serde(default = "default_split_method")]
    split_method: SplitMethodKind,
    #[serde(default)]
    custom_splits: Option<Vec<Split>>,
    #[serde(default)]
    receipt_url: Option<String>,
}

fn default_split_method() -> SplitMethodKind {
    SplitMethodKind::Equal
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupOverview {
    id: String,
    name: String,
    description: Option<String>,
    members: Vec<Member>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserOverview {
    member_id: MemberId,
    groups: Vec<GroupOverview>,
    summary: PersonalSummary,
}

async fn load_group(store: &dyn GroupStore, id: &str) -> Result<Group, Error> {
    store.find_group(id).await?.ok_or(Error::NotFound)
}

#[put("/groups/{id}")]
async fn add_group(
    store: web::Data<dyn GroupStore>,
    member: AuthenticatedMember,
    id: web::Path<String>,
    json: web::Json<NewGroupJson>,
) -> Result<HttpResponse, Error> {
    let json = json.into_inner();
    if json.name.trim().is_empty() {
        return Err(Error::MissingField("name"));
    }
    let group = Group::new(id.into_inner(), json.name, json.description);
    store.create_group(group.clone()).await?;
    tracing::info!("Member {} created group {}", member.0, group.id);
    Ok(HttpResponse::Created().json(group))
}

#[post("/groups/{id}/members")]
async fn add_member(
    store: web::Data<dyn GroupStore>,
    _member: AuthenticatedMember,
    id: web::Path<String>,
    json: web::Json<Member>,
) -> Result<HttpResponse, Error> {
    let new_member = json.into_inner();
    if new_member.id.trim().is_empty() {
        return Err(Error::MissingField("id"));
    }
    if new_member.email.trim().is_empty() {
        return Err(Error::MissingField("email"));
    }
    let group = store.add_member(&id, new_member).await?;
    tracing::info!("Group {} now has {} members", group.id, group.members.len());
    Ok(HttpResponse::Ok().json(group))
}

#[post("/groups/{id}/expenses")]
async fn add_expense(
    store: web::Data<dyn GroupStore>,
    member: AuthenticatedMember,
    id: web::Path<String>,
    json: web::Json<NewExpenseJson>,
) -> Result<HttpResponse, Error> {
    let json = json.into_inner();
    if json.description.trim().is_empty() {
        return Err(Error::MissingField("description"));
    }
    if !json.amount.is_positive() {
        return Err(Error::InvalidAmount(json.amount.to_string()));
    }

    let group = load_group(store.get_ref(), &id).await?;
    let payer = member.0;
    if group.member(&payer).is_none() {
        return Err(Error::UnknownMember(payer));
    }

    let method = match json.split_method {
        SplitMethodKind::Equal => SplitMethod::Equal,
        SplitMethodKind::Custom => SplitMethod::Custom(json.custom_splits.unwrap_or_default()),
    };
    let splits = build_splits(json.amount, &group.members, method)?;

    let expense = Expense {
        id: ObjectId::new().to_hex(),
        description: json.description,
        amount: json.amount,
        payer,
        splits,
        created_at: json.date.unwrap_or_else(Utc::now),
        receipt_url: json.receipt_url,
    };
    store.add_expense(&group.id, expense.clone()).await?;
    tracing::info!(
        "Added expense {} of {} paid by {} to group {}",
        expense.id,
        expense.amount,
        expense.payer,
        group.id
    );
    Ok(HttpResponse::Created().json(expense))
}

#[get("/groups/{id}/expenses")]
async fn get_expenses(
    store: web::Data<dyn GroupStore>,
    _member: AuthenticatedMember,
    id: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let mut expenses = load_group(store.get_ref(), &id).await?.expenses;
    expenses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(HttpResponse::Ok().json(expenses))
}

#[get("/groups/{id}/balances")]
async fn get_balances(
    store: web::Data<dyn GroupStore>,
    _member: AuthenticatedMember,
    id: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let group = load_group(store.get_ref(), &id).await?;
    Ok(HttpResponse::Ok().json(settle_group(&group)))
}

#[get("/user")]
async fn get_user(
    store: web::Data<dyn GroupStore>,
    member: AuthenticatedMember,
) -> Result<HttpResponse, Error> {
    let member_id = member.0;
    let groups = store.groups_for_member(&member_id).await?;
    let summary = personal_summary(&member_id, groups.iter().flat_map(|group| &group.expenses));

    let groups = groups
        .into_iter()
        .map(|group| GroupOverview {
            id: group.id,
            name: group.name,
            description: group.description,
            members: group.members,
        })
        .collect();
    Ok(HttpResponse::Ok().json(UserOverview {
        member_id,
        groups,
        summary,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{http::StatusCode, test, web, App};
    use serde_json::{json, Value};

    use super::*;
    use crate::auth::sign_member_id;
    use crate::config::Config;
    use crate::store::memory::MemoryGroupStore;

    const SECRET: &str = "route-secret";

    fn config() -> Config {
        Config {
            mongodb_uri: "mongodb://unused".to_string(),
            database_name: "test".to_string(),
            auth_secret: SECRET.to_string(),
            bind_address: "127.0.0.1".to_string(),
            port: 0,
        }
    }

    fn auth(member_id: &str) -> (&'static str, String) {
        ("Authorization", sign_member_id(member_id, SECRET))
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(config()))
                    .app_data(web::Data::from(
                        Arc::new(MemoryGroupStore::default()) as Arc<dyn GroupStore>
                    ))
                    .configure(configure),
            )
            .await
        };
    }

    macro_rules! call {
        ($app:expr, $request:expr) => {{
            let response = test::call_service(&$app, $request.to_request()).await;
            let status = response.status();
            let body: Value = test::read_body_json(response).await;
            (status, body)
        }};
    }

    macro_rules! setup_group {
        ($app:expr) => {{
            call!(
                $app,
                test::TestRequest::put()
                    .uri("/groups/flat")
                    .insert_header(auth("a"))
                    .set_json(json!({ "name": "Flat" }))
            );
            for id in ["a", "b", "c"] {
                call!(
                    $app,
                    test::TestRequest::post()
                        .uri("/groups/flat/members")
                        .insert_header(auth("a"))
                        .set_json(json!({
                            "id": id,
                            "name": id.to_uppercase(),
                            "email": format!("{id}@example.com"),
                        }))
                );
            }
        }};
    }

    #[actix_web::test]
    async fn requests_need_a_signature() {
        let app = app!();
        let response = test::call_service(
            &app,
            test::TestRequest::get().uri("/user").to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/user")
                .insert_header(("Authorization", "a:00"))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn equal_expense_settles_to_the_payer() {
        let app = app!();
        setup_group!(app);

        let (status, expense) = call!(
            app,
            test::TestRequest::post()
                .uri("/groups/flat/expenses")
                .insert_header(auth("a"))
                .set_json(json!({
                    "description": "Groceries",
                    "amount": 90.0,
                    "splitMethod": "equal",
                }))
        );
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(expense["payer"], "a");
        assert_eq!(expense["splits"].as_array().unwrap().len(), 3);

        let (status, body) = call!(
            app,
            test::TestRequest::get()
                .uri("/groups/flat/balances")
                .insert_header(auth("b"))
        );
        assert_eq!(status, StatusCode::OK);
        let nets: Vec<f64> = body["balances"]
            .as_array()
            .unwrap()
            .iter()
            .map(|balance| balance["net"].as_f64().unwrap())
            .collect();
        assert_eq!(nets, vec![60.0, -30.0, -30.0]);
        assert_eq!(
            body["transfers"],
            json!([
                { "fromMemberId": "b", "toMemberId": "a", "amount": 30.0, "fromName": "B", "toName": "A" },
                { "fromMemberId": "c", "toMemberId": "a", "amount": 30.0, "fromName": "C", "toName": "A" },
            ])
        );
    }

    #[actix_web::test]
    async fn custom_splits_must_match_the_total() {
        let app = app!();
        setup_group!(app);

        let (status, body) = call!(
            app,
            test::TestRequest::post()
                .uri("/groups/flat/expenses")
                .insert_header(auth("b"))
                .set_json(json!({
                    "description": "Dinner",
                    "amount": 50.0,
                    "splitMethod": "custom",
                    "customSplits": [
                        { "memberId": "a", "amount": 25.0 },
                        { "memberId": "b", "amount": 24.98 },
                    ],
                }))
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "custom splits add up to 49.98 but the expense total is 50.00"
        );

        let (status, _) = call!(
            app,
            test::TestRequest::post()
                .uri("/groups/flat/expenses")
                .insert_header(auth("b"))
                .set_json(json!({
                    "description": "Dinner",
                    "amount": 50.0,
                    "splitMethod": "custom",
                    "customSplits": [
                        { "memberId": "a", "amount": 25.0 },
                        { "memberId": "b", "amount": 25.0 },
                    ],
                }))
        );
        assert_eq!(status, StatusCode::CREATED);
    }

    #[actix_web::test]
    async fn oversized_amounts_are_rejected() {
        let app = app!();
        setup_group!(app);

        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/groups/flat/expenses")
                .insert_header(auth("a"))
                .set_json(json!({
                    "description": "Wraps around",
                    "amount": 50.0,
                    "splitMethod": "custom",
                    "customSplits": [
                        { "memberId": "a", "amount": 92233720368547758u64 },
                        { "memberId": "b", "amount": 92233720368547758u64 },
                        { "memberId": "c", "amount": 50.16 },
                    ],
                }))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/groups/flat/expenses")
                .insert_header(auth("a"))
                .set_json(json!({ "description": "Too much", "amount": "90071992547409.93" }))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (_, expenses) = call!(
            app,
            test::TestRequest::get()
                .uri("/groups/flat/expenses")
                .insert_header(auth("a"))
        );
        assert_eq!(expenses, json!([]));
    }

    #[actix_web::test]
    async fn payer_has_to_belong_to_the_group() {
        let app = app!();
        setup_group!(app);

        let (status, _) = call!(
            app,
            test::TestRequest::post()
                .uri("/groups/flat/expenses")
                .insert_header(auth("stranger"))
                .set_json(json!({ "description": "Taxi", "amount": 12.5 }))
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call!(
            app,
            test::TestRequest::post()
                .uri("/groups/nowhere/expenses")
                .insert_header(auth("a"))
                .set_json(json!({ "description": "Taxi", "amount": 12.5 }))
        );
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn duplicate_groups_and_members_conflict() {
        let app = app!();
        setup_group!(app);

        let (status, _) = call!(
            app,
            test::TestRequest::put()
                .uri("/groups/flat")
                .insert_header(auth("a"))
                .set_json(json!({ "name": "Again" }))
        );
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call!(
            app,
            test::TestRequest::post()
                .uri("/groups/flat/members")
                .insert_header(auth("a"))
                .set_json(json!({ "id": "b", "email": "b@example.com" }))
        );
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn expenses_are_listed_newest_first() {
        let app = app!();
        setup_group!(app);

        for (description, date) in [
            ("old", "2024-01-01T10:00:00Z"),
            ("new", "2024-03-01T10:00:00Z"),
        ] {
            call!(
                app,
                test::TestRequest::post()
                    .uri("/groups/flat/expenses")
                    .insert_header(auth("c"))
                    .set_json(json!({ "description": description, "amount": 3, "date": date }))
            );
        }

        let (status, body) = call!(
            app,
            test::TestRequest::get()
                .uri("/groups/flat/expenses")
                .insert_header(auth("a"))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["description"], "new");
        assert_eq!(body[1]["description"], "old");
        assert_eq!(body[0]["splits"][0]["amount"], json!(1.0));
    }

    #[actix_web::test]
    async fn user_overview_sums_across_groups() {
        let app = app!();
        setup_group!(app);
        call!(
            app,
            test::TestRequest::post()
                .uri("/groups/flat/expenses")
                .insert_header(auth("a"))
                .set_json(json!({ "description": "Rent", "amount": "10.00" }))
        );

        let (status, body) = call!(
            app,
            test::TestRequest::get().uri("/user").insert_header(auth("a"))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["memberId"], "a");
        assert_eq!(body["groups"][0]["id"], "flat");
        assert_eq!(body["summary"]["totalPaid"], json!(10.0));
        assert_eq!(body["summary"]["totalOwed"], json!(3.34));
        assert_eq!(body["summary"]["balance"], json!(6.66));
    }
}
