// tests/api_tests.rs

use std::sync::Arc;

use exam_platform::{
    config::Config,
    exam::bank::QuestionBank,
    models::question::QuestionKind,
    routes,
    state::AppState,
    store::MemoryStore,
    utils::hash::hash_password,
};
use serde_json::{Value, json};

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "correct-horse";

struct TestApp {
    address: String,
    client: reqwest::Client,
    bank: QuestionBank,
}

/// Helper function to spawn the app on a random port for testing.
/// Every app gets its own in-memory store.
async fn spawn_app() -> TestApp {
    let config = Config {
        database_url: None,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_email: ADMIN_EMAIL.to_string(),
        admin_password_hash: Some(hash_password(ADMIN_PASSWORD).unwrap()),
        exam_time_limit_minutes: 30,
        bind_addr: "127.0.0.1:0".to_string(),
        cors_origins: vec!["http://localhost:3000".to_string()],
    };

    let state = AppState {
        store: Arc::new(MemoryStore::new()),
        bank: Arc::new(QuestionBank::embedded().unwrap()),
        config,
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        bank: QuestionBank::embedded().unwrap(),
    }
}

impl TestApp {
    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn admin_token(&self) -> String {
        let resp = self
            .post(
                "/api/auth/admin-login",
                json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 200);
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().expect("Token not found").to_string()
    }

    async fn admin_get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn admin_post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn create_code(&self, token: &str, code: &str) -> Value {
        let resp = self
            .admin_post(
                token,
                "/api/admin/exam-codes",
                json!({ "code": code, "name": "Spring exam" }),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 201);
        resp.json().await.unwrap()
    }

    async fn start(&self, code: &str, first: &str, last: &str) -> reqwest::Response {
        self.post(
            "/api/exam/start",
            json!({ "examCode": code, "firstName": first, "lastName": last }),
        )
        .await
    }

    async fn started(&self, code: &str, first: &str, last: &str) -> Value {
        let resp = self.start(code, first, last).await;
        assert_eq!(resp.status().as_u16(), 201);
        resp.json().await.unwrap()
    }

    async fn answer(
        &self,
        attempt_id: &str,
        question_id: i64,
        selected: &str,
        written: Option<&str>,
    ) -> reqwest::Response {
        self.post(
            "/api/exam/answer",
            json!({
                "attemptId": attempt_id,
                "questionId": question_id,
                "selectedOption": selected,
                "writtenAnswer": written,
                "timeSpent": 7
            }),
        )
        .await
    }

    async fn complete(&self, attempt_id: &str, timed_out: bool) -> reqwest::Response {
        self.post(
            "/api/exam/complete",
            json!({ "attemptId": attempt_id, "isTimedOut": timed_out, "totalTimeSeconds": 420 }),
        )
        .await
    }

    /// A submission that the grader accepts, worked out from the participant view and the bank.
    fn correct_submission(&self, question: &Value) -> (String, Option<String>) {
        let id = question["id"].as_i64().unwrap();
        let q = self.bank.get(id).unwrap();
        match &q.kind {
            QuestionKind::MultipleChoice { correct_answer, .. } => {
                let text = q.option_text(*correct_answer).unwrap();
                let shown = question["options"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .find(|o| o["text"] == text)
                    .unwrap();
                (shown["key"].as_str().unwrap().to_string(), None)
            }
            QuestionKind::TrueFalse { correct_answer, .. } => (correct_answer.to_string(), None),
            QuestionKind::Written {
                accepted_keywords, ..
            } => ("written".to_string(), Some(accepted_keywords.join(", "))),
        }
    }

    fn wrong_submission(&self, question: &Value) -> (String, Option<String>) {
        let (right, _) = self.correct_submission(question);
        match question["type"].as_str().unwrap() {
            "multiple-choice" => {
                let wrong = ["A", "B", "C", "D"].into_iter().find(|l| *l != right).unwrap();
                (wrong.to_string(), None)
            }
            "true-false" => (if right == "true" { "false" } else { "true" }.to_string(), None),
            _ => ("written".to_string(), Some("nothing relevant".to_string())),
        }
    }
}

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn validate_code_reports_state() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let unknown: Value = app
        .post("/api/exam/validate-code", json!({ "code": "NOPE" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(unknown["valid"], false);

    let created = app.create_code(&token, "spring26").await;
    assert_eq!(created["code"], "SPRING26");

    let valid: Value = app
        .post("/api/exam/validate-code", json!({ "code": "Spring26" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(valid["valid"], true);
    assert_eq!(valid["examName"], "Spring exam");
    assert_eq!(valid["examCodeId"], created["id"]);

    let resp = app
        .client
        .patch(format!("{}/api/admin/exam-codes/{}", app.address, created["id"].as_str().unwrap()))
        .bearer_auth(&token)
        .json(&json!({ "isActive": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let inactive: Value = app
        .post("/api/exam/validate-code", json!({ "code": "SPRING26" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(inactive["valid"], false);
}

#[tokio::test]
async fn expired_code_cannot_start() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let resp = app
        .admin_post(
            &token,
            "/api/admin/exam-codes",
            json!({ "code": "OLD2020", "name": "Old", "expiresAt": "2020-01-01T00:00:00Z" }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 201);

    let check: Value = app
        .post("/api/exam/validate-code", json!({ "code": "OLD2020" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(check["valid"], false);
    assert_eq!(check["expired"], true);

    assert_eq!(app.start("OLD2020", "Anna", "Svensson").await.status().as_u16(), 400);
    assert_eq!(app.start("MISSING", "Anna", "Svensson").await.status().as_u16(), 404);
}

#[tokio::test]
async fn exam_code_validation_and_duplicates() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    app.create_code(&token, "DUP123").await;
    let dup = app
        .admin_post(&token, "/api/admin/exam-codes", json!({ "code": "dup123", "name": "x" }))
        .await;
    assert_eq!(dup.status().as_u16(), 409);

    let bad = app
        .admin_post(&token, "/api/admin/exam-codes", json!({ "code": "no way", "name": "x" }))
        .await;
    assert_eq!(bad.status().as_u16(), 400);

    let codes: Vec<Value> = app
        .admin_get(&token, "/api/admin/exam-codes")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(codes.len(), 1);
}

#[tokio::test]
async fn start_hides_answers_and_blocks_second_attempt() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    app.create_code(&token, "TELINK").await;

    let body = app.started("TELINK", "Anna", "Svensson").await;
    assert_eq!(body["timeLimit"], 1800);
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), app.bank.len());

    let raw = body.to_string();
    assert!(!raw.contains("correctAnswer"));
    assert!(!raw.contains("acceptedKeywords"));

    // Same person, different spelling.
    let again = app.start("telink", " anna", "SVENSSON ").await;
    assert_eq!(again.status().as_u16(), 409);

    let blank = app.start("TELINK", "   ", "Svensson").await;
    assert_eq!(blank.status().as_u16(), 400);
}

#[tokio::test]
async fn full_exam_scores_and_rejects_second_completion() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    app.create_code(&token, "FULL01").await;

    let body = app.started("FULL01", "Erik", "Lund").await;
    let attempt_id = body["attemptId"].as_str().unwrap().to_string();

    for question in body["questions"].as_array().unwrap() {
        let (selected, written) = app.correct_submission(question);
        let resp = app
            .answer(&attempt_id, question["id"].as_i64().unwrap(), &selected, written.as_deref())
            .await;
        assert_eq!(resp.status().as_u16(), 200);
    }

    let resp = app.complete(&attempt_id, false).await;
    assert_eq!(resp.status().as_u16(), 200);
    let result: Value = resp.json().await.unwrap();
    assert_eq!(result["totalCorrect"], 30);
    assert_eq!(result["totalScore"], 100);
    assert_eq!(result["percentage"], 100);

    // Review follows the shuffled order and carries the shuffled correct letter.
    let review = result["answers"].as_array().unwrap();
    assert_eq!(review.len(), 30);
    for (shown, reviewed) in body["questions"].as_array().unwrap().iter().zip(review) {
        assert_eq!(shown["id"], reviewed["questionId"]);
        assert_eq!(reviewed["isCorrect"], true);
        if reviewed["questionType"] == "multiple-choice" {
            assert_eq!(reviewed["selectedOption"], reviewed["correctOption"]);
            assert_eq!(shown["options"], reviewed["options"]);
        }
    }

    let second = app.complete(&attempt_id, true).await;
    assert_eq!(second.status().as_u16(), 409);

    let late = app.answer(&attempt_id, 1, "A", None).await;
    assert_eq!(late.status().as_u16(), 409);

    let detail: Value = app
        .admin_get(&token, &format!("/api/admin/attempts/{}", attempt_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail["totalCorrect"], 30);
    assert_eq!(detail["isTimedOut"], false);
    assert_eq!(detail["participantName"], "Erik Lund");
}

#[tokio::test]
async fn manual_override_recomputes_totals() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    app.create_code(&token, "GRADE1").await;

    let body = app.started("GRADE1", "Maja", "Berg").await;
    let attempt_id = body["attemptId"].as_str().unwrap().to_string();
    let questions = body["questions"].as_array().unwrap();

    for (i, question) in questions.iter().take(3).enumerate() {
        let (selected, written) = if i < 2 {
            app.correct_submission(question)
        } else {
            app.wrong_submission(question)
        };
        app.answer(&attempt_id, question["id"].as_i64().unwrap(), &selected, written.as_deref())
            .await;
    }

    let result: Value = app.complete(&attempt_id, true).await.json().await.unwrap();
    assert_eq!(result["totalCorrect"], 2);
    // Unanswered questions still count: 2 of 30.
    assert_eq!(result["totalScore"], 7);

    let third = questions[2]["id"].as_i64().unwrap();
    let resp = app
        .admin_post(
            &token,
            "/api/admin/grade-answer",
            json!({ "attemptId": attempt_id, "questionId": third, "isCorrect": true }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let graded: Value = resp.json().await.unwrap();
    assert_eq!(graded["totalCorrect"], 3);
    assert_eq!(graded["totalScore"], 10);

    let detail: Value = app
        .admin_get(&token, &format!("/api/admin/attempts/{}", attempt_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail["isCompleted"], true);
    assert_eq!(detail["isTimedOut"], true);
    assert_eq!(detail["totalScore"], 10);

    let missing = app
        .admin_post(
            &token,
            "/api/admin/grade-answer",
            json!({ "attemptId": attempt_id, "questionId": questions[5]["id"], "isCorrect": true }),
        )
        .await;
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn concurrent_completion_and_answers_stay_consistent() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    app.create_code(&token, "RACE01").await;

    let body = app.started("RACE01", "Karin", "Sjo").await;
    let attempt_id = body["attemptId"].as_str().unwrap().to_string();
    let questions = body["questions"].as_array().unwrap();

    let app = &app;
    let submit = |i: usize| {
        let (selected, written) = app.correct_submission(&questions[i]);
        let id = questions[i]["id"].as_i64().unwrap();
        let attempt_id = attempt_id.clone();
        async move {
            app.answer(&attempt_id, id, &selected, written.as_deref())
                .await
                .status()
                .as_u16()
        }
    };

    let (first, second, a, b, c) = tokio::join!(
        app.complete(&attempt_id, false),
        app.complete(&attempt_id, true),
        submit(0),
        submit(1),
        submit(2),
    );

    let mut statuses = [first.status().as_u16(), second.status().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [200, 409]);

    let winner = if first.status().as_u16() == 200 { first } else { second };
    let result: Value = winner.json().await.unwrap();

    let submitted = [a, b, c];
    assert!(submitted.iter().all(|s| *s == 200 || *s == 409));
    let accepted = submitted.iter().filter(|s| **s == 200).count();

    // Every accepted answer is counted; refused ones never reach the store.
    let detail: Value = app
        .admin_get(&token, &format!("/api/admin/attempts/{}", attempt_id))
        .await
        .json()
        .await
        .unwrap();
    let correct_rows = detail["answers"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["isCorrect"] == true)
        .count();
    assert_eq!(correct_rows, accepted);
    assert_eq!(detail["totalCorrect"], accepted);
    assert_eq!(result["totalCorrect"], accepted);
}

#[tokio::test]
async fn answer_rejections() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    app.create_code(&token, "REJECT").await;

    let body = app.started("REJECT", "Olof", "Ek").await;
    let attempt_id = body["attemptId"].as_str().unwrap().to_string();

    let unknown_attempt = app
        .answer(&uuid::Uuid::new_v4().to_string(), 1, "A", None)
        .await;
    assert_eq!(unknown_attempt.status().as_u16(), 404);

    let not_in_attempt = app.answer(&attempt_id, 999, "A", None).await;
    assert_eq!(not_in_attempt.status().as_u16(), 400);

    let bad_letter = app.answer(&attempt_id, 1, "E", None).await;
    assert_eq!(bad_letter.status().as_u16(), 400);

    let too_long = "x".repeat(301);
    let long_written = app.answer(&attempt_id, 28, "written", Some(&too_long)).await;
    assert_eq!(long_written.status().as_u16(), 400);

    let unknown_complete = app.complete(&uuid::Uuid::new_v4().to_string(), false).await;
    assert_eq!(unknown_complete.status().as_u16(), 404);
}

#[tokio::test]
async fn resubmission_overwrites_answer() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    app.create_code(&token, "AGAIN1").await;

    let body = app.started("AGAIN1", "Sara", "Holm").await;
    let attempt_id = body["attemptId"].as_str().unwrap().to_string();
    let first = &body["questions"][0];
    let id = first["id"].as_i64().unwrap();

    let (wrong, wrong_text) = app.wrong_submission(first);
    app.answer(&attempt_id, id, &wrong, wrong_text.as_deref()).await;
    let (right, right_text) = app.correct_submission(first);
    app.answer(&attempt_id, id, &right, right_text.as_deref()).await;

    let result: Value = app.complete(&attempt_id, false).await.json().await.unwrap();
    assert_eq!(result["totalCorrect"], 1);
}

#[tokio::test]
async fn admin_routes_require_token() {
    let app = spawn_app().await;

    let resp = app
        .client
        .get(format!("{}/api/admin/stats", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let bad = app.admin_get("not-a-token", "/api/admin/attempts").await;
    assert_eq!(bad.status().as_u16(), 401);

    let wrong_password = app
        .post(
            "/api/auth/admin-login",
            json!({ "email": ADMIN_EMAIL, "password": "nope" }),
        )
        .await;
    assert_eq!(wrong_password.status().as_u16(), 401);

    let wrong_email = app
        .post(
            "/api/auth/admin-login",
            json!({ "email": "someone@example.com", "password": ADMIN_PASSWORD }),
        )
        .await;
    assert_eq!(wrong_email.status().as_u16(), 401);
}

#[tokio::test]
async fn stats_listing_and_delete() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    app.create_code(&token, "STATS1").await;

    let body = app.started("STATS1", "Lina", "Ahl").await;
    let attempt_id = body["attemptId"].as_str().unwrap().to_string();
    for question in body["questions"].as_array().unwrap().iter().take(10) {
        let (selected, written) = app.correct_submission(question);
        app.answer(&attempt_id, question["id"].as_i64().unwrap(), &selected, written.as_deref())
            .await;
    }
    app.complete(&attempt_id, false).await;

    // Started but never finished.
    app.started("STATS1", "Nils", "Ek").await;

    let attempts: Vec<Value> = app
        .admin_get(&token, "/api/admin/attempts")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["participantName"], "Lina Ahl");
    assert_eq!(attempts[0]["totalCorrect"], 10);

    let stats: Value = app
        .admin_get(&token, "/api/admin/stats")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(stats["stats"]["totalParticipants"], 1);
    assert_eq!(stats["stats"]["completionRate"], 50);
    assert_eq!(stats["scoreDistribution"].as_array().unwrap().len(), 6);
    assert_eq!(stats["scoreDistribution"][1]["count"], 1);
    assert_eq!(stats["timeVsScore"][0]["name"], "Lina A.");
    assert_eq!(stats["questionStats"].as_array().unwrap().len(), 30);
    assert_eq!(stats["hardestQuestions"].as_array().unwrap().len(), 5);

    let resp = app
        .client
        .delete(format!("{}/api/admin/attempts/{}", app.address, attempt_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let gone = app
        .admin_get(&token, &format!("/api/admin/attempts/{}", attempt_id))
        .await;
    assert_eq!(gone.status().as_u16(), 404);
}
