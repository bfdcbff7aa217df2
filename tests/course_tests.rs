// tests/course_tests.rs

use std::sync::Arc;

use academy::{
    config::Config,
    media::local::LocalMediaStore,
    routes,
    services::users::seed_admin_user,
    state::AppState,
    store::memory::MemoryStore,
};
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use tempfile::TempDir;

const ADMIN_EMAIL: &str = "admin@academy.test";
const ADMIN_PASSWORD: &str = "admin_password";

struct TestApp {
    address: String,
    client: reqwest::Client,
    _uploads: TempDir,
}

async fn spawn_app() -> TestApp {
    let uploads = tempfile::tempdir().expect("Failed to create temp dir");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let config = Config {
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        upload_dir: uploads.path().to_path_buf(),
        public_base_url: address.clone(),
        ..Config::new("postgres://unused", "course_test_secret")
    };

    let store = MemoryStore::new();
    seed_admin_user(&store, &config)
        .await
        .expect("Failed to seed admin");

    let state = AppState {
        store: Arc::new(store),
        media: Arc::new(LocalMediaStore::new(uploads.path(), &address)),
        config,
    };
    let app = routes::create_router(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
        _uploads: uploads,
    }
}

/// A module whose quiz has `questions` questions, every answer key "A".
fn quiz_module(title: &str, questions: usize) -> Value {
    let quiz: Vec<Value> = (0..questions)
        .map(|i| {
            json!({
                "question": format!("{} question {}", title, i + 1),
                "options": ["A", "B", "C"],
                "correct_answer": "A"
            })
        })
        .collect();
    json!({ "title": title, "description": "Read the notes first.", "quiz": quiz })
}

fn reading_module(title: &str) -> Value {
    json!({
        "title": title,
        "links": [{ "name": "Notes", "url": "https://example.org/notes" }]
    })
}

/// `correct` right answers followed by wrong ones, `total` in all.
fn answers(correct: usize, total: usize) -> Value {
    let answers: Vec<&str> = (0..total).map(|i| if i < correct { "A" } else { "B" }).collect();
    json!({ "answers": answers })
}

fn cover() -> Part {
    Part::bytes(vec![0x89, b'P', b'N', b'G'])
        .file_name("cover.png")
        .mime_str("image/png")
        .unwrap()
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn token(&self, email: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        self.token(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Registers, approves and logs in a user. Returns (user id, token).
    async fn approved_user(&self, role: &str) -> (String, String) {
        let email = format!("{}@academy.test", &uuid::Uuid::new_v4().to_string()[..8]);
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "first_name": "Elena",
                "last_name": "Quispe",
                "email": email,
                "role": role,
                "password": "password123",
                "confirm_password": "password123"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        let id = body["user_id"].as_str().unwrap().to_string();

        let admin = self.admin_token().await;
        let response = self
            .client
            .put(self.url(&format!("/api/admin/users/{}/approve", id)))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        (id, self.token(&email, "password123").await)
    }

    async fn create_course(&self, token: &str, modules: Value) -> String {
        let form = Form::new()
            .text("title", "Community Gardening")
            .text("duration_hours", "12")
            .text("welcome", "<p>Welcome!</p>")
            .text("audience", "community")
            .text("tools", r#"["spade"]"#)
            .text("learning_outcomes", r#"["Plan a bed"]"#)
            .text("modules", modules.to_string())
            .part("image", cover());

        let response = self
            .client
            .post(self.url("/api/staff/courses"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    async fn post(&self, token: &str, path: &str, body: Option<Value>) -> reqwest::Response {
        let mut request = self.client.post(self.url(path)).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        request.send().await.expect("Failed to execute request")
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

#[tokio::test]
async fn worked_example_progress_and_certificate() {
    // Arrange: two quiz modules and one reading module
    let app = spawn_app().await;
    let (_, teacher) = app.approved_user("teacher").await;
    let (student_id, student) = app.approved_user("student").await;
    let course_id = app
        .create_course(
            &teacher,
            json!([
                quiz_module("Soil", 5),
                reading_module("Further reading"),
                quiz_module("Water", 10)
            ]),
        )
        .await;

    // Act: enroll twice
    let first = app.post(&student, &format!("/api/courses/{}/enroll", course_id), None).await;
    let second = app.post(&student, &format!("/api/courses/{}/enroll", course_id), None).await;

    // Assert
    assert_eq!(first.status().as_u16(), 201);
    assert_eq!(second.status().as_u16(), 200);

    // Act: 4 of 5 on the first quiz (80%)
    let response = app
        .post(
            &student,
            &format!("/api/courses/{}/modules/0/answers", course_id),
            Some(answers(4, 5)),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["attempt"]["score"], 80);
    assert_eq!(body["passed"], true);
    assert_eq!(body["progress"]["progress"], 50);
    assert_eq!(body["progress"]["completed"], false);

    let early = app
        .post(&student, &format!("/api/courses/{}/finalize", course_id), None)
        .await;
    assert_eq!(early.status().as_u16(), 400);

    // Act: 7 of 10 on the second quiz (70%)
    let response = app
        .post(
            &student,
            &format!("/api/courses/{}/modules/2/answers", course_id),
            Some(answers(7, 10)),
        )
        .await;

    // Assert
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["attempt"]["score"], 70);
    assert_eq!(body["progress"]["progress"], 100);
    assert_eq!(body["progress"]["completed"], true);
    assert_eq!(body["progress"]["completed_modules"], json!([0, 2]));

    // Act: finalize twice
    let issued = app
        .post(&student, &format!("/api/courses/{}/finalize", course_id), None)
        .await;
    let reissued = app
        .post(&student, &format!("/api/courses/{}/finalize", course_id), None)
        .await;

    // Assert
    assert_eq!(issued.status().as_u16(), 201);
    assert_eq!(reissued.status().as_u16(), 200);
    let issued: Value = issued.json().await.unwrap();
    let reissued: Value = reissued.json().await.unwrap();
    assert_eq!(issued["id"], reissued["id"]);
    assert_eq!(issued["code"], reissued["code"]);
    assert!(issued["code"].as_str().unwrap().starts_with("GP-"));
    assert_eq!(issued["user_name"], "Elena Quispe");
    assert_eq!(issued["course_name"], "Community Gardening");
    assert!(issued["diploma_url"].as_str().unwrap().contains("code="));

    let certificate_id = issued["id"].as_str().unwrap();
    let fetched = app
        .get(&student, &format!("/api/certificates/{}", certificate_id))
        .await;
    assert_eq!(fetched.status().as_u16(), 200);

    let listed: Value = app
        .get(&student, &format!("/api/certificates/user/{}", student_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // The course list reflects the progress
    let mine: Value = app
        .get(&student, "/api/courses/me/progress")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(mine[0]["id"], course_id.as_str());
    assert_eq!(mine[0]["progress"], 100);
    assert_eq!(mine[0]["completed"], true);
}

#[tokio::test]
async fn pass_threshold_boundary() {
    // Arrange: 9 of 13 rounds to 69%
    let app = spawn_app().await;
    let (_, teacher) = app.approved_user("teacher").await;
    let (_, student) = app.approved_user("student").await;
    let course_id = app
        .create_course(&teacher, json!([quiz_module("Seeds", 13)]))
        .await;
    let path = format!("/api/courses/{}/modules/0/answers", course_id);

    // Act
    let failing: Value = app
        .post(&student, &path, Some(answers(9, 13)))
        .await
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(failing["attempt"]["score"], 69);
    assert_eq!(failing["passed"], false);
    assert_eq!(failing["progress"]["progress"], 0);

    // Act: 10 of 13 is 77%
    let passing: Value = app
        .post(&student, &path, Some(answers(10, 13)))
        .await
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(passing["passed"], true);
    assert_eq!(passing["progress"]["progress"], 100);

    // Only one attempt is kept per module
    let attempts: Value = app
        .get(&student, &format!("/api/courses/{}/attempts", course_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(attempts.as_array().unwrap().len(), 1);
    assert_eq!(attempts[0]["score"], 77);
}

#[tokio::test]
async fn identical_resubmission_is_idempotent() {
    // Arrange
    let app = spawn_app().await;
    let (_, teacher) = app.approved_user("teacher").await;
    let (_, student) = app.approved_user("student").await;
    let course_id = app
        .create_course(&teacher, json!([quiz_module("A", 4), quiz_module("B", 4)]))
        .await;
    let path = format!("/api/courses/{}/modules/1/answers", course_id);

    // Act
    let first: Value = app
        .post(&student, &path, Some(answers(3, 4)))
        .await
        .json()
        .await
        .unwrap();
    let second: Value = app
        .post(&student, &path, Some(answers(3, 4)))
        .await
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(first["attempt"]["id"], second["attempt"]["id"]);
    assert_eq!(first["progress"]["progress"], second["progress"]["progress"]);
    assert_eq!(
        first["progress"]["completed_modules"],
        second["progress"]["completed_modules"]
    );
    assert_eq!(second["progress"]["progress"], 50);
    assert_eq!(first["progress"]["enrolled_at"], second["progress"]["enrolled_at"]);

    let attempt: Value = app
        .get(&student, &format!("/api/courses/{}/modules/1/attempt", course_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(attempt["correct_count"], 3);
    assert_eq!(attempt["answers"][3]["correct"], false);
}

#[tokio::test]
async fn concurrent_submissions_keep_both_modules() {
    // Arrange
    let app = spawn_app().await;
    let (_, teacher) = app.approved_user("teacher").await;
    let (_, student) = app.approved_user("student").await;
    let course_id = app
        .create_course(
            &teacher,
            json!([quiz_module("Compost", 4), quiz_module("Mulch", 4)]),
        )
        .await;
    let first = format!("/api/courses/{}/modules/0/answers", course_id);
    let second = format!("/api/courses/{}/modules/1/answers", course_id);

    // Act
    let (a, b) = tokio::join!(
        app.post(&student, &first, Some(answers(4, 4))),
        app.post(&student, &second, Some(answers(3, 4)))
    );

    // Assert
    assert_eq!(a.status().as_u16(), 200);
    assert_eq!(b.status().as_u16(), 200);

    let mine: Value = app
        .get(&student, "/api/courses/me/progress")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(mine[0]["progress"], 100);
    assert_eq!(mine[0]["completed"], true);

    let progress: Value = app
        .get(&student, &format!("/api/courses/{}/progress", course_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(progress["completed_modules"], json!([0, 1]));
    assert_eq!(progress["progress"], 100);
    assert_eq!(progress["completed"], true);
}

#[tokio::test]
async fn missing_answers_count_as_wrong() {
    // Arrange
    let app = spawn_app().await;
    let (_, teacher) = app.approved_user("teacher").await;
    let (_, student) = app.approved_user("student").await;
    let course_id = app
        .create_course(&teacher, json!([quiz_module("A", 4)]))
        .await;

    // Act: only two answers for four questions
    let body: Value = app
        .post(
            &student,
            &format!("/api/courses/{}/modules/0/answers", course_id),
            Some(json!({ "answers": ["A", "A"] })),
        )
        .await
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(body["attempt"]["score"], 50);
    assert_eq!(body["attempt"]["total_questions"], 4);
}

#[tokio::test]
async fn course_without_quizzes_is_complete_on_enrollment() {
    // Arrange
    let app = spawn_app().await;
    let (_, teacher) = app.approved_user("teacher").await;
    let (_, student) = app.approved_user("student").await;
    let course_id = app
        .create_course(&teacher, json!([reading_module("Intro")]))
        .await;

    // Act
    let enrolled: Value = app
        .post(&student, &format!("/api/courses/{}/enroll", course_id), None)
        .await
        .json()
        .await
        .unwrap();
    let finalized = app
        .post(&student, &format!("/api/courses/{}/finalize", course_id), None)
        .await;

    // Assert
    assert_eq!(enrolled["progress"], 100);
    assert_eq!(enrolled["completed"], true);
    assert_eq!(finalized.status().as_u16(), 201);
}

#[tokio::test]
async fn quiz_submission_errors() {
    // Arrange
    let app = spawn_app().await;
    let (_, teacher) = app.approved_user("teacher").await;
    let (_, student) = app.approved_user("student").await;
    let course_id = app
        .create_course(&teacher, json!([reading_module("Intro"), quiz_module("Q", 2)]))
        .await;
    let unknown = uuid::Uuid::new_v4();

    // Act
    let no_quiz = app
        .post(
            &student,
            &format!("/api/courses/{}/modules/0/answers", course_id),
            Some(answers(1, 1)),
        )
        .await;
    let no_module = app
        .post(
            &student,
            &format!("/api/courses/{}/modules/7/answers", course_id),
            Some(answers(1, 1)),
        )
        .await;
    let no_course = app
        .post(
            &student,
            &format!("/api/courses/{}/modules/0/answers", unknown),
            Some(answers(1, 1)),
        )
        .await;
    let no_attempt = app
        .get(&student, &format!("/api/courses/{}/modules/1/attempt", course_id))
        .await;
    let not_enrolled = app
        .get(&student, &format!("/api/courses/{}/progress", course_id))
        .await;

    // Assert
    assert_eq!(no_quiz.status().as_u16(), 400);
    assert_eq!(no_module.status().as_u16(), 404);
    assert_eq!(no_course.status().as_u16(), 404);
    assert_eq!(no_attempt.status().as_u16(), 404);
    assert_eq!(not_enrolled.status().as_u16(), 404);
}

#[tokio::test]
async fn public_views_hide_answer_keys() {
    // Arrange
    let app = spawn_app().await;
    let (_, teacher) = app.approved_user("teacher").await;
    let course_id = app
        .create_course(&teacher, json!([quiz_module("Soil", 2)]))
        .await;

    // Act
    let public: Value = app
        .client
        .get(app.url(&format!("/api/courses/{}", course_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let document: Value = app
        .get(&teacher, &format!("/api/staff/courses/{}", course_id))
        .await
        .json()
        .await
        .unwrap();

    // Assert
    let question = &public["modules"][0]["quiz"][0];
    assert_eq!(question["options"], json!(["A", "B", "C"]));
    assert!(question.get("correct_answer").is_none());
    assert_eq!(document["modules"][0]["quiz"][0]["correct_answer"], "A");
    assert_eq!(public["status"], "pending");
    assert_eq!(public["quiz_access_count"], 0);
}

#[tokio::test]
async fn publish_and_list_by_audience() {
    // Arrange
    let app = spawn_app().await;
    let (_, teacher) = app.approved_user("teacher").await;
    let course_id = app
        .create_course(&teacher, json!([reading_module("Intro")]))
        .await;

    let listed = |audience: &'static str| {
        let url = app.url(&format!("/api/courses/audience/{}", audience));
        let client = app.client.clone();
        async move { client.get(url).send().await.unwrap() }
    };

    // Act
    let before: Value = listed("community").await.json().await.unwrap();
    let published = app
        .client
        .put(app.url(&format!("/api/staff/courses/{}/publish", course_id)))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap();
    let after: Value = listed("community").await.json().await.unwrap();
    let other: Value = listed("teacher").await.json().await.unwrap();
    let invalid = listed("aliens").await;

    // Assert
    assert!(before.as_array().unwrap().is_empty());
    assert_eq!(published.status().as_u16(), 200);
    assert_eq!(after.as_array().unwrap().len(), 1);
    assert_eq!(after[0]["id"], course_id.as_str());
    assert!(other.as_array().unwrap().is_empty());
    assert_eq!(invalid.status().as_u16(), 400);
}

#[tokio::test]
async fn course_form_validation() {
    // Arrange
    let app = spawn_app().await;
    let (_, teacher) = app.approved_user("teacher").await;

    // Act
    let malformed = Form::new()
        .text("title", "Broken")
        .text("audience", "student")
        .text("modules", "[{not json")
        .part("image", cover());
    let malformed = app
        .client
        .post(app.url("/api/staff/courses"))
        .bearer_auth(&teacher)
        .multipart(malformed)
        .send()
        .await
        .unwrap();

    let no_image = Form::new().text("title", "No cover").text("audience", "student");
    let no_image = app
        .client
        .post(app.url("/api/staff/courses"))
        .bearer_auth(&teacher)
        .multipart(no_image)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(malformed.status().as_u16(), 400);
    assert_eq!(no_image.status().as_u16(), 400);
}

#[tokio::test]
async fn update_keeps_image_and_appends_files() {
    // Arrange
    let app = spawn_app().await;
    let (_, teacher) = app.approved_user("teacher").await;
    let course_id = app
        .create_course(&teacher, json!([reading_module("Intro")]))
        .await;
    let original: Value = app
        .get(&teacher, &format!("/api/staff/courses/{}", course_id))
        .await
        .json()
        .await
        .unwrap();

    let handout = || {
        Part::bytes(b"%PDF-1.4".to_vec())
            .file_name("handout.pdf")
            .mime_str("application/pdf")
            .unwrap()
    };

    // Act: two updates, each adding one file, no new image
    for title in ["Gardening II", "Gardening III"] {
        let form = Form::new()
            .text("title", title)
            .text("audience", "student")
            .text("modules", json!([reading_module("Intro")]).to_string())
            .part("module_files", handout());
        let response = app
            .client
            .put(app.url(&format!("/api/staff/courses/{}", course_id)))
            .bearer_auth(&teacher)
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    let updated: Value = app
        .get(&teacher, &format!("/api/staff/courses/{}", course_id))
        .await
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(updated["title"], "Gardening III");
    assert_eq!(updated["audience"], "student");
    assert_eq!(updated["image_url"], original["image_url"]);
    assert_eq!(updated["module_files"].as_array().unwrap().len(), 2);
    assert_eq!(updated["module_files"][0]["name"], "handout.pdf");
    assert!(!updated["updated_at"].is_null());
}

#[tokio::test]
async fn participants_access_log_and_unenroll() {
    // Arrange
    let app = spawn_app().await;
    let (_, teacher) = app.approved_user("teacher").await;
    let (student_id, student) = app.approved_user("student").await;
    let course_id = app
        .create_course(&teacher, json!([quiz_module("Q", 2)]))
        .await;
    app.post(&student, &format!("/api/courses/{}/enroll", course_id), None)
        .await;

    // Act
    let first: Value = app
        .post(&student, &format!("/api/courses/{}/modules/0/access", course_id), None)
        .await
        .json()
        .await
        .unwrap();
    let repeat: Value = app
        .post(&student, &format!("/api/courses/{}/modules/0/access", course_id), None)
        .await
        .json()
        .await
        .unwrap();
    let participants: Value = app
        .get(&teacher, &format!("/api/staff/courses/{}/participants", course_id))
        .await
        .json()
        .await
        .unwrap();
    let count: Value = app
        .get(&teacher, &format!("/api/staff/courses/{}/participants/count", course_id))
        .await
        .json()
        .await
        .unwrap();
    let course: Value = app
        .client
        .get(app.url(&format!("/api/courses/{}", course_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(first["recorded"], true);
    assert_eq!(repeat["recorded"], false);
    assert_eq!(participants[0]["user_id"], student_id.as_str());
    assert_eq!(participants[0]["name"], "Elena Quispe");
    assert_eq!(count["count"], 1);
    assert_eq!(course["quiz_access_count"], 1);

    // Act: unenroll
    let removed = app
        .client
        .delete(app.url(&format!("/api/users/me/courses/{}", course_id)))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    let courses: Value = app
        .get(&student, &format!("/api/users/{}/courses", student_id))
        .await
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(removed.status().as_u16(), 200);
    assert!(courses.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_course_keeps_certificates() {
    // Arrange
    let app = spawn_app().await;
    let (_, teacher) = app.approved_user("teacher").await;
    let (student_id, student) = app.approved_user("student").await;
    let admin = app.admin_token().await;
    let course_id = app
        .create_course(&teacher, json!([quiz_module("Q", 1)]))
        .await;
    app.post(
        &student,
        &format!("/api/courses/{}/modules/0/answers", course_id),
        Some(answers(1, 1)),
    )
    .await;
    let issued = app
        .post(&student, &format!("/api/courses/{}/finalize", course_id), None)
        .await;
    assert_eq!(issued.status().as_u16(), 201);

    let attempts_before: Value = app
        .get(&admin, &format!("/api/admin/courses/{}/attempts", course_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(attempts_before.as_array().unwrap().len(), 1);

    // Act
    let deleted = app
        .client
        .delete(app.url(&format!("/api/staff/courses/{}", course_id)))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap();
    let missing = app
        .client
        .get(app.url(&format!("/api/courses/{}", course_id)))
        .send()
        .await
        .unwrap();
    let certificates: Value = app
        .get(&student, &format!("/api/certificates/user/{}", student_id))
        .await
        .json()
        .await
        .unwrap();
    let progress = app
        .get(&student, &format!("/api/courses/{}/progress", course_id))
        .await;

    // Assert
    assert_eq!(deleted.status().as_u16(), 200);
    assert_eq!(missing.status().as_u16(), 404);
    assert_eq!(certificates.as_array().unwrap().len(), 1);
    assert_eq!(progress.status().as_u16(), 404);
}
