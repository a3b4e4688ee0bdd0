use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use lms_portal::{
    AppState, create_router,
    auth::issue_token,
    config::AppConfig,
    memory::InMemoryRepository,
    models::{NewUser, Role, User},
    repository::Repository,
    storage::{MockStorageService, StorageState},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

// --- Test Harness ---

struct TestApp {
    router: Router,
    repo: Arc<InMemoryRepository>,
    config: AppConfig,
}

fn test_app_with_storage(storage: StorageState) -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let config = AppConfig::default();
    let router = create_router(AppState {
        repo: repo.clone(),
        storage,
        config: config.clone(),
    });
    TestApp {
        router,
        repo,
        config,
    }
}

fn test_app() -> TestApp {
    test_app_with_storage(Arc::new(MockStorageService::new()))
}

impl TestApp {
    /// Inserts an account directly and returns it with a bearer token.
    async fn seed(&self, role: Role) -> (User, String) {
        let user = self
            .repo
            .create_user(NewUser {
                first_name: "Seeded".to_string(),
                last_name: role.to_string(),
                email: format!("{}@example.com", Uuid::new_v4()),
                password_hash: "unused".to_string(),
                role,
                specialization: None,
                qualifications: None,
            })
            .await
            .unwrap();
        let token = issue_token(&user, &self.config).unwrap();
        (user, token)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    async fn create_course(&self, token: &str, title: &str) -> Uuid {
        let (status, body) = self
            .send(
                Method::POST,
                "/courses",
                Some(token),
                Some(json!({
                    "title": title,
                    "description": "Handler test course",
                    "category": "Testing",
                    "level": "intermediate",
                    "price": 19.5
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().parse().unwrap()
    }
}

// --- Public Routes ---

#[tokio::test]
async fn test_health_check() {
    let app = test_app();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".to_string()));
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = test_app();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_register_and_login_over_http() {
    let app = test_app();
    let payload = json!({
        "first_name": "Alan",
        "last_name": "Turing",
        "email": "alan@example.com",
        "password": "enigma-machine"
    });

    let (status, body) = app
        .send(Method::POST, "/auth/register", None, Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "student");
    assert!(body["token"].as_str().is_some());
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = app
        .send(Method::POST, "/auth/register", None, Some(payload))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "duplicate_email");

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "alan@example.com", "password": "wrong-guess" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_credentials");

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "alan@example.com", "password": "enigma-machine" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.send(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alan@example.com");
}

#[tokio::test]
async fn test_register_rejects_elevated_role_and_bad_input() {
    let app = test_app();

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "first_name": "Eve",
                "last_name": "Admin",
                "email": "eve@example.com",
                "password": "let-me-in-please",
                "role": "admin"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": "half@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_public_catalogue_lists_published_only() {
    let app = test_app();
    let (_, token) = app.seed(Role::Instructor).await;
    let draft = app.create_course(&token, "Draft course").await;
    let live = app.create_course(&token, "Live course").await;

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/courses/{live}/status"),
            Some(&token),
            Some(json!({ "status": "Published" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(Method::GET, "/courses", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![live.to_string()]);
    assert!(!ids.contains(&draft.to_string().as_str()));
}

// --- Authenticated Routes ---

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = test_app();
    for (method, uri) in [
        (Method::POST, "/courses".to_string()),
        (Method::GET, "/me".to_string()),
        (Method::GET, format!("/courses/{}", Uuid::new_v4())),
        (Method::GET, "/admin/stats".to_string()),
    ] {
        let (status, body) = app.send(method, &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["code"], "unauthenticated");
    }
}

#[tokio::test]
async fn test_course_access_outcomes() {
    let app = test_app();
    let (_, owner) = app.seed(Role::Instructor).await;
    let (_, stranger) = app.seed(Role::Student).await;
    let course = app.create_course(&owner, "Access").await;

    let (status, body) = app
        .send(Method::GET, &format!("/courses/{course}"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lessons"][0]["title"], "Introduction");
    assert_eq!(body["price"], 19.5);

    let (status, _) = app
        .send(Method::GET, &format!("/courses/{course}"), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::GET, &format!("/courses/{}", Uuid::new_v4()), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = app
        .send(Method::POST, "/courses", Some(&stranger), Some(json!({ "title": "x" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_enrollment_flow_over_http() {
    let app = test_app();
    let (_, owner) = app.seed(Role::Instructor).await;
    let (student, student_token) = app.seed(Role::Student).await;
    let course = app.create_course(&owner, "Enrollment").await;

    let (status, body) = app
        .send(Method::POST, &format!("/courses/{course}/enroll"), Some(&student_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Enrolled successfully");

    let (status, body) = app
        .send(Method::POST, &format!("/courses/{course}/enroll"), Some(&student_token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_enrolled");

    let (status, body) = app
        .send(Method::GET, "/courses/enrolled", Some(&student_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let remove_uri = format!("/courses/{course}/students/{}", student.id);
    let (status, _) = app.send(Method::DELETE, &remove_uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(Method::DELETE, &remove_uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "not_enrolled");
}

#[tokio::test]
async fn test_course_content_endpoints() {
    let app = test_app();
    let (_, owner) = app.seed(Role::Instructor).await;
    let course = app.create_course(&owner, "Content").await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/courses/{course}/lessons"),
            Some(&owner),
            Some(json!({ "title": "Lifetimes", "video_url": "videos/l.mp4" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lessons"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/courses/{course}/assignments"),
            Some(&owner),
            Some(json!({
                "title": "Quiz",
                "description": "Ten questions",
                "due_date": "2030-01-01T00:00:00Z",
                "total_marks": 10
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assignments"][0]["total_marks"], 10);

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/courses/{course}/thumbnail"),
            Some(&owner),
            Some(json!({ "thumbnail": "thumbnails/cover.png" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["thumbnail"], "thumbnails/cover.png");

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/courses/{course}/status"),
            Some(&owner),
            Some(json!({ "status": "Upcoming" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, _) = app
        .send(Method::DELETE, &format!("/courses/{course}"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send(Method::GET, "/courses/instructor", Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_check_email_route() {
    let app = test_app();
    let (user, token) = app.seed(Role::Student).await;

    let (status, body) = app
        .send(Method::GET, &format!("/users/check-email/{}", user.email), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exists"], true);

    let (status, body) = app
        .send(Method::GET, "/users/check-email/ghost@example.com", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exists"], false);
}

// --- Uploads ---

#[tokio::test]
async fn test_upload_media_outcomes() {
    let app = test_app();
    let (_, instructor) = app.seed(Role::Instructor).await;
    let (_, student) = app.seed(Role::Student).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/upload/thumbnail",
            Some(&instructor),
            Some(json!({ "filename": "cover.PNG", "file_type": "image/png" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let key = body["resource_key"].as_str().unwrap();
    assert!(key.starts_with("thumbnails/") && key.ends_with(".png"));
    assert!(body["upload_url"].as_str().unwrap().contains(key));

    let (status, _) = app
        .send(
            Method::POST,
            "/upload/video",
            Some(&student),
            Some(json!({ "filename": "clip.mp4", "file_type": "video/mp4" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::POST,
            "/upload/video",
            Some(&instructor),
            Some(json!({ "filename": "notes.pdf", "file_type": "video/mp4" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/upload/document",
            Some(&instructor),
            Some(json!({ "filename": "a.png", "file_type": "image/png" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_reports_storage_outage() {
    let app = test_app_with_storage(Arc::new(MockStorageService::new_failing()));
    let (_, instructor) = app.seed(Role::Instructor).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/upload/video",
            Some(&instructor),
            Some(json!({ "filename": "clip.webm", "file_type": "video/webm" })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "storage_unavailable");
    assert_eq!(body["message"], "storage unavailable");
}

// --- Admin Routes ---

#[tokio::test]
async fn test_admin_routes_enforce_role() {
    let app = test_app();
    let (_, admin) = app.seed(Role::Admin).await;
    let (_, student) = app.seed(Role::Student).await;

    let (status, _) = app.send(Method::GET, "/admin/stats", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::GET, "/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_admins"], 1);
    assert_eq!(body["total_students"], 1);

    let (status, _) = app.send(Method::GET, "/admin/students", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_account_and_course_management() {
    let app = test_app();
    let (_, admin) = app.seed(Role::Admin).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/admin/instructors",
            Some(&admin),
            Some(json!({
                "first_name": "Barbara",
                "last_name": "Liskov",
                "email": "barbara@example.com",
                "password": "substitution",
                "specialization": "Programming languages"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "instructor");
    let instructor_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            Method::POST,
            "/courses",
            Some(&admin),
            Some(json!({
                "title": "Abstraction",
                "description": "Data abstraction",
                "category": "CS",
                "level": "advanced",
                "instructor": instructor_id
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["instructor_id"], instructor_id.as_str());

    let (status, body) = app.send(Method::GET, "/admin/courses", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = app.send(Method::GET, "/admin/instructors", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = app
        .send(Method::DELETE, &format!("/admin/users/{instructor_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.send(Method::GET, "/admin/courses", Some(&admin), None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = app
        .send(Method::DELETE, &format!("/admin/users/{instructor_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_deletes_any_course() {
    let app = test_app();
    let (_, admin) = app.seed(Role::Admin).await;
    let (_, owner) = app.seed(Role::Instructor).await;
    let course = app.create_course(&owner, "Moderated").await;

    let (status, _) = app
        .send(Method::DELETE, &format!("/admin/courses/{course}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(Method::GET, &format!("/courses/{course}"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// --- Malformed Input ---

#[tokio::test]
async fn test_mistyped_body_uses_error_envelope() {
    let app = test_app();
    let (_, instructor) = app.seed(Role::Instructor).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/courses",
            Some(&instructor),
            Some(json!({
                "title": "Free course",
                "description": "Price given as text",
                "category": "Testing",
                "level": "beginner",
                "price": "free"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("price"), "{body}");
}

#[tokio::test]
async fn test_unparseable_body_uses_error_envelope() {
    let app = test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"email": "a@b.co", "#))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "validation_error");

    // Missing content type is rejected the same way.
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .body(Body::from(r#"{"email":"a@b.co","password":"x"}"#))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_invalid_path_id_uses_error_envelope() {
    let app = test_app();
    let (_, student) = app.seed(Role::Student).await;
    let (_, admin) = app.seed(Role::Admin).await;

    let (status, body) = app
        .send(Method::GET, "/courses/not-a-uuid", Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = app
        .send(Method::DELETE, "/admin/users/not-a-uuid", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}
