use actix_web::middleware::Logger;
use actix_web::{test, web, App};
use dotenv::dotenv;
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlx::PgPool;
use taskhaven::auth::TokenService;
use taskhaven::routes;
use taskhaven::routes::health;

const TEST_SECRET: &str = "integration-test-secret";

async fn test_pool() -> PgPool {
    dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test DB");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

async fn cleanup_user(pool: &PgPool, email: &str) {
    let _ = sqlx::query(
        "DELETE FROM tasks WHERE owner_id IN (SELECT id FROM users WHERE email = $1)",
    )
    .bind(email)
    .execute(pool)
    .await;
    let _ = sqlx::query("DELETE FROM users WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await;
}

async fn signup_user(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    name: &str,
    email: &str,
    password: &str,
) -> (serde_json::Value, String) {
    let req = test::TestRequest::post()
        .uri("/users")
        .set_json(json!({ "name": name, "email": email, "password": password }))
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    assert_eq!(
        status,
        actix_web::http::StatusCode::CREATED,
        "Signup failed. Body: {:?}",
        String::from_utf8_lossy(&body)
    );

    let body: serde_json::Value = serde_json::from_slice(&body).expect("signup response JSON");
    let token = body["token"].as_str().expect("token in response").to_string();
    (body["user"].clone(), token)
}

/// Builds a single-file multipart body for the avatar upload endpoint.
fn multipart_body(filename: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    let boundary = "----taskhaven-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

fn sample_png() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        64,
        64,
        image::Rgba([10, 200, 30, 255]),
    ));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

macro_rules! test_app {
    ($pool:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($pool.clone()))
                .app_data(web::Data::new(TokenService::new(TEST_SECRET)))
                .wrap(Logger::default())
                .service(health::health)
                .configure(routes::config),
        )
        .await
    };
}

#[actix_rt::test]
async fn test_signup_and_login_flow() {
    let pool = test_pool().await;
    let email = "signup_flow@example.com";
    cleanup_user(&pool, email).await;

    let app = test_app!(pool);

    let (user, signup_token) = signup_user(&app, "Ahmed", email, "Mypass01x").await;
    assert_eq!(user["email"], email);
    assert_eq!(user["name"], "Ahmed");
    assert_eq!(user["age"], 0);

    // Secrets never appear in the serialized user
    assert!(user.get("password_hash").is_none());
    assert!(user.get("sessions").is_none());
    assert!(user.get("avatar").is_none());

    // The stored hash is not the plaintext
    let stored_hash: String =
        sqlx::query_scalar("SELECT password_hash FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_ne!(stored_hash, "Mypass01x");

    // Duplicate signup fails
    let req = test::TestRequest::post()
        .uri("/users")
        .set_json(json!({ "name": "Ahmed", "email": email, "password": "Mypass01x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

    // Login succeeds and yields a distinct token (multi-session)
    let req = test::TestRequest::post()
        .uri("/users/login")
        .set_json(json!({ "email": email, "password": "Mypass01x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let login_token = body["token"].as_str().unwrap().to_string();
    assert_ne!(login_token, signup_token);
    assert!(body["user"].get("password_hash").is_none());

    // Both sessions are accepted by the guard
    for token in [&signup_token, &login_token] {
        let req = test::TestRequest::get()
            .uri("/users/me")
            .append_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    }

    // Wrong password and unknown email are both 401
    let req = test::TestRequest::post()
        .uri("/users/login")
        .set_json(json!({ "email": email, "password": "WrongPass1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/users/login")
        .set_json(json!({ "email": "nobody@example.com", "password": "Mypass01x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

    cleanup_user(&pool, email).await;
}

#[actix_rt::test]
async fn test_invalid_signup_inputs() {
    let pool = test_pool().await;
    let app = test_app!(pool);

    let test_cases = vec![
        (
            json!({ "name": "X", "email": "x@example.com", "password": "abc12" }),
            "password too short",
        ),
        (
            json!({ "name": "X", "email": "x@example.com", "password": "MyPassWord1" }),
            "password contains password",
        ),
        (
            json!({ "name": "X", "email": "x@example.com", "password": "PASSWORD123" }),
            "password contains password uppercase",
        ),
        (
            json!({ "name": "X", "email": "not-an-email", "password": "Mypass01x" }),
            "invalid email format",
        ),
        (
            json!({ "name": "   ", "email": "x@example.com", "password": "Mypass01x" }),
            "blank name",
        ),
        (
            json!({ "name": "X", "email": "x@example.com", "age": -4, "password": "Mypass01x" }),
            "negative age",
        ),
    ];

    for (payload, description) in test_cases {
        let req = test::TestRequest::post()
            .uri("/users")
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        assert_eq!(
            status,
            actix_web::http::StatusCode::BAD_REQUEST,
            "Test case failed: {}. Body: {:?}",
            description,
            String::from_utf8_lossy(&body)
        );
    }
}

#[actix_rt::test]
async fn test_duplicate_email_constraint_reads_as_validation() {
    use actix_web::ResponseError;

    let pool = test_pool().await;
    let email = "unique_race@example.com";
    cleanup_user(&pool, email).await;

    let insert =
        "INSERT INTO users (id, name, age, email, password_hash) VALUES ($1, $2, 0, $3, $4)";
    sqlx::query(insert)
        .bind(uuid::Uuid::new_v4())
        .bind("First")
        .bind(email)
        .bind("$2b$12$placeholder")
        .execute(&pool)
        .await
        .unwrap();

    // Two concurrent signups can both pass the handler's pre-check; the
    // loser's INSERT then trips the UNIQUE constraint, and that database
    // error must surface as a 400, not a 500.
    let err = sqlx::query(insert)
        .bind(uuid::Uuid::new_v4())
        .bind("Second")
        .bind(email)
        .bind("$2b$12$placeholder")
        .execute(&pool)
        .await
        .expect_err("duplicate email insert should fail");

    let app_err: taskhaven::error::AppError = err.into();
    assert_eq!(
        app_err.error_response().status(),
        actix_web::http::StatusCode::BAD_REQUEST
    );

    cleanup_user(&pool, email).await;
}

#[actix_rt::test]
async fn test_profile_update_allow_list() {
    let pool = test_pool().await;
    let email = "profile_update@example.com";
    cleanup_user(&pool, email).await;

    let app = test_app!(pool);
    let (_, token) = signup_user(&app, "Original", email, "Mypass01x").await;
    let auth = ("Authorization", format!("Bearer {}", token));

    // Allowed fields apply
    let req = test::TestRequest::patch()
        .uri("/users/update")
        .append_header(auth.clone())
        .set_json(json!({ "name": "Renamed", "age": 31 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["age"], 31);
    assert!(body.get("password_hash").is_none());

    // Disallowed field fails the whole payload, nothing applied
    let req = test::TestRequest::patch()
        .uri("/users/update")
        .append_header(auth.clone())
        .set_json(json!({ "name": "Sneaky", "location": "Cairo" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/users/me")
        .append_header(auth.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["name"], "Renamed");

    // Password update: old credential stops working, new one works,
    // and the existing session survives
    let req = test::TestRequest::patch()
        .uri("/users/update")
        .append_header(auth.clone())
        .set_json(json!({ "password": "Newsecret9" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/users/login")
        .set_json(json!({ "email": email, "password": "Mypass01x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/users/login")
        .set_json(json!({ "email": email, "password": "Newsecret9" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/users/me")
        .append_header(auth)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);

    cleanup_user(&pool, email).await;
}

#[actix_rt::test]
async fn test_logout_and_logout_all() {
    let pool = test_pool().await;
    let email = "logout_flow@example.com";
    cleanup_user(&pool, email).await;

    let app = test_app!(pool);
    let (_, first_token) = signup_user(&app, "Logout", email, "Mypass01x").await;

    // Second session via login
    let req = test::TestRequest::post()
        .uri("/users/login")
        .set_json(json!({ "email": email, "password": "Mypass01x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let second_token = body["token"].as_str().unwrap().to_string();

    // Logout with the first token
    let req = test::TestRequest::post()
        .uri("/users/logout")
        .append_header(("Authorization", format!("Bearer {}", first_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);

    // The exact token is no longer accepted anywhere
    let req = test::TestRequest::get()
        .uri("/users/me")
        .append_header(("Authorization", format!("Bearer {}", first_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

    // Other sessions of the same user remain valid
    let req = test::TestRequest::get()
        .uri("/users/me")
        .append_header(("Authorization", format!("Bearer {}", second_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);

    // A third session, then logout-all from the second
    let req = test::TestRequest::post()
        .uri("/users/login")
        .set_json(json!({ "email": email, "password": "Mypass01x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let third_token = body["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/users/logout/all")
        .append_header(("Authorization", format!("Bearer {}", second_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);

    for token in [&second_token, &third_token] {
        let req = test::TestRequest::get()
            .uri("/users/me")
            .append_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    cleanup_user(&pool, email).await;
}

#[actix_rt::test]
async fn test_guard_rejects_bad_tokens() {
    let pool = test_pool().await;
    let email = "guard_reject@example.com";
    cleanup_user(&pool, email).await;

    let app = test_app!(pool);
    let (user, _) = signup_user(&app, "Guarded", email, "Mypass01x").await;
    let user_id: uuid::Uuid = user["id"].as_str().unwrap().parse().unwrap();

    // Missing header
    let req = test::TestRequest::get().uri("/users/me").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

    // Not a bearer header
    let req = test::TestRequest::get()
        .uri("/users/me")
        .append_header(("Authorization", "Token abcdef"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

    // Forged token: valid shape, wrong signing secret
    let forged = TokenService::new("some-other-secret").sign(user_id).unwrap();
    let req = test::TestRequest::get()
        .uri("/users/me")
        .append_header(("Authorization", format!("Bearer {}", forged)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

    // Well-signed token that was never issued (not in the session list)
    let unissued = TokenService::new(TEST_SECRET).sign(user_id).unwrap();
    let req = test::TestRequest::get()
        .uri("/users/me")
        .append_header(("Authorization", format!("Bearer {}", unissued)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

    cleanup_user(&pool, email).await;
}

#[actix_rt::test]
async fn test_account_deletion_cascades_to_tasks() {
    let pool = test_pool().await;
    let email = "cascade_delete@example.com";
    cleanup_user(&pool, email).await;

    let app = test_app!(pool);
    let (user, token) = signup_user(&app, "Cascade", email, "Mypass01x").await;
    let auth = ("Authorization", format!("Bearer {}", token));
    let user_id = user["id"].as_str().unwrap().to_string();

    for description in ["first", "second"] {
        let req = test::TestRequest::post()
            .uri("/tasks")
            .append_header(auth.clone())
            .set_json(json!({ "description": description }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
    }

    let req = test::TestRequest::delete()
        .uri("/users/delete")
        .append_header(auth.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["email"], email);
    assert!(body.get("password_hash").is_none());

    // Account and sessions are gone
    let req = test::TestRequest::get()
        .uri("/users/me")
        .append_header(auth)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

    // No task still references the deleted owner
    let remaining: i64 = sqlx::query_scalar("SELECT count(*) FROM tasks WHERE owner_id = $1")
        .bind(user_id.parse::<uuid::Uuid>().unwrap())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[actix_rt::test]
async fn test_avatar_lifecycle() {
    let pool = test_pool().await;
    let email = "avatar_flow@example.com";
    cleanup_user(&pool, email).await;

    let app = test_app!(pool);
    let (user, token) = signup_user(&app, "Avatar", email, "Mypass01x").await;
    let auth = ("Authorization", format!("Bearer {}", token));
    let user_id = user["id"].as_str().unwrap().to_string();

    // No avatar yet
    let req = test::TestRequest::get()
        .uri(&format!("/users/{}/avatar", user_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

    // Upload a PNG
    let (content_type, body) = multipart_body("me.png", &sample_png());
    let req = test::TestRequest::post()
        .uri("/users/me/avatar")
        .append_header(auth.clone())
        .append_header(("Content-Type", content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    let resp_body = test::read_body(resp).await;
    assert_eq!(
        status,
        actix_web::http::StatusCode::OK,
        "Avatar upload failed. Body: {:?}",
        String::from_utf8_lossy(&resp_body)
    );

    // Fetch without auth: normalized 250x250 PNG
    let req = test::TestRequest::get()
        .uri(&format!("/users/{}/avatar", user_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "image/png"
    );
    let bytes = test::read_body(resp).await;
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!(image::GenericImageView::dimensions(&img), (250, 250));

    // Unsupported extension
    let (content_type, body) = multipart_body("me.gif", &sample_png());
    let req = test::TestRequest::post()
        .uri("/users/me/avatar")
        .append_header(auth.clone())
        .append_header(("Content-Type", content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

    // Oversized upload
    let (content_type, body) = multipart_body("big.png", &vec![0u8; 1_100_000]);
    let req = test::TestRequest::post()
        .uri("/users/me/avatar")
        .append_header(auth.clone())
        .append_header(("Content-Type", content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

    // Undecodable bytes with an accepted extension
    let (content_type, body) = multipart_body("fake.png", b"not an image at all");
    let req = test::TestRequest::post()
        .uri("/users/me/avatar")
        .append_header(auth.clone())
        .append_header(("Content-Type", content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

    // Delete the avatar; fetch goes back to 404
    let req = test::TestRequest::delete()
        .uri("/users/me/avatar")
        .append_header(auth)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);

    let req = test::TestRequest::get()
        .uri(&format!("/users/{}/avatar", user_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

    cleanup_user(&pool, email).await;
}
