//! Request-level behaviour of the router
//!
//! Tests cover:
//! - Login redirects that remember where the viewer was going
//! - Not-found outcomes for unknown paths, posts, groups and profiles
//! - The timeline cache window and per-viewer chrome
//! - Follow / unfollow redirects and the unfollow asymmetry
//! - Post creation, editing and comments through the forms

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use folio::auth::session;
use folio::config::Config;
use folio::content::NewPost;
use folio::follow::FollowGraph;
use folio::db;
use folio::db::models::User;
use folio::forms::{INVALID_GROUP, REQUIRED};
use folio::routes;
use folio::state::AppState;

const BOUNDARY: &str = "folio-test-boundary";
const SMALL_GIF: &[u8] = b"GIF89a\x02\x00\x01\x00\x80\x00\x00\x00\x00\x00\xFF\xFF\xFF\x21\xF9\x04\x00\x00\x00\x00\x00\x2C\x00\x00\x00\x00\x02\x00\x01\x00\x00\x02\x02\x0C\x0A\x00\x3B";

struct TestApp {
    _dir: TempDir,
    state: AppState,
}

fn test_app() -> TestApp {
    test_app_with(|_| {})
}

fn test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.database.path = Some(dir.path().join("test.db"));
    config.storage.path = Some(dir.path().join("media"));
    configure(&mut config);

    let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    TestApp {
        _dir: dir,
        state: AppState::new(pool, config),
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        routes::app(self.state.clone()).oneshot(request).await.unwrap()
    }

    /// A user with a live session; returns the `Cookie` header value.
    async fn sign_in(&self, username: &str) -> (User, String) {
        let hash = bcrypt::hash("correct horse", 4).unwrap();
        let user = self
            .state
            .content
            .create_user(username, None, Some(&hash))
            .await
            .unwrap();
        let token = session::create_session(&self.state.db, &user.id, 1).unwrap();
        (user, format!("folio_session={}", token))
    }

    async fn publish(&self, author: &User, text: &str, image: Option<&str>) -> i64 {
        self.state
            .content
            .create_post(NewPost {
                author_id: author.id.clone(),
                text: text.to_string(),
                group_id: None,
                image: image.map(str::to_string),
            })
            .await
            .unwrap()
            .id
    }
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn post_multipart(
    uri: &str,
    cookie: &str,
    fields: &[(&str, &str)],
    image: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: image/gif\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn post_cards(body: &str) -> usize {
    body.matches("class=\"card post\"").count()
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

#[tokio::test]
async fn test_anonymous_create_redirects_to_login_with_next() {
    let app = test_app();

    let response = app.send(get("/create", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login?next=%2Fcreate");

    let response = app.send(get("/follow?page=2", None)).await;
    assert_eq!(location(&response), "/auth/login?next=%2Ffollow%3Fpage%3D2");
}

#[tokio::test]
async fn test_anonymous_follow_redirects_to_login() {
    let app = test_app();
    app.sign_in("leo").await;

    let response = app.send(post_form("/profile/leo/follow", None, "")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "/auth/login?next=%2Fprofile%2Fleo%2Ffollow"
    );
}

#[tokio::test]
async fn test_follow_completes_after_signing_in() {
    let app = test_app();
    let (leo, _) = app.sign_in("leo").await;
    let (reader, _) = app.sign_in("reader").await;

    let response = app.send(post_form("/profile/leo/follow", None, "")).await;
    let login = location(&response).to_string();
    assert_eq!(login, "/auth/login?next=%2Fprofile%2Fleo%2Ffollow");

    let response = app
        .send(post_form(
            "/auth/login",
            None,
            "username=reader&password=correct+horse&next=%2Fprofile%2Fleo%2Ffollow",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let next = location(&response).to_string();
    assert_eq!(next, "/profile/leo/follow");
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    // The browser follows the redirect with a GET
    let response = app.send(get(&next, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/leo");
    assert!(app
        .state
        .follows
        .is_following(Some(&reader.to_ref()), &leo.to_ref())
        .await
        .unwrap());

    let response = app.send(get("/profile/leo/unfollow", Some(&cookie))).await;
    assert_eq!(location(&response), "/profile/leo");
    assert!(!app
        .state
        .follows
        .is_following(Some(&reader.to_ref()), &leo.to_ref())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_comment_link_after_login_lands_on_the_post() {
    let app = test_app();
    let (leo, cookie) = app.sign_in("leo").await;
    let id = app.publish(&leo, "discuss", None).await;
    let comment_uri = format!("/posts/{}/comment", id);

    let response = app.send(get(&comment_uri, None)).await;
    assert_eq!(
        location(&response),
        format!("/auth/login?next=%2Fposts%2F{}%2Fcomment", id)
    );

    let response = app.send(get(&comment_uri, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}", id));

    let response = app.send(get("/posts/abc/comment", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_login_returns_to_next_with_session_cookie() {
    let app = test_app();
    app.sign_in("leo").await;

    let response = app
        .send(post_form(
            "/auth/login",
            None,
            "username=leo&password=correct+horse&next=%2Fcreate",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/create");
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("folio_session="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_login_ignores_offsite_next() {
    let app = test_app();
    app.sign_in("leo").await;

    let response = app
        .send(post_form(
            "/auth/login",
            None,
            "username=leo&password=correct+horse&next=%2F%2Fevil.example",
        ))
        .await;
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_wrong_password_rerenders_login() {
    let app = test_app();
    app.sign_in("leo").await;

    let response = app
        .send(post_form(
            "/auth/login",
            None,
            "username=leo&password=wrong+horse",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert!(body_text(response)
        .await
        .contains("Please enter a correct username and password"));
}

#[tokio::test]
async fn test_signup_reports_field_errors() {
    let app = test_app();
    app.sign_in("leo").await;

    let response = app
        .send(post_form("/auth/signup", None, "username=leo&password=short"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("A user with that username already exists."));
    assert!(body.contains("This password is too short."));
}

#[tokio::test]
async fn test_logout_clears_session() {
    let app = test_app();
    let (_, cookie) = app.sign_in("leo").await;

    let response = app.send(post_form("/auth/logout", Some(&cookie), "")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let response = app.send(get("/create", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

// ============================================================================
// NOT FOUND
// ============================================================================

#[tokio::test]
async fn test_unknown_things_are_not_found() {
    let app = test_app();
    let (leo, _) = app.sign_in("leo").await;
    let id = app.publish(&leo, "exists", None).await;

    for uri in [
        "/nowhere/at/all".to_string(),
        "/posts/abc".to_string(),
        format!("/posts/{}", id + 1),
        "/group/missing".to_string(),
        "/profile/ghost".to_string(),
        "/media/posts/missing.gif".to_string(),
        "/assets/css/missing.css".to_string(),
    ] {
        let response = app.send(get(&uri, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }

    let response = app.send(get(&format!("/posts/{}", id), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_stylesheet_is_served() {
    let app = test_app();
    let response = app.send(get("/assets/css/style.css", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "text/css"
    );
}

// ============================================================================
// TIMELINE CACHE
// ============================================================================

#[tokio::test]
async fn test_timeline_is_served_from_cache_within_window() {
    let app = test_app_with(|config| config.feed.timeline_cache_secs = 1);
    let (leo, _) = app.sign_in("leo").await;
    let id = app.publish(&leo, "soon to be gone", None).await;

    let first = body_text(app.send(get("/", None)).await).await;
    assert!(first.contains("soon to be gone"));

    app.state.content.delete_post(id).await.unwrap();

    // Same bytes while the window is open
    let second = body_text(app.send(get("/", None)).await).await;
    assert_eq!(first, second);

    // Uncached views see the delete at once
    let profile = body_text(app.send(get("/profile/leo", None)).await).await;
    assert!(!profile.contains("soon to be gone"));

    // Expired entries are re-rendered on the next request
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let third = body_text(app.send(get("/", None)).await).await;
    assert!(!third.contains("soon to be gone"));
}

#[tokio::test]
async fn test_timeline_cache_ignores_page_number() {
    let app = test_app();
    let (leo, _) = app.sign_in("leo").await;
    for i in 0..15 {
        app.publish(&leo, &format!("entry {}", i), None).await;
    }

    let first = body_text(app.send(get("/", None)).await).await;
    assert_eq!(post_cards(&first), 10);

    let second = body_text(app.send(get("/?page=2", None)).await).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_cached_timeline_gets_each_viewers_chrome() {
    let app = test_app();
    let (leo, _) = app.sign_in("leo").await;
    let (_, reader_cookie) = app.sign_in("reader").await;
    app.publish(&leo, "hello world", None).await;

    let anonymous = body_text(app.send(get("/", None)).await).await;
    assert!(anonymous.contains("Log in"));
    assert!(!anonymous.contains("Log out"));

    let signed_in = body_text(app.send(get("/", Some(&reader_cookie))).await).await;
    assert!(signed_in.contains("hello world"));
    assert!(signed_in.contains("Log out"));
    assert!(signed_in.contains("/profile/reader"));
}

// ============================================================================
// GROUP PAGES
// ============================================================================

#[tokio::test]
async fn test_group_page_two_holds_the_remainder() {
    let app = test_app();
    let (leo, _) = app.sign_in("leo").await;
    let cats = app
        .state
        .content
        .create_group("cats", "Cats", "All about cats")
        .await
        .unwrap();
    for i in 0..15 {
        app.state
            .content
            .create_post(NewPost {
                author_id: leo.id.clone(),
                text: format!("cat {}", i),
                group_id: Some(cats.id),
                image: None,
            })
            .await
            .unwrap();
    }

    let page_one = body_text(app.send(get("/group/cats", None)).await).await;
    assert_eq!(post_cards(&page_one), 10);
    assert!(page_one.contains("All about cats"));

    let page_two = body_text(app.send(get("/group/cats?page=2", None)).await).await;
    assert_eq!(post_cards(&page_two), 5);

    let garbage = body_text(app.send(get("/group/cats?page=abc", None)).await).await;
    assert_eq!(post_cards(&garbage), 10);
}

// ============================================================================
// FOLLOWS
// ============================================================================

#[tokio::test]
async fn test_follow_redirects() {
    let app = test_app();
    app.sign_in("leo").await;
    let (_, cookie) = app.sign_in("reader").await;

    let response = app
        .send(post_form("/profile/leo/follow", Some(&cookie), ""))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/leo");

    let response = app
        .send(post_form("/profile/leo/follow", Some(&cookie), ""))
        .await;
    assert_eq!(location(&response), "/profile/reader");

    let response = app
        .send(post_form("/profile/reader/follow", Some(&cookie), ""))
        .await;
    assert_eq!(location(&response), "/profile/reader");

    let response = app
        .send(post_form("/profile/ghost/follow", Some(&cookie), ""))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unfollow_without_relation_is_not_found() {
    let app = test_app();
    app.sign_in("leo").await;
    let (_, cookie) = app.sign_in("reader").await;

    app.send(post_form("/profile/leo/follow", Some(&cookie), ""))
        .await;

    let response = app
        .send(post_form("/profile/leo/unfollow", Some(&cookie), ""))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/leo");

    let response = app
        .send(post_form("/profile/leo/unfollow", Some(&cookie), ""))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(post_form("/profile/reader/unfollow", Some(&cookie), ""))
        .await;
    assert_eq!(location(&response), "/profile/reader");
}

#[tokio::test]
async fn test_follow_page_lists_followed_authors() {
    let app = test_app();
    let (leo, _) = app.sign_in("leo").await;
    let (reader, cookie) = app.sign_in("reader").await;
    app.publish(&leo, "from leo", None).await;
    app.publish(&reader, "from reader", None).await;

    let before = body_text(app.send(get("/follow", Some(&cookie))).await).await;
    assert_eq!(post_cards(&before), 0);

    app.send(post_form("/profile/leo/follow", Some(&cookie), ""))
        .await;

    let after = body_text(app.send(get("/follow", Some(&cookie))).await).await;
    assert!(after.contains("from leo"));
    assert!(!after.contains("from reader"));

    let profile = body_text(app.send(get("/profile/leo", Some(&cookie))).await).await;
    assert!(profile.contains("/profile/leo/unfollow"));
}

// ============================================================================
// POSTS AND COMMENTS
// ============================================================================

#[tokio::test]
async fn test_create_post_with_image() {
    let app = test_app();
    let (leo, cookie) = app.sign_in("leo").await;
    app.state
        .content
        .create_group("cats", "Cats", "")
        .await
        .unwrap();

    let response = app
        .send(post_multipart(
            "/create",
            &cookie,
            &[("text", "Look at this"), ("group", "cats")],
            Some(("small.gif", SMALL_GIF)),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/leo");

    let feed = app.state.feed.profile("leo", None, None).await.unwrap();
    let post = &feed.page.items[0];
    assert_eq!(post.text, "Look at this");
    assert_eq!(post.author.id, leo.id);
    assert_eq!(post.group.as_ref().unwrap().slug, "cats");
    assert_eq!(post.image.as_deref(), Some("posts/small.gif"));

    let response = app.send(get("/media/posts/small.gif", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "image/gif"
    );
}

#[tokio::test]
async fn test_invalid_post_form_is_rerendered() {
    let app = test_app();
    let (_, cookie) = app.sign_in("leo").await;

    let response = app
        .send(post_multipart(
            "/create",
            &cookie,
            &[("text", "   "), ("group", "nope")],
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains(REQUIRED));
    assert!(body.contains(INVALID_GROUP));

    let feed = app.state.feed.timeline(None).await.unwrap();
    assert_eq!(feed.count, 0);
}

#[tokio::test]
async fn test_any_signed_in_user_can_edit() {
    let app = test_app();
    let (leo, _) = app.sign_in("leo").await;
    let (_, anna_cookie) = app.sign_in("anna").await;
    let id = app.publish(&leo, "original", Some("posts/keep.gif")).await;

    let edit_uri = format!("/posts/{}/edit", id);
    let response = app.send(get(&edit_uri, None)).await;
    assert_eq!(
        location(&response),
        format!("/auth/login?next=%2Fposts%2F{}%2Fedit", id)
    );

    let form = body_text(app.send(get(&edit_uri, Some(&anna_cookie))).await).await;
    assert!(form.contains("original"));

    let response = app
        .send(post_multipart(
            &edit_uri,
            &anna_cookie,
            &[("text", "rewritten"), ("group", "")],
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}", id));

    let post = app.state.content.post_by_id(id).await.unwrap();
    assert_eq!(post.text, "rewritten");
    assert_eq!(post.author.id, leo.id);
    assert!(post.edited_at.is_some());
    assert_eq!(post.image.as_deref(), Some("posts/keep.gif"));
}

#[tokio::test]
async fn test_comments_validate_and_redirect() {
    let app = test_app();
    let (leo, cookie) = app.sign_in("leo").await;
    let id = app.publish(&leo, "discuss", None).await;
    let comment_uri = format!("/posts/{}/comment", id);

    let response = app
        .send(post_form(&comment_uri, Some(&cookie), "text=+++"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains(REQUIRED));

    let response = app
        .send(post_form(&comment_uri, Some(&cookie), "text=Nice+post"))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}", id));

    let detail = body_text(app.send(get(&format!("/posts/{}", id), None)).await).await;
    assert!(detail.contains("Nice post"));

    let response = app
        .send(post_form(
            &format!("/posts/{}/comment", id + 1),
            Some(&cookie),
            "text=lost",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
